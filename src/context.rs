// Copyright 2014 Nick Fitzgerald
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The embedded API: [`Context`] ties the heap, the intern table, the
//! global environment, and the reader/evaluator/printer together into
//! the one object a host actually holds onto.
//!
//! A `Context` is created with a [`ContextConfig`] (heap sizing, an
//! error callback, an optional file loader), used to read and evaluate
//! source text, and dropped when the host is done with it -- `Drop`
//! walks the heap's intrusive list and frees every live object, playing
//! the role of the original C API's explicit `vm_free`.

use std::io::Write;

use crate::error::{Error, ErrorReport, Result};
use crate::heap::{Heap, HeapStats, ObjKind, ObjPtr, Rooted};
use crate::value::{Cons, Lambda, Primitive, PrimitiveFn, SchemeString, Symbol, Value, Vector};
use crate::{environment, printer, reader};

/// A pointer to an environment-frame heap object. An alias rather than a
/// newtype, matching how every other heap-object kind is passed around
/// as a bare `ObjPtr` and checked at the point of use.
pub type EnvPtr = ObjPtr;

pub static DEFAULT_INITIAL_HEAP_BYTES: usize = 1 << 16;
pub static DEFAULT_MIN_HEAP_FLOOR: usize = 1 << 16;
pub static DEFAULT_GROWTH_FACTOR: f64 = 1.0;
pub static DEFAULT_HARD_CAP_BYTES: usize = 1 << 28;

/// The `write`/`display` choice for [`Context::print`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStyle {
    Write,
    Display,
}

/// Configuration consumed by [`Context::new`]. `error_callback` and
/// `loader` are the embedded API's two host hooks (spec.md §6).
pub struct ContextConfig {
    pub initial_heap_bytes: usize,
    pub min_heap_floor: usize,
    pub growth_factor: f64,
    pub hard_cap_bytes: usize,
    pub error_callback: Box<dyn FnMut(ErrorReport)>,
    pub loader: Option<Box<dyn FnMut(&mut Context, EnvPtr, &str) -> Result<()>>>,
}

impl Default for ContextConfig {
    fn default() -> ContextConfig {
        ContextConfig {
            initial_heap_bytes: DEFAULT_INITIAL_HEAP_BYTES,
            min_heap_floor: DEFAULT_MIN_HEAP_FLOOR,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            hard_cap_bytes: DEFAULT_HARD_CAP_BYTES,
            error_callback: Box::new(|report| {
                tracing::error!(%report, "scheme error");
            }),
            loader: None,
        }
    }
}

pub struct Context {
    heap: Box<Heap>,
    global_env: EnvPtr,
    current_env: Option<EnvPtr>,
    current_result: Value,

    error_flag: bool,
    last_error: Option<ErrorReport>,
    error_callback: Box<dyn FnMut(ErrorReport)>,
    loader: Option<Box<dyn FnMut(&mut Context, EnvPtr, &str) -> Result<()>>>,

    gensym_counter: u64,
    exit_requested: Option<i32>,
}

impl Context {
    pub fn new(config: ContextConfig) -> Context {
        let mut heap = Box::new(Heap::new(
            config.initial_heap_bytes,
            config.min_heap_floor,
            config.growth_factor,
            config.hard_cap_bytes,
        ));
        let global_env = heap
            .alloc(ObjKind::Environment(environment::Environment::new(None)))
            .expect("the first allocation in a fresh heap cannot exceed the hard cap");
        Context {
            heap,
            global_env,
            current_env: None,
            current_result: Value::Undefined,
            error_flag: false,
            last_error: None,
            error_callback: config.error_callback,
            loader: config.loader,
            gensym_counter: 0,
            exit_requested: None,
        }
    }

    pub fn global_environment(&self) -> EnvPtr {
        self.global_env
    }

    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    pub fn has_error(&self) -> bool {
        self.error_flag
    }

    pub fn clear_error(&mut self) {
        self.error_flag = false;
        self.last_error = None;
    }

    pub fn last_error(&self) -> Option<&ErrorReport> {
        self.last_error.as_ref()
    }

    pub fn exit_requested(&self) -> Option<i32> {
        self.exit_requested
    }

    pub fn request_exit(&mut self, code: i32) {
        self.exit_requested = Some(code);
    }

    /// Install the default global environment: every primitive named in
    /// the primitives registry, bound in the global frame.
    pub fn install_default_environment(&mut self) {
        crate::primitives::install(self);
    }

    /// Record a runtime or engineering failure: sets the error flag,
    /// stores it for `last_error`, and invokes the host's error
    /// callback. Returns the sentinel value the failing operation should
    /// produce, per spec.md §7's "errors accumulate, evaluation does not
    /// unwind" discipline.
    pub fn report_error(&mut self, err: Error) -> Value {
        if let Error::Invariant { message } = &err {
            debug_assert!(false, "engineering invariant violated: {message}");
        }
        let report = err.to_report();
        self.error_flag = true;
        (self.error_callback)(report.clone());
        self.last_error = Some(report);
        Value::Undefined
    }

    /// Run `f` with `value` protected as a temporary GC root for the
    /// duration of the call. The scope-based counterpart to the
    /// teacher's `Rooted<T>` guard (see [`crate::heap::Rooted`]), used
    /// where a closure reads more naturally than a guard variable.
    pub fn protect<F, T>(&mut self, value: Value, f: F) -> Result<T>
    where
        F: FnOnce(&mut Context) -> Result<T>,
    {
        let _root = Rooted::new(&self.heap, value)?;
        f(self)
    }

    fn roots(&self) -> Vec<Value> {
        let mut roots = Vec::with_capacity(4);
        if let Some(env) = self.current_env {
            roots.push(Value::Environment(env));
        }
        roots.push(Value::Environment(self.global_env));
        roots.push(self.current_result);
        roots
    }

    pub fn collect_garbage(&mut self) {
        let roots = self.roots();
        self.heap.collect_garbage(&roots);
    }

    fn alloc(&mut self, kind: ObjKind) -> Result<ObjPtr> {
        if self.heap.should_collect(0) {
            self.collect_garbage();
        }
        self.heap.alloc(kind)
    }

    pub fn alloc_cons(&mut self, car: Value, cdr: Value) -> Result<Value> {
        self.alloc(ObjKind::Cons(Cons::new(car, cdr))).map(Value::Pair)
    }

    pub fn alloc_string(&mut self, text: &str) -> Result<Value> {
        self.alloc(ObjKind::Str(SchemeString::new(text))).map(Value::Str)
    }

    pub fn alloc_vector(&mut self, data: Vec<Value>) -> Result<Value> {
        self.alloc(ObjKind::Vector(Vector::new(data))).map(Value::Vector)
    }

    pub fn alloc_environment(&mut self, parent: Option<EnvPtr>) -> Result<Value> {
        self.alloc(ObjKind::Environment(environment::Environment::new(parent)))
            .map(Value::Environment)
    }

    pub fn alloc_function(&mut self, env: EnvPtr, params: Value, body: Value) -> Result<Value> {
        self.alloc(ObjKind::Function(Lambda {
            env,
            params,
            body,
            name: std::cell::Cell::new(None),
        }))
        .map(Value::Function)
    }

    pub fn alloc_macro(&mut self, env: EnvPtr, params: Value, body: Value) -> Result<Value> {
        self.alloc(ObjKind::Macro(Lambda {
            env,
            params,
            body,
            name: std::cell::Cell::new(None),
        }))
        .map(Value::Macro)
    }

    pub fn alloc_primitive(&mut self, func: PrimitiveFn) -> Result<Value> {
        self.alloc(ObjKind::Primitive(Primitive {
            func,
            name: std::cell::Cell::new(None),
        }))
        .map(Value::Primitive)
    }

    /// Ensure a canonical symbol object exists for `name`, allocating one
    /// (and threading it into the intern chain) only the first time a
    /// given name is seen.
    pub fn intern(&mut self, name: &str) -> Value {
        if let Some(existing) = self.heap.intern_lookup(name) {
            return existing;
        }
        let ptr = self
            .alloc(ObjKind::Symbol(Symbol::new(name)))
            .expect("symbol allocation should never legitimately hit the hard cap this early");
        self.heap.intern_insert(ptr);
        Value::Symbol(ptr)
    }

    /// Produce a fresh, already-interned symbol named `g<N>` for a
    /// monotonically increasing per-context counter `N`.
    pub fn gensym(&mut self) -> Value {
        let n = self.gensym_counter;
        self.gensym_counter += 1;
        self.intern(&format!("g{n}"))
    }

    /// Read the first complete datum out of `source`. Returns `eof` on
    /// empty input and `undefined` (with the error flag set) on a parse
    /// error, per spec.md §4.3.
    pub fn read(&mut self, source: &str) -> Value {
        reader::read_from(self, source).0
    }

    /// Evaluate `value` in `env`. Never returns a Rust `Err`: runtime
    /// failures are reported via [`Context::report_error`] and a
    /// sentinel value is returned instead, per spec.md §4.5's "the
    /// evaluator does not unwind automatically".
    pub fn eval(&mut self, env: EnvPtr, value: Value) -> Value {
        let saved = self.current_env.replace(env);
        let result = match crate::eval::eval(self, env, value) {
            Ok(v) => v,
            Err(e) => self.report_error(e),
        };
        self.current_env = saved;
        self.current_result = result;
        result
    }

    /// Read and evaluate every top-level form in `source` in the global
    /// environment, stopping early if `exit` was requested. Returns the
    /// value of the last form evaluated, or `eof` if `source` had none.
    pub fn eval_str(&mut self, source: &str) -> Value {
        let mut rest = source;
        let mut last = Value::Eof;
        loop {
            let (form, consumed) = reader::read_from(self, rest);
            if matches!(form, Value::Eof) {
                return last;
            }
            rest = &rest[consumed..];
            last = self.eval(self.global_env, form);
            if self.exit_requested.is_some() {
                return last;
            }
        }
    }

    /// Run the host's loader callback against `path`, evaluating its
    /// contents in `env`. No-op (and not an error) if no loader was
    /// configured.
    pub fn load(&mut self, env: EnvPtr, path: &str) -> Result<()> {
        let Some(mut loader) = self.loader.take() else {
            return Ok(());
        };
        let result = loader(self, env, path);
        self.loader = Some(loader);
        result
    }

    pub fn print(&mut self, value: Value, style: PrintStyle, sink: &mut dyn Write) -> Result<()> {
        let mut buf = String::new();
        match style {
            PrintStyle::Write => printer::write_value(&mut buf, value),
            PrintStyle::Display => printer::display_value(&mut buf, value),
        }
        .map_err(|e| Error::runtime(format!("formatting failure: {e}")))?;
        sink.write_all(buf.as_bytes())
            .map_err(|e| Error::runtime(format!("write failure: {e}")))
    }

    pub fn write_to_string(&self, value: Value) -> String {
        let mut buf = String::new();
        let _ = printer::write_value(&mut buf, value);
        buf
    }

    pub fn display_to_string(&self, value: Value) -> String {
        let mut buf = String::new();
        let _ = printer::display_value(&mut buf, value);
        buf
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Context {{ heap: {:?} }}", self.heap.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_has_an_empty_global_environment() {
        let mut ctx = Context::new(ContextConfig::default());
        let sym = match ctx.intern("nonexistent-binding") {
            Value::Symbol(p) => p,
            _ => unreachable!(),
        };
        let env = ctx.global_environment();
        assert_eq!(environment::lookup(env, sym), Value::Undefined);
    }

    #[test]
    fn intern_is_idempotent() {
        let mut ctx = Context::new(ContextConfig::default());
        let a = ctx.intern("foo");
        let b = ctx.intern("foo");
        assert_eq!(a, b);
    }

    #[test]
    fn gensym_produces_distinct_symbols() {
        let mut ctx = Context::new(ContextConfig::default());
        let a = ctx.gensym();
        let b = ctx.gensym();
        assert_ne!(a, b);
    }

    #[test]
    fn load_runs_the_configured_loader_callback() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(+ 1 2 3)").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut config = ContextConfig::default();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Value::Undefined));
        let seen_inner = seen.clone();
        config.loader = Some(Box::new(move |ctx, env, path| {
            let source = std::fs::read_to_string(path)
                .map_err(|e| Error::runtime(format!("cannot read {path}: {e}")))?;
            let form = ctx.read(&source);
            *seen_inner.borrow_mut() = ctx.eval(env, form);
            Ok(())
        }));
        let mut ctx = Context::new(config);
        let env = ctx.global_environment();
        ctx.install_default_environment();
        ctx.load(env, &path).unwrap();
        assert_eq!(*seen.borrow(), Value::Number(6.0));
    }

    #[test]
    fn load_is_a_no_op_without_a_configured_loader() {
        let mut ctx = Context::new(ContextConfig::default());
        let env = ctx.global_environment();
        assert!(ctx.load(env, "/nonexistent/path.scm").is_ok());
    }

    #[test]
    fn gc_survives_a_rooted_allocation_storm() {
        let mut ctx = Context::new(ContextConfig {
            initial_heap_bytes: 256,
            min_heap_floor: 256,
            ..ContextConfig::default()
        });
        let mut list = Value::Nil;
        for i in 0..2000 {
            list = ctx
                .protect(list, |ctx| ctx.alloc_cons(Value::Number(i as f64), list))
                .unwrap();
        }
        assert_eq!(list.list_len(), 2000);
    }
}
