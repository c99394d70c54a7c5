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

//! The `heap` module provides memory management for the interpreter.
//!
//! ## Allocation
//!
//! Every heap-allocated object -- cons cells, strings, symbols,
//! primitives, functions, macros, vectors, and environment frames -- is a
//! [`GcObject`]: a small header (a mark bit and an intrusive `next`
//! pointer) wrapping an [`ObjKind`] payload. `GcObject`s are individually
//! `Box`-allocated and threaded into one singly linked list anchored at
//! `Heap::head`; there is no arena and nothing ever moves, so a raw
//! pointer to a live object ([`ObjPtr`]) stays valid for as long as the
//! object is reachable.
//!
//! ## Garbage collection
//!
//! `Heap` tracks a running `allocated` byte count against a `threshold`.
//! Just before an allocation would push `allocated` over `threshold`, a
//! collection runs. Collection is non-moving mark-and-sweep:
//!
//! 1. **Mark.** Starting from the root set (handed in by the caller --
//!    see [`crate::context::Context::collect_garbage`]), an iterative
//!    worklist walk visits every reachable object and sets its mark bit.
//!    The walk is iterative rather than recursive so that a long cons
//!    chain cannot overflow the native stack during a collection.
//! 2. **Sweep.** The intrusive list is walked with a `prev`/`cur` cursor;
//!    unmarked nodes are unlinked and freed (symbols are additionally
//!    unlinked from the intern table), marked nodes have their bit
//!    cleared and their size folded into the post-sweep `allocated`
//!    total.
//! 3. **Regrow.** `threshold` becomes `allocated * (1 + growth_factor)`,
//!    floored at a configured minimum, so pressure has to build back up
//!    before the next collection.
//!
//! Allocating past `hard_cap` -- even immediately after a collection --
//! is a runtime error, not a crash: the caller gets an
//! [`crate::error::Error::Runtime`] and decides how to proceed.
//!
//! ## Temporary roots
//!
//! A computation that allocates more than once while holding onto an
//! intermediate result (for example, building a list by repeated
//! `cons`ing) must keep that intermediate reachable across the *next*
//! allocation, which might trigger a collection. [`Heap`] keeps a bounded
//! stack of such temporary roots; [`crate::context::Context::protect`] is
//! the safe, scope-based way to push and pop it, playing the same role
//! the teacher repository's `Rooted<T>` RAII guard does, without needing
//! a raw back-pointer to the heap (see DESIGN.md).

use std::cell::{Cell, RefCell};
use std::mem::size_of;
use std::ptr::NonNull;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::value::{Cons, Lambda, Primitive, SchemeString, Symbol, Value, Vector};

/// A pointer to a live, non-moving heap object. Equality is pointer
/// identity.
pub type ObjPtr = NonNull<GcObject>;

/// The maximum depth of the temporary-root stack. Exceeding it indicates
/// a bug in the interpreter (an allocation sequence that nests far deeper
/// than any real Scheme program's evaluation would require), not a fault
/// in the Scheme program being run.
const MAX_TEMP_ROOTS: usize = 4096;

/// The GC header shared by every heap object: a mark bit and the next
/// pointer threading it into the heap's intrusive list.
pub struct GcHeader {
    marked: Cell<bool>,
    next: Cell<Option<ObjPtr>>,
}

/// The union of heap object kinds, tagged so that every GC operation
/// (mark, size, free) dispatches over this one enum rather than through
/// per-kind virtual tables.
pub enum ObjKind {
    Cons(Cons),
    Str(SchemeString),
    Symbol(Symbol),
    Primitive(Primitive),
    Function(Lambda),
    Macro(Lambda),
    Vector(Vector),
    Environment(Environment),
}

impl ObjKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjKind::Cons(_) => "cons",
            ObjKind::Str(_) => "string",
            ObjKind::Symbol(_) => "symbol",
            ObjKind::Primitive(_) => "primitive",
            ObjKind::Function(_) => "function",
            ObjKind::Macro(_) => "macro",
            ObjKind::Vector(_) => "vector",
            ObjKind::Environment(_) => "environment",
        }
    }
}

pub struct GcObject {
    header: GcHeader,
    pub kind: ObjKind,
}

/// Diagnostic snapshot of heap state, exposed for tests and hosts that
/// want to observe collector behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub allocated: usize,
    pub threshold: usize,
    pub hard_cap: usize,
    pub live_objects: usize,
}

pub struct Heap {
    head: Cell<Option<ObjPtr>>,
    symbol_table: Cell<Option<ObjPtr>>,
    temp_roots: RefCell<Vec<Value>>,

    allocated: usize,
    threshold: usize,
    hard_cap: usize,
    min_floor: usize,
    growth_factor: f64,

    live_objects: usize,
    collections_run: u64,
}

impl Heap {
    pub fn new(
        initial_heap_bytes: usize,
        min_heap_floor: usize,
        growth_factor: f64,
        hard_cap_bytes: usize,
    ) -> Heap {
        Heap {
            head: Cell::new(None),
            symbol_table: Cell::new(None),
            temp_roots: RefCell::new(Vec::new()),
            allocated: 0,
            threshold: initial_heap_bytes.max(min_heap_floor),
            hard_cap: hard_cap_bytes,
            min_floor: min_heap_floor,
            growth_factor,
            live_objects: 0,
            collections_run: 0,
        }
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            allocated: self.allocated,
            threshold: self.threshold,
            hard_cap: self.hard_cap,
            live_objects: self.live_objects,
        }
    }

    pub fn collections_run(&self) -> u64 {
        self.collections_run
    }

    pub fn should_collect(&self, incoming: usize) -> bool {
        self.allocated + incoming > self.threshold
    }

    /// The single entry point through which every object is born.
    pub fn alloc(&mut self, kind: ObjKind) -> Result<ObjPtr> {
        let size = Self::object_size(&kind);
        if self.allocated + size > self.hard_cap {
            return Err(Error::runtime(format!(
                "heap allocation of {size} bytes exceeds hard cap of {} bytes",
                self.hard_cap
            )));
        }
        let boxed = Box::new(GcObject {
            header: GcHeader {
                marked: Cell::new(false),
                next: Cell::new(self.head.get()),
            },
            kind,
        });
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(boxed)) };
        self.head.set(Some(ptr));
        self.allocated += size;
        self.live_objects += 1;
        Ok(ptr)
    }

    fn object_size(kind: &ObjKind) -> usize {
        let base = size_of::<GcObject>();
        let extra = match kind {
            ObjKind::Str(s) => s.len(),
            ObjKind::Symbol(s) => s.name.len(),
            ObjKind::Vector(v) => v.data.borrow().capacity() * size_of::<Value>(),
            ObjKind::Cons(_)
            | ObjKind::Primitive(_)
            | ObjKind::Function(_)
            | ObjKind::Macro(_)
            | ObjKind::Environment(_) => 0,
        };
        base + extra
    }

    /// Push a value onto the temporary-root stack. Returns an
    /// `Error::Invariant` if the stack is already at its maximum depth.
    pub fn push_temp_root(&self, v: Value) -> Result<()> {
        let mut roots = self.temp_roots.borrow_mut();
        if roots.len() >= MAX_TEMP_ROOTS {
            return Err(Error::invariant("temporary-root stack overflow"));
        }
        roots.push(v);
        Ok(())
    }

    pub fn temp_root_depth(&self) -> usize {
        self.temp_roots.borrow().len()
    }

    /// Truncate the temporary-root stack back to `depth`. Used both for
    /// ordinary scope exit and to reset the stack after an error, per the
    /// spec's note that implementations may reset temp-stack height on
    /// error rather than unwind it frame by frame.
    pub fn truncate_temp_roots(&self, depth: usize) {
        self.temp_roots.borrow_mut().truncate(depth);
    }

    fn pop_temp_root(&self) {
        self.temp_roots.borrow_mut().pop();
    }

    fn find_symbol(&self, name: &str) -> Option<ObjPtr> {
        let mut cur = self.symbol_table.get();
        while let Some(p) = cur {
            let sym = match unsafe { &p.as_ref().kind } {
                ObjKind::Symbol(s) => s,
                _ => unreachable!("symbol table chain contains a non-symbol"),
            };
            if &*sym.name == name {
                return Some(p);
            }
            cur = sym.next_intern.get();
        }
        None
    }

    pub fn intern_lookup(&self, name: &str) -> Option<Value> {
        self.find_symbol(name).map(Value::Symbol)
    }

    /// Thread a freshly allocated symbol object into the intern table.
    /// Callers (`Context::intern`) must only call this once per symbol
    /// name, after confirming via `intern_lookup` that none exists yet.
    pub fn intern_insert(&self, ptr: ObjPtr) {
        match unsafe { &ptr.as_ref().kind } {
            ObjKind::Symbol(s) => s.next_intern.set(self.symbol_table.get()),
            _ => unreachable!("intern_insert called on a non-symbol"),
        }
        self.symbol_table.set(Some(ptr));
    }

    fn unlink_symbol(&self, victim: ObjPtr) {
        let mut cur = self.symbol_table.get();
        let mut prev: Option<ObjPtr> = None;
        while let Some(p) = cur {
            let next = match unsafe { &p.as_ref().kind } {
                ObjKind::Symbol(s) => s.next_intern.get(),
                _ => unreachable!(),
            };
            if p == victim {
                match prev {
                    Some(pp) => match unsafe { &pp.as_ref().kind } {
                        ObjKind::Symbol(s) => s.next_intern.set(next),
                        _ => unreachable!(),
                    },
                    None => self.symbol_table.set(next),
                }
                return;
            }
            prev = Some(p);
            cur = next;
        }
    }

    /// Mark every object reachable from `roots`, then sweep the heap,
    /// freeing every object that was not reached. `roots` is supplied by
    /// the caller (`Context`), which alone knows the current environment,
    /// the reader's in-progress value, and the current result slot; this
    /// method additionally always includes the symbol table and the
    /// temporary-root stack, which it owns directly.
    pub fn collect_garbage(&mut self, roots: &[Value]) {
        self.collections_run += 1;
        let mut worklist: Vec<Value> = Vec::new();
        worklist.extend_from_slice(roots);
        worklist.extend(self.temp_roots.borrow().iter().copied());

        let mut cur = self.symbol_table.get();
        while let Some(p) = cur {
            worklist.push(Value::Symbol(p));
            cur = match unsafe { &p.as_ref().kind } {
                ObjKind::Symbol(s) => s.next_intern.get(),
                _ => unreachable!(),
            };
        }

        while let Some(v) = worklist.pop() {
            let Some(ptr) = v.as_object() else { continue };
            let obj = unsafe { ptr.as_ref() };
            if obj.header.marked.get() {
                continue;
            }
            obj.header.marked.set(true);
            trace(obj, &mut worklist);
        }

        self.sweep();
        self.regrow_threshold();
    }

    fn sweep(&mut self) {
        let mut prev: Option<ObjPtr> = None;
        let mut cur = self.head.get();
        let mut allocated = 0usize;
        let mut live = 0usize;

        while let Some(ptr) = cur {
            let obj = unsafe { ptr.as_ref() };
            let next = obj.header.next.get();
            if obj.header.marked.get() {
                obj.header.marked.set(false);
                allocated += Self::object_size(&obj.kind);
                live += 1;
                prev = Some(ptr);
                cur = next;
            } else {
                if matches!(obj.kind, ObjKind::Symbol(_)) {
                    self.unlink_symbol(ptr);
                }
                match prev {
                    Some(pp) => unsafe { pp.as_ref() }.header.next.set(next),
                    None => self.head.set(next),
                }
                // SAFETY: `ptr` was allocated by `Box::into_raw` in `alloc`
                // and has just been unlinked from every list that could
                // still reach it (the heap list above, and the symbol
                // table if applicable); nothing else holds a long-lived
                // reference to an unmarked object.
                unsafe { drop(Box::from_raw(ptr.as_ptr())) };
                cur = next;
            }
        }

        self.allocated = allocated;
        self.live_objects = live;
    }

    fn regrow_threshold(&mut self) {
        let grown = (self.allocated as f64 * (1.0 + self.growth_factor)) as usize;
        self.threshold = grown.max(self.min_floor);
    }

    /// Free every live object unconditionally. Called from `Context`'s
    /// `Drop` impl; equivalent to the embedded API's "free context"
    /// operation.
    pub fn free_all(&mut self) {
        let mut cur = self.head.get();
        self.head.set(None);
        self.symbol_table.set(None);
        while let Some(ptr) = cur {
            let next = unsafe { ptr.as_ref() }.header.next.get();
            unsafe { drop(Box::from_raw(ptr.as_ptr())) };
            cur = next;
        }
        self.allocated = 0;
        self.live_objects = 0;
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        self.free_all();
    }
}

/// A smart pointer that roots its referent for as long as it is alive,
/// unrooting on `Drop`. Adapted from the teacher's `Rooted<T>`: the
/// teacher points it at an arena slot, this points it at a value pushed
/// onto the intrusive heap's temporary-root stack. Use this (or
/// [`crate::context::Context::protect`], a scope-based wrapper around the
/// same stack) around any computation that allocates more than once
/// while holding a freshly built intermediate.
pub struct Rooted {
    heap: *const Heap,
    value: Value,
}

impl Rooted {
    pub fn new(heap: &Heap, value: Value) -> Result<Rooted> {
        heap.push_temp_root(value)?;
        Ok(Rooted { heap, value })
    }

    pub fn get(&self) -> Value {
        self.value
    }
}

impl Drop for Rooted {
    fn drop(&mut self) {
        // SAFETY: `heap` outlives every `Rooted` built from it, since a
        // `Rooted` can only be constructed from a live `&Heap` and the
        // heap itself never moves once boxed inside `Context`.
        unsafe { &*self.heap }.pop_temp_root();
    }
}

/// Push every `Value` that `obj` directly references onto `worklist`, per
/// kind. Immediates are filtered out by the caller (`collect_garbage`),
/// since they carry no heap references.
fn trace(obj: &GcObject, worklist: &mut Vec<Value>) {
    match &obj.kind {
        ObjKind::Cons(c) => {
            worklist.push(c.car.get());
            worklist.push(c.cdr.get());
        }
        ObjKind::Str(_) | ObjKind::Symbol(_) => {}
        ObjKind::Primitive(p) => {
            if let Some(name) = p.name.get() {
                worklist.push(Value::Symbol(name));
            }
        }
        ObjKind::Function(l) | ObjKind::Macro(l) => {
            worklist.push(Value::Environment(l.env));
            worklist.push(l.params);
            worklist.push(l.body);
            if let Some(name) = l.name.get() {
                worklist.push(Value::Symbol(name));
            }
        }
        ObjKind::Vector(v) => {
            worklist.extend(v.data.borrow().iter().copied());
        }
        ObjKind::Environment(e) => {
            worklist.push(e.variables.get());
            if let Some(parent) = e.parent {
                worklist.push(Value::Environment(parent));
            }
        }
    }
}
