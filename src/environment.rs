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

//! Lexical environment frames.
//!
//! An `Environment` is a heap object like any other: a frame carries an
//! association list of `(symbol . value)` bindings and a link to its
//! parent frame (or none, for the global frame). Lookup and `set!` walk
//! the chain from the innermost frame outward; `define` always prepends
//! into the *current* frame, shadowing same-named bindings there.

use std::cell::Cell;

use crate::context::Context;
use crate::error::Result;
use crate::heap::{ObjKind, ObjPtr};
use crate::value::Value;

pub struct Environment {
    /// Either `Value::Nil` or a cons chain whose every car is a
    /// `(symbol . value)` pair.
    pub variables: Cell<Value>,
    pub parent: Option<ObjPtr>,
}

impl Environment {
    pub fn new(parent: Option<ObjPtr>) -> Environment {
        Environment {
            variables: Cell::new(Value::Nil),
            parent,
        }
    }
}

fn as_env<'a>(ptr: ObjPtr) -> &'a Environment {
    match unsafe { &ptr.as_ref().kind } {
        ObjKind::Environment(e) => e,
        _ => panic!("expected an environment object"),
    }
}

/// Look up `sym` starting at `env`, walking outward through parent frames.
/// Returns `Value::Undefined` if the chain is exhausted without a match.
pub fn lookup(env: ObjPtr, sym: ObjPtr) -> Value {
    let mut frame = Some(env);
    while let Some(f) = frame {
        let e = as_env(f);
        let mut bindings = e.variables.get();
        while let Value::Pair(_) = bindings {
            let pair = bindings.car().expect("binding list car is a pair");
            if let Value::Symbol(key) = pair.car().expect("binding pair has a car") {
                if key == sym {
                    return pair.cdr().expect("binding pair has a cdr");
                }
            }
            bindings = bindings.cdr().expect("binding list cdr");
        }
        frame = e.parent;
    }
    Value::Undefined
}

/// Bind `sym` to `value` in `env`'s own frame, prepending a fresh pair and
/// shadowing any existing binding for `sym` in that same frame.
pub fn define(ctx: &mut Context, env: ObjPtr, sym: ObjPtr, value: Value) -> Result<()> {
    let pair = ctx.alloc_cons(Value::Symbol(sym), value)?;
    let rest = as_env(env).variables.get();
    let new_head = ctx.protect(pair, |ctx| ctx.alloc_cons(pair, rest))?;
    as_env(env).variables.set(new_head);
    Ok(())
}

/// Rebind the first occurrence of `sym` found by walking outward from
/// `env`. Returns `false` (and does nothing) if `sym` is not bound
/// anywhere in the chain -- the caller is responsible for reporting that
/// as an error, per the `set!` special form's contract.
pub fn set(env: ObjPtr, sym: ObjPtr, value: Value) -> bool {
    let mut frame = Some(env);
    while let Some(f) = frame {
        let e = as_env(f);
        let mut bindings = e.variables.get();
        while let Value::Pair(_) = bindings {
            let pair_val = bindings.car().expect("binding list car is a pair");
            if let Value::Symbol(key) = pair_val.car().expect("binding pair has a car") {
                if key == sym {
                    pair_val
                        .as_cons()
                        .expect("binding pair is a cons")
                        .cdr
                        .set(value);
                    return true;
                }
            }
            bindings = bindings.cdr().expect("binding list cdr");
        }
        frame = e.parent;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextConfig};

    fn sym(ctx: &mut Context, name: &str) -> ObjPtr {
        match ctx.intern(name) {
            Value::Symbol(p) => p,
            _ => unreachable!(),
        }
    }

    #[test]
    fn define_then_lookup() {
        let mut ctx = Context::new(ContextConfig::default());
        let env = ctx.global_environment();
        let x = sym(&mut ctx, "x");
        define(&mut ctx, env, x, Value::Number(42.0)).unwrap();
        assert_eq!(lookup(env, x), Value::Number(42.0));
    }

    #[test]
    fn lookup_missing_is_undefined() {
        let mut ctx = Context::new(ContextConfig::default());
        let env = ctx.global_environment();
        let y = sym(&mut ctx, "y");
        assert_eq!(lookup(env, y), Value::Undefined);
    }

    #[test]
    fn define_shadows_in_same_frame() {
        let mut ctx = Context::new(ContextConfig::default());
        let env = ctx.global_environment();
        let x = sym(&mut ctx, "x");
        define(&mut ctx, env, x, Value::Number(1.0)).unwrap();
        define(&mut ctx, env, x, Value::Number(2.0)).unwrap();
        assert_eq!(lookup(env, x), Value::Number(2.0));
    }

    #[test]
    fn set_mutates_outer_frame() {
        let mut ctx = Context::new(ContextConfig::default());
        let outer = ctx.global_environment();
        let x = sym(&mut ctx, "x");
        define(&mut ctx, outer, x, Value::Number(1.0)).unwrap();
        let inner = ctx.alloc_environment(Some(outer)).unwrap();
        let inner_env = inner.as_environment().unwrap();
        assert!(set(inner_env, x, Value::Number(2.0)));
        assert_eq!(lookup(outer, x), Value::Number(2.0));
    }

    #[test]
    fn set_undefined_symbol_fails() {
        let mut ctx = Context::new(ContextConfig::default());
        let env = ctx.global_environment();
        let z = sym(&mut ctx, "z");
        assert!(!set(env, z, Value::Number(1.0)));
    }
}
