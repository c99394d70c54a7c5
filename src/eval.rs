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

//! The evaluator.
//!
//! `eval` and `apply` are the two entry points; everything else here is
//! shared machinery that both they and the special-form primitives in
//! [`crate::primitives`] call into: argument evaluation, parameter
//! binding, `begin` sequencing, and the three equality relations.
//!
//! Special forms (`quote`, `if`, `define`, `lambda`, `set!`, `let`,
//! `and`, `or`, `define-macro`) are *not* special-cased in `eval`'s
//! dispatch -- per spec.md's "Primitives as special forms" design note,
//! they are ordinary [`crate::value::Primitive`] entries in the global
//! environment that happen to inspect their raw, unevaluated argument
//! list. The only dispatch `eval` itself performs is macro expansion,
//! which has to happen before application because by definition a
//! macro's arguments are never evaluated.

use crate::context::{Context, EnvPtr};
use crate::environment;
use crate::error::{Error, Result};
use crate::value::Value;

/// Evaluate `expr` in `env`.
pub fn eval(ctx: &mut Context, env: EnvPtr, expr: Value) -> Result<Value> {
    match expr {
        Value::Symbol(sym) => {
            let v = environment::lookup(env, sym);
            if v == Value::Undefined {
                Err(Error::runtime(format!(
                    "unbound variable: {}",
                    Value::Symbol(sym).symbol_name().unwrap_or("?")
                )))
            } else {
                Ok(v)
            }
        }
        Value::Pair(_) => eval_application(ctx, env, expr),
        other => Ok(other),
    }
}

fn eval_application(ctx: &mut Context, env: EnvPtr, expr: Value) -> Result<Value> {
    let head = expr.car().expect("application form is a cons");
    let args = expr.cdr().expect("application form is a cons");

    if let Value::Symbol(sym) = head {
        if let bound @ Value::Macro(_) = environment::lookup(env, sym) {
            let expanded = apply(ctx, env, bound, args)?;
            return eval(ctx, env, expanded);
        }
    }

    let proc = eval(ctx, env, head)?;
    match proc {
        Value::Primitive(_) => {
            let func = proc.as_primitive().expect("just matched Primitive").func;
            func(ctx, env, args)
        }
        Value::Function(_) => {
            let eargs = eval_args_to_list(ctx, env, args)?;
            apply_closure(ctx, proc, eargs)
        }
        _ => Err(Error::runtime(format!(
            "attempt to apply a non-procedure: {}",
            ctx.write_to_string(proc)
        ))),
    }
}

/// Apply `proc` to `args`. `args` is evaluated already for functions and
/// unevaluated for macros/primitives, matching the contract of whichever
/// call site reaches here: direct macro expansion passes the raw
/// argument list straight through, the `apply` primitive passes an
/// already-evaluated list.
pub fn apply(ctx: &mut Context, env: EnvPtr, proc: Value, args: Value) -> Result<Value> {
    match proc {
        Value::Primitive(_) => {
            let func = proc.as_primitive().expect("just matched Primitive").func;
            func(ctx, env, args)
        }
        Value::Function(_) | Value::Macro(_) => apply_closure(ctx, proc, args),
        _ => Err(Error::runtime(format!(
            "attempt to apply a non-procedure: {}",
            ctx.write_to_string(proc)
        ))),
    }
}

fn apply_closure(ctx: &mut Context, proc: Value, args: Value) -> Result<Value> {
    let lambda = proc
        .as_function()
        .or_else(|| proc.as_macro())
        .expect("apply_closure is only called with Function or Macro values");
    let parent = lambda.env;
    let params = lambda.params;
    let body = lambda.body;

    let new_env = ctx.alloc_environment(Some(parent))?;
    let env_ptr = new_env.as_environment().expect("alloc_environment returns Environment");
    bind_params(ctx, env_ptr, params, args)?;
    eval_begin(ctx, env_ptr, body)
}

/// Bind `params` (one of the four parameter-spec shapes, spec.md §4.5)
/// against `args` in `env`.
fn bind_params(ctx: &mut Context, env: EnvPtr, params: Value, args: Value) -> Result<()> {
    match params {
        Value::Nil => {
            if !args.is_nil() {
                return Err(Error::runtime("too many arguments: expected 0"));
            }
            Ok(())
        }
        Value::Symbol(rest) => environment::define(ctx, env, rest, args),
        Value::Pair(_) => bind_params_list(ctx, env, params, args),
        _ => Err(Error::runtime("invalid parameter specification")),
    }
}

fn bind_params_list(ctx: &mut Context, env: EnvPtr, mut params: Value, mut args: Value) -> Result<()> {
    loop {
        match params {
            Value::Nil => {
                return if args.is_nil() {
                    Ok(())
                } else {
                    Err(Error::runtime("too many arguments"))
                };
            }
            Value::Symbol(rest) => return environment::define(ctx, env, rest, args),
            Value::Pair(_) => {
                let psym = match params.car().expect("Pair has a car") {
                    Value::Symbol(s) => s,
                    _ => return Err(Error::runtime("parameter specification: not a symbol")),
                };
                let (aval, arest) = match args {
                    Value::Pair(_) => (
                        args.car().expect("Pair has a car"),
                        args.cdr().expect("Pair has a cdr"),
                    ),
                    _ => return Err(Error::runtime("too few arguments")),
                };
                environment::define(ctx, env, psym, aval)?;
                params = params.cdr().expect("Pair has a cdr");
                args = arest;
            }
            _ => return Err(Error::runtime("invalid parameter specification")),
        }
    }
}

/// Evaluate `body` (a list of forms) in order, returning the value of
/// the last one. An empty body evaluates to `void`.
pub fn eval_begin(ctx: &mut Context, env: EnvPtr, mut body: Value) -> Result<Value> {
    if body.is_nil() {
        return Ok(Value::Void);
    }
    loop {
        let form = body.car().ok_or_else(|| Error::runtime("begin: improper body"))?;
        let rest = body.cdr().expect("Pair has a cdr");
        if rest.is_nil() {
            return eval(ctx, env, form);
        }
        eval(ctx, env, form)?;
        body = rest;
    }
}

/// Evaluate each form in `args` (a raw, unevaluated argument list) left
/// to right, building a freshly allocated list of the results. The
/// growing list's head is kept as a temporary GC root for the whole
/// walk, the same discipline [`crate::reader`] uses for parsing a list.
pub fn eval_args_to_list(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    match args {
        Value::Nil => Ok(Value::Nil),
        Value::Pair(_) => {
            let first = eval(ctx, env, args.car().expect("Pair has a car"))?;
            let rest = args.cdr().expect("Pair has a cdr");
            let head = ctx.protect(first, |ctx| ctx.alloc_cons(first, Value::Nil))?;
            if rest.is_nil() {
                return Ok(head);
            }
            ctx.protect(head, |ctx| eval_args_tail(ctx, env, rest, head))
        }
        _ => Err(Error::runtime("improper argument list")),
    }
}

fn eval_args_tail(ctx: &mut Context, env: EnvPtr, mut rest: Value, head: Value) -> Result<Value> {
    let mut tail = head;
    loop {
        match rest {
            Value::Nil => return Ok(head),
            Value::Pair(_) => {
                let v = eval(ctx, env, rest.car().expect("Pair has a car"))?;
                let new_pair = ctx.protect(v, |ctx| ctx.alloc_cons(v, Value::Nil))?;
                tail.as_cons()
                    .expect("tail is always a cons built by this function")
                    .cdr
                    .set(new_pair);
                tail = new_pair;
                rest = rest.cdr().expect("Pair has a cdr");
            }
            _ => return Err(Error::runtime("improper argument list")),
        }
    }
}

/// Identity equality: pointer identity for heap objects, bitwise
/// equality for immediates. This is exactly `Value`'s `PartialEq` impl.
pub fn eq(a: Value, b: Value) -> bool {
    a == b
}

/// Structural equality. Cons cells recurse, strings compare by length
/// and bytes (the precomputed hash is checked first as a cheap
/// mismatch filter), vectors compare length then element-wise. Not
/// guaranteed to terminate on cyclic structures (spec.md §9, a
/// documented non-goal).
pub fn equal(a: Value, b: Value) -> bool {
    if eq(a, b) {
        return true;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Pair(_), Value::Pair(_)) => {
            equal(a.car().unwrap(), b.car().unwrap()) && equal(a.cdr().unwrap(), b.cdr().unwrap())
        }
        (Value::Str(_), Value::Str(_)) => {
            let (sa, sb) = (a.as_string().unwrap(), b.as_string().unwrap());
            sa.hash == sb.hash && sa.bytes == sb.bytes
        }
        (Value::Vector(_), Value::Vector(_)) => {
            let (va, vb) = (a.as_vector().unwrap(), b.as_vector().unwrap());
            let (da, db) = (va.data.borrow(), vb.data.borrow());
            da.len() == db.len() && da.iter().zip(db.iter()).all(|(x, y)| equal(*x, *y))
        }
        _ => false,
    }
}

/// FNV-1a hash of a value, per spec.md §4.5: strings hash their bytes,
/// numbers hash their 8-byte bit pattern, immediates hash to small fixed
/// constants. Any other heap object is not hashable.
pub fn hash(v: Value) -> Result<u32> {
    match v {
        Value::Str(_) => Ok(v.as_string().expect("just matched Str").hash),
        Value::Number(n) => Ok(crate::value::fnv1a(&n.to_bits().to_ne_bytes())),
        Value::Nil => Ok(1),
        Value::True => Ok(2),
        Value::False => Ok(3),
        Value::Undefined => Ok(4),
        Value::Void => Ok(5),
        Value::Eof => Ok(6),
        _ => Err(Error::runtime("value is not hashable")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;

    fn eval_str(ctx: &mut Context, src: &str) -> Value {
        let env = ctx.global_environment();
        let form = ctx.read(src);
        ctx.eval(env, form)
    }

    fn fresh() -> Context {
        let mut ctx = Context::new(ContextConfig::default());
        ctx.install_default_environment();
        ctx
    }

    #[test]
    fn self_evaluating_values_evaluate_to_themselves() {
        let mut ctx = fresh();
        assert_eq!(eval_str(&mut ctx, "42"), Value::Number(42.0));
        assert_eq!(eval_str(&mut ctx, "#t"), Value::True);
        let s = eval_str(&mut ctx, "\"hi\"");
        assert_eq!(ctx.display_to_string(s), "hi");
    }

    #[test]
    fn quote_yields_its_argument_unevaluated() {
        let mut ctx = fresh();
        let env = ctx.global_environment();
        let quoted = ctx.read("(quote x)");
        let result = ctx.eval(env, quoted);
        assert_eq!(result, ctx.intern("x"));
    }

    #[test]
    fn if_does_not_evaluate_the_untaken_branch() {
        let mut ctx = fresh();
        let env = ctx.global_environment();
        let then_branch = ctx.read("(if #t 1 undefined-variable-that-would-error)");
        assert_eq!(ctx.eval(env, then_branch), Value::Number(1.0));
        assert!(!ctx.has_error());

        let else_branch = ctx.read("(if #f undefined-variable-that-would-error 2)");
        assert_eq!(ctx.eval(env, else_branch), Value::Number(2.0));
        assert!(!ctx.has_error());
    }

    #[test]
    fn lambda_application_binds_parameters() {
        let mut ctx = fresh();
        assert_eq!(
            eval_str(&mut ctx, "((lambda (x y) (* x y)) 6 7)"),
            Value::Number(42.0)
        );
    }

    #[test]
    fn identity_lambda_returns_its_argument() {
        let mut ctx = fresh();
        assert_eq!(eval_str(&mut ctx, "((lambda (x) x) 5)"), Value::Number(5.0));
    }

    #[test]
    fn and_or_short_circuit() {
        let mut ctx = fresh();
        assert_eq!(eval_str(&mut ctx, "(and)"), Value::True);
        assert_eq!(eval_str(&mut ctx, "(or)"), Value::False);
        assert_eq!(
            eval_str(&mut ctx, "(and #f undefined-variable-that-would-error)"),
            Value::False
        );
        assert_eq!(
            eval_str(&mut ctx, "(or #t undefined-variable-that-would-error)"),
            Value::True
        );
    }

    #[test]
    fn recursive_factorial_via_define() {
        let mut ctx = fresh();
        let env = ctx.global_environment();
        let expr = ctx.read("(define (fact n) (if (= n 0) 1 (* n (fact (- n 1)))))");
        ctx.eval(env, expr);
        assert_eq!(eval_str(&mut ctx, "(fact 5)"), Value::Number(120.0));
    }

    #[test]
    fn define_macro_expands_before_evaluation() {
        let mut ctx = fresh();
        let env = ctx.global_environment();
        let def = ctx.read(
            "(define-macro (unless c . body) (list (quote if) c #f (cons (quote begin) body)))",
        );
        ctx.eval(env, def);
        assert_eq!(eval_str(&mut ctx, "(unless #f 1 2 3)"), Value::Number(3.0));
    }

    #[test]
    fn closure_captures_defining_environment() {
        let mut ctx = fresh();
        let env = ctx.global_environment();
        let expr1 = ctx.read("(define (adder n) (lambda (x) (+ x n)))");
        ctx.eval(env, expr1);
        let expr2 = ctx.read("(define add5 (adder 5))");
        ctx.eval(env, expr2);
        assert_eq!(eval_str(&mut ctx, "(add5 10)"), Value::Number(15.0));
    }

    #[test]
    fn unbound_variable_is_a_runtime_error() {
        let mut ctx = fresh();
        let v = eval_str(&mut ctx, "this-is-not-bound");
        assert_eq!(v, Value::Undefined);
        assert!(ctx.has_error());
    }

    #[test]
    fn equal_on_lists_and_vectors() {
        let mut ctx = fresh();
        let a = ctx.read("(1 2 (3 4))");
        let b = ctx.read("(1 2 (3 4))");
        assert!(equal(a, b));
        assert!(!eq(a, b));

        let va = ctx.read("#(1 2 3)");
        let vb = ctx.read("#(1 2 3)");
        assert!(equal(va, vb));
        assert!(!eq(va, vb));
    }
}
