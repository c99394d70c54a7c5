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

//! The default global environment.
//!
//! Every binding here is a [`crate::value::Primitive`] -- a bare Rust
//! function pointer that receives its argument list unevaluated. Special
//! forms (`quote`, `if`, `define`, `lambda`, `set!`, `let`, `and`, `or`,
//! `begin`, `define-macro`) are ordinary entries in this same registry
//! that simply choose not to evaluate all (or any) of their arguments;
//! everything else evaluates its argument list up front via
//! [`crate::eval::eval_args_to_list`] before doing any work, the same
//! split the original C core library draws between `builtin_if` and
//! `add`/`car`/`cons`.

use crate::context::{Context, EnvPtr};
use crate::environment;
use crate::error::{Error, Result};
use crate::eval::{self, eval, eval_begin};
use crate::heap::ObjPtr;
use crate::value::{list_from_slice, list_to_vec, PrimitiveFn, Value};

pub fn install(ctx: &mut Context) {
    let env = ctx.global_environment();

    bind(ctx, env, "quote", quote);
    bind(ctx, env, "if", prim_if);
    bind(ctx, env, "define", prim_define);
    bind(ctx, env, "define-macro", prim_define_macro);
    bind(ctx, env, "lambda", lambda);
    bind(ctx, env, "set!", set_bang);
    bind(ctx, env, "let", prim_let);
    bind(ctx, env, "and", prim_and);
    bind(ctx, env, "or", prim_or);
    bind(ctx, env, "begin", prim_begin);

    bind(ctx, env, "+", add);
    bind(ctx, env, "-", subtract);
    bind(ctx, env, "*", multiply);
    bind(ctx, env, "/", divide);
    bind(ctx, env, "=", num_eq);
    bind(ctx, env, "<", num_lt);
    bind(ctx, env, ">", num_gt);
    bind(ctx, env, "<=", num_le);
    bind(ctx, env, ">=", num_ge);

    bind(ctx, env, "eq?", is_eq);
    bind(ctx, env, "equal?", is_equal);
    bind(ctx, env, "not", not);
    bind(ctx, env, "null?", is_null);
    bind(ctx, env, "pair?", is_pair);
    bind(ctx, env, "number?", is_number);
    bind(ctx, env, "string?", is_string);
    bind(ctx, env, "symbol?", is_symbol);
    bind(ctx, env, "boolean?", is_boolean);
    bind(ctx, env, "procedure?", is_procedure);
    bind(ctx, env, "vector?", is_vector);

    bind(ctx, env, "cons", cons);
    bind(ctx, env, "car", car);
    bind(ctx, env, "cdr", cdr);
    bind(ctx, env, "set-car!", set_car_bang);
    bind(ctx, env, "set-cdr!", set_cdr_bang);
    bind(ctx, env, "list", list);
    bind(ctx, env, "length", length);
    bind(ctx, env, "append", append);
    bind(ctx, env, "reverse", reverse);

    bind(ctx, env, "make-vector", make_vector);
    bind(ctx, env, "vector", vector);
    bind(ctx, env, "vector-ref", vector_ref);
    bind(ctx, env, "vector-set!", vector_set_bang);
    bind(ctx, env, "vector-length", vector_length);
    bind(ctx, env, "vector->list", vector_to_list);
    bind(ctx, env, "list->vector", list_to_vector);

    bind(ctx, env, "string-length", string_length);
    bind(ctx, env, "string-append", string_append);
    bind(ctx, env, "string->symbol", string_to_symbol);
    bind(ctx, env, "symbol->string", symbol_to_string);
    bind(ctx, env, "string=?", string_eq);

    bind(ctx, env, "write", write_prim);
    bind(ctx, env, "display", display_prim);
    bind(ctx, env, "newline", newline);
    bind(ctx, env, "apply", apply_prim);
    bind(ctx, env, "eval", eval_prim);
    bind(ctx, env, "gensym", gensym_prim);
    bind(ctx, env, "exit", exit_prim);
}

fn bind(ctx: &mut Context, env: EnvPtr, name: &str, func: PrimitiveFn) {
    let sym = match ctx.intern(name) {
        Value::Symbol(s) => s,
        _ => unreachable!("intern always returns a Symbol"),
    };
    let prim = ctx
        .alloc_primitive(func)
        .expect("allocating a primitive in a fresh environment cannot hit the hard cap");
    environment::define(ctx, env, sym, prim)
        .expect("defining a primitive in the global frame cannot fail");
}

/// Checks `args.len()` against `n`, either exactly (`at_least = false`)
/// or as a floor (`at_least = true`).
fn arity(who: &str, args: &[Value], n: usize, at_least: bool) -> Result<()> {
    let argc = args.len();
    let ok = if at_least { argc >= n } else { argc == n };
    if ok {
        Ok(())
    } else if at_least {
        Err(Error::runtime(format!(
            "{who}: expected at least {n} argument(s), got {argc}"
        )))
    } else {
        Err(Error::runtime(format!(
            "{who}: expected {n} argument(s), got {argc}"
        )))
    }
}

fn num(v: Value, who: &str) -> Result<f64> {
    match v {
        Value::Number(n) => Ok(n),
        _ => Err(Error::runtime(format!("{who}: argument is not a number"))),
    }
}

fn sym(v: Value, who: &str) -> Result<ObjPtr> {
    match v {
        Value::Symbol(s) => Ok(s),
        _ => Err(Error::runtime(format!("{who}: expected a symbol"))),
    }
}

fn evaluated_args(ctx: &mut Context, env: EnvPtr, args: Value, who: &str) -> Result<Vec<Value>> {
    let eargs = eval::eval_args_to_list(ctx, env, args)?;
    list_to_vec(eargs, who)
}

/* *** special forms *** */

fn quote(_ctx: &mut Context, _env: EnvPtr, args: Value) -> Result<Value> {
    let forms = list_to_vec(args, "quote")?;
    arity("quote", &forms, 1, false)?;
    Ok(forms[0])
}

fn prim_if(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let forms = list_to_vec(args, "if")?;
    arity("if", &forms, 2, true)?;
    let condition = eval(ctx, env, forms[0])?;
    if condition.is_truthy() {
        return eval(ctx, env, forms[1]);
    }
    if forms.len() > 2 {
        let otherwise = list_from_slice(ctx, &forms[2..])?;
        eval_begin(ctx, env, otherwise)
    } else {
        Ok(Value::Void)
    }
}

fn prim_define(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let head = args.car().ok_or_else(|| Error::runtime("define: missing target"))?;
    let body = args.cdr().ok_or_else(|| Error::runtime("define: missing target"))?;
    match head {
        Value::Symbol(name) => {
            let value_form = body
                .car()
                .ok_or_else(|| Error::runtime("define: missing value expression"))?;
            let value = eval(ctx, env, value_form)?;
            environment::define(ctx, env, name, value)?;
            Ok(value)
        }
        Value::Pair(_) => {
            let name = sym(head.car().expect("Pair has a car"), "define")?;
            let params = head.cdr().expect("Pair has a cdr");
            let func = ctx.alloc_function(env, params, body)?;
            environment::define(ctx, env, name, func)?;
            Ok(func)
        }
        _ => Err(Error::runtime(
            "define: first argument must be a symbol or a (name . params) form",
        )),
    }
}

fn prim_define_macro(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let head = args
        .car()
        .ok_or_else(|| Error::runtime("define-macro: missing target"))?;
    let body = args.cdr().ok_or_else(|| Error::runtime("define-macro: missing body"))?;
    let name = sym(
        head.car()
            .ok_or_else(|| Error::runtime("define-macro: target must be (name . params)"))?,
        "define-macro",
    )?;
    let params = head.cdr().expect("Pair has a cdr");
    let mac = ctx.alloc_macro(env, params, body)?;
    environment::define(ctx, env, name, mac)?;
    Ok(mac)
}

fn lambda(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let params = args.car().ok_or_else(|| Error::runtime("lambda: missing parameter list"))?;
    let body = args.cdr().expect("Pair has a cdr");
    ctx.alloc_function(env, params, body)
}

fn set_bang(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let forms = list_to_vec(args, "set!")?;
    arity("set!", &forms, 2, false)?;
    let name = sym(forms[0], "set!")?;
    let value = eval(ctx, env, forms[1])?;
    if environment::set(env, name, value) {
        Ok(value)
    } else {
        Err(Error::runtime(format!(
            "set!: unbound variable: {}",
            forms[0].symbol_name().unwrap_or("?")
        )))
    }
}

fn prim_let(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let bindings_form = args
        .car()
        .ok_or_else(|| Error::runtime("let: missing binding list"))?;
    let body = args.cdr().expect("Pair has a cdr");
    let bindings = list_to_vec(bindings_form, "let")?;

    let new_env = ctx.alloc_environment(Some(env))?;
    let new_env_ptr = new_env.as_environment().expect("alloc_environment returns Environment");

    for binding in bindings {
        let pair = list_to_vec(binding, "let binding")?;
        arity("let binding", &pair, 2, false)?;
        let name = sym(pair[0], "let")?;
        let value = eval(ctx, env, pair[1])?;
        environment::define(ctx, new_env_ptr, name, value)?;
    }

    eval_begin(ctx, new_env_ptr, body)
}

fn prim_and(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let forms = list_to_vec(args, "and")?;
    let mut result = Value::True;
    for form in forms {
        result = eval(ctx, env, form)?;
        if !result.is_truthy() {
            return Ok(Value::False);
        }
    }
    Ok(result)
}

fn prim_or(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let forms = list_to_vec(args, "or")?;
    for form in forms {
        let result = eval(ctx, env, form)?;
        if result.is_truthy() {
            return Ok(result);
        }
    }
    Ok(Value::False)
}

fn prim_begin(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    eval_begin(ctx, env, args)
}

/* *** arithmetic *** */

fn add(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "+")?;
    let mut acc = 0.0;
    for v in vals {
        acc += num(v, "+")?;
    }
    Ok(Value::Number(acc))
}

fn multiply(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "*")?;
    let mut acc = 1.0;
    for v in vals {
        acc *= num(v, "*")?;
    }
    Ok(Value::Number(acc))
}

fn subtract(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "-")?;
    arity("-", &vals, 1, true)?;
    let first = num(vals[0], "-")?;
    if vals.len() == 1 {
        return Ok(Value::Number(-first));
    }
    let mut acc = first;
    for v in &vals[1..] {
        acc -= num(*v, "-")?;
    }
    Ok(Value::Number(acc))
}

fn divide(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "/")?;
    arity("/", &vals, 1, true)?;
    let first = num(vals[0], "/")?;
    if vals.len() == 1 {
        return Ok(Value::Number(1.0 / first));
    }
    let mut acc = first;
    for v in &vals[1..] {
        acc /= num(*v, "/")?;
    }
    Ok(Value::Number(acc))
}

fn num_chain(ctx: &mut Context, env: EnvPtr, args: Value, who: &str, cmp: fn(f64, f64) -> bool) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, who)?;
    arity(who, &vals, 1, true)?;
    let mut prev = num(vals[0], who)?;
    for v in &vals[1..] {
        let cur = num(*v, who)?;
        if !cmp(prev, cur) {
            return Ok(Value::False);
        }
        prev = cur;
    }
    Ok(Value::True)
}

fn num_eq(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    num_chain(ctx, env, args, "=", |a, b| a == b)
}

fn num_lt(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    num_chain(ctx, env, args, "<", |a, b| a < b)
}

fn num_gt(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    num_chain(ctx, env, args, ">", |a, b| a > b)
}

fn num_le(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    num_chain(ctx, env, args, "<=", |a, b| a <= b)
}

fn num_ge(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    num_chain(ctx, env, args, ">=", |a, b| a >= b)
}

/* *** equality and type predicates *** */

fn is_eq(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "eq?")?;
    arity("eq?", &vals, 2, false)?;
    Ok(Value::from_bool(eval::eq(vals[0], vals[1])))
}

fn is_equal(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "equal?")?;
    arity("equal?", &vals, 2, false)?;
    Ok(Value::from_bool(eval::equal(vals[0], vals[1])))
}

fn one_pred(ctx: &mut Context, env: EnvPtr, args: Value, who: &str, pred: fn(Value) -> bool) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, who)?;
    arity(who, &vals, 1, false)?;
    Ok(Value::from_bool(pred(vals[0])))
}

fn not(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "not", |v| !v.is_truthy())
}

fn is_null(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "null?", |v| v.is_nil())
}

fn is_pair(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "pair?", |v| v.is_pair())
}

fn is_number(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "number?", |v| v.is_number())
}

fn is_string(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "string?", |v| matches!(v, Value::Str(_)))
}

fn is_symbol(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "symbol?", |v| v.is_symbol())
}

fn is_boolean(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "boolean?", |v| matches!(v, Value::True | Value::False))
}

fn is_procedure(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "procedure?", |v| v.is_procedure())
}

fn is_vector(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    one_pred(ctx, env, args, "vector?", |v| matches!(v, Value::Vector(_)))
}

/* *** pairs and lists *** */

fn cons(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "cons")?;
    arity("cons", &vals, 2, false)?;
    ctx.alloc_cons(vals[0], vals[1])
}

fn car(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "car")?;
    arity("car", &vals, 1, false)?;
    vals[0].car().ok_or_else(|| Error::runtime("car: not a pair"))
}

fn cdr(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "cdr")?;
    arity("cdr", &vals, 1, false)?;
    vals[0].cdr().ok_or_else(|| Error::runtime("cdr: not a pair"))
}

fn set_car_bang(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "set-car!")?;
    arity("set-car!", &vals, 2, false)?;
    let cons = vals[0].as_cons().ok_or_else(|| Error::runtime("set-car!: not a pair"))?;
    cons.car.set(vals[1]);
    Ok(Value::Void)
}

fn set_cdr_bang(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "set-cdr!")?;
    arity("set-cdr!", &vals, 2, false)?;
    let cons = vals[0].as_cons().ok_or_else(|| Error::runtime("set-cdr!: not a pair"))?;
    cons.cdr.set(vals[1]);
    Ok(Value::Void)
}

fn list(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "list")?;
    list_from_slice(ctx, &vals)
}

fn length(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "length")?;
    arity("length", &vals, 1, false)?;
    let n = vals[0].list_len();
    if n < 0 {
        return Err(Error::runtime("length: not a proper list"));
    }
    Ok(Value::Number(n as f64))
}

fn append(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "append")?;
    if vals.is_empty() {
        return Ok(Value::Nil);
    }
    let (last, init) = vals.split_last().expect("checked non-empty above");
    let mut flat = Vec::new();
    for list in init {
        flat.extend(list_to_vec(*list, "append")?);
    }
    let mut result = *last;
    for v in flat.into_iter().rev() {
        result = ctx.protect(result, |ctx| ctx.alloc_cons(v, result))?;
    }
    Ok(result)
}

fn reverse(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "reverse")?;
    arity("reverse", &vals, 1, false)?;
    let items = list_to_vec(vals[0], "reverse")?;
    let mut result = Value::Nil;
    for v in items {
        result = ctx.protect(result, |ctx| ctx.alloc_cons(v, result))?;
    }
    Ok(result)
}

/* *** vectors *** */

fn make_vector(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "make-vector")?;
    arity("make-vector", &vals, 1, true)?;
    let n = num(vals[0], "make-vector")? as usize;
    let fill = vals.get(1).copied().unwrap_or(Value::False);
    ctx.alloc_vector(vec![fill; n])
}

fn vector(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "vector")?;
    ctx.alloc_vector(vals)
}

fn vector_ref(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "vector-ref")?;
    arity("vector-ref", &vals, 2, false)?;
    let v = vals[0].as_vector().ok_or_else(|| Error::runtime("vector-ref: not a vector"))?;
    let i = num(vals[1], "vector-ref")? as usize;
    let result = v.data
        .borrow()
        .get(i)
        .copied()
        .ok_or_else(|| Error::runtime("vector-ref: index out of bounds"));
    result
}

fn vector_set_bang(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "vector-set!")?;
    arity("vector-set!", &vals, 3, false)?;
    let v = vals[0].as_vector().ok_or_else(|| Error::runtime("vector-set!: not a vector"))?;
    let i = num(vals[1], "vector-set!")? as usize;
    let mut data = v.data.borrow_mut();
    if i >= data.len() {
        return Err(Error::runtime("vector-set!: index out of bounds"));
    }
    data[i] = vals[2];
    Ok(Value::Void)
}

fn vector_length(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "vector-length")?;
    arity("vector-length", &vals, 1, false)?;
    let v = vals[0].as_vector().ok_or_else(|| Error::runtime("vector-length: not a vector"))?;
    let result = Ok(Value::Number(v.data.borrow().len() as f64));
    result
}

fn vector_to_list(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "vector->list")?;
    arity("vector->list", &vals, 1, false)?;
    let v = vals[0].as_vector().ok_or_else(|| Error::runtime("vector->list: not a vector"))?;
    let data = v.data.borrow().clone();
    list_from_slice(ctx, &data)
}

fn list_to_vector(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "list->vector")?;
    arity("list->vector", &vals, 1, false)?;
    let items = list_to_vec(vals[0], "list->vector")?;
    ctx.alloc_vector(items)
}

/* *** strings *** */

fn string_length(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "string-length")?;
    arity("string-length", &vals, 1, false)?;
    let s = vals[0]
        .as_string()
        .ok_or_else(|| Error::runtime("string-length: not a string"))?;
    Ok(Value::Number(s.len() as f64))
}

fn string_append(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "string-append")?;
    let mut buf = String::new();
    for v in &vals {
        let s = v
            .as_string()
            .ok_or_else(|| Error::runtime("string-append: not a string"))?;
        buf.push_str(&s.bytes);
    }
    ctx.alloc_string(&buf)
}

fn string_to_symbol(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "string->symbol")?;
    arity("string->symbol", &vals, 1, false)?;
    let s = vals[0]
        .as_string()
        .ok_or_else(|| Error::runtime("string->symbol: not a string"))?;
    let name = s.bytes.to_string();
    Ok(ctx.intern(&name))
}

fn symbol_to_string(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "symbol->string")?;
    arity("symbol->string", &vals, 1, false)?;
    let name = sym(vals[0], "symbol->string")?;
    let text = Value::Symbol(name).symbol_name().unwrap_or("").to_string();
    ctx.alloc_string(&text)
}

fn string_eq(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "string=?")?;
    arity("string=?", &vals, 1, true)?;
    let first = vals[0]
        .as_string()
        .ok_or_else(|| Error::runtime("string=?: not a string"))?;
    for v in &vals[1..] {
        let s = v.as_string().ok_or_else(|| Error::runtime("string=?: not a string"))?;
        if s.bytes != first.bytes {
            return Ok(Value::False);
        }
    }
    Ok(Value::True)
}

/* *** I/O, application, and control *** */

fn write_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "write")?;
    arity("write", &vals, 1, false)?;
    print!("{}", ctx.write_to_string(vals[0]));
    Ok(Value::Void)
}

fn display_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "display")?;
    arity("display", &vals, 1, false)?;
    print!("{}", ctx.display_to_string(vals[0]));
    Ok(Value::Void)
}

fn newline(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "newline")?;
    arity("newline", &vals, 0, false)?;
    println!();
    Ok(Value::Void)
}

fn apply_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "apply")?;
    arity("apply", &vals, 2, true)?;
    let proc = vals[0];
    let (last, middle) = vals[1..].split_last().expect("checked at least 2 args above");
    let mut final_args = list_to_vec(*last, "apply")?;
    let mut prefix: Vec<Value> = middle.to_vec();
    prefix.append(&mut final_args);
    let arg_list = list_from_slice(ctx, &prefix)?;
    eval::apply(ctx, env, proc, arg_list)
}

fn eval_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "eval")?;
    arity("eval", &vals, 1, true)?;
    let target_env = match vals.get(1) {
        Some(Value::Environment(e)) => *e,
        Some(_) => return Err(Error::runtime("eval: second argument must be an environment")),
        None => ctx.global_environment(),
    };
    let _ = env;
    eval(ctx, target_env, vals[0])
}

fn gensym_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "gensym")?;
    arity("gensym", &vals, 0, false)?;
    Ok(ctx.gensym())
}

fn exit_prim(ctx: &mut Context, env: EnvPtr, args: Value) -> Result<Value> {
    let vals = evaluated_args(ctx, env, args, "exit")?;
    arity("exit", &vals, 1, true)?;
    let code = match vals.first() {
        Some(v) => num(*v, "exit")? as i32,
        None => 0,
    };
    ctx.request_exit(code);
    Ok(Value::Void)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;

    fn run(ctx: &mut Context, src: &str) -> Value {
        ctx.eval_str(src)
    }

    fn fresh() -> Context {
        let mut ctx = Context::new(ContextConfig::default());
        ctx.install_default_environment();
        ctx
    }

    #[test]
    fn arithmetic_primitives() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(+ 1 2 3)"), Value::Number(6.0));
        assert_eq!(run(&mut ctx, "(- 10 3 2)"), Value::Number(5.0));
        assert_eq!(run(&mut ctx, "(* 2 3 4)"), Value::Number(24.0));
        assert_eq!(run(&mut ctx, "(/ 10 2)"), Value::Number(5.0));
        assert_eq!(run(&mut ctx, "(- 5)"), Value::Number(-5.0));
    }

    #[test]
    fn division_by_zero_is_infinity_not_an_error() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(/ 1 0)"), Value::Number(f64::INFINITY));
        assert!(!ctx.has_error());
    }

    #[test]
    fn comparisons_chain() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(< 1 2 3)"), Value::True);
        assert_eq!(run(&mut ctx, "(< 1 3 2)"), Value::False);
        assert_eq!(run(&mut ctx, "(= 1 1 1)"), Value::True);
    }

    #[test]
    fn pair_and_list_primitives() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(car (cons 1 2))"), Value::Number(1.0));
        assert_eq!(run(&mut ctx, "(length (list 1 2 3))"), Value::Number(3.0));
        assert_eq!(
            run(&mut ctx, "(car (append (list 1 2) (list 3 4)))"),
            Value::Number(1.0)
        );
        assert_eq!(
            run(&mut ctx, "(car (reverse (list 1 2 3)))"),
            Value::Number(3.0)
        );
    }

    #[test]
    fn set_car_and_set_cdr_mutate_in_place() {
        let mut ctx = fresh();
        ctx.eval_str("(define p (cons 1 2))");
        ctx.eval_str("(set-car! p 99)");
        assert_eq!(run(&mut ctx, "(car p)"), Value::Number(99.0));
    }

    #[test]
    fn vector_primitives() {
        let mut ctx = fresh();
        ctx.eval_str("(define v (make-vector 3 0))");
        ctx.eval_str("(vector-set! v 1 42)");
        assert_eq!(run(&mut ctx, "(vector-ref v 1)"), Value::Number(42.0));
        assert_eq!(run(&mut ctx, "(vector-length (vector 1 2 3))"), Value::Number(3.0));
    }

    #[test]
    fn string_primitives() {
        let mut ctx = fresh();
        assert_eq!(
            run(&mut ctx, "(string-length (string-append \"foo\" \"bar\"))"),
            Value::Number(6.0)
        );
        assert_eq!(run(&mut ctx, "(string=? \"a\" \"a\" \"a\")"), Value::True);
        let s = run(&mut ctx, "(symbol->string 'x)");
        assert_eq!(ctx.display_to_string(s), "x");
    }

    #[test]
    fn apply_splices_the_trailing_list() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(apply + 1 2 (list 3 4))"), Value::Number(10.0));
    }

    #[test]
    fn eval_primitive_evaluates_a_quoted_form() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(eval (list '+ 1 2))"), Value::Number(3.0));
    }

    #[test]
    fn predicates() {
        let mut ctx = fresh();
        assert_eq!(run(&mut ctx, "(null? '())"), Value::True);
        assert_eq!(run(&mut ctx, "(pair? (cons 1 2))"), Value::True);
        assert_eq!(run(&mut ctx, "(procedure? car)"), Value::True);
        assert_eq!(run(&mut ctx, "(not #f)"), Value::True);
    }

    #[test]
    fn define_function_shorthand() {
        let mut ctx = fresh();
        ctx.eval_str("(define (square x) (* x x))");
        assert_eq!(run(&mut ctx, "(square 7)"), Value::Number(49.0));
    }
}
