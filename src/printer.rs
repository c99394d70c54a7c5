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

//! Value printing: `write_value` (machine-readable, quotes strings and
//! escapes their contents) and `display_value` (human-readable, prints
//! strings raw). Both walk the same recursive structure and differ only
//! in how they render a `Str`.
//!
//! Circular lists are detected with the same Floyd's-algorithm approach
//! [`crate::value::Value::list_len`] uses, so printing a cyclic structure
//! built with `set-cdr!` reports `...` at the point of recurrence instead
//! of looping forever.

use std::fmt::{self, Write};

use crate::value::Value;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Style {
    Write,
    Display,
}

pub fn write_value(out: &mut impl Write, v: Value) -> fmt::Result {
    print_value(out, v, Style::Write)
}

pub fn display_value(out: &mut impl Write, v: Value) -> fmt::Result {
    print_value(out, v, Style::Display)
}

fn print_value(out: &mut impl Write, v: Value, style: Style) -> fmt::Result {
    match v {
        Value::Nil => write!(out, "()"),
        Value::True => write!(out, "#t"),
        Value::False => write!(out, "#f"),
        Value::Undefined => write!(out, "#<undefined>"),
        Value::Void => write!(out, "#<void>"),
        Value::Eof => write!(out, "#<eof>"),
        Value::Number(n) => print_number(out, n),
        Value::Pair(_) => print_list(out, v, style),
        Value::Str(_) => {
            let s = v.as_string().expect("just matched Str");
            match style {
                Style::Display => write!(out, "{}", s.bytes),
                Style::Write => print_quoted_string(out, &s.bytes),
            }
        }
        Value::Symbol(_) => write!(out, "{}", v.symbol_name().expect("just matched Symbol")),
        Value::Primitive(_) => {
            let prim = v.as_primitive().expect("just matched Primitive");
            print_named(out, "primitive", &prim.name)
        }
        Value::Function(_) => {
            let f = v.as_function().expect("just matched Function");
            print_named(out, "function", &f.name)
        }
        Value::Macro(_) => {
            let m = v.as_macro().expect("just matched Macro");
            print_named(out, "macro", &m.name)
        }
        Value::Vector(_) => print_vector(out, v, style),
        Value::Environment(_) => write!(out, "#<environment>"),
    }
}

fn print_named(
    out: &mut impl Write,
    kind: &str,
    name: &std::cell::Cell<Option<crate::heap::ObjPtr>>,
) -> fmt::Result {
    match name.get() {
        Some(sym) => write!(out, "#<{kind} {}>", Value::Symbol(sym).symbol_name().unwrap_or("?")),
        None => write!(out, "#<{kind}>"),
    }
}

fn print_number(out: &mut impl Write, n: f64) -> fmt::Result {
    if n.is_nan() {
        write!(out, "+nan.0")
    } else if n.is_infinite() {
        write!(out, "{}", if n > 0.0 { "+inf.0" } else { "-inf.0" })
    } else if n == n.trunc() && n.abs() < 1e15 {
        write!(out, "{}", n as i64)
    } else {
        write!(out, "{n}")
    }
}

fn print_quoted_string(out: &mut impl Write, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '\n' => out.write_str("\\n")?,
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            _ => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

/// Print `(a b c)` / `(a b . c)` form, stopping and printing `...` if
/// the fast pointer ever catches the slow one (the list is circular).
/// `slow` advances one cons per two of `fast`'s, the same pairing
/// [`crate::value::Value::list_len`] uses.
fn print_list(out: &mut impl Write, list: Value, style: Style) -> fmt::Result {
    out.write_char('(')?;
    let mut slow = list;
    let mut fast = list;
    let mut step: u64 = 0;
    let mut first = true;
    loop {
        let car = fast.car().expect("fast pointer trails a cons chain");
        if !first {
            out.write_char(' ')?;
        }
        first = false;
        print_value(out, car, style)?;

        match fast.cdr().expect("fast pointer trails a cons chain") {
            Value::Nil => break,
            Value::Pair(_) => {
                fast = fast.cdr().expect("just matched Pair");
                step += 1;
                if step % 2 == 0 {
                    slow = slow.cdr().expect("slow pointer trails a cons chain");
                }
                if let (Value::Pair(s), Value::Pair(f)) = (slow, fast) {
                    if s == f {
                        out.write_str(" ...")?;
                        break;
                    }
                }
            }
            other => {
                out.write_str(" . ")?;
                print_value(out, other, style)?;
                break;
            }
        }
    }
    out.write_char(')')
}

fn print_vector(out: &mut impl Write, v: Value, style: Style) -> fmt::Result {
    let vec = v.as_vector().expect("caller matched Vector");
    out.write_str("#(")?;
    let data = vec.data.borrow();
    for (i, item) in data.iter().enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        print_value(out, *item, style)?;
    }
    out.write_char(')')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextConfig};

    fn write_str(v: Value) -> String {
        let mut s = String::new();
        write_value(&mut s, v).unwrap();
        s
    }

    fn display_str(v: Value) -> String {
        let mut s = String::new();
        display_value(&mut s, v).unwrap();
        s
    }

    #[test]
    fn numbers_print_without_a_trailing_dot() {
        assert_eq!(write_str(Value::Number(42.0)), "42");
        assert_eq!(write_str(Value::Number(3.5)), "3.5");
    }

    #[test]
    fn special_floats_use_scheme_notation() {
        assert_eq!(write_str(Value::Number(f64::INFINITY)), "+inf.0");
        assert_eq!(write_str(Value::Number(f64::NEG_INFINITY)), "-inf.0");
        assert_eq!(write_str(Value::Number(f64::NAN)), "+nan.0");
    }

    #[test]
    fn booleans_print_as_hash_t_and_hash_f() {
        assert_eq!(write_str(Value::True), "#t");
        assert_eq!(write_str(Value::False), "#f");
    }

    #[test]
    fn write_quotes_strings_and_display_does_not() {
        let mut ctx = Context::new(ContextConfig::default());
        let s = ctx.alloc_string("a\"b").unwrap();
        assert_eq!(write_str(s), "\"a\\\"b\"");
        assert_eq!(display_str(s), "a\"b");
    }

    #[test]
    fn lists_and_dotted_pairs() {
        let mut ctx = Context::new(ContextConfig::default());
        let list = ctx.read("(1 2 3)");
        assert_eq!(write_str(list), "(1 2 3)");
        let dotted = ctx.read("(1 . 2)");
        assert_eq!(write_str(dotted), "(1 . 2)");
    }

    #[test]
    fn vectors_print_with_hash_paren() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = ctx.read("#(1 2 3)");
        assert_eq!(write_str(v), "#(1 2 3)");
    }

    #[test]
    fn circular_list_does_not_hang_the_printer() {
        let mut ctx = Context::new(ContextConfig::default());
        let a = ctx.alloc_cons(Value::Number(1.0), Value::Nil).unwrap();
        let cons = a.as_cons().unwrap();
        cons.cdr.set(a);
        assert_eq!(write_str(a), "(1 ...)");
    }
}
