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

//! The reader: turns source text into one `Value` at a time.
//!
//! The grammar and character classes here are lifted directly from the
//! original `read.c` (`is_space`/`is_digit`/`is_letter`/`is_symbol`,
//! `read_number`, `read_string`, `read_list`'s head/tail cons-building
//! loop). What differs from the C original is the rooting discipline:
//! every intermediate cons or vector built while still reading more
//! input is protected with [`Context::protect`] before the next
//! allocation, since a collection can run at any allocation site.

use crate::context::Context;
use crate::error::{Error, Result};
use crate::value::{list_to_vec, Value};

struct Reader<'s> {
    src: &'s str,
    pos: usize,
    line: u32,
    col: u32,
}

impl<'s> Reader<'s> {
    fn new(src: &'s str) -> Reader<'s> {
        Reader {
            src,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.as_bytes().get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if is_space(c) => {
                    self.advance();
                }
                Some(b';') => {
                    while !matches!(self.peek(), Some(b'\n') | None) {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }

    fn err(&self, message: impl Into<String>) -> Error {
        Error::parse(self.line, self.col, message)
    }
}

fn is_space(c: u8) -> bool {
    c == b' ' || c == b'\r' || c == b'\n' || c == b'\t'
}

fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// R5RS symbol characters, less `.` and `@` (spec.md §4.3).
fn is_symbol_char(c: u8) -> bool {
    is_digit(c)
        || is_letter(c)
        || matches!(
            c,
            b'!' | b'$' | b'%' | b'&' | b'*' | b'+' | b'-' | b':' | b'<' | b'=' | b'>' | b'?' | b'^' | b'_' | b'~' | b'/'
        )
}

/// Read the first complete datum out of `source`, returning it along
/// with the number of bytes consumed. `Value::Eof` is returned (with
/// zero or more bytes of trailing whitespace consumed) when the input
/// holds no further data.
///
/// On a parse error the error is reported through `ctx` (setting the
/// error flag and invoking the error callback), `Value::Undefined` is
/// returned, and the consumed count covers the rest of `source` -- the
/// reader is not required to recover for further tokens within the same
/// buffer (spec.md §4.3).
pub fn read_from(ctx: &mut Context, source: &str) -> (Value, usize) {
    let mut rd = Reader::new(source);
    rd.skip_whitespace_and_comments();
    if rd.peek().is_none() {
        return (Value::Eof, rd.pos);
    }
    match read_datum(ctx, &mut rd) {
        Ok(v) => (v, rd.pos),
        Err(e) => (ctx.report_error(e), source.len()),
    }
}

fn read_datum(ctx: &mut Context, rd: &mut Reader) -> Result<Value> {
    rd.skip_whitespace_and_comments();
    let Some(c) = rd.peek() else {
        return Err(rd.err("unexpected EOF while parsing"));
    };
    match c {
        b'(' => {
            rd.advance();
            read_list_body(ctx, rd, true)
        }
        b')' => Err(rd.err("unexpected ')'")),
        b'.' => Err(rd.err("unexpected '.'")),
        b'\'' => read_quote(ctx, rd),
        b'"' => read_string(ctx, rd),
        b'#' => read_hash(ctx, rd),
        c if is_digit(c) => read_number(ctx, rd),
        b'+' | b'-' if rd.peek_at(1).is_some_and(is_digit) => read_number(ctx, rd),
        c if is_symbol_char(c) => Ok(read_symbol(ctx, rd)),
        c => Err(rd.err(format!("unknown token starting with '{}'", c as char))),
    }
}

fn read_quote(ctx: &mut Context, rd: &mut Reader) -> Result<Value> {
    rd.advance();
    let datum = read_datum(ctx, rd)?;
    let quote_sym = ctx.intern("quote");
    ctx.protect(datum, |ctx| {
        let inner = ctx.alloc_cons(datum, Value::Nil)?;
        ctx.protect(inner, |ctx| ctx.alloc_cons(quote_sym, inner))
    })
}

fn read_string(ctx: &mut Context, rd: &mut Reader) -> Result<Value> {
    rd.advance();
    let start = rd.pos;
    loop {
        match rd.peek() {
            Some(b'"') => break,
            Some(_) => {
                rd.advance();
            }
            None => return Err(rd.err("unterminated string literal")),
        }
    }
    let text = &rd.src[start..rd.pos];
    rd.advance();
    ctx.alloc_string(text)
}

fn read_number(ctx: &mut Context, rd: &mut Reader) -> Result<Value> {
    let start = rd.pos;
    let err_loc = (rd.line, rd.col);
    if matches!(rd.peek(), Some(b'+') | Some(b'-')) {
        rd.advance();
    }
    while rd.peek().is_some_and(is_digit) {
        rd.advance();
    }
    if rd.peek() == Some(b'.') && rd.peek_at(1).is_some_and(is_digit) {
        rd.advance();
        while rd.peek().is_some_and(is_digit) {
            rd.advance();
        }
    }
    if matches!(rd.peek(), Some(b'e') | Some(b'E')) {
        let save = rd.pos;
        let save_line_col = (rd.line, rd.col);
        rd.advance();
        if matches!(rd.peek(), Some(b'+') | Some(b'-')) {
            rd.advance();
        }
        if rd.peek().is_some_and(is_digit) {
            while rd.peek().is_some_and(is_digit) {
                rd.advance();
            }
        } else {
            // not actually an exponent -- back out (e.g. "1efoo").
            rd.pos = save;
            rd.line = save_line_col.0;
            rd.col = save_line_col.1;
        }
    }
    let text = &rd.src[start..rd.pos];
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Value::Number(v)),
        Ok(_) => {
            ctx.report_error(Error::parse(
                err_loc.0,
                err_loc.1,
                format!("numeric literal '{text}' overflows a double"),
            ));
            Ok(Value::Number(0.0))
        }
        Err(_) => Err(Error::parse(
            err_loc.0,
            err_loc.1,
            format!("malformed numeric literal '{text}'"),
        )),
    }
}

fn read_symbol(ctx: &mut Context, rd: &mut Reader) -> Value {
    let start = rd.pos;
    while rd.peek().is_some_and(is_symbol_char) {
        rd.advance();
    }
    let text = &rd.src[start..rd.pos];
    ctx.intern(text)
}

fn read_hash(ctx: &mut Context, rd: &mut Reader) -> Result<Value> {
    rd.advance();
    match rd.peek() {
        Some(b't') => {
            rd.advance();
            Ok(Value::True)
        }
        Some(b'f') => {
            rd.advance();
            Ok(Value::False)
        }
        Some(b'(') => {
            rd.advance();
            let list = read_list_body(ctx, rd, false)?;
            ctx.protect(list, |ctx| {
                let items = list_to_vec(list, "vector literal")?;
                ctx.alloc_vector(items)
            })
        }
        _ => Err(rd.err("#t, #f, and #( are the only forms beginning with '#'")),
    }
}

/// Parse the contents of a list or vector after the opening delimiter
/// has already been consumed, up to and including the closing `)`.
/// `allow_dot` distinguishes `(` (proper or dotted list) from `#(`
/// (vector literal, where a stray `.` is an error).
fn read_list_body(ctx: &mut Context, rd: &mut Reader, allow_dot: bool) -> Result<Value> {
    rd.skip_whitespace_and_comments();
    if rd.peek() == Some(b')') {
        rd.advance();
        return Ok(Value::Nil);
    }
    if rd.peek().is_none() {
        return Err(rd.err("unexpected EOF while parsing"));
    }
    let first = read_datum(ctx, rd)?;
    let head = ctx.protect(first, |ctx| ctx.alloc_cons(first, Value::Nil))?;
    ctx.protect(head, |ctx| read_list_tail(ctx, rd, head, allow_dot))
}

fn read_list_tail(ctx: &mut Context, rd: &mut Reader, head: Value, allow_dot: bool) -> Result<Value> {
    let mut tail = head;
    loop {
        rd.skip_whitespace_and_comments();
        match rd.peek() {
            Some(b')') => {
                rd.advance();
                return Ok(head);
            }
            None => return Err(rd.err("unexpected EOF while parsing")),
            Some(b'.') if allow_dot => {
                rd.advance();
                let tail_val = read_datum(ctx, rd)?;
                tail.as_cons()
                    .expect("list tail is always a cons built by this function")
                    .cdr
                    .set(tail_val);
                rd.skip_whitespace_and_comments();
                if rd.peek() != Some(b')') {
                    return Err(rd.err("expected ')' after dotted tail"));
                }
                rd.advance();
                return Ok(head);
            }
            Some(b'.') => return Err(rd.err("unexpected '.' in vector literal")),
            _ => {
                let elem = read_datum(ctx, rd)?;
                let new_pair = ctx.protect(elem, |ctx| ctx.alloc_cons(elem, Value::Nil))?;
                tail.as_cons()
                    .expect("list tail is always a cons built by this function")
                    .cdr
                    .set(new_pair);
                tail = new_pair;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextConfig;

    fn read(ctx: &mut Context, src: &str) -> Value {
        read_from(ctx, src).0
    }

    #[test]
    fn reads_empty_input_as_eof() {
        let mut ctx = Context::new(ContextConfig::default());
        assert_eq!(read(&mut ctx, "   \n  "), Value::Eof);
    }

    #[test]
    fn reads_numbers() {
        let mut ctx = Context::new(ContextConfig::default());
        assert_eq!(read(&mut ctx, "42"), Value::Number(42.0));
        assert_eq!(read(&mut ctx, "-3.5"), Value::Number(-3.5));
        assert_eq!(read(&mut ctx, "1.5e2"), Value::Number(150.0));
    }

    #[test]
    fn reads_booleans() {
        let mut ctx = Context::new(ContextConfig::default());
        assert_eq!(read(&mut ctx, "#t"), Value::True);
        assert_eq!(read(&mut ctx, "#f"), Value::False);
    }

    #[test]
    fn reads_symbols_and_interns_them() {
        let mut ctx = Context::new(ContextConfig::default());
        let a = read(&mut ctx, "foo->bar!");
        let b = ctx.intern("foo->bar!");
        assert_eq!(a, b);
    }

    #[test]
    fn reads_a_string_without_escapes() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "\"hello world\"");
        assert_eq!(v.as_string().unwrap().bytes.as_ref(), "hello world");
    }

    #[test]
    fn reads_a_proper_list() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "(1 2 3)");
        assert_eq!(v.list_len(), 3);
        let items = list_to_vec(v, "test").unwrap();
        assert_eq!(items, vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
    }

    #[test]
    fn reads_a_dotted_pair() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "(1 . 2)");
        assert_eq!(v.car(), Some(Value::Number(1.0)));
        assert_eq!(v.cdr(), Some(Value::Number(2.0)));
    }

    #[test]
    fn nested_dotted_form_matches_flat_form() {
        let mut ctx = Context::new(ContextConfig::default());
        let a = read(&mut ctx, "(1 . (2 . 3))");
        let b = read(&mut ctx, "(1 2 . 3)");
        assert_eq!(a.list_len(), b.list_len());
        assert_eq!(a.car(), b.car());
        assert_eq!(a.cdr().unwrap().car(), b.cdr().unwrap().car());
        assert_eq!(a.cdr().unwrap().cdr(), b.cdr().unwrap().cdr());
    }

    #[test]
    fn reads_a_quote_form() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "'x");
        let quote_sym = ctx.intern("quote");
        assert_eq!(v.car(), Some(quote_sym));
        assert_eq!(v.cdr().unwrap().car(), Some(ctx.intern("x")));
    }

    #[test]
    fn reads_a_vector_literal() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "#(1 2 3)");
        let items = v.as_vector().unwrap().data.borrow().clone();
        assert_eq!(items, vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
    }

    #[test]
    fn unexpected_close_paren_reports_an_error() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, ")");
        assert_eq!(v, Value::Undefined);
        assert!(ctx.has_error());
    }

    #[test]
    fn deeply_nested_list_reads_without_crashing() {
        let mut ctx = Context::new(ContextConfig::default());
        let mut src = String::new();
        for _ in 0..1000 {
            src.push('(');
        }
        src.push('1');
        for _ in 0..1000 {
            src.push(')');
        }
        let v = read(&mut ctx, &src);
        assert!(!ctx.has_error());
        assert_eq!(v.list_len(), 1);
    }

    #[test]
    fn comments_are_skipped() {
        let mut ctx = Context::new(ContextConfig::default());
        let v = read(&mut ctx, "; a comment\n42 ; trailing\n");
        assert_eq!(v, Value::Number(42.0));
    }
}
