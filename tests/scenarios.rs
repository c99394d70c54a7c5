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

//! End-to-end scenarios driven entirely through the public [`Context`]
//! API, one per concrete scenario in spec.md's testable-properties
//! section.

use treescheme::{Context, ContextConfig, PrintStyle, Value};

fn fresh() -> Context {
    let mut ctx = Context::new(ContextConfig::default());
    ctx.install_default_environment();
    ctx
}

#[test]
fn scenario_1_variadic_addition() {
    let mut ctx = fresh();
    let result = ctx.eval_str("(+ 1 2 3)");
    assert_eq!(result, Value::Number(6.0));
    assert!(!ctx.has_error());
}

#[test]
fn scenario_2_lambda_application() {
    let mut ctx = fresh();
    let result = ctx.eval_str("((lambda (x y) (* x y)) 6 7)");
    assert_eq!(result, Value::Number(42.0));
}

#[test]
fn scenario_3_recursive_factorial() {
    let mut ctx = fresh();
    let result = ctx.eval_str(
        "(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 5)",
    );
    assert_eq!(result, Value::Number(120.0));
    assert!(!ctx.has_error());
}

#[test]
fn scenario_4_define_macro_unless() {
    let mut ctx = fresh();
    let result = ctx.eval_str(
        "(define-macro (unless c . body) (list (quote if) c #f (cons (quote begin) body))) \
         (unless #f 1 2 3)",
    );
    assert_eq!(result, Value::Number(3.0));
}

#[test]
fn scenario_5_let_prints_as_dotted_pair() {
    let mut ctx = fresh();
    let result = ctx.eval_str("(let ((a 1) (b 2)) (cons a b))");
    assert_eq!(ctx.write_to_string(result), "(1 . 2)");

    let mut sink = Vec::new();
    ctx.print(result, PrintStyle::Write, &mut sink).unwrap();
    assert_eq!(String::from_utf8(sink).unwrap(), "(1 . 2)");
}

#[test]
fn scenario_6_vector_mutation() {
    let mut ctx = fresh();
    let result = ctx.eval_str(
        "(define v (make-vector 3 #f)) (vector-set! v 1 42) (vector-ref v 1)",
    );
    assert_eq!(result, Value::Number(42.0));
    assert!(!ctx.has_error());
}

#[test]
fn empty_input_reads_as_eof() {
    let mut ctx = fresh();
    assert_eq!(ctx.read(""), Value::Eof);
    assert_eq!(ctx.read("   ; just a comment\n"), Value::Eof);
}

#[test]
fn deeply_nested_list_reads_and_prints_without_crashing() {
    let mut ctx = fresh();
    let mut src = String::new();
    for _ in 0..1000 {
        src.push('(');
    }
    src.push('1');
    for _ in 0..1000 {
        src.push(')');
    }
    let value = ctx.read(&src);
    assert!(!ctx.has_error());
    let printed = ctx.write_to_string(value);
    assert!(printed.starts_with("(((("));
}

#[test]
fn exit_stops_further_evaluation() {
    let mut ctx = fresh();
    ctx.eval_str("(exit 0) (car '())");
    assert_eq!(ctx.exit_requested(), Some(0));
    assert!(!ctx.has_error());
}

#[test]
fn gc_runs_transparently_across_many_small_evaluations() {
    let mut ctx = Context::new(ContextConfig {
        initial_heap_bytes: 1 << 12,
        min_heap_floor: 1 << 12,
        ..ContextConfig::default()
    });
    ctx.install_default_environment();
    for i in 0..500 {
        let src = format!("(length (list {i} {i} {i}))");
        let result = ctx.eval_str(&src);
        assert_eq!(result, Value::Number(3.0));
    }
    assert!(!ctx.has_error());
}
