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

//! `treescheme` - run a Scheme source file, evaluate an inline
//! expression, or drop into an interactive REPL.
//!
//! Exit codes follow the BSD `sysexits.h` convention the rest of this
//! codebase's ecosystem favors: `0` on success, `66` (`EX_NOINPUT`) when
//! the given file cannot be read, `74` (`EX_IOERR`) when evaluating the
//! source produced a reported error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use treescheme::{Context, ContextConfig, PrintStyle};

const EX_NOINPUT: u8 = 66;
const EX_IOERR: u8 = 74;

#[derive(Parser)]
#[command(name = "treescheme")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A small tree-walking Scheme interpreter", long_about = None)]
struct Cli {
    /// Scheme source file to run. Omit to start an interactive REPL.
    file: Option<PathBuf>,

    /// Evaluate a single expression instead of reading a file or REPL.
    #[arg(short = 'e', long = "eval")]
    expr: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ContextConfig::default();
    config.loader = Some(Box::new(|ctx, _env, path| {
        let source = std::fs::read_to_string(path)
            .map_err(|e| treescheme::Error::runtime(format!("cannot read {path}: {e}")))?;
        ctx.eval_str(&source);
        Ok(())
    }));
    let mut ctx = Context::new(config);
    ctx.install_default_environment();

    if let Some(expr) = cli.expr {
        return run_source(&mut ctx, &expr);
    }

    if let Some(path) = cli.file {
        let env = ctx.global_environment();
        let Some(path_str) = path.to_str() else {
            eprintln!("treescheme: non-UTF-8 path: {}", path.display());
            return ExitCode::from(EX_NOINPUT);
        };
        if let Err(e) = ctx.load(env, path_str) {
            eprintln!("treescheme: {}", e.to_report());
            return ExitCode::from(EX_NOINPUT);
        }
        if let Some(code) = ctx.exit_requested() {
            return ExitCode::from(code as u8);
        }
        return if ctx.has_error() {
            if let Some(report) = ctx.last_error() {
                eprintln!("treescheme: {report}");
            }
            ExitCode::from(EX_IOERR)
        } else {
            ExitCode::SUCCESS
        };
    }

    run_repl(&mut ctx)
}

fn run_source(ctx: &mut Context, source: &str) -> ExitCode {
    ctx.eval_str(source);
    if let Some(code) = ctx.exit_requested() {
        return ExitCode::from(code as u8);
    }
    if ctx.has_error() {
        if let Some(report) = ctx.last_error() {
            eprintln!("treescheme: {report}");
        }
        ExitCode::from(EX_IOERR)
    } else {
        ExitCode::SUCCESS
    }
}

fn run_repl(ctx: &mut Context) -> ExitCode {
    let mut editor = match DefaultEditor::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("treescheme: failed to start line editor: {e}");
            return ExitCode::from(EX_IOERR);
        }
    };

    loop {
        match editor.readline("scheme> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                ctx.clear_error();
                let value = ctx.eval_str(&line);
                if ctx.has_error() {
                    if let Some(report) = ctx.last_error() {
                        eprintln!("error: {report}");
                    }
                } else {
                    let mut out = String::new();
                    ctx.print(value, PrintStyle::Write, &mut ToStringSink(&mut out))
                        .ok();
                    println!("{out}");
                }
                if let Some(code) = ctx.exit_requested() {
                    return ExitCode::from(code as u8);
                }
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("treescheme: readline error: {e}");
                return ExitCode::from(EX_IOERR);
            }
        }
    }

    ExitCode::SUCCESS
}

/// Adapts a `String` to `std::io::Write` so the REPL can reuse
/// [`Context::print`]'s sink-based API instead of formatting twice.
struct ToStringSink<'a>(&'a mut String);

impl std::io::Write for ToStringSink<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
