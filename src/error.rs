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

//! The error taxonomy shared by the reader and the evaluator.
//!
//! Lexical errors carry a source location; runtime errors and engineering
//! invariant violations do not, and are reported with `line = -1` when
//! handed to a host's error callback (see [`ErrorReport`]).

use std::fmt;

/// A single error produced while reading or evaluating Scheme source.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// A lexical or syntactic error discovered by the reader.
    #[error("{line}:{column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },

    /// An arity mismatch, type error, unbound symbol, or similar failure
    /// discovered while evaluating a form.
    #[error("{message}")]
    Runtime { message: String },

    /// A violation of an engineering invariant (temp-root stack overflow,
    /// sweeping a dangling pointer). These indicate a bug in the
    /// interpreter itself rather than in the Scheme program being run.
    #[error("internal error: {message}")]
    Invariant { message: String },
}

impl Error {
    pub fn parse(line: u32, column: u32, message: impl Into<String>) -> Error {
        Error::Parse {
            line,
            column,
            message: message.into(),
        }
    }

    pub fn runtime(message: impl Into<String>) -> Error {
        Error::Runtime {
            message: message.into(),
        }
    }

    pub fn invariant(message: impl Into<String>) -> Error {
        Error::Invariant {
            message: message.into(),
        }
    }

    /// The report handed to a host's error callback: `line < 0` denotes a
    /// non-lexical (runtime or invariant) error, per the embedded API's
    /// callback signature.
    pub fn to_report(&self) -> ErrorReport {
        match self {
            Error::Parse {
                line,
                column,
                message,
            } => ErrorReport {
                line: *line as i64,
                column: *column as i64,
                message: message.clone(),
            },
            Error::Runtime { message } => ErrorReport {
                line: -1,
                column: -1,
                message: message.clone(),
            },
            Error::Invariant { message } => ErrorReport {
                line: -1,
                column: -1,
                message: format!("internal error: {message}"),
            },
        }
    }
}

/// The plain-data form of an [`Error`] passed to a host's error callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorReport {
    pub line: i64,
    pub column: i64,
    pub message: String,
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.line < 0 {
            write!(f, "runtime error: {}", self.message)
        } else {
            write!(f, "{}:{}: {}", self.line, self.column, self.message)
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
