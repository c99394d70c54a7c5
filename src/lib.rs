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

//! A small tree-walking Scheme interpreter: a tagged-value heap with a
//! mark-and-sweep collector, a reader, a lexically-scoped evaluator, and
//! a default environment of primitive procedures and special forms.
//!
//! The embedded API is [`Context`]: construct one with a
//! [`ContextConfig`], call [`Context::install_default_environment`] to
//! bind the standard library, then drive it with [`Context::eval_str`]
//! or the lower-level [`Context::read`]/[`Context::eval`] pair. See
//! `src/main.rs` for the host CLI built on top of this crate.

pub mod context;
pub mod environment;
pub mod error;
pub mod eval;
pub mod heap;
pub mod primitives;
pub mod printer;
pub mod reader;
pub mod value;

pub use context::{Context, ContextConfig, EnvPtr, PrintStyle};
pub use error::{Error, ErrorReport, Result};
pub use value::Value;
