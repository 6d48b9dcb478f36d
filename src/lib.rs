// Copyright 2026 vmspawn Contributors
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
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # vmspawn
//!
//! Thread spawning for a bytecode virtual machine: start an OS thread that
//! executes a runtime-level callable, with the spawning call frame kept
//! alive as the new thread's dynamic-scope anchor and a per-thread
//! interpreter loop bootstrapped behind a single entry frame.
//!
//! ## Features
//!
//! - **Validated spawning** - representation-kind and anchor checks fail
//!   fast as typed errors, before any side effect
//! - **Anchor lifetime extension** - the spawner's current frame survives
//!   for as long as the child thread may resolve dynamic scope against it,
//!   via counted frame handles
//! - **Entry-frame semantics** - each spawned thread drives its own
//!   interpreter loop, terminated by a return out of its marked entry
//!   frame rather than by unwinding into the spawner
//! - **Observable lifecycle** - a `Created -> Starting -> Running ->
//!   Finished` state cell per thread object, plus optional NDJSON tracing
//!   of spawn events
//!
//! ## Quick Start
//!
//! Add `vmspawn` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! vmspawn = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust
//! use vmspawn::prelude::*;
//!
//! let instance = Instance::new();
//! let mut ctx = ThreadContext::new(instance)?;
//! ctx.set_cur_frame(Some(FrameHandle::root("main")));
//!
//! let greeter = native_code("greeter", |_ctx| Ok(Value::Str("hello".into())));
//! let thread = spawn(&ctx, &greeter, &thread_type("Thread"))?;
//!
//! // The spawner does not wait; a registry layer can join later.
//! if let Some(handle) = thread.as_thread().and_then(|t| t.take_os_handle()) {
//!     let _ = handle.join();
//! }
//! # Ok::<(), vmspawn::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`threads`] - spawn validation, the cross-thread start request, the
//!   bootstrap function the new OS thread runs, and the thread object's
//!   lifecycle state
//! - [`runtime`] - the substrate: values, objects and representations,
//!   counted frame handles, the VM instance, per-thread contexts, and the
//!   interpreter loop in [`runtime::interp`]
//! - [`fault`] - the non-recoverable failure channel for faults raised
//!   mid-spawn, after side effects exist
//! - [`TraceWriter`] / [`TraceEvent`] - optional NDJSON lifecycle tracing
//!
//! Joining, cancellation, GC coordination, and inter-thread messaging are
//! out of scope; the spawned thread's OS handle is parked on its thread
//! object for a higher-level registry to own.

mod error;
pub mod fault;
pub mod prelude;
pub mod runtime;
pub mod threads;
mod trace;

pub use error::{Error, Result};
pub use trace::{TraceEvent, TraceWriter};
