//! # vmspawn Prelude
//!
//! A convenient prelude re-exporting the types most embedders need to
//! spawn a thread and drive a context. Import it to get going quickly:
//!
//! ```rust
//! use vmspawn::prelude::*;
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all vmspawn operations
pub use crate::Error;

/// The result type used throughout vmspawn
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Spawn a thread with the instance's default attributes
pub use crate::threads::spawn;

/// Spawn a thread with explicit attributes
pub use crate::threads::spawn_with_attrs;

/// Lifecycle state of a spawned thread object
pub use crate::threads::SpawnState;

/// The body of a thread object
pub use crate::threads::ThreadBody;

// ================================================================================================
// Runtime Substrate
// ================================================================================================

/// Shared VM identity and its builder
pub use crate::runtime::{Instance, InstanceBuilder};

/// Per-thread interpreter state
pub use crate::runtime::ThreadContext;

/// Attributes applied when creating a thread
pub use crate::runtime::SpawnAttrs;

/// Counted call-frame ownership
pub use crate::runtime::FrameHandle;

/// Runtime values and objects
pub use crate::runtime::{ObjectHandle, Value};

/// Representation protocol types
pub use crate::runtime::{ReprKind, Representation, TypeHandle};

/// Builtin type and code constructors
pub use crate::runtime::{data_type, native_code, thread_type};

// ================================================================================================
// Tracing
// ================================================================================================

/// Spawn-lifecycle trace events
pub use crate::TraceEvent;

/// NDJSON trace sink
pub use crate::TraceWriter;
