use std::collections::TryReserveError;

use thiserror::Error;

use crate::runtime::ReprKind;

/// The generic Error type covering every recoverable failure this library can
/// return.
///
/// These are *usage* errors in the sense of the spawning contract: they are
/// raised back to the caller before any irreversible side effect has taken
/// place (no reference-count mutation, no OS thread). Unrecoverable resource
/// faults are deliberately **not** represented here; those go through the
/// process-terminating channel in [`crate::fault`].
///
/// # Error Categories
///
/// ## Spawn contract errors
/// - [`Error::ThreadReprRequired`] - result type lacks the Thread representation
/// - [`Error::NoAnchorFrame`] - spawning context has no executing frame
///
/// ## Representation protocol errors
/// - [`Error::NotInvokable`] - invoke on a non-code representation
/// - [`Error::AllocationUnsupported`] - generic allocate on a representation
///   that cannot produce an object body
/// - [`Error::ReprBodyMismatch`] - an object's body does not match what its
///   representation kind promises
/// - [`Error::CallsiteArity`] - a call-site shape the callee cannot accept
///
/// ## Interpreter bootstrap errors
/// - [`Error::EntryFrameNotMarked`] - bootstrap callback left no termination
///   sentinel for the loop
/// - [`Error::InertFrame`] - the loop reached a frame with nothing to execute
///
/// ## Resource errors
/// - [`Error::PoolAllocation`] - resource-pool reservation failed for a
///   context created *outside* the spawn path (inside `spawn` the same
///   condition is a fatal fault, see the spawn documentation)
#[derive(Error, Debug)]
pub enum Error {
    /// The result type passed to `spawn` does not use the Thread
    /// representation.
    ///
    /// Raised before any allocation, reference-count change, or OS thread
    /// creation; the spawn call has no observable side effects when this is
    /// returned.
    #[error("thread result type must have Thread representation (found {found})")]
    ThreadReprRequired {
        /// The representation kind the result type actually had.
        found: ReprKind,
    },

    /// The spawning context has no currently executing frame.
    ///
    /// A spawned thread inherits the caller's current frame as its
    /// dynamic-scope anchor; without one there is nothing to anchor to.
    #[error("spawning context has no executing frame to anchor the new thread")]
    NoAnchorFrame,

    /// An invoke was attempted through a representation that has no invoke
    /// semantics.
    #[error("value with {found} representation cannot be invoked")]
    NotInvokable {
        /// The representation kind of the value that was invoked.
        found: ReprKind,
    },

    /// A generic allocation was attempted through a representation that
    /// cannot conjure an object body from a type alone.
    #[error("{kind} representation does not support generic allocation")]
    AllocationUnsupported {
        /// The representation kind that rejected the allocation.
        kind: ReprKind,
    },

    /// An object's body does not match what its representation kind promises.
    ///
    /// This indicates a broken [`Representation`](crate::runtime::Representation)
    /// implementation, for example one that reports the Thread kind but
    /// allocates a plain data body.
    #[error("object of type `{type_name}` does not match its representation kind")]
    ReprBodyMismatch {
        /// Name of the type whose representation misbehaved.
        type_name: String,
    },

    /// The call-site shape is not accepted by the callee.
    ///
    /// Native code bodies take no runtime-level arguments; any call-site with
    /// a non-zero argument count is rejected.
    #[error("native code takes no arguments (call-site carries {found})")]
    CallsiteArity {
        /// The argument count the call-site described.
        found: usize,
    },

    /// The interpreter loop was entered but its bootstrap callback did not
    /// mark a thread entry frame.
    ///
    /// Without the entry sentinel the loop would have no defined termination
    /// point, so it refuses to run.
    #[error("bootstrap callback did not mark a thread entry frame")]
    EntryFrameNotMarked,

    /// The interpreter loop reached a frame that carries no code.
    ///
    /// Synthetic anchor frames exist only as dynamic-scope roots and must
    /// never become the loop's current frame.
    #[error("frame `{label}` has no code to execute")]
    InertFrame {
        /// Label of the inert frame.
        label: String,
    },

    /// A resource pool reservation failed.
    ///
    /// Returned only from context construction outside the spawn path. The
    /// same condition mid-spawn is reported through the fatal-fault channel
    /// because partial construction cannot be unwound there.
    #[error("could not reserve {requested} bytes for a resource pool")]
    PoolAllocation {
        /// The number of bytes the reservation asked for.
        requested: usize,
        /// The underlying reservation failure.
        #[source]
        source: TryReserveError,
    },
}

/// A convenience `Result` type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            Error::ThreadReprRequired {
                found: ReprKind::Data,
            },
            Error::NoAnchorFrame,
            Error::NotInvokable {
                found: ReprKind::Thread,
            },
            Error::EntryFrameNotMarked,
            Error::InertFrame {
                label: "main".to_string(),
            },
            Error::CallsiteArity { found: 2 },
        ];

        for err in errors {
            let display = format!("{err}");
            assert!(!display.is_empty());
        }
    }

    #[test]
    fn test_thread_repr_required_names_kind() {
        let err = Error::ThreadReprRequired {
            found: ReprKind::Code,
        };
        assert!(format!("{err}").contains("Code"));
        assert!(format!("{err}").contains("Thread representation"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
