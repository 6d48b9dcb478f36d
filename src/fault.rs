//! Fatal-fault reporting, the process-terminating sibling of [`crate::Error`].
//!
//! Two failure channels exist in this crate, handled deliberately
//! differently:
//!
//! - **Recoverable errors** ([`crate::Error`]) are raised back to the caller
//!   before any irreversible side effect has happened.
//! - **Fatal faults** (this module) cover conditions detected *mid-spawn*,
//!   where a partially constructed thread object already exists and cannot be
//!   safely unwound. These are reported to stderr, recorded as a final trace
//!   event when a tracer is installed, and terminate the process.
//!
//! The two channels are kept distinct on purpose: an embedding layer that
//! wants a fully recoverable spawn would have to release the inherited frame
//! reference on the failure path itself, and that trade-off belongs to it,
//! not to this subsystem.

use std::process;

use strum::Display;

use crate::trace::{TraceEvent, TraceWriter};

/// The category of an unrecoverable fault.
///
/// Carried in the stderr diagnostic and the final trace event so operators
/// can tell resource-pool failures from OS-level thread-creation failures
/// without parsing the message text.
#[derive(Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// A thread-scoped resource pool could not be allocated.
    PoolAllocation,
    /// The OS refused to create a thread.
    ThreadCreate,
}

/// Reports an unrecoverable fault and terminates the process.
///
/// Never returns. The diagnostic always goes to stderr; when a tracer is
/// installed, a [`TraceEvent::Fault`] is additionally written and flushed
/// best-effort first, so a trace file ends with the reason the run died.
pub fn fatal(trace: Option<&TraceWriter>, kind: FaultKind, detail: &str) -> ! {
    record(trace, kind, detail);
    eprintln!("vmspawn fatal fault [{kind}]: {detail}");
    process::abort();
}

/// Writes the final fault event to the tracer, if one is installed.
fn record(trace: Option<&TraceWriter>, kind: FaultKind, detail: &str) {
    if let Some(tracer) = trace {
        tracer.write(TraceEvent::Fault {
            kind: kind.to_string(),
            detail: detail.to_string(),
        });
        tracer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_display() {
        assert_eq!(format!("{}", FaultKind::PoolAllocation), "PoolAllocation");
        assert_eq!(format!("{}", FaultKind::ThreadCreate), "ThreadCreate");
    }

    #[test]
    fn test_fault_recorded_to_tracer() {
        let writer = TraceWriter::new_memory(4);
        record(Some(&writer), FaultKind::ThreadCreate, "no resources");

        let events = writer.take_buffer().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            TraceEvent::Fault { kind, detail }
                if kind == "ThreadCreate" && detail == "no resources"
        ));
    }

    #[test]
    fn test_record_without_tracer_is_a_no_op() {
        record(None, FaultKind::PoolAllocation, "ignored");
    }
}
