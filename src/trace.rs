//! Spawn-lifecycle tracing for debugging and analysis.
//!
//! When a trace writer is installed on an [`Instance`](crate::runtime::Instance),
//! every spawn request, thread bootstrap, interpreter-loop exit, and anchor
//! release is recorded, and a fatal fault leaves a final event before the
//! process dies. This is the primary diagnostic surface of the subsystem;
//! there is no global logger.
//!
//! # Output Format
//!
//! Trace events are written as newline-delimited JSON (NDJSON/JSONL).
//! Each line is a complete JSON object representing one trace event.

use std::{
    fmt::Write as FmtWrite,
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    mem,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

/// A trace event recorded during thread spawning.
///
/// Each event captures one point in a spawned thread's lifecycle with the
/// VM-level thread id it belongs to.
#[derive(Clone, Debug)]
pub enum TraceEvent {
    /// A spawn request passed validation and an OS thread was requested.
    Spawned {
        /// VM-level id of the new thread's context.
        thread_id: u64,
        /// OS thread name the new thread was given.
        name: String,
    },

    /// The new OS thread entered its bootstrap function.
    BootstrapEntered {
        /// VM-level id of the thread's context.
        thread_id: u64,
        /// Label of the inherited dynamic-scope anchor frame.
        anchor: String,
    },

    /// The thread's interpreter loop returned.
    LoopExited {
        /// VM-level id of the thread's context.
        thread_id: u64,
        /// `true` for a natural return, `false` for an abrupt exit.
        clean: bool,
    },

    /// The thread released its hold on the inherited anchor frame.
    AnchorReleased {
        /// VM-level id of the thread's context.
        thread_id: u64,
    },

    /// An unrecoverable fault was detected; the process is about to
    /// terminate.
    ///
    /// Written best-effort just before the abort, so a trace file ends
    /// with the reason the run died. No thread id: the fault may strike
    /// before the new thread's context exists.
    Fault {
        /// The fault category, as rendered by
        /// [`FaultKind`](crate::fault::FaultKind).
        kind: String,
        /// Human-readable failure detail.
        detail: String,
    },
}

impl TraceEvent {
    /// Converts the event to a JSON string.
    #[must_use]
    pub fn to_json(&self) -> String {
        match self {
            TraceEvent::Spawned { thread_id, name } => {
                format!(
                    r#"{{"type":"spawned","thread_id":{},"name":"{}"}}"#,
                    thread_id,
                    escape_json(name)
                )
            }
            TraceEvent::BootstrapEntered { thread_id, anchor } => {
                format!(
                    r#"{{"type":"bootstrap","thread_id":{},"anchor":"{}"}}"#,
                    thread_id,
                    escape_json(anchor)
                )
            }
            TraceEvent::LoopExited { thread_id, clean } => {
                format!(
                    r#"{{"type":"loop_exit","thread_id":{thread_id},"clean":{clean}}}"#
                )
            }
            TraceEvent::AnchorReleased { thread_id } => {
                format!(r#"{{"type":"anchor_released","thread_id":{thread_id}}}"#)
            }
            TraceEvent::Fault { kind, detail } => {
                format!(
                    r#"{{"type":"fault","kind":"{}","detail":"{}"}}"#,
                    escape_json(kind),
                    escape_json(detail)
                )
            }
        }
    }
}

/// Escapes a string for JSON output.
fn escape_json(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => result.push_str("\\\""),
            '\\' => result.push_str("\\\\"),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(result, "\\u{:04X}", c as u32);
            }
            c => result.push(c),
        }
    }
    result
}

/// A writer for trace events.
///
/// Handles writing trace events to either a file or an in-memory buffer.
/// Thread-safe via internal locking; spawned threads write to the same
/// writer as the spawning thread.
pub struct TraceWriter {
    /// File writer if file-based tracing is enabled.
    file: Option<Mutex<BufWriter<File>>>,
    /// In-memory buffer if memory-based tracing is enabled.
    buffer: Option<Mutex<Vec<TraceEvent>>>,
    /// Maximum buffer size (0 = unlimited).
    max_entries: usize,
    /// Number of events written.
    event_count: AtomicU64,
}

impl TraceWriter {
    /// Creates a new trace writer for file-based tracing.
    ///
    /// The file is opened in append mode so that multiple runtime instances
    /// can share one trace file without overwriting each other's output.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or opened.
    pub fn new_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Some(Mutex::new(BufWriter::new(file))),
            buffer: None,
            max_entries: 0,
            event_count: AtomicU64::new(0),
        })
    }

    /// Creates a new trace writer for memory-based tracing.
    ///
    /// # Arguments
    ///
    /// * `max_entries` - Maximum trace entries to keep (0 for unlimited)
    #[must_use]
    pub fn new_memory(max_entries: usize) -> Self {
        Self {
            file: None,
            buffer: Some(Mutex::new(Vec::with_capacity(max_entries.min(1024)))),
            max_entries,
            event_count: AtomicU64::new(0),
        }
    }

    /// Writes a trace event.
    pub fn write(&self, event: TraceEvent) {
        self.event_count.fetch_add(1, Ordering::Relaxed);

        if let Some(ref file) = self.file {
            if let Ok(mut writer) = file.lock() {
                let _ = writeln!(writer, "{}", event.to_json());
            }
        } else if let Some(ref buffer) = self.buffer {
            if let Ok(mut buf) = buffer.lock() {
                if self.max_entries > 0 && buf.len() >= self.max_entries {
                    buf.remove(0);
                }
                buf.push(event);
            }
        }
    }

    /// Flushes any buffered output.
    pub fn flush(&self) {
        if let Some(ref file) = self.file {
            if let Ok(mut writer) = file.lock() {
                let _ = writer.flush();
            }
        }
    }

    /// Returns the number of events written.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.event_count.load(Ordering::Relaxed)
    }

    /// Takes the in-memory buffer, leaving it empty.
    ///
    /// Returns `None` if this is a file-based writer.
    pub fn take_buffer(&self) -> Option<Vec<TraceEvent>> {
        self.buffer
            .as_ref()
            .and_then(|buf| buf.lock().ok().map(|mut b| mem::take(&mut *b)))
    }
}

impl std::fmt::Debug for TraceWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceWriter")
            .field("is_file_based", &self.file.is_some())
            .field("max_entries", &self.max_entries)
            .field("event_count", &self.event_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_event_json() {
        let event = TraceEvent::Spawned {
            thread_id: 2,
            name: "vm-thread-2".to_string(),
        };

        let json = event.to_json();
        assert!(json.contains("\"type\":\"spawned\""));
        assert!(json.contains("\"thread_id\":2"));
        assert!(json.contains("\"name\":\"vm-thread-2\""));
    }

    #[test]
    fn test_loop_exit_json_flags_abrupt_exit() {
        let event = TraceEvent::LoopExited {
            thread_id: 3,
            clean: false,
        };
        assert!(event.to_json().contains("\"clean\":false"));
    }

    #[test]
    fn test_fault_event_json() {
        let event = TraceEvent::Fault {
            kind: "ThreadCreate".to_string(),
            detail: "could not spawn thread: \"no resources\"".to_string(),
        };

        let json = event.to_json();
        assert!(json.contains("\"type\":\"fault\""));
        assert!(json.contains("\"kind\":\"ThreadCreate\""));
        assert!(json.contains("\\\"no resources\\\""));
    }

    #[test]
    fn test_trace_writer_memory() {
        let writer = TraceWriter::new_memory(100);

        writer.write(TraceEvent::AnchorReleased { thread_id: 7 });

        assert_eq!(writer.event_count(), 1);
        let buffer = writer.take_buffer().unwrap();
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_trace_writer_memory_bounded() {
        let writer = TraceWriter::new_memory(2);
        for id in 0..5 {
            writer.write(TraceEvent::AnchorReleased { thread_id: id });
        }
        assert_eq!(writer.event_count(), 5);
        let buffer = writer.take_buffer().unwrap();
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json("hello"), "hello");
        assert_eq!(escape_json("hello\"world"), "hello\\\"world");
        assert_eq!(escape_json("line1\nline2"), "line1\\nline2");
    }
}
