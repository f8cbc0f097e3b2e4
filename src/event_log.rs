//! JSON-lines diagnostic log of dispatched modification events
//!
//! Embedders and tests can install an [`EventLogWriter`] on a bus to get a
//! durable trace of what was published and in which order. Records are JSON
//! objects on a single line:
//!
//! ```json
//! {"type":"module_out_of_block","module":{"name":"app.main","kind":"source"},"timestamp":"..."}
//! ```
//!
//! The writer is a plain listener; nothing in the core depends on it.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::Result;
use crate::events::{ModificationEvent, ModificationEventBus};

/// One log line: the event plus an RFC-3339 timestamp
#[derive(Serialize)]
struct LogRecord<'a> {
    #[serde(flatten)]
    event: &'a ModificationEvent,
    timestamp: String,
}

/// Writes every event published on a bus as a JSON line
pub struct EventLogWriter<W: Write + Send + 'static> {
    out: Mutex<W>,
}

impl<W: Write + Send + 'static> EventLogWriter<W> {
    pub fn new(out: W) -> Arc<Self> {
        Arc::new(Self {
            out: Mutex::new(out),
        })
    }

    /// Subscribe this writer to all four channels of `bus`.
    pub fn install(self: &Arc<Self>, bus: &ModificationEventBus) {
        let w = Arc::clone(self);
        bus.subscribe_module_state(move |module| {
            w.record(&ModificationEvent::ModuleState {
                module: module.clone(),
            })
        });

        let w = Arc::clone(self);
        bus.subscribe_module_out_of_block(move |module| {
            w.record(&ModificationEvent::ModuleOutOfBlock {
                module: module.clone(),
            })
        });

        let w = Arc::clone(self);
        bus.subscribe_global_state(move |include_binary_modules| {
            w.record(&ModificationEvent::GlobalState {
                include_binary_modules,
            })
        });

        let w = Arc::clone(self);
        bus.subscribe_global_out_of_block(move |include_binary_modules| {
            w.record(&ModificationEvent::GlobalOutOfBlock {
                include_binary_modules,
            })
        });
    }

    fn record(&self, event: &ModificationEvent) {
        let record = LogRecord {
            event,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        // A torn-down log sink must not take the publisher with it
        if let Ok(json) = serde_json::to_string(&record) {
            let mut out = self.out.lock();
            if writeln!(out, "{}", json).is_err() {
                tracing::warn!("failed to write event log record");
            }
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.out.lock().flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleId;

    /// In-memory sink sharing its buffer with the test
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_records_are_json_lines() {
        let bus = ModificationEventBus::new();
        let buf = SharedBuf::default();
        let writer = EventLogWriter::new(buf.clone());
        writer.install(&bus);

        bus.publish_module_state_modification(&ModuleId::source("app"));
        bus.publish_global_out_of_block_modification(true);

        let contents = String::from_utf8(buf.0.lock().clone()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "module_state");
        assert_eq!(first["module"]["name"], "app");
        assert!(first["timestamp"].is_string());

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["type"], "global_out_of_block");
        assert_eq!(second["include_binary_modules"], true);
    }

    #[test]
    fn test_uninstalled_writer_sees_nothing() {
        let bus = ModificationEventBus::new();
        let buf = SharedBuf::default();
        let _writer = EventLogWriter::new(buf.clone());
        // Never installed

        bus.publish_global_state_modification(false);
        assert!(buf.0.lock().is_empty());
    }
}
