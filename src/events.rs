//! Session event history: per-command timing records plus named
//! lifecycle and custom events.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DriverError, Result};

/// Reserved key for per-command timing records inside the history map.
const COMMANDS_KEY: &str = "commands";

// Lifecycle event names recorded by the command runtime itself.
pub const NEW_SESSION_REQUESTED: &str = "newSessionRequested";
pub const NEW_SESSION_STARTED: &str = "newSessionStarted";
pub const QUIT_SESSION_REQUESTED: &str = "quitSessionRequested";
pub const QUIT_SESSION_FINISHED: &str = "quitSessionFinished";

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Timing record for one executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandRecord {
    pub cmd: String,
    pub start_time: i64,
    pub end_time: i64,
}

#[derive(Default)]
struct HistoryInner {
    commands: Vec<CommandRecord>,
    events: BTreeMap<String, Vec<i64>>,
}

/// Ordered event history for one driver instance.
///
/// Cheap to clone; all copies share the same store. The history outlives
/// individual sessions so post-mortem timing data stays available.
#[derive(Clone, Default)]
pub struct EventHistory {
    inner: Arc<Mutex<HistoryInner>>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a `{cmd, startTime, endTime}` record.
    pub fn record_command(&self, cmd: &str, start_time: i64, end_time: i64) {
        self.inner.lock().commands.push(CommandRecord {
            cmd: cmd.to_string(),
            start_time,
            end_time,
        });
    }

    /// Record a named lifecycle event at the current time.
    ///
    /// The `commands` key is reserved for timing records and cannot be
    /// logged directly.
    pub fn log_event(&self, name: &str) -> Result<()> {
        if name == COMMANDS_KEY {
            return Err(DriverError::InvalidArgument(
                "cannot log 'commands' as a named event".into(),
            ));
        }
        if name.is_empty() {
            return Err(DriverError::InvalidArgument(
                "event name must not be empty".into(),
            ));
        }
        let ts = now_ms();
        self.inner.lock().events.entry(name.to_string()).or_default().push(ts);
        tracing::debug!(event = %name, ts, "event logged");
        Ok(())
    }

    /// Record a runtime lifecycle event. Lifecycle names are fixed
    /// constants, so no validation is needed here.
    pub(crate) fn log_lifecycle(&self, name: &str) {
        let ts = now_ms();
        self.inner.lock().events.entry(name.to_string()).or_default().push(ts);
    }

    /// Record a client-supplied event, namespaced as `vendor:event`.
    pub fn log_custom_event(&self, vendor: &str, event: &str) -> Result<()> {
        if vendor.is_empty() || event.is_empty() {
            return Err(DriverError::InvalidArgument(
                "custom events require both a vendor and an event name".into(),
            ));
        }
        self.log_event(&format!("{vendor}:{event}"))
    }

    pub fn command_records(&self) -> Vec<CommandRecord> {
        self.inner.lock().commands.clone()
    }

    /// Full history as a JSON map: `commands` plus one key per event name.
    pub fn snapshot(&self) -> Value {
        let inner = self.inner.lock();
        let mut map = serde_json::Map::new();
        map.insert(
            COMMANDS_KEY.to_string(),
            serde_json::to_value(&inner.commands).unwrap_or(Value::Array(vec![])),
        );
        for (name, stamps) in &inner.events {
            map.insert(name.clone(), serde_json::to_value(stamps).unwrap_or_default());
        }
        Value::Object(map)
    }

    /// History restricted to the requested type names.
    pub fn filtered(&self, types: &[String]) -> Value {
        let Value::Object(full) = self.snapshot() else {
            unreachable!("snapshot always yields an object");
        };
        let picked: serde_json::Map<String, Value> = full
            .into_iter()
            .filter(|(name, _)| types.iter().any(|t| t == name))
            .collect();
        Value::Object(picked)
    }
}
