//! Event history commands: custom event logging and history retrieval.

use async_trait::async_trait;
use serde_json::Value;

use crate::driver::CoreHolder;
use crate::error::Result;

#[async_trait]
pub trait EventCommands: CoreHolder {
    /// Record a client-supplied event under the `vendor:event` key.
    async fn log_custom_event(&self, vendor: &str, event: &str) -> Result<Value> {
        self.core().history.log_custom_event(vendor, event)?;
        Ok(Value::Null)
    }

    /// The event history, optionally restricted to the named types.
    async fn get_log_events(&self, types: Option<Vec<String>>) -> Result<Value> {
        let history = &self.core().history;
        Ok(match types {
            Some(types) => history.filtered(&types),
            None => history.snapshot(),
        })
    }
}
