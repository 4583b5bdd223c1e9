//! Timeout negotiation, in both the W3C and the legacy `type`/`ms`
//! request shapes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};

/// The timeouts request body. Legacy clients send `type` plus `ms`;
/// W3C clients send any subset of the named fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeoutsRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ms: Option<Value>,
    pub script: Option<Value>,
    pub page_load: Option<Value>,
    pub implicit: Option<Value>,
}

impl TimeoutsRequest {
    fn is_legacy(&self) -> bool {
        self.kind.is_some() && self.ms.is_some()
    }
}

/// Parse one timeout value: a non-negative integral number of
/// milliseconds, also accepted as a numeric string for legacy clients.
pub fn parse_timeout_argument(value: &Value) -> Result<u64> {
    let bad = || DriverError::Unknown(format!("invalid timeout value '{value}'"));
    let ms = match value {
        Value::Number(n) => n.as_f64().ok_or_else(bad)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| bad())?,
        _ => return Err(bad()),
    };
    if !ms.is_finite() || ms < 0.0 || ms.fract() != 0.0 {
        return Err(bad());
    }
    Ok(ms as u64)
}

#[async_trait]
pub trait TimeoutCommands: CoreHolder {
    /// Apply a timeouts request, routing each value to its setter.
    async fn timeouts(&self, req: TimeoutsRequest) -> Result<Value> {
        if req.is_legacy() {
            let kind = req.kind.as_deref().unwrap_or_default();
            let ms = parse_timeout_argument(req.ms.as_ref().unwrap_or(&Value::Null))?;
            match kind {
                "command" => self.set_new_command_timeout(ms).await?,
                "implicit" => self.set_implicit_wait(ms).await?,
                "script" => self.set_script_timeout(ms).await?,
                "page load" => self.set_page_load_timeout(ms).await?,
                other => {
                    return Err(DriverError::InvalidArgument(format!(
                        "unknown timeout type '{other}'"
                    )));
                }
            }
            return Ok(Value::Null);
        }

        if let Some(value) = &req.script {
            self.set_script_timeout(parse_timeout_argument(value)?).await?;
        }
        if let Some(value) = &req.page_load {
            self.set_page_load_timeout(parse_timeout_argument(value)?).await?;
        }
        if let Some(value) = &req.implicit {
            self.set_implicit_wait(parse_timeout_argument(value)?).await?;
        }
        Ok(Value::Null)
    }

    /// The timeouts this runtime tracks itself.
    async fn get_timeouts(&self) -> Result<Value> {
        let state = self.core().state().read();
        Ok(json!({
            "command": state.new_command_timeout_ms,
            "implicit": state.implicit_wait_ms,
        }))
    }

    async fn set_implicit_wait(&self, ms: u64) -> Result<()> {
        self.core().state().write().implicit_wait_ms = ms;
        tracing::debug!(ms, "implicit wait set");
        Ok(())
    }

    /// Update the idle timeout, propagating to any managed drivers so
    /// subordinates never outlive their parent's patience.
    async fn set_new_command_timeout(&self, ms: u64) -> Result<()> {
        let core = self.core();
        core.state().write().new_command_timeout_ms = ms;
        for managed in core.managed_cores() {
            managed.state().write().new_command_timeout_ms = ms;
            managed.watchdog.clear();
        }
        tracing::debug!(ms, "new-command timeout set");
        Ok(())
    }

    /// Script timeouts only mean something to drivers with a script
    /// runtime; the base runtime rejects them.
    async fn set_script_timeout(&self, _ms: u64) -> Result<()> {
        Err(DriverError::NotYetImplemented("scriptTimeout".into()))
    }

    async fn set_page_load_timeout(&self, _ms: u64) -> Result<()> {
        Err(DriverError::NotYetImplemented("pageLoadTimeout".into()))
    }
}
