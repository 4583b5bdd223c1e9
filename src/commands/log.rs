//! Log retrieval, driven by a per-driver registry of supported types.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};

#[async_trait]
pub trait LogCommands: CoreHolder {
    /// The log types this driver can produce. Empty at the base; device
    /// drivers override.
    fn supported_log_types(&self) -> Vec<&'static str> {
        Vec::new()
    }

    async fn get_log_types(&self) -> Result<Value> {
        Ok(json!(self.supported_log_types()))
    }

    /// Fetch entries for one log type, rejecting unknown types with the
    /// full list of valid ones.
    async fn get_log(&self, log_type: &str) -> Result<Value> {
        let supported = self.supported_log_types();
        if !supported.contains(&log_type) {
            return Err(DriverError::InvalidArgument(format!(
                "unsupported log type '{log_type}'; valid types: [{}]",
                supported.join(", "),
            )));
        }
        self.get_typed_log(log_type).await
    }

    /// Device hook: produce the entries for an already-validated type.
    async fn get_typed_log(&self, log_type: &str) -> Result<Value> {
        Err(DriverError::NotYetImplemented(format!("getLog ({log_type})")))
    }
}
