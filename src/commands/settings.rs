//! Session-scoped settings store.

use async_trait::async_trait;
use serde_json::Value;

use crate::capabilities::CapabilityMap;
use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};

#[async_trait]
pub trait SettingsCommands: CoreHolder {
    /// Merge new values into the session's settings store, then give the
    /// device a chance to react to the change.
    async fn update_settings(&self, new_settings: CapabilityMap) -> Result<Value> {
        let core = self.core();
        {
            let mut state = core.state().write();
            let Some(settings) = state.settings.as_mut() else {
                return Err(DriverError::Unknown(
                    "this session does not have a settings store".into(),
                ));
            };
            settings.update(new_settings.clone());
        }
        self.on_settings_update(&new_settings).await?;
        tracing::debug!(count = new_settings.len(), "settings updated");
        Ok(Value::Null)
    }

    async fn get_settings(&self) -> Result<Value> {
        let state = self.core().state().read();
        let Some(settings) = state.settings.as_ref() else {
            return Err(DriverError::Unknown(
                "this session does not have a settings store".into(),
            ));
        };
        Ok(Value::Object(settings.snapshot()))
    }

    /// Device hook: called after settings have been stored. The base does
    /// nothing.
    async fn on_settings_update(&self, _changed: &CapabilityMap) -> Result<()> {
        Ok(())
    }
}
