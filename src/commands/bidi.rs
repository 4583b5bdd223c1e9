//! BiDi event subscription bookkeeping.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};

/// Subscription request body: which events, optionally scoped to which
/// browsing contexts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubscriptionRequest {
    pub events: Vec<String>,
    pub contexts: Vec<String>,
}

#[async_trait]
pub trait BidiCommands: CoreHolder {
    async fn bidi_subscribe(&self, events: Vec<String>, contexts: Vec<String>) -> Result<Value> {
        let core = self.core();
        core.require_session()?;
        if events.is_empty() {
            return Err(DriverError::InvalidArgument(
                "at least one event must be given to subscribe to".into(),
            ));
        }
        core.state().write().bidi_subscribe(&events, &contexts);
        Ok(Value::Null)
    }

    async fn bidi_unsubscribe(&self, events: Vec<String>, contexts: Vec<String>) -> Result<Value> {
        let core = self.core();
        core.require_session()?;
        if events.is_empty() {
            return Err(DriverError::InvalidArgument(
                "at least one event must be given to unsubscribe from".into(),
            ));
        }
        core.state().write().bidi_unsubscribe(&events, &contexts);
        Ok(Value::Null)
    }

    /// Readiness plus the current subscriptions as an event-to-contexts
    /// map.
    async fn bidi_status(&self) -> Result<Value> {
        let state = self.core().state().read();
        Ok(json!({
            "ready": state.has_session(),
            "subscriptions": state.bidi_subscriptions,
        }))
    }
}
