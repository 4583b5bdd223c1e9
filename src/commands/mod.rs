//! Command groups: one trait per protocol area, all with default
//! implementations so a driver picks up the full contract by embedding a
//! core and implementing the empty marker impls.

mod bidi;
mod event;
mod find;
mod inspector;
mod log;
mod session;
mod settings;
mod timeouts;

pub use bidi::{BidiCommands, SubscriptionRequest};
pub use event::EventCommands;
pub use find::FindCommands;
pub use inspector::InspectorCommands;
pub use log::LogCommands;
pub use session::SessionCommands;
pub use settings::SettingsCommands;
pub use timeouts::{parse_timeout_argument, TimeoutCommands, TimeoutsRequest};

use serde_json::Value;

use crate::capabilities::{is_w3c_caps, W3cCapabilities};
use crate::error::{DriverError, Result};

/// Parse the new-session payload, rejecting anything that is not a W3C
/// capability envelope.
pub fn parse_w3c_envelope(value: Value) -> Result<W3cCapabilities> {
    if !is_w3c_caps(&value) {
        return Err(DriverError::SessionNotCreated(
            "capabilities must use the W3C format: an object with an 'alwaysMatch' \
             object and/or a 'firstMatch' array"
                .into(),
        ));
    }
    serde_json::from_value(value)
        .map_err(|e| DriverError::SessionNotCreated(format!("malformed capabilities: {e}")))
}

/// Parse the timeouts request body.
pub fn parse_timeouts_request(value: Option<&Value>) -> Result<TimeoutsRequest> {
    match value {
        None | Some(Value::Null) => Ok(TimeoutsRequest::default()),
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
            .map_err(|e| DriverError::InvalidArgument(format!("malformed timeouts request: {e}"))),
        Some(other) => Err(DriverError::InvalidArgument(format!(
            "timeouts request must be an object, got: {other}"
        ))),
    }
}

/// Parse the BiDi subscription body (`events` plus optional `contexts`).
pub fn parse_subscription_request(value: Option<&Value>) -> Result<SubscriptionRequest> {
    match value {
        Some(v @ Value::Object(_)) => serde_json::from_value(v.clone()).map_err(|e| {
            DriverError::InvalidArgument(format!("malformed subscription request: {e}"))
        }),
        other => Err(DriverError::InvalidArgument(format!(
            "subscription request must be an object, got: {}",
            other.cloned().unwrap_or(Value::Null)
        ))),
    }
}

/// Parse the optional event-history filter: absent, a single type name,
/// or an array of type names.
pub fn parse_event_filter(value: Option<&Value>) -> Result<Option<Vec<String>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(items)) => {
            let mut types = Vec::with_capacity(items.len());
            for item in items {
                match item {
                    Value::String(s) => types.push(s.clone()),
                    other => {
                        return Err(DriverError::InvalidArgument(format!(
                            "event filter entries must be strings, got: {other}"
                        )));
                    }
                }
            }
            Ok(Some(types))
        }
        Some(other) => Err(DriverError::InvalidArgument(format!(
            "event filter must be a string or an array of strings, got: {other}"
        ))),
    }
}
