//! Session lifecycle: create, inspect, reset, delete.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::capabilities::{process_capabilities, W3cCapabilities};
use crate::driver::CoreHolder;
use crate::error::{DriverError, Result};
use crate::session::{
    generate_session_id, DeviceSettings, Protocol, SessionOpts, DEFAULT_NEW_COMMAND_TIMEOUT_MS,
};

#[async_trait]
pub trait SessionCommands: CoreHolder {
    /// Negotiate and start a session.
    ///
    /// All validation happens before a session id is assigned, so a
    /// rejected request leaves the driver exactly as it was.
    async fn create_session(&self, caps: W3cCapabilities) -> Result<Value> {
        let core = self.core();

        if core.has_session() {
            return Err(DriverError::SessionNotCreated(
                "session cannot be created: this driver instance already has one".into(),
            ));
        }

        let merged =
            process_capabilities(&caps, core.constraints(), core.should_validate_caps())
                .map_err(|e| DriverError::SessionNotCreated(e.to_string()))?;
        let opts = SessionOpts::from_caps(&merged)?;

        let session_id = generate_session_id();
        let timeout_ms = opts
            .new_command_timeout_ms()
            .unwrap_or(DEFAULT_NEW_COMMAND_TIMEOUT_MS);

        {
            let mut state = core.state().write();
            state.session_id = Some(session_id.clone());
            state.protocol = Some(Protocol::W3c);
            state.caps = merged.clone();
            state.original_caps = Some(caps);
            state.opts = opts;
            state.settings = Some(DeviceSettings::new());
            state.new_command_timeout_ms = timeout_ms;
        }

        tracing::info!(session_id = %session_id, "session created");
        Ok(json!({
            "sessionId": session_id,
            "capabilities": merged,
        }))
    }

    /// End the session. Idempotent: deleting when no session exists is a
    /// no-op, so shutdown paths can always call it safely.
    async fn delete_session(&self) -> Result<Value> {
        let core = self.core();
        core.watchdog.clear();
        let session_id = {
            let mut state = core.state().write();
            let id = state.session_id.clone();
            state.clear_session();
            id
        };
        match session_id {
            Some(id) => tracing::info!(session_id = %id, "session deleted"),
            None => tracing::debug!("delete requested with no active session"),
        }
        Ok(Value::Null)
    }

    /// The session's negotiated capabilities, with event timings attached
    /// when the session asked for them.
    async fn get_session(&self) -> Result<Value> {
        let core = self.core();
        core.require_session()?;
        let (mut caps, event_timings) = {
            let state = core.state().read();
            (state.caps.clone(), state.opts.event_timings)
        };
        if event_timings {
            caps.insert("events".to_string(), core.history.snapshot());
        }
        Ok(Value::Object(caps))
    }

    /// All sessions on this instance: zero or one entries.
    async fn get_sessions(&self) -> Result<Value> {
        let state = self.core().state().read();
        let sessions: Vec<Value> = state
            .session_id
            .iter()
            .map(|id| json!({"id": id, "capabilities": state.caps}))
            .collect();
        Ok(Value::Array(sessions))
    }

    /// Restart the session in place: delete it, recreate it from the
    /// originally submitted capabilities, and keep the external identity
    /// and negotiated timeouts intact.
    async fn reset(&self) -> Result<Value> {
        let core = self.core().clone();
        let (saved_id, original_caps, implicit_wait_ms, timeout_ms, reset_on_shutdown) = {
            let state = core.state().read();
            (
                state.session_id.clone(),
                state.original_caps.clone(),
                state.implicit_wait_ms,
                state.new_command_timeout_ms,
                state.reset_on_unexpected_shutdown,
            )
        };
        let saved_id = saved_id.ok_or_else(|| {
            DriverError::NoSuchDriver("a session is either terminated or not started".into())
        })?;
        let original_caps = original_caps.ok_or_else(|| {
            DriverError::Unknown("no capabilities recorded for this session".into())
        })?;

        tracing::debug!(session_id = %saved_id, "resetting session");
        self.delete_session().await?;
        let outcome = self.create_session(original_caps).await;

        // The restore set survives even a failed recreate, so the driver
        // keeps its external identity and negotiated timeouts no matter
        // what the recreate step did.
        {
            let mut state = core.state().write();
            state.implicit_wait_ms = implicit_wait_ms;
            state.new_command_timeout_ms = timeout_ms;
            state.reset_on_unexpected_shutdown = reset_on_shutdown;
            state.session_id = Some(saved_id);
        }

        outcome.map(|_| Value::Null)
    }
}
