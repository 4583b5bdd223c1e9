//! Per-instance session state: identity, negotiated capabilities, typed
//! session options, the settings store and BiDi subscriptions.
//!
//! All of this lives behind the driver core's lock; nothing here is
//! shared across driver instances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::capabilities::{CapabilityMap, W3cCapabilities};
use crate::error::{DriverError, Result};

/// Idle timeout applied when the client does not negotiate one.
pub const DEFAULT_NEW_COMMAND_TIMEOUT_MS: u64 = 60_000;

/// Wire protocol negotiated for the session. Only W3C can be negotiated;
/// the legacy variant survives for reporting on old recordings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    #[serde(rename = "W3C")]
    W3c,
    #[serde(rename = "MJSONWP")]
    Mjsonwp,
}

/// Typed view of the session-relevant capabilities, derived once at
/// session creation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionOpts {
    pub no_reset: bool,
    pub full_reset: bool,
    /// Derived: neither a full reset nor reset suppression was requested.
    #[serde(skip)]
    pub fast_reset: bool,
    /// Derived: the app should stay installed between sessions.
    #[serde(skip)]
    pub skip_uninstall: bool,
    pub app: Option<String>,
    /// Seconds, as negotiated; stored internally in milliseconds.
    pub new_command_timeout: Option<f64>,
    pub event_timings: bool,
    pub print_page_source_on_find_failure: bool,
}

impl SessionOpts {
    /// Derive typed options from a merged capability map.
    ///
    /// Rejects the `noReset`/`fullReset` conflict and strips an empty app
    /// path so downstream code never has to test for it.
    pub fn from_caps(caps: &CapabilityMap) -> Result<Self> {
        let mut opts: SessionOpts =
            serde_json::from_value(Value::Object(caps.clone())).map_err(|e| {
                DriverError::SessionNotCreated(format!("invalid capability values: {e}"))
            })?;

        if opts.no_reset && opts.full_reset {
            return Err(DriverError::SessionNotCreated(
                "the 'noReset' and 'fullReset' capabilities are mutually exclusive and must \
                 not both be set to true; you probably meant to use 'fullReset' on its own"
                    .into(),
            ));
        }

        opts.fast_reset = !opts.full_reset && !opts.no_reset;
        opts.skip_uninstall = opts.fast_reset || opts.no_reset;

        if opts.app.as_deref().is_some_and(|app| app.trim().is_empty()) {
            opts.app = None;
        }

        Ok(opts)
    }

    /// The negotiated idle timeout in milliseconds, if one was supplied.
    pub fn new_command_timeout_ms(&self) -> Option<u64> {
        self.new_command_timeout.map(|secs| (secs * 1000.0) as u64)
    }
}

/// Mutable key-value store scoped to one session.
#[derive(Debug, Clone, Default)]
pub struct DeviceSettings {
    values: CapabilityMap,
}

impl DeviceSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge new values over the existing ones.
    pub fn update(&mut self, new_settings: CapabilityMap) {
        for (key, value) in new_settings {
            self.values.insert(key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn snapshot(&self) -> CapabilityMap {
        self.values.clone()
    }
}

/// The full per-instance session state.
#[derive(Debug, Clone)]
pub struct SessionState {
    /// None means no active session.
    pub session_id: Option<String>,
    pub protocol: Option<Protocol>,
    /// Validated and merged capabilities for the active session.
    pub caps: CapabilityMap,
    /// Capabilities exactly as submitted, kept for session restarts.
    pub original_caps: Option<W3cCapabilities>,
    pub opts: SessionOpts,
    /// Exists only while a session is active.
    pub settings: Option<DeviceSettings>,
    /// BiDi event name to subscribed context filters.
    pub bidi_subscriptions: BTreeMap<String, Vec<String>>,
    pub implicit_wait_ms: u64,
    pub new_command_timeout_ms: u64,
    pub reset_on_unexpected_shutdown: bool,
    /// Locator strategies this instance accepts for find commands.
    pub locator_strategies: Vec<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: None,
            protocol: None,
            caps: CapabilityMap::new(),
            original_caps: None,
            opts: SessionOpts::default(),
            settings: None,
            bidi_subscriptions: BTreeMap::new(),
            implicit_wait_ms: 0,
            new_command_timeout_ms: DEFAULT_NEW_COMMAND_TIMEOUT_MS,
            reset_on_unexpected_shutdown: false,
            locator_strategies: Vec::new(),
        }
    }
}

impl SessionState {
    pub fn has_session(&self) -> bool {
        self.session_id.is_some()
    }

    /// Drop everything that dies with the session. Capabilities and the
    /// original submission survive so a restart can reuse them.
    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.protocol = None;
        self.settings = None;
        self.bidi_subscriptions.clear();
    }

    /// Union the given contexts into each event's subscription list.
    /// An empty context list defaults to `[""]`, meaning all contexts.
    pub fn bidi_subscribe(&mut self, events: &[String], contexts: &[String]) {
        let contexts: Vec<String> = if contexts.is_empty() {
            vec![String::new()]
        } else {
            contexts.to_vec()
        };
        for event in events {
            let subs = self.bidi_subscriptions.entry(event.clone()).or_default();
            for ctx in &contexts {
                if !subs.contains(ctx) {
                    subs.push(ctx.clone());
                }
            }
        }
    }

    /// Remove the given contexts from each event's subscription list,
    /// deleting the event key once its list empties.
    pub fn bidi_unsubscribe(&mut self, events: &[String], contexts: &[String]) {
        let contexts: Vec<String> = if contexts.is_empty() {
            vec![String::new()]
        } else {
            contexts.to_vec()
        };
        for event in events {
            if let Some(subs) = self.bidi_subscriptions.get_mut(event) {
                subs.retain(|ctx| !contexts.contains(ctx));
                if subs.is_empty() {
                    self.bidi_subscriptions.remove(event);
                }
            }
        }
    }
}

/// Opaque session id: a v4 UUID string.
pub fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
