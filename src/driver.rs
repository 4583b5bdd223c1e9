//! The driver runtime: shared core state, the command execution loop and
//! the `Driver` trait that device drivers implement on top of it.
//!
//! Every command funnels through [`Driver::execute_command`], which owns
//! the invariants of the runtime: one command in flight at a time, strict
//! arrival ordering, fast-fail while teardown runs, and the idle watchdog
//! that tears the session down when clients go quiet.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::capabilities::{build_constraint_table, Constraint, ConstraintTable};
use crate::commands::{
    BidiCommands, EventCommands, FindCommands, InspectorCommands, LogCommands, SessionCommands,
    SettingsCommands, TimeoutCommands,
};
use crate::error::{DriverError, Result};
use crate::events::{self, now_ms, EventHistory};
use crate::execute::{self, ExecuteMethodDef};
use crate::serializer::CommandSerializer;
use crate::session::SessionState;
use crate::shutdown::ShutdownCoordinator;
use crate::watchdog::IdleTimeoutWatchdog;

// Wire command names.
pub const CMD_CREATE_SESSION: &str = "createSession";
pub const CMD_DELETE_SESSION: &str = "deleteSession";
pub const CMD_GET_SESSION: &str = "getSession";
pub const CMD_GET_SESSIONS: &str = "getSessions";
pub const CMD_RESET: &str = "reset";
pub const CMD_TIMEOUTS: &str = "timeouts";
pub const CMD_GET_TIMEOUTS: &str = "getTimeouts";
pub const CMD_IMPLICIT_WAIT: &str = "implicitWait";
pub const CMD_FIND_ELEMENT: &str = "findElement";
pub const CMD_FIND_ELEMENTS: &str = "findElements";
pub const CMD_FIND_ELEMENT_FROM_ELEMENT: &str = "findElementFromElement";
pub const CMD_FIND_ELEMENTS_FROM_ELEMENT: &str = "findElementsFromElement";
pub const CMD_GET_PAGE_SOURCE: &str = "getPageSource";
pub const CMD_GET_LOG: &str = "getLog";
pub const CMD_GET_LOG_TYPES: &str = "getLogTypes";
pub const CMD_UPDATE_SETTINGS: &str = "updateSettings";
pub const CMD_GET_SETTINGS: &str = "getSettings";
pub const CMD_LOG_CUSTOM_EVENT: &str = "logCustomEvent";
pub const CMD_GET_LOG_EVENTS: &str = "getLogEvents";
pub const CMD_EXECUTE: &str = "execute";
pub const CMD_BIDI_SUBSCRIBE: &str = "bidiSubscribe";
pub const CMD_BIDI_UNSUBSCRIBE: &str = "bidiUnsubscribe";
pub const CMD_BIDI_STATUS: &str = "bidiStatus";
pub const CMD_LIST_COMMANDS: &str = "listCommands";

/// Every command the base runtime knows how to dispatch.
pub const BUILTIN_COMMANDS: &[&str] = &[
    CMD_CREATE_SESSION,
    CMD_DELETE_SESSION,
    CMD_GET_SESSION,
    CMD_GET_SESSIONS,
    CMD_RESET,
    CMD_TIMEOUTS,
    CMD_GET_TIMEOUTS,
    CMD_IMPLICIT_WAIT,
    CMD_FIND_ELEMENT,
    CMD_FIND_ELEMENTS,
    CMD_FIND_ELEMENT_FROM_ELEMENT,
    CMD_FIND_ELEMENTS_FROM_ELEMENT,
    CMD_GET_PAGE_SOURCE,
    CMD_GET_LOG,
    CMD_GET_LOG_TYPES,
    CMD_UPDATE_SETTINGS,
    CMD_GET_SETTINGS,
    CMD_LOG_CUSTOM_EVENT,
    CMD_GET_LOG_EVENTS,
    CMD_EXECUTE,
    CMD_BIDI_SUBSCRIBE,
    CMD_BIDI_UNSUBSCRIBE,
    CMD_BIDI_STATUS,
    CMD_LIST_COMMANDS,
];

/// Shared runtime state for one driver instance.
///
/// Cheap to clone; all clones are views of the same instance. Device
/// drivers embed one of these and expose it through [`CoreHolder`].
#[derive(Clone)]
pub struct DriverCore {
    state: Arc<RwLock<SessionState>>,
    pub serializer: CommandSerializer,
    pub shutdown: ShutdownCoordinator,
    pub watchdog: IdleTimeoutWatchdog,
    pub history: EventHistory,
    execute_methods: Arc<Vec<ExecuteMethodDef>>,
    constraints: Arc<ConstraintTable>,
    should_validate_caps: bool,
    managed: Arc<RwLock<Vec<DriverCore>>>,
}

impl DriverCore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SessionState::default())),
            serializer: CommandSerializer::new(),
            shutdown: ShutdownCoordinator::new(),
            watchdog: IdleTimeoutWatchdog::new(),
            history: EventHistory::new(),
            execute_methods: Arc::new(Vec::new()),
            constraints: Arc::new(build_constraint_table(&[])),
            should_validate_caps: true,
            managed: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Extend the base constraint table with driver-specific rows.
    pub fn with_constraints(mut self, extra: &[(&str, Constraint)]) -> Self {
        self.constraints = Arc::new(build_constraint_table(extra));
        self
    }

    /// Install the driver's execute-method map. Definition order matters
    /// for suggestion tie-breaks, so the list is kept as given.
    pub fn with_execute_methods(mut self, methods: Vec<ExecuteMethodDef>) -> Self {
        self.execute_methods = Arc::new(methods);
        self
    }

    /// Disable capability validation (used by drivers that forward raw
    /// capabilities to another endpoint).
    pub fn without_caps_validation(mut self) -> Self {
        self.should_validate_caps = false;
        self
    }

    pub fn state(&self) -> &RwLock<SessionState> {
        &self.state
    }

    pub fn session_id(&self) -> Option<String> {
        self.state.read().session_id.clone()
    }

    pub fn has_session(&self) -> bool {
        self.state.read().has_session()
    }

    /// The active session id, or the standard no-session error.
    pub fn require_session(&self) -> Result<String> {
        self.session_id().ok_or_else(|| {
            DriverError::NoSuchDriver("a session is either terminated or not started".into())
        })
    }

    pub fn execute_methods(&self) -> &[ExecuteMethodDef] {
        &self.execute_methods
    }

    pub fn constraints(&self) -> &ConstraintTable {
        &self.constraints
    }

    pub fn should_validate_caps(&self) -> bool {
        self.should_validate_caps
    }

    pub fn new_command_timeout_ms(&self) -> u64 {
        self.state.read().new_command_timeout_ms
    }

    /// Register a subordinate driver whose idle timeout should follow
    /// this one's.
    pub fn add_managed(&self, core: DriverCore) {
        self.managed.write().push(core);
    }

    pub fn managed_cores(&self) -> Vec<DriverCore> {
        self.managed.read().clone()
    }
}

impl Default for DriverCore {
    fn default() -> Self {
        Self::new()
    }
}

/// Access to the shared runtime core. Implemented once per driver type;
/// all command traits hang off this.
pub trait CoreHolder: Clone + Send + Sync + 'static {
    fn core(&self) -> &DriverCore;
}

/// The driver runtime contract. Default methods implement the full
/// command loop; device drivers usually only override the command-group
/// traits and, when they add commands, [`Driver::dispatch`] and
/// [`Driver::has_command`].
#[async_trait]
pub trait Driver:
    SessionCommands
    + TimeoutCommands
    + FindCommands
    + LogCommands
    + SettingsCommands
    + EventCommands
    + BidiCommands
    + InspectorCommands
{
    /// True if `cmd` is part of this driver's contract. Checked before
    /// the command enters the queue, so unknown commands never consume
    /// the execution slot.
    fn has_command(&self, cmd: &str) -> bool {
        BUILTIN_COMMANDS.contains(&cmd)
    }

    /// Run one command through the runtime.
    ///
    /// The command body is raced against the shutdown signal. If the
    /// signal wins, the caller gets the shutdown error immediately while
    /// the body keeps running detached; losers of that race are never
    /// cancelled mid-flight.
    async fn execute_command(&self, cmd: &str, args: Vec<Value>) -> Result<Value> {
        let core = self.core().clone();

        // Any traffic proves the client is alive.
        core.watchdog.clear();

        if core.shutdown.is_latched() {
            return Err(DriverError::unexpected_shutdown());
        }
        if !self.has_command(cmd) {
            return Err(DriverError::NotYetImplemented(cmd.to_string()));
        }

        match cmd {
            CMD_CREATE_SESSION => core.history.log_lifecycle(events::NEW_SESSION_REQUESTED),
            CMD_DELETE_SESSION => core.history.log_lifecycle(events::QUIT_SESSION_REQUESTED),
            _ => {}
        }

        let slot = core.serializer.acquire().await;

        // Teardown may have started while this command sat in the queue.
        if core.shutdown.is_latched() {
            drop(slot);
            return Err(DriverError::unexpected_shutdown());
        }

        // Timing starts when the command actually gets the slot, not when
        // it was submitted.
        let start_time = now_ms();
        tracing::debug!(cmd, "executing command");

        let mut shutdown_rx = core.shutdown.subscribe();
        let driver = self.clone();
        let cmd_owned = cmd.to_string();
        let body = tokio::spawn(async move { driver.dispatch(&cmd_owned, args).await });

        let result = tokio::select! {
            joined = body => match joined {
                Ok(res) => res,
                Err(join_err) => {
                    Err(DriverError::Unknown(format!("command task failed: {join_err}")))
                }
            },
            signal = shutdown_rx.recv() => {
                // Dropping the join handle detaches the body; it runs to
                // completion on its own while the client gets the error.
                tracing::warn!(cmd, "command abandoned by driver shutdown");
                Err(signal.unwrap_or_else(|_| DriverError::unexpected_shutdown()))
            }
        };
        drop(slot);

        let end_time = now_ms();
        core.history.record_command(cmd, start_time, end_time);

        if result.is_ok() {
            match cmd {
                CMD_CREATE_SESSION => core.history.log_lifecycle(events::NEW_SESSION_STARTED),
                CMD_DELETE_SESSION => core.history.log_lifecycle(events::QUIT_SESSION_FINISHED),
                _ => {}
            }
        }

        // A race loser must not rearm while teardown is still clearing
        // state, or a timer could outlive the session it guards.
        if cmd != CMD_DELETE_SESSION && !core.shutdown.is_latched() {
            self.start_new_command_timeout().await;
        }

        if let Err(err) = &result {
            tracing::debug!(cmd, error = %err, "command failed");
        }
        result
    }

    /// Map a wire command name to its implementation. Drivers adding
    /// commands override this, handle their own names, and delegate the
    /// rest to [`dispatch_builtin`].
    async fn dispatch(&self, cmd: &str, args: Vec<Value>) -> Result<Value> {
        dispatch_builtin(self, cmd, args).await
    }

    /// Tear the driver down outside of client control: signal every
    /// in-flight command, then delete the session with new commands
    /// latched out for the duration.
    async fn start_unexpected_shutdown(&self, err: DriverError) -> Result<()> {
        let core = self.core().clone();
        tracing::warn!(error = %err, "unexpected driver shutdown");
        core.shutdown.notify(err);
        let _latch = core.shutdown.latch();
        self.delete_session().await?;
        Ok(())
    }

    /// Arm the idle watchdog with the session's configured timeout. A
    /// configured timeout of zero disables the watchdog entirely.
    async fn start_new_command_timeout(&self) {
        let core = self.core().clone();
        core.watchdog.clear();
        let timeout_ms = core.new_command_timeout_ms();
        if timeout_ms == 0 || !core.has_session() {
            return;
        }
        let driver = self.clone();
        core.watchdog.arm(Duration::from_millis(timeout_ms), async move {
            tracing::warn!(timeout_ms, "no new commands; shutting session down");
            let err = DriverError::new_command_timeout(timeout_ms);
            if let Err(e) = driver.start_unexpected_shutdown(err).await {
                tracing::warn!(error = %e, "session cleanup after idle timeout failed");
            }
        });
    }
}

/// The built-in command table. Kept as a free function so drivers that
/// override [`Driver::dispatch`] can still fall through to it.
pub async fn dispatch_builtin<D: Driver>(driver: &D, cmd: &str, args: Vec<Value>) -> Result<Value> {
    match cmd {
        CMD_CREATE_SESSION => {
            let envelope = args.into_iter().next().unwrap_or(Value::Null);
            driver.create_session(crate::commands::parse_w3c_envelope(envelope)?).await
        }
        CMD_DELETE_SESSION => driver.delete_session().await,
        CMD_GET_SESSION => driver.get_session().await,
        CMD_GET_SESSIONS => driver.get_sessions().await,
        CMD_RESET => driver.reset().await,
        CMD_TIMEOUTS => {
            let req = crate::commands::parse_timeouts_request(args.first())?;
            driver.timeouts(req).await
        }
        CMD_GET_TIMEOUTS => driver.get_timeouts().await,
        CMD_IMPLICIT_WAIT => {
            let ms =
                crate::commands::parse_timeout_argument(args.first().unwrap_or(&Value::Null))?;
            driver.set_implicit_wait(ms).await?;
            Ok(Value::Null)
        }
        CMD_FIND_ELEMENT => {
            let (strategy, selector) = two_strings(&args, "using", "value")?;
            driver.find_element(&strategy, &selector).await
        }
        CMD_FIND_ELEMENTS => {
            let (strategy, selector) = two_strings(&args, "using", "value")?;
            driver.find_elements(&strategy, &selector).await
        }
        CMD_FIND_ELEMENT_FROM_ELEMENT => {
            let (strategy, selector) = two_strings(&args, "using", "value")?;
            let element = string_arg(&args, 2, "elementId")?;
            driver.find_element_from_element(&strategy, &selector, &element).await
        }
        CMD_FIND_ELEMENTS_FROM_ELEMENT => {
            let (strategy, selector) = two_strings(&args, "using", "value")?;
            let element = string_arg(&args, 2, "elementId")?;
            driver.find_elements_from_element(&strategy, &selector, &element).await
        }
        CMD_GET_PAGE_SOURCE => driver.get_page_source().await.map(Value::String),
        CMD_GET_LOG => {
            let log_type = string_arg(&args, 0, "type")?;
            driver.get_log(&log_type).await
        }
        CMD_GET_LOG_TYPES => driver.get_log_types().await,
        CMD_UPDATE_SETTINGS => {
            let settings = object_arg(&args, 0, "settings")?;
            driver.update_settings(settings).await
        }
        CMD_GET_SETTINGS => driver.get_settings().await,
        CMD_LOG_CUSTOM_EVENT => {
            let (vendor, event) = two_strings(&args, "vendor", "event")?;
            driver.log_custom_event(&vendor, &event).await
        }
        CMD_GET_LOG_EVENTS => {
            let types = crate::commands::parse_event_filter(args.first())?;
            driver.get_log_events(types).await
        }
        CMD_EXECUTE => {
            let script = string_arg(&args, 0, "script")?;
            let script_args = match args.get(1) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items.clone(),
                Some(other) => {
                    return Err(DriverError::InvalidArgument(format!(
                        "execute arguments must be an array, got: {other}"
                    )));
                }
            };
            let def = *execute::resolve(driver.core().execute_methods(), &script)?;
            let positional = execute::build_args(&def, &script_args)?;
            driver.dispatch(def.command, positional).await
        }
        CMD_BIDI_SUBSCRIBE => {
            let req = crate::commands::parse_subscription_request(args.first())?;
            driver.bidi_subscribe(req.events, req.contexts).await
        }
        CMD_BIDI_UNSUBSCRIBE => {
            let req = crate::commands::parse_subscription_request(args.first())?;
            driver.bidi_unsubscribe(req.events, req.contexts).await
        }
        CMD_BIDI_STATUS => driver.bidi_status().await,
        CMD_LIST_COMMANDS => driver.list_commands().await,
        other => Err(DriverError::NotYetImplemented(other.to_string())),
    }
}

fn string_arg(args: &[Value], idx: usize, name: &str) -> Result<String> {
    match args.get(idx) {
        Some(Value::String(s)) => Ok(s.clone()),
        other => Err(DriverError::InvalidArgument(format!(
            "'{name}' must be a string, got: {}",
            other.cloned().unwrap_or(Value::Null)
        ))),
    }
}

fn two_strings(args: &[Value], first: &str, second: &str) -> Result<(String, String)> {
    Ok((string_arg(args, 0, first)?, string_arg(args, 1, second)?))
}

fn object_arg(args: &[Value], idx: usize, name: &str) -> Result<crate::capabilities::CapabilityMap> {
    match args.get(idx) {
        Some(Value::Object(map)) => Ok(map.clone()),
        other => Err(DriverError::InvalidArgument(format!(
            "'{name}' must be an object, got: {}",
            other.cloned().unwrap_or(Value::Null)
        ))),
    }
}

/// The reference driver: the runtime with no device behind it. Useful on
/// its own for session bookkeeping and as the embedding model for real
/// drivers.
#[derive(Clone, Default)]
pub struct BaseDriver {
    core: DriverCore,
}

impl BaseDriver {
    pub fn new() -> Self {
        Self { core: DriverCore::new() }
    }

    /// Build around a pre-configured core (custom constraints, execute
    /// methods, validation policy).
    pub fn with_core(core: DriverCore) -> Self {
        Self { core }
    }
}

impl CoreHolder for BaseDriver {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}

impl SessionCommands for BaseDriver {}
impl TimeoutCommands for BaseDriver {}
impl FindCommands for BaseDriver {}
impl LogCommands for BaseDriver {}
impl SettingsCommands for BaseDriver {}
impl EventCommands for BaseDriver {}
impl BidiCommands for BaseDriver {}
impl InspectorCommands for BaseDriver {}
impl Driver for BaseDriver {}
