//! Shared test fixtures: a stub driver with controllable custom commands.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use drover::driver::dispatch_builtin;
use drover::{
    BidiCommands, CoreHolder, Driver, DriverCore, EventCommands, ExecuteMethodDef, FindCommands,
    InspectorCommands, LogCommands, MethodParams, Result, SessionCommands, SettingsCommands,
    TimeoutCommands, BUILTIN_COMMANDS,
};

pub const PAUSE_CMD: &str = "stubPause";
pub const TOUCH_CMD: &str = "stubTouch";

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per binary; `RUST_LOG` controls
/// verbosity.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Execute methods exposed by the stub, in a fixed definition order so
/// suggestion tie-breaks are observable.
pub fn stub_execute_methods() -> Vec<ExecuteMethodDef> {
    vec![
        ExecuteMethodDef {
            script: "stub: pause",
            command: PAUSE_CMD,
            params: MethodParams { required: &["ms"], optional: &[] },
        },
        ExecuteMethodDef {
            script: "stub: touch",
            command: TOUCH_CMD,
            params: MethodParams { required: &[], optional: &["label"] },
        },
        ExecuteMethodDef {
            script: "stub: torch",
            command: TOUCH_CMD,
            params: MethodParams { required: &[], optional: &[] },
        },
    ]
}

/// A driver with two extra commands: one that sleeps for a requested
/// duration and one that just records it ran. Every command start and end
/// is appended to `trace` so tests can assert on interleaving.
#[derive(Clone)]
pub struct StubDriver {
    core: DriverCore,
    pub trace: Arc<Mutex<Vec<String>>>,
    pub touches: Arc<AtomicUsize>,
}

impl StubDriver {
    pub fn new() -> Self {
        init_tracing();
        Self {
            core: DriverCore::new().with_execute_methods(stub_execute_methods()),
            trace: Arc::new(Mutex::new(Vec::new())),
            touches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn trace_snapshot(&self) -> Vec<String> {
        self.trace.lock().clone()
    }
}

impl Default for StubDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CoreHolder for StubDriver {
    fn core(&self) -> &DriverCore {
        &self.core
    }
}

impl SessionCommands for StubDriver {}
impl TimeoutCommands for StubDriver {}
impl FindCommands for StubDriver {}
impl LogCommands for StubDriver {}
impl SettingsCommands for StubDriver {}
impl EventCommands for StubDriver {}
impl BidiCommands for StubDriver {}
impl InspectorCommands for StubDriver {}

#[async_trait]
impl Driver for StubDriver {
    fn has_command(&self, cmd: &str) -> bool {
        matches!(cmd, PAUSE_CMD | TOUCH_CMD) || BUILTIN_COMMANDS.contains(&cmd)
    }

    async fn dispatch(&self, cmd: &str, args: Vec<Value>) -> Result<Value> {
        match cmd {
            PAUSE_CMD => {
                let ms = args.first().and_then(Value::as_u64).unwrap_or(0);
                self.trace.lock().push(format!("pause({ms}):start"));
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.trace.lock().push(format!("pause({ms}):end"));
                Ok(json!(ms))
            }
            TOUCH_CMD => {
                self.trace.lock().push("touch".to_string());
                self.touches.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Null)
            }
            other => dispatch_builtin(self, other, args).await,
        }
    }
}

/// A plain W3C envelope good enough to open a session.
pub fn fake_caps() -> Value {
    json!({"alwaysMatch": {"platformName": "fake"}})
}

/// Open a session on `driver` and return its id.
pub async fn start_session<D: Driver>(driver: &D) -> String {
    init_tracing();
    let result = driver
        .execute_command("createSession", vec![fake_caps()])
        .await
        .expect("session should start");
    result["sessionId"].as_str().expect("session id in response").to_string()
}
