//! Per-session driver runtime for WebDriver-style automation drivers.
//!
//! The crate provides the machinery every concrete driver shares: W3C
//! capability negotiation, strictly serialized command execution, an idle
//! watchdog that reclaims abandoned sessions, unexpected-shutdown
//! coordination, execute-method dispatch with fuzzy suggestions, and the
//! standard command groups (session, timeouts, find, log, settings,
//! events, BiDi subscriptions, introspection).
//!
//! A device driver embeds a [`DriverCore`], implements [`CoreHolder`],
//! and picks up the full contract from the command-group traits, then
//! overrides the device hooks it can actually serve:
//!
//! ```
//! use drover::{BaseDriver, Driver};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let driver = BaseDriver::new();
//! let result = driver
//!     .execute_command(
//!         "createSession",
//!         vec![json!({"alwaysMatch": {"platformName": "fake"}})],
//!     )
//!     .await
//!     .unwrap();
//! assert!(result["sessionId"].is_string());
//! # }
//! ```

pub mod capabilities;
pub mod commands;
pub mod driver;
pub mod error;
pub mod events;
pub mod execute;
pub mod serializer;
pub mod session;
pub mod shutdown;
pub mod watchdog;

pub use capabilities::{
    build_constraint_table, is_w3c_caps, process_capabilities, CapabilityMap, Constraint,
    ConstraintKind, ConstraintTable, W3cCapabilities, BASE_CONSTRAINTS,
};
pub use commands::{
    BidiCommands, EventCommands, FindCommands, InspectorCommands, LogCommands, SessionCommands,
    SettingsCommands, TimeoutCommands, TimeoutsRequest,
};
pub use driver::{dispatch_builtin, BaseDriver, CoreHolder, Driver, DriverCore, BUILTIN_COMMANDS};
pub use error::{DriverError, Result};
pub use events::{CommandRecord, EventHistory};
pub use execute::{ExecuteMethodDef, MethodParams};
pub use serializer::CommandSerializer;
pub use session::{
    DeviceSettings, Protocol, SessionOpts, SessionState, DEFAULT_NEW_COMMAND_TIMEOUT_MS,
};
pub use shutdown::ShutdownCoordinator;
pub use watchdog::IdleTimeoutWatchdog;
