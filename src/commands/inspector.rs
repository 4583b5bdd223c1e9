//! Introspection: enumerate everything this driver can do.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::driver::{CoreHolder, BUILTIN_COMMANDS};
use crate::error::Result;

#[async_trait]
pub trait InspectorCommands: CoreHolder {
    /// Built-in commands plus the driver's execute-method map, in a shape
    /// inspection tools can render directly.
    async fn list_commands(&self) -> Result<Value> {
        let methods: serde_json::Map<String, Value> = self
            .core()
            .execute_methods()
            .iter()
            .map(|def| {
                (
                    def.script.to_string(),
                    json!({
                        "command": def.command,
                        "params": {
                            "required": def.params.required,
                            "optional": def.params.optional,
                        },
                    }),
                )
            })
            .collect();
        Ok(json!({
            "rest": BUILTIN_COMMANDS,
            "executeMethods": methods,
        }))
    }
}
