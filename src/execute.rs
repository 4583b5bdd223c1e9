//! Execute-method dispatch: resolves generic "execute script" names to
//! internal driver commands, with deterministic fuzzy suggestions on miss.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::capabilities::CapabilityMap;
use crate::error::{DriverError, Result};

/// Parameter schema of one execute method. Required parameters come
/// first in the internal command's positional argument list, then the
/// optionals (missing optionals become JSON null).
#[derive(Debug, Clone, Copy, Default)]
pub struct MethodParams {
    pub required: &'static [&'static str],
    pub optional: &'static [&'static str],
}

/// One registered execute method, declared per driver type at definition
/// time and immutable thereafter.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteMethodDef {
    /// The public script name, e.g. `"mobile: activateApp"`.
    pub script: &'static str,
    /// The internal command the script maps to.
    pub command: &'static str,
    pub params: MethodParams,
}

/// Look up `script` in the driver's method map.
///
/// On a miss against a non-empty map, the error names the closest known
/// method and lists every candidate, nearest first. Candidates at the
/// same edit distance keep their map order, so suggestions are fully
/// deterministic.
pub fn resolve<'a>(map: &'a [ExecuteMethodDef], script: &str) -> Result<&'a ExecuteMethodDef> {
    if let Some(def) = map.iter().find(|def| def.script == script) {
        return Ok(def);
    }

    if map.is_empty() {
        return Err(DriverError::UnsupportedOperation(format!(
            "unsupported execute method '{script}'; this driver does not define any \
             execute methods"
        )));
    }

    let ranked = rank_by_distance(map, script);
    Err(DriverError::UnsupportedOperation(format!(
        "unsupported execute method '{script}'; did you mean '{}'? Known methods: {}",
        ranked[0],
        ranked.join(", "),
    )))
}

/// All known script names, grouped by Levenshtein distance to `script`
/// and flattened in ascending-distance order.
fn rank_by_distance(map: &[ExecuteMethodDef], script: &str) -> Vec<&'static str> {
    let mut buckets: BTreeMap<usize, Vec<&'static str>> = BTreeMap::new();
    for def in map {
        buckets
            .entry(strsim::levenshtein(script, def.script))
            .or_default()
            .push(def.script);
    }
    buckets.into_values().flatten().collect()
}

/// Validate the raw execute arguments against the method's schema and
/// build the positional argument list for the internal command.
///
/// The wire shape is a possibly-empty argument array whose only element,
/// if present, is a parameters object.
pub fn build_args(def: &ExecuteMethodDef, args: &[Value]) -> Result<Vec<Value>> {
    if args.len() > 1 {
        return Err(DriverError::InvalidArgument(format!(
            "execute method '{}' takes at most one parameters object, got {} arguments",
            def.script,
            args.len(),
        )));
    }

    let params: CapabilityMap = match args.first() {
        None | Some(Value::Null) => CapabilityMap::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(other) => {
            return Err(DriverError::InvalidArgument(format!(
                "parameters for execute method '{}' must be an object, got: {other}",
                def.script,
            )));
        }
    };

    let known = |name: &String| {
        def.params.required.contains(&name.as_str()) || def.params.optional.contains(&name.as_str())
    };
    let unknown: Vec<&String> = params.keys().filter(|name| !known(name)).collect();
    if !unknown.is_empty() {
        return Err(DriverError::InvalidArgument(format!(
            "execute method '{}' received unrecognized parameters: {}",
            def.script,
            unknown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "),
        )));
    }

    let mut positional = Vec::with_capacity(def.params.required.len() + def.params.optional.len());
    for name in def.params.required {
        match params.get(*name) {
            Some(value) => positional.push(value.clone()),
            None => {
                return Err(DriverError::InvalidArgument(format!(
                    "execute method '{}' requires the '{name}' parameter",
                    def.script,
                )));
            }
        }
    }
    for name in def.params.optional {
        positional.push(params.get(*name).cloned().unwrap_or(Value::Null));
    }
    Ok(positional)
}
