//! W3C capability processing: parse, validate, merge.
//!
//! Capabilities arrive as a W3C envelope (`alwaysMatch` plus a list of
//! `firstMatch` candidates). Validation is driven by a declarative
//! constraint table so drivers can extend the base table without writing
//! any validation code.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DriverError, Result};

/// A flat capability map, as merged for one session.
pub type CapabilityMap = serde_json::Map<String, Value>;

/// The W3C new-session capability envelope.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct W3cCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_match: Option<CapabilityMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_match: Option<Vec<CapabilityMap>>,
}

/// Returns true if `value` looks like a W3C capability envelope: a JSON
/// object carrying an `alwaysMatch` object and/or a `firstMatch` array.
pub fn is_w3c_caps(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    let always_ok = obj.get("alwaysMatch").is_some_and(Value::is_object);
    let first_ok = obj.get("firstMatch").is_some_and(Value::is_array);
    always_ok || first_ok
}

/// Expected JSON shape of one capability value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Any,
    String,
    Bool,
    Number,
}

impl ConstraintKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            ConstraintKind::Any => true,
            ConstraintKind::String => value.is_string(),
            ConstraintKind::Bool => value.is_boolean(),
            ConstraintKind::Number => value.is_number(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            ConstraintKind::Any => "any",
            ConstraintKind::String => "string",
            ConstraintKind::Bool => "boolean",
            ConstraintKind::Number => "number",
        }
    }
}

/// One row of a constraint table.
#[derive(Debug, Clone, Copy)]
pub struct Constraint {
    /// The capability must be present and non-empty.
    pub presence: bool,
    pub kind: ConstraintKind,
}

/// A constraint table: capability name to its constraint. Drivers append
/// their own rows to [`BASE_CONSTRAINTS`] at construction time.
pub type ConstraintTable = Vec<(String, Constraint)>;

/// Constraints every driver shares.
pub const BASE_CONSTRAINTS: &[(&str, Constraint)] = &[
    ("platformName", Constraint { presence: true, kind: ConstraintKind::String }),
    ("automationName", Constraint { presence: false, kind: ConstraintKind::String }),
    ("browserName", Constraint { presence: false, kind: ConstraintKind::String }),
    ("app", Constraint { presence: false, kind: ConstraintKind::String }),
    ("deviceName", Constraint { presence: false, kind: ConstraintKind::String }),
    ("newCommandTimeout", Constraint { presence: false, kind: ConstraintKind::Number }),
    ("noReset", Constraint { presence: false, kind: ConstraintKind::Bool }),
    ("fullReset", Constraint { presence: false, kind: ConstraintKind::Bool }),
    ("eventTimings", Constraint { presence: false, kind: ConstraintKind::Bool }),
    ("printPageSourceOnFindFailure", Constraint { presence: false, kind: ConstraintKind::Bool }),
];

/// Build a driver's full constraint table from the base rows plus
/// driver-specific extras. Extra rows with the same name override base rows.
pub fn build_constraint_table(extra: &[(&str, Constraint)]) -> ConstraintTable {
    let mut table: ConstraintTable = BASE_CONSTRAINTS
        .iter()
        .map(|(name, c)| (name.to_string(), *c))
        .collect();
    for (name, constraint) in extra {
        match table.iter_mut().find(|(n, _)| n == name) {
            Some(row) => row.1 = *constraint,
            None => table.push((name.to_string(), *constraint)),
        }
    }
    table
}

/// Validate a capability map against a constraint table.
///
/// Collects every violation rather than stopping at the first, so the
/// client sees the complete picture in one round trip. When
/// `skip_presence` is set, required-capability checks are suppressed (used
/// while validating `alwaysMatch`, where a required capability may still
/// be satisfied by a `firstMatch` candidate).
pub fn validate_caps(
    caps: &CapabilityMap,
    constraints: &ConstraintTable,
    skip_presence: bool,
) -> Result<()> {
    let mut problems: Vec<String> = Vec::new();

    for (name, constraint) in constraints {
        match caps.get(name) {
            None | Some(Value::Null) => {
                if constraint.presence && !skip_presence {
                    problems.push(format!("'{name}' is required"));
                }
            }
            Some(value) => {
                if !constraint.kind.matches(value) {
                    problems.push(format!(
                        "'{name}' must be of type {}",
                        constraint.kind.name()
                    ));
                }
                if constraint.presence
                    && !skip_presence
                    && value.as_str().is_some_and(|s| s.trim().is_empty())
                {
                    problems.push(format!("'{name}' must not be blank"));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(DriverError::InvalidArgument(problems.join("; ")))
    }
}

/// Merge a `firstMatch` candidate into the `alwaysMatch` caps.
///
/// Overwriting is not allowed: the two maps must have disjoint keys
/// (W3C merging rule 4.4).
pub fn merge_caps(primary: &CapabilityMap, secondary: &CapabilityMap) -> Result<CapabilityMap> {
    let mut merged = primary.clone();
    for (name, value) in secondary {
        if primary.contains_key(name) {
            return Err(DriverError::InvalidArgument(format!(
                "capability '{name}' must not appear in both alwaysMatch and a firstMatch entry"
            )));
        }
        merged.insert(name.clone(), value.clone());
    }
    Ok(merged)
}

/// Process a W3C capability envelope into the single merged map for the
/// session, following the W3C "processing capabilities" algorithm: validate
/// `alwaysMatch`, then try each `firstMatch` candidate in order and take
/// the first one that validates and merges cleanly.
pub fn process_capabilities(
    caps: &W3cCapabilities,
    constraints: &ConstraintTable,
    should_validate: bool,
) -> Result<CapabilityMap> {
    let required = caps.always_match.clone().unwrap_or_default();
    let mut candidates = caps.first_match.clone().unwrap_or_default();
    if candidates.is_empty() {
        // Be forgiving about a missing or empty firstMatch array.
        candidates.push(CapabilityMap::new());
    }

    if should_validate {
        validate_caps(&required, constraints, true)?;
    }

    // Presence obligations already met by alwaysMatch don't need to be
    // re-checked against each candidate.
    let filtered: ConstraintTable = constraints
        .iter()
        .filter(|(name, _)| !required.contains_key(name))
        .cloned()
        .collect();

    let mut failures: Vec<String> = Vec::new();
    for candidate in &candidates {
        if should_validate {
            if let Err(e) = validate_caps(candidate, &filtered, false) {
                failures.push(e.to_string());
                continue;
            }
        }
        match merge_caps(&required, candidate) {
            Ok(merged) => return Ok(merged),
            Err(e) => failures.push(e.to_string()),
        }
    }

    Err(DriverError::InvalidArgument(if failures.len() > 1 {
        format!(
            "could not find matching capabilities from any firstMatch entry:\n{}",
            failures.join("\n")
        )
    } else {
        failures.pop().unwrap_or_else(|| "no capabilities matched".into())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_table() -> ConstraintTable {
        build_constraint_table(&[])
    }

    fn map(value: Value) -> CapabilityMap {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn w3c_shape_detection() {
        assert!(is_w3c_caps(&json!({"alwaysMatch": {}})));
        assert!(is_w3c_caps(&json!({"firstMatch": [{}]})));
        assert!(is_w3c_caps(&json!({"alwaysMatch": {}, "firstMatch": []})));
        assert!(!is_w3c_caps(&json!({"desiredCapabilities": {}})));
        assert!(!is_w3c_caps(&json!({"alwaysMatch": 3})));
        assert!(!is_w3c_caps(&json!(null)));
        assert!(!is_w3c_caps(&json!("platformName")));
    }

    #[test]
    fn merge_disjoint_maps() {
        let merged = merge_caps(
            &map(json!({"platformName": "fake"})),
            &map(json!({"deviceName": "emu"})),
        )
        .unwrap();
        assert_eq!(merged["platformName"], "fake");
        assert_eq!(merged["deviceName"], "emu");
    }

    #[test]
    fn merge_rejects_overwrite() {
        let err = merge_caps(
            &map(json!({"platformName": "fake"})),
            &map(json!({"platformName": "other"})),
        )
        .unwrap_err();
        assert!(
            err.to_string().contains("platformName"),
            "error should name the duplicated capability: {err}"
        );
    }

    #[test]
    fn validate_required_capability() {
        let err = validate_caps(&map(json!({})), &base_table(), false).unwrap_err();
        assert!(err.to_string().contains("'platformName' is required"));
    }

    #[test]
    fn validate_skip_presence() {
        validate_caps(&map(json!({})), &base_table(), true)
            .expect("presence check should be suppressed");
    }

    #[test]
    fn validate_type_mismatch() {
        let caps = map(json!({"platformName": "fake", "newCommandTimeout": "soon"}));
        let err = validate_caps(&caps, &base_table(), false).unwrap_err();
        assert!(
            err.to_string().contains("'newCommandTimeout' must be of type number"),
            "got: {err}"
        );
    }

    #[test]
    fn validate_blank_required_value() {
        let caps = map(json!({"platformName": "  "}));
        let err = validate_caps(&caps, &base_table(), false).unwrap_err();
        assert!(err.to_string().contains("must not be blank"), "got: {err}");
    }

    #[test]
    fn validate_collects_all_problems() {
        let caps = map(json!({"noReset": "yes", "fullReset": 1}));
        let err = validate_caps(&caps, &base_table(), false).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("noReset"), "got: {msg}");
        assert!(msg.contains("fullReset"), "got: {msg}");
        assert!(msg.contains("platformName"), "got: {msg}");
    }

    #[test]
    fn process_always_match_only() {
        let caps: W3cCapabilities =
            serde_json::from_value(json!({"alwaysMatch": {"platformName": "fake"}})).unwrap();
        let merged = process_capabilities(&caps, &base_table(), true).unwrap();
        assert_eq!(merged["platformName"], "fake");
    }

    #[test]
    fn process_picks_first_valid_candidate() {
        let caps: W3cCapabilities = serde_json::from_value(json!({
            "firstMatch": [
                {"platformName": 42},
                {"platformName": "fake", "deviceName": "emu"},
            ]
        }))
        .unwrap();
        let merged = process_capabilities(&caps, &base_table(), true).unwrap();
        assert_eq!(merged["deviceName"], "emu");
    }

    #[test]
    fn process_reports_all_candidate_failures() {
        let caps: W3cCapabilities = serde_json::from_value(json!({
            "firstMatch": [
                {"platformName": 42},
                {"noReset": "nope"},
            ]
        }))
        .unwrap();
        let err = process_capabilities(&caps, &base_table(), true).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("platformName"), "got: {msg}");
        assert!(msg.contains("noReset"), "got: {msg}");
    }

    #[test]
    fn process_empty_envelope_fails_presence() {
        let caps = W3cCapabilities::default();
        let err = process_capabilities(&caps, &base_table(), true).unwrap_err();
        assert!(err.to_string().contains("platformName"));
    }

    #[test]
    fn process_without_validation_accepts_anything() {
        let caps: W3cCapabilities =
            serde_json::from_value(json!({"alwaysMatch": {"anything": [1, 2]}})).unwrap();
        let merged = process_capabilities(&caps, &base_table(), false).unwrap();
        assert_eq!(merged["anything"], json!([1, 2]));
    }

    #[test]
    fn driver_rows_override_base_rows() {
        let table = build_constraint_table(&[
            ("platformName", Constraint { presence: false, kind: ConstraintKind::String }),
            ("udid", Constraint { presence: false, kind: ConstraintKind::String }),
        ]);
        validate_caps(&map(json!({})), &table, false)
            .expect("overridden platformName row should drop the presence check");
        assert!(table.iter().any(|(n, _)| n == "udid"));
    }
}
