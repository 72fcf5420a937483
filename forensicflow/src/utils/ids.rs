//! Validation of cloud identifiers carried through the workflow.
//!
//! Identifiers end up in object keys, log stream names and role ARNs, so
//! malformed values are rejected before any resource is touched.

use crate::errors::CaptureError;
use regex::Regex;
use std::sync::OnceLock;

fn account_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{12}$").expect("static pattern compiles"))
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").expect("static pattern compiles")
    })
}

fn resource_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(i|vol|snap)-[0-9A-Za-z]+$").expect("static pattern compiles")
    })
}

/// Validates a 12-digit account identifier.
pub fn validate_account_id(field: &str, value: &str) -> Result<(), CaptureError> {
    if account_pattern().is_match(value) {
        Ok(())
    } else {
        Err(CaptureError::configuration(
            field,
            format!("'{value}' is not a 12-digit account id"),
        ))
    }
}

/// Validates a region name such as `us-east-1`.
pub fn validate_region(field: &str, value: &str) -> Result<(), CaptureError> {
    if region_pattern().is_match(value) {
        Ok(())
    } else {
        Err(CaptureError::configuration(
            field,
            format!("'{value}' is not a region name"),
        ))
    }
}

/// Validates an instance, volume or snapshot identifier with the given prefix.
pub fn validate_resource_id(field: &str, prefix: &str, value: &str) -> Result<(), CaptureError> {
    let prefixed = value
        .split_once('-')
        .is_some_and(|(head, _)| head == prefix);
    if prefixed && resource_pattern().is_match(value) {
        Ok(())
    } else {
        Err(CaptureError::configuration(
            field,
            format!("'{value}' is not a valid {prefix}- identifier"),
        ))
    }
}

/// Validates an incident identifier.
///
/// The identifier prefixes every evidence key and names the audit stream,
/// so it must be non-empty and free of whitespace.
pub fn validate_incident_id(value: &str) -> Result<(), CaptureError> {
    if value.is_empty() || value.chars().any(char::is_whitespace) {
        return Err(CaptureError::configuration(
            "incident_id",
            "must be non-empty and contain no whitespace",
        ));
    }
    Ok(())
}
