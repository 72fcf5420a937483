//! Error types for the forensic capture workflow.
//!
//! `CaptureError` is the taxonomy every stage, poll and orchestrator step
//! reports through. `ProviderError` is what the external collaborators
//! (compute, credentials, logs, object store) return before it is classified.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for capture operations.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// The condition is not finished yet and may succeed on a later attempt.
    #[error("Transient error: {message}")]
    Transient {
        /// What was not ready.
        message: String,
    },

    /// A resource reached a state it cannot recover from (e.g. snapshot `error`).
    #[error("State error: {resource} reported state '{state}'")]
    State {
        /// The resource identifier.
        resource: String,
        /// The observed state.
        state: String,
    },

    /// The retry budget of a stage was consumed without success.
    #[error("Retry budget exhausted for stage {stage} after {attempts} attempts: {last_reason}")]
    RetryExhausted {
        /// The stage that was being retried.
        stage: String,
        /// How many attempts were made.
        attempts: u32,
        /// The reason reported by the last attempt.
        last_reason: String,
    },

    /// A required input is missing or malformed.
    #[error("Configuration error: {field}: {message}")]
    Configuration {
        /// The offending field.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// A collaborator call failed with a non-transient error.
    #[error("{0}")]
    Provider(ProviderError),

    /// The workflow was cancelled while this operation was in flight.
    #[error("Cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// The workflow exceeded its global timeout.
    #[error("Workflow timed out after {timeout_seconds}s")]
    Timeout {
        /// The configured timeout.
        timeout_seconds: u64,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CaptureError {
    /// Creates a transient error.
    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Creates a state error.
    #[must_use]
    pub fn state(resource: impl Into<String>, state: impl Into<String>) -> Self {
        Self::State {
            resource: resource.into(),
            state: state.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Stable snake_case name of the error kind, used in alerts and retry rules.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient_error",
            Self::State { .. } => "state_error",
            Self::RetryExhausted { .. } => "retry_exhausted",
            Self::Configuration { .. } => "configuration_error",
            Self::Provider(_) => "provider_error",
            Self::Cancelled { .. } => "cancelled",
            Self::Timeout { .. } => "timeout",
            Self::Serialization(_) => "serialization_error",
            Self::Internal(_) => "internal_error",
        }
    }

    /// Returns true if the error describes a "try again" condition.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true for kinds that no retry rule may ever absorb.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::State { .. }
                | Self::Configuration { .. }
                | Self::Cancelled { .. }
                | Self::Timeout { .. }
        )
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), json!(self.kind()));
        map.insert("message".to_string(), json!(self.to_string()));

        match self {
            Self::State { resource, state } => {
                map.insert("resource".to_string(), json!(resource));
                map.insert("state".to_string(), json!(state));
            }
            Self::RetryExhausted { stage, attempts, .. } => {
                map.insert("stage".to_string(), json!(stage));
                map.insert("attempts".to_string(), json!(attempts));
            }
            Self::Configuration { field, .. } => {
                map.insert("field".to_string(), json!(field));
            }
            _ => {}
        }

        map
    }
}

impl From<ProviderError> for CaptureError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotVisible { .. } | ProviderError::Throttled { .. } => Self::Transient {
                message: err.to_string(),
            },
            other => Self::Provider(other),
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors returned by the external cloud collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The resource does not exist.
    #[error("Resource not found: {resource}")]
    NotFound {
        /// The resource identifier.
        resource: String,
    },

    /// The resource already exists.
    #[error("Resource already exists: {resource}")]
    AlreadyExists {
        /// The resource identifier.
        resource: String,
    },

    /// The resource exists but is not yet visible to the caller's account.
    #[error("Resource not yet visible: {resource}")]
    NotVisible {
        /// The resource identifier.
        resource: String,
    },

    /// The service throttled the request.
    #[error("Request throttled: {operation}")]
    Throttled {
        /// The throttled operation.
        operation: String,
    },

    /// Any other service-side failure.
    #[error("Service error in {operation}: {message}")]
    Service {
        /// The failing operation.
        operation: String,
        /// The service message.
        message: String,
    },
}

impl ProviderError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(resource: impl Into<String>) -> Self {
        Self::AlreadyExists {
            resource: resource.into(),
        }
    }

    /// Creates a not-visible error.
    #[must_use]
    pub fn not_visible(resource: impl Into<String>) -> Self {
        Self::NotVisible {
            resource: resource.into(),
        }
    }

    /// Creates a service error.
    #[must_use]
    pub fn service(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Service {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_are_stable() {
        assert_eq!(CaptureError::transient("x").kind(), "transient_error");
        assert_eq!(CaptureError::state("snap-1", "error").kind(), "state_error");
        assert_eq!(
            CaptureError::configuration("region", "missing").kind(),
            "configuration_error"
        );
        assert_eq!(CaptureError::cancelled("timeout").kind(), "cancelled");
    }

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(CaptureError::transient("not yet").is_retryable());
        assert!(!CaptureError::state("snap-1", "error").is_retryable());
        assert!(!CaptureError::Internal("boom".into()).is_retryable());
    }

    #[test]
    fn test_provider_visibility_maps_to_transient() {
        let err: CaptureError = ProviderError::not_visible("snap-1").into();
        assert!(err.is_retryable());

        let err: CaptureError = ProviderError::Throttled {
            operation: "CopySnapshot".into(),
        }
        .into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_provider_service_error_is_not_retryable() {
        let err: CaptureError = ProviderError::service("RunInstances", "capacity").into();
        assert_eq!(err.kind(), "provider_error");
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("RunInstances"));
    }

    #[test]
    fn test_state_error_to_dict() {
        let dict = CaptureError::state("snap-9", "error").to_dict();
        assert_eq!(dict.get("kind").unwrap(), "state_error");
        assert_eq!(dict.get("resource").unwrap(), "snap-9");
        assert_eq!(dict.get("state").unwrap(), "error");
    }

    #[test]
    fn test_fatal_kinds() {
        assert!(CaptureError::state("snap", "error").is_fatal());
        assert!(CaptureError::Timeout { timeout_seconds: 1 }.is_fatal());
        assert!(!CaptureError::transient("x").is_fatal());
    }
}
