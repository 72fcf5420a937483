//! Tagged outcome of a single stage handler invocation.

use crate::errors::CaptureError;

/// The outcome of one stage attempt.
///
/// `Pending` is only meaningful for asynchronous stages; the poll executor
/// rejects it from any other stage.
#[derive(Debug, Clone)]
pub enum StageResult<T> {
    /// The stage finished and produced its output.
    Completed(T),
    /// The stage is not finished yet; try again later.
    Pending(String),
    /// The stage failed.
    Failed(CaptureError),
}

impl<T> StageResult<T> {
    /// Creates a pending result with a reason.
    #[must_use]
    pub fn pending(reason: impl Into<String>) -> Self {
        Self::Pending(reason.into())
    }

    /// Collapses a fallible computation that may itself report pending.
    #[must_use]
    pub fn flatten(result: Result<Self, CaptureError>) -> Self {
        result.unwrap_or_else(Self::Failed)
    }

    /// Returns true if completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns true if pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    /// Returns true if failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Returns the error of a failed result.
    #[must_use]
    pub fn error(&self) -> Option<&CaptureError> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the completed output.
    pub fn map<U, F>(self, f: F) -> StageResult<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Self::Completed(v) => StageResult::Completed(f(v)),
            Self::Pending(reason) => StageResult::Pending(reason),
            Self::Failed(e) => StageResult::Failed(e),
        }
    }

    /// Short status label for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Pending(_) => "pending",
            Self::Failed(_) => "failed",
        }
    }
}

impl<T> From<Result<T, CaptureError>> for StageResult<T> {
    fn from(result: Result<T, CaptureError>) -> Self {
        match result {
            Ok(v) => Self::Completed(v),
            Err(e) => Self::Failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result() {
        let ok: StageResult<u32> = Ok(7).into();
        assert!(ok.is_completed());

        let err: StageResult<u32> = Err(CaptureError::transient("later")).into();
        assert!(err.is_failed());
        assert_eq!(err.error().map(CaptureError::kind), Some("transient_error"));
    }

    #[test]
    fn test_flatten_keeps_pending() {
        let inner: Result<StageResult<u32>, CaptureError> = Ok(StageResult::pending("copying"));
        assert!(StageResult::flatten(inner).is_pending());

        let failed: Result<StageResult<u32>, CaptureError> =
            Err(CaptureError::state("snap-1", "error"));
        assert!(StageResult::flatten(failed).is_failed());
    }

    #[test]
    fn test_map_and_label() {
        let r = StageResult::Completed(2).map(|v| v * 10);
        assert!(matches!(r, StageResult::Completed(20)));
        assert_eq!(r.label(), "completed");
        assert_eq!(StageResult::<()>::pending("x").label(), "pending");
    }
}
