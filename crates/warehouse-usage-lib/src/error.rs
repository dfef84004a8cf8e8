use thiserror::Error;

/// Failures raised by the aggregation engine.
///
/// Each kind stays distinct so callers can map them to their own exit codes
/// or messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("Invalid usage fact for {subject}: {reason}")]
    InvalidUsageFact { subject: String, reason: String },

    #[error("Invalid rate configuration for '{field}': {reason}")]
    InvalidRateConfig { field: &'static str, reason: String },

    #[error("Report inconsistency in {section} section: {field} does not match the sum of its entries")]
    ReportInconsistency {
        section: &'static str,
        field: &'static str,
    },
}

impl UsageError {
    pub fn invalid_fact(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        UsageError::InvalidUsageFact {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_rate(field: &'static str, reason: impl Into<String>) -> Self {
        UsageError::InvalidRateConfig {
            field,
            reason: reason.into(),
        }
    }
}

pub type UsageResult<T> = std::result::Result<T, UsageError>;
