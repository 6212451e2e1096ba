// src/error.rs

/// Failures of a pure calculation. None of these are retryable: the same
/// snapshot fed back in fails the same way.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("malformed snapshot: `{field}`: {reason}")]
    MalformedSnapshot { field: String, reason: String },
    #[error("arithmetic degenerate in {op}: {reason}")]
    ArithmeticDegenerate { op: &'static str, reason: &'static str },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("config: {0}")]
    Config(String),
}

impl RiskError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        RiskError::MalformedSnapshot { field: field.into(), reason: reason.into() }
    }

    pub(crate) fn div_by_zero(op: &'static str) -> Self {
        RiskError::ArithmeticDegenerate { op, reason: "division by zero" }
    }

    pub(crate) fn overflow(op: &'static str) -> Self {
        RiskError::ArithmeticDegenerate { op, reason: "result exceeds 256 bits" }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskError::MalformedSnapshot { .. } => "malformed",
            RiskError::ArithmeticDegenerate { .. } => "arithmetic",
            RiskError::InvalidInput(_) => "input",
            RiskError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
