//! Defaults errors.

use runas_auth::DefaultsOp;
use runas_types::ErrorCode;
use thiserror::Error;

/// A defaults entry that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefaultsError {
    #[error("unknown defaults entry \"{var}\"")]
    UnknownVariable { var: String },

    #[error("value \"{value}\" is invalid for option \"{var}\": expected {expected}")]
    InvalidValue {
        var: String,
        value: String,
        expected: &'static str,
    },

    #[error("no value specified for \"{var}\"")]
    MissingValue { var: String },

    #[error("operation {op:?} is not supported by \"{var}\"")]
    UnsupportedOperation { var: String, op: DefaultsOp },
}

impl DefaultsError {
    pub fn unknown(var: impl Into<String>) -> Self {
        Self::UnknownVariable { var: var.into() }
    }

    pub fn invalid(var: impl Into<String>, value: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidValue {
            var: var.into(),
            value: value.into(),
            expected,
        }
    }

    pub fn missing(var: impl Into<String>) -> Self {
        Self::MissingValue { var: var.into() }
    }

    pub fn unsupported(var: impl Into<String>, op: DefaultsOp) -> Self {
        Self::UnsupportedOperation {
            var: var.into(),
            op,
        }
    }
}

impl ErrorCode for DefaultsError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownVariable { .. } => "DEFAULTS_UNKNOWN_VARIABLE",
            Self::InvalidValue { .. } => "DEFAULTS_INVALID_VALUE",
            Self::MissingValue { .. } => "DEFAULTS_MISSING_VALUE",
            Self::UnsupportedOperation { .. } => "DEFAULTS_UNSUPPORTED_OPERATION",
        }
    }

    fn is_recoverable(&self) -> bool {
        true
    }
}
