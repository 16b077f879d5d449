//! Configuration validation errors and helpers.

use thiserror::Error;

/// Error raised when a configuration value is outside its valid domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A field holds a value that cannot be used.
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Implemented by every configuration section.
pub trait ConfigValidator {
    /// Checks that all values are usable by the pipeline.
    fn validate(&self) -> Result<(), ConfigError>;
}

pub(crate) fn ensure_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::invalid(field, "must be greater than zero"));
    }
    Ok(())
}

pub(crate) fn ensure_unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::invalid(
            field,
            format!("must be a finite non-negative number, got {value}"),
        ));
    }
    Ok(())
}
