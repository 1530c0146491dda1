//! Field-level validation.
//!
//! Request payloads that need checking implement [`Validatable`]. Errors name the field they
//! belong to so the form can show them next to the input.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Validation error with field name and message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a failed check, if any.
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(error) = result {
            self.errors.push(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    #[must_use]
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// # Errors
    /// Returns `self` if any error was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Longest name accepted for saved searches, reports and templates.
pub const MAX_NAME_LENGTH: usize = 128;

pub trait Validatable {
    /// # Errors
    /// Returns every failing field.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// # Errors
    /// Fails on an empty or whitespace-only value.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }

    /// # Errors
    /// Fails when the length is outside `min..=max`.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();
        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }
        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }
        Ok(())
    }

    /// # Errors
    /// Fails when the value is outside `min..=max`.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(field, format!("Must be at least {min_val}")));
        }
        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(field, format!("Must be at most {max_val}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validators::{validate_length, validate_range, validate_required};

    #[test]
    fn test_validation_errors_collection() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.add(ValidationError::new("name", "required"));
        errors.check(validate_required("owner", " "));
        errors.check(validate_required("type", "business"));
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.errors()[1].field, "owner");
        assert!(errors.result().is_err());
    }

    #[test]
    fn test_validate_length() {
        assert!(validate_length("name", "ab", Some(3), None).is_err());
        assert!(validate_length("name", "abcdef", None, Some(5)).is_err());
        assert!(validate_length("name", "abc", Some(3), Some(5)).is_ok());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("threshold", 101, Some(0), Some(100)).is_err());
        assert!(validate_range("threshold", -1, Some(0), None).is_err());
        assert!(validate_range("threshold", 80, Some(0), Some(100)).is_ok());
    }
}
