//! Structural validation for request payloads.
//!
//! Types implement [`Validate`] by pushing [`FieldError`]s through the small
//! rule helpers below. An empty list means the value is valid.

use serde::Serialize;

/// A single failed rule on a named field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Capability to check a value's structure
pub trait Validate {
    /// Every rule violation, in field order
    fn validate(&self) -> Vec<FieldError>;

    /// `Ok` when `validate` found nothing
    fn check(&self) -> Result<(), Vec<FieldError>> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Text must be non-blank and at most `max_chars` characters once trimmed
pub fn bounded_text(field: &str, value: &str, max_chars: usize, errors: &mut Vec<FieldError>) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        errors.push(FieldError::new(field, "must not be empty"));
    } else if trimmed.chars().count() > max_chars {
        errors.push(FieldError::new(
            field,
            format!("must be at most {max_chars} characters"),
        ));
    }
}

/// Value must be one of a closed set
pub fn one_of(field: &str, value: &str, allowed: &[&str], errors: &mut Vec<FieldError>) {
    if !allowed.contains(&value) {
        errors.push(FieldError::new(
            field,
            format!("must be one of: {}", allowed.join(", ")),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_text_rejects_blank_and_long() {
        let mut errors = Vec::new();
        bounded_text("title", "   ", 5, &mut errors);
        bounded_text("title", "abcdef", 5, &mut errors);
        bounded_text("title", " abcde ", 5, &mut errors);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "must not be empty");
        assert_eq!(errors[1].message, "must be at most 5 characters");
    }

    #[test]
    fn bounded_text_counts_chars_not_bytes() {
        let mut errors = Vec::new();
        bounded_text("title", "ééééé", 5, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn one_of_lists_allowed_values() {
        let mut errors = Vec::new();
        one_of("status", "done", &["pending", "done"], &mut errors);
        assert!(errors.is_empty());

        one_of("status", "Done", &["pending", "done"], &mut errors);
        assert_eq!(
            errors,
            vec![FieldError::new("status", "must be one of: pending, done")]
        );
    }
}
