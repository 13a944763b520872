//! Form input validation.
//!
//! Every submitted form is deserialized into a struct of raw strings and then
//! checked field by field. Failures are collected into [`FieldErrors`] so the
//! client can show each message next to the offending input.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

pub mod auth;
pub mod detail;
pub mod event;

pub use auth::{LoginForm, RegisterForm, Registration};
pub use detail::{DetailAction, DetailForm};
pub use event::{EventForm, ImageUpload};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns `value` when no error was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

/// Trims `value` and records an error if it is empty or longer than `max`
/// characters.
pub(crate) fn required(errors: &mut FieldErrors, field: &str, value: &str, max: usize) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required");
    } else if value.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters"));
    }
    value.to_string()
}

/// Like [`required`] but blank input yields `None`.
pub(crate) fn optional(
    errors: &mut FieldErrors,
    field: &str,
    value: &str,
    max: usize,
) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value.chars().count() > max {
        errors.add(field, format!("Must be at most {max} characters"));
    }
    Some(value.to_string())
}
