//! Request validation with localized messages.
//!
//! The validator is initialized once with the configured locale and then
//! shared read-only by every handler through the application context.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::context::ContextBuilder;
use crate::lifecycle::{InitStep, StepError};

/// Supported message catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Zh,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported locale {0:?} (expected one of: en, zh)")]
pub struct UnsupportedLocale(pub String);

impl FromStr for Locale {
    type Err = UnsupportedLocale;

    /// Accepts bare tags and region variants (`en`, `en-US`, `zh_CN`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = s
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match lang.as_str() {
            "en" => Ok(Locale::En),
            "zh" => Ok(Locale::Zh),
            _ => Err(UnsupportedLocale(s.to_string())),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locale::En => f.write_str("en"),
            Locale::Zh => f.write_str("zh"),
        }
    }
}

/// A field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Missing { field: String },
    Malformed { field: String },
    OutOfRange { field: String, min: i64, max: i64 },
}

#[derive(Debug, Clone)]
pub struct Validator {
    locale: Locale,
}

impl Validator {
    pub fn new(locale: &str) -> Result<Self, UnsupportedLocale> {
        Ok(Self {
            locale: locale.parse()?,
        })
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Parse an optional integer field, falling back to `default` when absent.
    pub fn integer(
        &self,
        field: &str,
        raw: Option<&str>,
        default: Option<i64>,
    ) -> Result<i64, FieldError> {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() => value.parse().map_err(|_| FieldError::Malformed {
                field: field.to_string(),
            }),
            _ => default.ok_or_else(|| FieldError::Missing {
                field: field.to_string(),
            }),
        }
    }

    /// Check that `value` lies in `min..=max`.
    pub fn range(&self, field: &str, value: i64, min: i64, max: i64) -> Result<i64, FieldError> {
        if (min..=max).contains(&value) {
            Ok(value)
        } else {
            Err(FieldError::OutOfRange {
                field: field.to_string(),
                min,
                max,
            })
        }
    }

    /// Render a field error in the configured locale.
    pub fn translate(&self, err: &FieldError) -> String {
        match (self.locale, err) {
            (Locale::En, FieldError::Missing { field }) => format!("{field} is a required field"),
            (Locale::En, FieldError::Malformed { field }) => format!("{field} must be a valid integer"),
            (Locale::En, FieldError::OutOfRange { field, min, max }) => {
                format!("{field} must be between {min} and {max}")
            }
            (Locale::Zh, FieldError::Missing { field }) => format!("{field}为必填字段"),
            (Locale::Zh, FieldError::Malformed { field }) => format!("{field}必须是一个有效的整数"),
            (Locale::Zh, FieldError::OutOfRange { field, min, max }) => {
                format!("{field}必须在{min}和{max}之间")
            }
        }
    }
}

/// Init step installing the shared [`Validator`].
pub struct ValidatorStep {
    locale: String,
}

impl ValidatorStep {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
        }
    }
}

#[async_trait]
impl InitStep for ValidatorStep {
    fn name(&self) -> &str {
        "validator"
    }

    async fn init(&mut self, ctx: &mut ContextBuilder) -> Result<(), StepError> {
        let validator = Validator::new(&self.locale)?;
        tracing::debug!(locale = %validator.locale(), "Validator translations registered");
        ctx.set_validator(Arc::new(validator));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locale_parsing() {
        assert_eq!("en".parse::<Locale>(), Ok(Locale::En));
        assert_eq!("en-US".parse::<Locale>(), Ok(Locale::En));
        assert_eq!("zh_CN".parse::<Locale>(), Ok(Locale::Zh));
        assert!("fr".parse::<Locale>().is_err());
    }

    #[test]
    fn integer_field() {
        let v = Validator::new("en").unwrap();
        assert_eq!(v.integer("count", None, Some(1)), Ok(1));
        assert_eq!(v.integer("count", Some(" 7 "), Some(1)), Ok(7));
        assert_eq!(
            v.integer("count", Some("seven"), Some(1)),
            Err(FieldError::Malformed { field: "count".into() })
        );
        assert_eq!(
            v.integer("count", None, None),
            Err(FieldError::Missing { field: "count".into() })
        );
    }

    #[test]
    fn translated_messages() {
        let err = FieldError::OutOfRange {
            field: "count".into(),
            min: 1,
            max: 100,
        };
        assert_eq!(
            Validator::new("en").unwrap().translate(&err),
            "count must be between 1 and 100"
        );
        assert_eq!(
            Validator::new("zh").unwrap().translate(&err),
            "count必须在1和100之间"
        );
    }
}
