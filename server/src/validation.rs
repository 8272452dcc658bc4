use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use rust_decimal::Decimal;
use thiserror::Error;

/// A field-level validation failure, rendered as `"<field> <message>"`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field} {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Largest quantity or amount accepted on a single field.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

fn email_regex() -> &'static Regex {
    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid email regex")
    })
}

/// Collects checks in declaration order and reports the first failure.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationError>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(mut self, ok: bool, field: &str, message: &str) -> Self {
        if !ok {
            self.errors.push(ValidationError::new(field, message));
        }
        self
    }

    /// Non-blank string.
    pub fn required(self, field: &str, value: &str) -> Self {
        let ok = !value.trim().is_empty();
        self.check(ok, field, "is required")
    }

    pub fn required_opt<T>(self, field: &str, value: &Option<T>) -> Self {
        self.check(value.is_some(), field, "is required")
    }

    /// Blank values are left to `required`.
    pub fn email(self, field: &str, value: &str) -> Self {
        let ok = value.trim().is_empty() || email_regex().is_match(value.trim());
        self.check(ok, field, "must be a valid email address")
    }

    /// `HH:MM`, 24-hour clock. Blank values are left to `required`.
    pub fn time(self, field: &str, value: &str) -> Self {
        let ok = value.trim().is_empty() || parse_time(value).is_some();
        self.check(ok, field, "must be a time in HH:MM format")
    }

    /// `YYYY-MM-DD`. Blank values are left to `required`.
    pub fn date(self, field: &str, value: &str) -> Self {
        let ok = value.trim().is_empty() || parse_date(value).is_some();
        self.check(ok, field, "must be a date in YYYY-MM-DD format")
    }

    pub fn optional_date(self, field: &str, value: &Option<String>) -> Self {
        match value {
            Some(v) => self.date(field, v),
            None => self,
        }
    }

    pub fn positive(self, field: &str, value: Decimal) -> Self {
        self.check(value > Decimal::ZERO, field, "must be greater than zero")
    }

    pub fn non_negative(self, field: &str, value: Decimal) -> Self {
        self.check(value >= Decimal::ZERO, field, "must not be negative")
    }

    pub fn within_limit(self, field: &str, value: Decimal) -> Self {
        let message = format!("must not exceed {MAX_AMOUNT}");
        self.check(value <= Decimal::from(MAX_AMOUNT), field, &message)
    }

    pub fn one_of(self, field: &str, value: &Option<String>, allowed: &[&str]) -> Self {
        let ok = value.as_deref().map(|v| allowed.contains(&v)).unwrap_or(true);
        let message = format!("must be one of: {}", allowed.join(", "));
        self.check(ok, field, &message)
    }

    pub fn finish(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}

pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_first_failure() {
        let err = Validator::new()
            .required("firstName", "Jane")
            .required("lastName", " ")
            .email("email", "nope")
            .finish()
            .unwrap_err();

        assert_eq!(err.field, "lastName");
        assert_eq!(err.to_string(), "lastName is required");
    }

    #[test]
    fn email_format() {
        assert!(Validator::new().email("email", "jane@x.com").finish().is_ok());
        assert!(Validator::new().email("email", "").finish().is_ok());
        assert_eq!(
            Validator::new().email("email", "jane@").finish().unwrap_err().to_string(),
            "email must be a valid email address"
        );
    }

    #[test]
    fn times_are_hh_mm() {
        assert!(parse_time("09:30").is_some());
        assert!(parse_time("23:59").is_some());
        assert!(parse_time("24:00").is_none());
        assert!(parse_time("9:30").is_none());
        assert!(parse_time("09:30:00").is_none());
    }

    #[test]
    fn dates_are_iso() {
        assert!(parse_date("2024-02-29").is_some());
        assert!(parse_date("2023-02-29").is_none());
        assert!(parse_date("2024-2-1").is_none());
        assert!(Validator::new().optional_date("passportExpiry", &None).finish().is_ok());
        assert!(Validator::new().date("date", "01/02/2024").finish().is_err());
    }

    #[test]
    fn amounts() {
        assert!(Validator::new().positive("amount", Decimal::new(1, 2)).finish().is_ok());
        assert!(Validator::new().positive("amount", Decimal::ZERO).finish().is_err());
        assert!(Validator::new().non_negative("tax", Decimal::ZERO).finish().is_ok());
        assert!(Validator::new().non_negative("tax", Decimal::NEGATIVE_ONE).finish().is_err());
        assert!(Validator::new()
            .within_limit("amount", Decimal::from(MAX_AMOUNT))
            .finish()
            .is_ok());
        assert_eq!(
            Validator::new()
                .within_limit("amount", Decimal::from(MAX_AMOUNT) + Decimal::ONE)
                .finish()
                .unwrap_err()
                .to_string(),
            "amount must not exceed 1000000000000"
        );
    }

    #[test]
    fn one_of_allows_missing() {
        let allowed = ["A+", "O-"];
        assert!(Validator::new().one_of("bloodType", &None, &allowed).finish().is_ok());
        assert!(Validator::new()
            .one_of("bloodType", &Some("O-".into()), &allowed)
            .finish()
            .is_ok());
        assert!(Validator::new()
            .one_of("bloodType", &Some("Z".into()), &allowed)
            .finish()
            .is_err());
    }
}
