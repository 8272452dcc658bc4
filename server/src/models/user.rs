use std::fmt;

use agency_store::{Collection, Filter, Sort};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{collections, Resource};
use crate::auth::password;
use crate::error::ApiResult;
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

pub const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    #[default]
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Staff => "staff",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialization: Option<String>,
    /// Plain password accepted on writes; hashed by `prepare`, never stored.
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    pub two_factor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            role: Role::default(),
            phone: None,
            specialization: None,
            password: None,
            password_hash: None,
            two_factor: false,
            otp_hash: None,
            otp_expires_at: None,
            active: true,
            last_login_at: None,
        }
    }
}

impl Resource for User {
    const COLLECTION: Collection = collections::USERS;
    const NAME: &'static str = "User";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "email", "role"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["otpHash", "otpExpiresAt", "lastLoginAt"];
    const HIDDEN_FIELDS: &'static [&'static str] = &["passwordHash", "otpHash", "otpExpiresAt"];
    const ADMIN_ONLY: bool = true;

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("name")]
    }

    fn list_filter(params: &ListParams) -> Filter {
        match params.status.as_deref() {
            Some("active") => Filter::eq("active", true),
            Some("inactive") => Filter::eq("active", false),
            _ => Filter::all(),
        }
    }

    fn prepare(&mut self) -> ApiResult<()> {
        self.email = self.email.trim().to_lowercase();
        if let Some(plain) = self.password.take() {
            if plain.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(ValidationError::new(
                    "password",
                    format!("must be at least {MIN_PASSWORD_LENGTH} characters"),
                )
                .into());
            }
            self.password_hash = Some(password::hash_password(&plain)?);
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("name", &self.name)
            .required("email", &self.email)
            .email("email", &self.email)
            .required_opt("password", &self.password_hash)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use serde_json::json;

    #[test]
    fn password_is_hashed_and_never_serialized() {
        let mut user: User = serde_json::from_value(json!({
            "name": "Admin",
            "email": "admin@agency.test",
            "role": "admin",
            "password": "correct horse"
        }))
        .unwrap();
        user.prepare().unwrap();

        assert!(user.password.is_none());
        let hash = user.password_hash.clone().unwrap();
        assert!(password::verify_password("correct horse", &hash));
        assert!(user.validate().is_ok());

        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["role"], "admin");
    }

    #[test]
    fn short_passwords_rejected() {
        let mut user = User {
            name: "x".into(),
            email: "x@y.zz".into(),
            password: Some("short".into()),
            ..Default::default()
        };
        match user.prepare() {
            Err(ApiError::Validation(err)) => assert_eq!(err.field, "password"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn missing_password_is_required() {
        let user = User {
            name: "x".into(),
            email: "x@y.zz".into(),
            ..Default::default()
        };
        assert_eq!(user.validate().unwrap_err().to_string(), "password is required");
    }
}
