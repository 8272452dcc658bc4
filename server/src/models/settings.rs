use serde::{Deserialize, Serialize};

use crate::validation::{ValidationError, Validator};

const LANGUAGES: &[&str] = &["en", "ar"];
const THEMES: &[&str] = &["light", "dark", "system"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub email: bool,
    pub sms: bool,
    pub appointment_reminders: bool,
    pub payment_alerts: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email: true,
            sms: false,
            appointment_reminders: true,
            payment_alerts: true,
        }
    }
}

/// Per-user preferences. Users without a stored document get the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub language: String,
    pub theme: String,
    pub timezone: String,
    pub currency: String,
    pub date_format: String,
    pub notifications: NotificationPreferences,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            owner_id: None,
            language: "en".to_string(),
            theme: "light".to_string(),
            timezone: "UTC".to_string(),
            currency: "USD".to_string(),
            date_format: "YYYY-MM-DD".to_string(),
            notifications: NotificationPreferences::default(),
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .one_of("language", &Some(self.language.clone()), LANGUAGES)
            .one_of("theme", &Some(self.theme.clone()), THEMES)
            .required("timezone", &self.timezone)
            .check(
                self.currency.len() == 3 && self.currency.chars().all(|c| c.is_ascii_uppercase()),
                "currency",
                "must be a three-letter code",
            )
            .required("dateFormat", &self.date_format)
            .finish()
    }
}
