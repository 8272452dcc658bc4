//! Persisted entities and the [`Resource`] trait that lets the generic
//! repository and handlers serve them.

pub mod accounting;
pub mod appointment;
pub mod client;
pub mod invoice;
pub mod knowledge;
pub mod patient;
pub mod settings;
pub mod user;
pub mod visa;

use agency_store::{Collection, Filter, Sort, StoredDocument};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::pagination::ListParams;
use crate::validation::ValidationError;

pub use accounting::{FeeStructure, Payment, PaymentKind, PaymentStatus};
pub use appointment::{Appointment, AppointmentStatus};
pub use client::Client;
pub use invoice::{Invoice, InvoiceStatus};
pub use knowledge::{LearningGuideline, RejectionTip, SopDocument, VisaKnowledge};
pub use patient::Patient;
pub use settings::Settings;
pub use user::{Role, User};
pub use visa::{VisaApplication, VisaStatus};

pub mod collections {
    use agency_store::Collection;

    pub const CLIENTS: Collection = Collection::new("clients").with_unique(&["email", "clientId"]);
    pub const PATIENTS: Collection = Collection::new("patients").with_unique(&["patientId"]);
    pub const APPOINTMENTS: Collection = Collection::new("appointments");
    pub const INVOICES: Collection = Collection::new("invoices").with_unique(&["invoiceNumber"]);
    pub const PAYMENTS: Collection = Collection::new("payments");
    pub const FEE_STRUCTURES: Collection = Collection::new("fee_structures");
    pub const VISA_APPLICATIONS: Collection =
        Collection::new("visa_applications").with_unique(&["applicationNumber"]);
    pub const USERS: Collection = Collection::new("users").with_unique(&["email"]);
    pub const SETTINGS: Collection = Collection::new("settings").with_unique(&["ownerId"]);
    pub const VISA_KNOWLEDGE: Collection = Collection::new("visa_knowledge");
    pub const SOP_DOCUMENTS: Collection = Collection::new("sop_documents");
    pub const LEARNING_GUIDELINES: Collection = Collection::new("learning_guidelines");
    pub const REJECTION_TIPS: Collection = Collection::new("rejection_tips");
    pub const REVOKED_SESSIONS: Collection = Collection::new("revoked_sessions").with_unique(&["jti"]);

    /// Every collection, for index creation at startup.
    pub const ALL: &[Collection] = &[
        CLIENTS,
        PATIENTS,
        APPOINTMENTS,
        INVOICES,
        PAYMENTS,
        FEE_STRUCTURES,
        VISA_APPLICATIONS,
        USERS,
        SETTINGS,
        VISA_KNOWLEDGE,
        SOP_DOCUMENTS,
        LEARNING_GUIDELINES,
        REJECTION_TIPS,
        REVOKED_SESSIONS,
    ];
}

/// Display-id scheme: `{prefix}-{n:04}`, numbered per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sequence {
    pub prefix: &'static str,
    /// Keep an id the caller supplied instead of assigning one.
    pub keep_supplied: bool,
}

impl Sequence {
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            keep_supplied: false,
        }
    }

    pub const fn keep_supplied(mut self) -> Self {
        self.keep_supplied = true;
        self
    }

    pub fn format(&self, n: u64) -> String {
        format!("{}-{:04}", self.prefix, n)
    }
}

/// A record id held by another document that must resolve on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub collection: Collection,
    pub id: Uuid,
}

impl Reference {
    pub fn new(field: &'static str, collection: Collection, id: Uuid) -> Self {
        Self { field, collection, id }
    }
}

pub trait Resource: Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Singular display name used in messages, e.g. `"Client"`.
    const NAME: &'static str;
    const SEARCH_FIELDS: &'static [&'static str];
    /// Fields that updates never change.
    const IMMUTABLE_FIELDS: &'static [&'static str] = &[];
    /// Fields stored but never returned.
    const HIDDEN_FIELDS: &'static [&'static str] = &[];
    const SEQUENCE: Option<Sequence> = None;
    const ADMIN_ONLY: bool = false;

    fn default_sort() -> Vec<Sort> {
        vec![Sort::newest_first()]
    }

    fn list_filter(_params: &ListParams) -> Filter {
        Filter::all()
    }

    /// Slot for the assigned display id, when the resource has one.
    fn display_id_mut(&mut self) -> Option<&mut Option<String>> {
        None
    }

    /// Runs once before the first validation of a new record.
    fn on_create(&mut self) {}

    /// Normalises derived fields. Runs on every write, before `validate`.
    fn prepare(&mut self) -> ApiResult<()> {
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError>;

    /// Rejects updates that the previous state does not allow.
    fn check_update(&self, _previous: &Self) -> ApiResult<()> {
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}

/// A stored body together with its envelope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record<T> {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: T,
}

impl<T: DeserializeOwned> TryFrom<StoredDocument> for Record<T> {
    type Error = serde_json::Error;

    fn try_from(doc: StoredDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: doc.id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            body: serde_json::from_value(doc.data)?,
        })
    }
}

impl<T: Resource> Record<T> {
    /// JSON form returned to callers, without hidden fields.
    pub fn to_public(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for field in T::HIDDEN_FIELDS {
                map.remove(*field);
            }
        }
        Ok(value)
    }
}

/// Parses an id held in a body field; blank means absent.
pub fn parse_reference(field: &'static str, value: &Option<String>) -> Result<Option<Uuid>, ValidationError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Uuid::parse_str(raw)
            .map(Some)
            .map_err(|_| ValidationError::new(field, "must be a record id")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmergencyContact {
    pub name: String,
    pub relationship: String,
    pub phone: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_ids_are_zero_padded() {
        let seq = Sequence::new("CLI");
        assert_eq!(seq.format(1), "CLI-0001");
        assert_eq!(seq.format(42), "CLI-0042");
        assert_eq!(seq.format(12345), "CLI-12345");
    }

    #[test]
    fn references_parse_or_explain() {
        assert_eq!(parse_reference("clientId", &None), Ok(None));
        assert_eq!(parse_reference("clientId", &Some(" ".into())), Ok(None));
        let id = Uuid::new_v4();
        assert_eq!(parse_reference("clientId", &Some(id.to_string())), Ok(Some(id)));
        assert_eq!(
            parse_reference("clientId", &Some("CLI-0001".into())).unwrap_err().to_string(),
            "clientId must be a record id"
        );
    }

    #[test]
    fn record_flattens_body() {
        #[derive(Debug, Serialize, Deserialize)]
        struct Body {
            name: String,
        }

        let doc = StoredDocument {
            id: Uuid::new_v4(),
            data: json!({ "name": "x" }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let record = Record::<Body>::try_from(doc.clone()).unwrap();
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], json!(doc.id));
        assert_eq!(value["name"], "x");
        assert!(value.get("createdAt").is_some());
    }
}
