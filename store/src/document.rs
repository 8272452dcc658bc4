use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A named group of documents, plus the fields whose values must be unique
/// within it. Uniqueness is case-insensitive and only applies to string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Collection {
    pub name: &'static str,
    pub unique: &'static [&'static str],
}

impl Collection {
    pub const fn new(name: &'static str) -> Self {
        Self { name, unique: &[] }
    }

    pub const fn with_unique(mut self, fields: &'static [&'static str]) -> Self {
        self.unique = fields;
        self
    }

    /// Name of the partial unique index backing `field` in Postgres.
    pub fn unique_index_name(&self, field: &str) -> String {
        format!("documents_{}_{}_key", self.name, field.to_ascii_lowercase())
    }
}

/// A document as persisted: opaque primary key, JSON body and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    pub id: Uuid,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    /// Lowercased string value of `field`, the key unique constraints compare on.
    pub fn unique_key(&self, field: &str) -> Option<String> {
        unique_key(&self.data, field)
    }
}

pub(crate) fn unique_key(data: &Value, field: &str) -> Option<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unique_key_is_case_insensitive_and_string_only() {
        let doc = StoredDocument {
            id: Uuid::new_v4(),
            data: json!({ "email": "Jane@X.com", "count": 3 }),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        assert_eq!(doc.unique_key("email").as_deref(), Some("jane@x.com"));
        assert_eq!(doc.unique_key("count"), None);
        assert_eq!(doc.unique_key("missing"), None);
    }

    #[test]
    fn index_names_are_stable() {
        const CLIENTS: Collection = Collection::new("clients").with_unique(&["email", "clientId"]);
        assert_eq!(CLIENTS.unique_index_name("clientId"), "documents_clients_clientid_key");
    }
}
