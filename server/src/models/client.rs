use agency_store::{Collection, Filter};
use serde::{Deserialize, Serialize};

use super::{collections, Address, EmergencyContact, Gender, RecordStatus, Resource, Sequence};
use crate::error::ApiResult;
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Client {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_expiry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visa_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visa_application_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
    pub special_requirements: Vec<String>,
    pub previous_applications: Vec<String>,
    pub travel_history: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: RecordStatus,
}

impl Client {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Resource for Client {
    const COLLECTION: Collection = collections::CLIENTS;
    const NAME: &'static str = "Client";
    const SEARCH_FIELDS: &'static [&'static str] = &["firstName", "lastName", "email", "clientId"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["clientId"];
    const SEQUENCE: Option<Sequence> = Some(Sequence::new("CLI"));

    fn list_filter(params: &ListParams) -> Filter {
        match params.status.as_deref() {
            Some(status) => Filter::eq("status", status),
            None => Filter::all(),
        }
    }

    fn display_id_mut(&mut self) -> Option<&mut Option<String>> {
        Some(&mut self.client_id)
    }

    fn prepare(&mut self) -> ApiResult<()> {
        self.email = self.email.trim().to_string();
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("firstName", &self.first_name)
            .required("lastName", &self.last_name)
            .required("email", &self.email)
            .email("email", &self.email)
            .required("phone", &self.phone)
            .required("dateOfBirth", &self.date_of_birth)
            .date("dateOfBirth", &self.date_of_birth)
            .required_opt("gender", &self.gender)
            .optional_date("passportExpiry", &self.passport_expiry)
            .optional_date("visaApplicationDate", &self.visa_application_date)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jane() -> Client {
        serde_json::from_value(json!({
            "firstName": "Jane",
            "lastName": "Doe",
            "email": "jane@x.com",
            "phone": "555",
            "dateOfBirth": "1990-01-01",
            "gender": "female",
            "city": "Dubai"
        }))
        .unwrap()
    }

    #[test]
    fn deserializes_flat_address() {
        let client = jane();
        assert_eq!(client.address.city.as_deref(), Some("Dubai"));
        assert_eq!(client.status, RecordStatus::Active);
        assert!(client.validate().is_ok());

        let value = serde_json::to_value(&client).unwrap();
        assert_eq!(value["city"], "Dubai");
        assert!(value.get("clientId").is_none());
    }

    #[test]
    fn required_fields() {
        let mut client = jane();
        client.phone = String::new();
        assert_eq!(client.validate().unwrap_err().field, "phone");

        let mut client = jane();
        client.gender = None;
        assert_eq!(client.validate().unwrap_err().to_string(), "gender is required");

        let mut client = jane();
        client.email = "not-an-email".into();
        assert_eq!(client.validate().unwrap_err().field, "email");
    }
}
