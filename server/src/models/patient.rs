use agency_store::{Collection, Filter, Sort};
use serde::{Deserialize, Serialize};

use super::{collections, Address, EmergencyContact, Gender, RecordStatus, Resource, Sequence};
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Patient {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blood_type: Option<String>,
    pub medical_history: Vec<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_doctor: Option<String>,
    #[serde(flatten)]
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub status: RecordStatus,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Resource for Patient {
    const COLLECTION: Collection = collections::PATIENTS;
    const NAME: &'static str = "Patient";
    const SEARCH_FIELDS: &'static [&'static str] = &["firstName", "lastName", "email", "phone", "patientId"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["patientId"];
    const SEQUENCE: Option<Sequence> = Some(Sequence::new("PAT"));

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("lastName"), Sort::asc("firstName")]
    }

    fn list_filter(params: &ListParams) -> Filter {
        match params.status.as_deref() {
            Some(status) => Filter::eq("status", status),
            None => Filter::all(),
        }
    }

    fn display_id_mut(&mut self) -> Option<&mut Option<String>> {
        Some(&mut self.patient_id)
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
            .one_of("bloodType", &self.blood_type, BLOOD_TYPES)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blood_type_is_checked() {
        let mut patient: Patient = serde_json::from_value(json!({
            "firstName": "Omar",
            "lastName": "Ali",
            "email": "omar@x.com",
            "phone": "555",
            "dateOfBirth": "1980-05-05",
            "gender": "male",
            "bloodType": "O+"
        }))
        .unwrap();
        assert!(patient.validate().is_ok());

        patient.blood_type = Some("C".into());
        assert_eq!(patient.validate().unwrap_err().field, "bloodType");
    }
}
