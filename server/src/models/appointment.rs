use agency_store::{Collection, Filter, Sort};
use serde::{Deserialize, Serialize};

use super::{collections, parse_reference, Reference, Resource};
use crate::error::{ApiError, ApiResult};
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in-progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no-show",
        }
    }

    pub fn can_become(self, next: AppointmentStatus) -> bool {
        use AppointmentStatus::*;

        self == next
            || matches!(
                (self, next),
                (Scheduled, Confirmed)
                    | (Confirmed, InProgress)
                    | (InProgress, Completed)
                    | (Scheduled | Confirmed | InProgress, Cancelled)
                    | (Scheduled | Confirmed, NoShow)
            )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    #[default]
    Consultation,
    FollowUp,
    DocumentReview,
    Interview,
    Biometrics,
    Other,
}

/// A booking for either a client or a patient, referenced by record id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Appointment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<String>,
    pub provider: String,
    pub date: String,
    pub time: String,
    pub duration: u32,
    pub appointment_type: AppointmentType,
    pub status: AppointmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Default for Appointment {
    fn default() -> Self {
        Self {
            client_id: None,
            patient_id: None,
            provider: String::new(),
            date: String::new(),
            time: String::new(),
            duration: 30,
            appointment_type: AppointmentType::default(),
            status: AppointmentStatus::default(),
            notes: None,
        }
    }
}

impl Resource for Appointment {
    const COLLECTION: Collection = collections::APPOINTMENTS;
    const NAME: &'static str = "Appointment";
    const SEARCH_FIELDS: &'static [&'static str] = &["provider", "notes", "appointmentType", "status"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::desc("date"), Sort::desc("time")]
    }

    fn list_filter(params: &ListParams) -> Filter {
        let mut filter = Filter::all();
        if let Some(status) = &params.status {
            filter = filter.and(Filter::eq("status", status.as_str()));
        }
        if let Some(date) = &params.date {
            filter = filter.and(Filter::eq("date", date.as_str()));
        }
        if let Some(from) = &params.from {
            filter = filter.and(Filter::gte("date", from.as_str()));
        }
        if let Some(to) = &params.to {
            filter = filter.and(Filter::lt("date", to.as_str()));
        }
        if let Some(client_id) = &params.client_id {
            filter = filter.and(Filter::eq("clientId", client_id.as_str()));
        }
        if let Some(patient_id) = &params.patient_id {
            filter = filter.and(Filter::eq("patientId", patient_id.as_str()));
        }
        filter
    }

    fn validate(&self) -> Result<(), ValidationError> {
        let client = parse_reference("clientId", &self.client_id)?;
        let patient = parse_reference("patientId", &self.patient_id)?;
        Validator::new()
            .check(
                client.is_some() != patient.is_some(),
                "clientId",
                "or patientId is required, but not both",
            )
            .required("provider", &self.provider)
            .required("date", &self.date)
            .date("date", &self.date)
            .required("time", &self.time)
            .time("time", &self.time)
            .check(self.duration > 0, "duration", "must be greater than zero")
            .finish()
    }

    fn check_update(&self, previous: &Self) -> ApiResult<()> {
        if previous.status.can_become(self.status) {
            Ok(())
        } else {
            Err(ApiError::bad_request(format!(
                "Cannot change appointment status from {} to {}",
                previous.status.as_str(),
                self.status.as_str()
            )))
        }
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        if let Ok(Some(id)) = parse_reference("clientId", &self.client_id) {
            refs.push(Reference::new("clientId", collections::CLIENTS, id));
        }
        if let Ok(Some(id)) = parse_reference("patientId", &self.patient_id) {
            refs.push(Reference::new("patientId", collections::PATIENTS, id));
        }
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;
    use AppointmentStatus::*;

    #[test]
    fn status_lifecycle() {
        assert!(Scheduled.can_become(Confirmed));
        assert!(Confirmed.can_become(InProgress));
        assert!(InProgress.can_become(Completed));
        assert!(Scheduled.can_become(Cancelled));
        assert!(Confirmed.can_become(NoShow));
        assert!(Completed.can_become(Completed));

        assert!(!Completed.can_become(Scheduled));
        assert!(!Cancelled.can_become(Confirmed));
        assert!(!InProgress.can_become(NoShow));
        assert!(!Scheduled.can_become(Completed));
    }

    #[test]
    fn defaults_and_subject() {
        let appt: Appointment = serde_json::from_value(json!({
            "clientId": Uuid::new_v4().to_string(),
            "provider": "Dr. Khan",
            "date": "2024-06-01",
            "time": "10:30"
        }))
        .unwrap();
        assert_eq!(appt.duration, 30);
        assert_eq!(appt.status, Scheduled);
        assert!(appt.validate().is_ok());
        assert_eq!(appt.references().len(), 1);

        let mut both = appt.clone();
        both.patient_id = Some(Uuid::new_v4().to_string());
        assert_eq!(both.validate().unwrap_err().field, "clientId");

        let mut neither = appt;
        neither.client_id = None;
        assert!(neither.validate().is_err());
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(serde_json::to_value(InProgress).unwrap(), json!("in-progress"));
        assert_eq!(serde_json::to_value(NoShow).unwrap(), json!("no-show"));
    }
}
