use agency_store::{Collection, Filter};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{collections, parse_reference, Reference, Resource, Sequence};
use crate::error::{ApiError, ApiResult};
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

/// Case workflow state of a visa application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisaStatus {
    #[default]
    Draft,
    Submitted,
    UnderReview,
    Locked,
    Approved,
    Rejected,
}

impl VisaStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaStatus::Draft => "draft",
            VisaStatus::Submitted => "submitted",
            VisaStatus::UnderReview => "under-review",
            VisaStatus::Locked => "locked",
            VisaStatus::Approved => "approved",
            VisaStatus::Rejected => "rejected",
        }
    }

    /// Field edits are refused in these states.
    pub fn is_frozen(&self) -> bool {
        matches!(self, VisaStatus::Locked | VisaStatus::Approved | VisaStatus::Rejected)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub from: VisaStatus,
    pub to: VisaStatus,
    pub by: String,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisaApplication {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub application_number: Option<String>,
    pub client_id: Option<String>,
    pub visa_type: String,
    pub destination_country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Decimal>,
    pub status: VisaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub history: Vec<StatusChange>,
}

impl Resource for VisaApplication {
    const COLLECTION: Collection = collections::VISA_APPLICATIONS;
    const NAME: &'static str = "Visa application";
    const SEARCH_FIELDS: &'static [&'static str] =
        &["applicationNumber", "visaType", "destinationCountry", "status"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["applicationNumber", "status", "history"];
    const SEQUENCE: Option<Sequence> = Some(Sequence::new("VA"));

    fn list_filter(params: &ListParams) -> Filter {
        let mut filter = Filter::all();
        if let Some(status) = &params.status {
            filter = filter.and(Filter::eq("status", status.as_str()));
        }
        if let Some(client_id) = &params.client_id {
            filter = filter.and(Filter::eq("clientId", client_id.as_str()));
        }
        filter
    }

    fn display_id_mut(&mut self) -> Option<&mut Option<String>> {
        Some(&mut self.application_number)
    }

    fn on_create(&mut self) {
        self.status = VisaStatus::Draft;
        self.history.clear();
    }

    fn validate(&self) -> Result<(), ValidationError> {
        parse_reference("clientId", &self.client_id)?;
        let mut validator = Validator::new()
            .required_opt("clientId", &self.client_id)
            .required("visaType", &self.visa_type)
            .required("destinationCountry", &self.destination_country)
            .optional_date("submissionDate", &self.submission_date)
            .optional_date("decisionDate", &self.decision_date);
        if let Some(fee) = self.fee {
            validator = validator.non_negative("fee", fee);
        }
        validator.finish()
    }

    fn check_update(&self, previous: &Self) -> ApiResult<()> {
        if previous.status.is_frozen() && self != previous {
            return Err(ApiError::bad_request(format!(
                "Visa application is {} and cannot be edited",
                previous.status.as_str()
            )));
        }
        Ok(())
    }

    fn references(&self) -> Vec<Reference> {
        match parse_reference("clientId", &self.client_id) {
            Ok(Some(id)) => vec![Reference::new("clientId", collections::CLIENTS, id)],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn application() -> VisaApplication {
        serde_json::from_value(json!({
            "clientId": Uuid::new_v4().to_string(),
            "visaType": "student",
            "destinationCountry": "Canada",
            "status": "approved"
        }))
        .unwrap()
    }

    #[test]
    fn creation_starts_in_draft() {
        let mut app = application();
        app.on_create();
        assert_eq!(app.status, VisaStatus::Draft);
        assert!(app.validate().is_ok());
    }

    #[test]
    fn frozen_applications_refuse_edits() {
        let mut previous = application();
        previous.status = VisaStatus::Locked;

        let unchanged = previous.clone();
        assert!(unchanged.check_update(&previous).is_ok());

        let mut edited = previous.clone();
        edited.notes = Some("late edit".into());
        assert!(matches!(edited.check_update(&previous), Err(ApiError::BadRequest(_))));

        previous.status = VisaStatus::UnderReview;
        assert!(edited.check_update(&previous).is_ok());
    }
}
