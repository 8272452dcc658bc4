//! Reference material for agents: country rules, procedures, training notes
//! and advice for avoiding refusals.

use agency_store::{Collection, Filter, Sort};
use serde::{Deserialize, Serialize};

use super::{collections, Resource};
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VisaKnowledge {
    pub country: String,
    pub visa_type: String,
    pub title: String,
    pub content: String,
    pub requirements: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    pub tags: Vec<String>,
}

impl Resource for VisaKnowledge {
    const COLLECTION: Collection = collections::VISA_KNOWLEDGE;
    const NAME: &'static str = "Visa knowledge entry";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "country", "visaType", "content"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("country"), Sort::asc("title")]
    }

    fn list_filter(params: &ListParams) -> Filter {
        match params.kind.as_deref() {
            Some(visa_type) => Filter::eq("visaType", visa_type),
            None => Filter::all(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("country", &self.country)
            .required("visaType", &self.visa_type)
            .required("title", &self.title)
            .required("content", &self.content)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SopDocument {
    pub title: String,
    pub category: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub tags: Vec<String>,
}

impl Resource for SopDocument {
    const COLLECTION: Collection = collections::SOP_DOCUMENTS;
    const NAME: &'static str = "SOP document";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "category", "content"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("category"), Sort::asc("title")]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("title", &self.title)
            .required("category", &self.category)
            .required("content", &self.content)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LearningGuideline {
    pub title: String,
    pub topic: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl Resource for LearningGuideline {
    const COLLECTION: Collection = collections::LEARNING_GUIDELINES;
    const NAME: &'static str = "Learning guideline";
    const SEARCH_FIELDS: &'static [&'static str] = &["title", "topic", "content"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("topic"), Sort::asc("title")]
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("title", &self.title)
            .required("topic", &self.topic)
            .required("content", &self.content)
            .one_of(
                "level",
                &self.level,
                &["beginner", "intermediate", "advanced"],
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RejectionTip {
    pub reason: String,
    pub tip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visa_type: Option<String>,
}

impl Resource for RejectionTip {
    const COLLECTION: Collection = collections::REJECTION_TIPS;
    const NAME: &'static str = "Rejection tip";
    const SEARCH_FIELDS: &'static [&'static str] = &["reason", "tip", "country"];

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("reason", &self.reason)
            .required("tip", &self.tip)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_content() {
        let entry = VisaKnowledge {
            country: "UK".into(),
            visa_type: "tourist".into(),
            title: "Standard visitor".into(),
            ..Default::default()
        };
        assert_eq!(entry.validate().unwrap_err().field, "content");

        let guideline = LearningGuideline {
            title: "Interviews".into(),
            topic: "consular".into(),
            content: "Be concise".into(),
            level: Some("expert".into()),
        };
        assert_eq!(guideline.validate().unwrap_err().field, "level");
    }
}
