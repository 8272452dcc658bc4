use agency_store::{Collection, Filter, Sort};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{collections, parse_reference, Reference, Resource};
use crate::pagination::ListParams;
use crate::validation::{ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    #[default]
    Income,
    Expense,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Income => "income",
            PaymentKind::Expense => "expense",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentMethod {
    #[default]
    Cash,
    Card,
    BankTransfer,
    Cheque,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    #[default]
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

/// Money in or out of the agency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Payment {
    pub kind: PaymentKind,
    pub amount: Decimal,
    pub date: String,
    pub method: PaymentMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Amount earned by the agency on this payment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<Decimal>,
    pub status: PaymentStatus,
}

impl Resource for Payment {
    const COLLECTION: Collection = collections::PAYMENTS;
    const NAME: &'static str = "Transaction";
    const SEARCH_FIELDS: &'static [&'static str] = &["description", "category", "reference"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::desc("date"), Sort::newest_first()]
    }

    fn list_filter(params: &ListParams) -> Filter {
        let mut filter = Filter::all();
        if let Some(kind) = &params.kind {
            filter = filter.and(Filter::eq("kind", kind.as_str()));
        }
        if let Some(status) = &params.status {
            filter = filter.and(Filter::eq("status", status.as_str()));
        }
        if let Some(client_id) = &params.client_id {
            filter = filter.and(Filter::eq("clientId", client_id.as_str()));
        }
        if let Some(from) = &params.from {
            filter = filter.and(Filter::gte("date", from.as_str()));
        }
        if let Some(to) = &params.to {
            filter = filter.and(Filter::lt("date", to.as_str()));
        }
        filter
    }

    fn validate(&self) -> Result<(), ValidationError> {
        parse_reference("invoiceId", &self.invoice_id)?;
        parse_reference("clientId", &self.client_id)?;
        let mut validator = Validator::new()
            .positive("amount", self.amount)
            .within_limit("amount", self.amount)
            .required("date", &self.date)
            .date("date", &self.date);
        if let Some(commission) = self.commission {
            validator = validator
                .non_negative("commission", commission)
                .check(commission <= self.amount, "commission", "must not exceed amount");
        }
        validator.finish()
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        if let Ok(Some(id)) = parse_reference("invoiceId", &self.invoice_id) {
            refs.push(Reference::new("invoiceId", collections::INVOICES, id));
        }
        if let Ok(Some(id)) = parse_reference("clientId", &self.client_id) {
            refs.push(Reference::new("clientId", collections::CLIENTS, id));
        }
        refs
    }
}

/// Published price for a visa service in a destination country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeeStructure {
    pub name: String,
    pub visa_type: String,
    pub country: String,
    pub government_fee: Decimal,
    pub service_fee: Decimal,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<String>,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for FeeStructure {
    fn default() -> Self {
        Self {
            name: String::new(),
            visa_type: String::new(),
            country: String::new(),
            government_fee: Decimal::ZERO,
            service_fee: Decimal::ZERO,
            currency: "USD".to_string(),
            processing_time: None,
            active: true,
            description: None,
        }
    }
}

impl Resource for FeeStructure {
    const COLLECTION: Collection = collections::FEE_STRUCTURES;
    const NAME: &'static str = "Fee structure";
    const SEARCH_FIELDS: &'static [&'static str] = &["name", "visaType", "country"];

    fn default_sort() -> Vec<Sort> {
        vec![Sort::asc("country"), Sort::asc("visaType")]
    }

    fn list_filter(params: &ListParams) -> Filter {
        match params.status.as_deref() {
            Some("active") => Filter::eq("active", true),
            Some("inactive") => Filter::eq("active", false),
            _ => Filter::all(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Validator::new()
            .required("name", &self.name)
            .required("visaType", &self.visa_type)
            .required("country", &self.country)
            .non_negative("governmentFee", self.government_fee)
            .within_limit("governmentFee", self.government_fee)
            .non_negative("serviceFee", self.service_fee)
            .within_limit("serviceFee", self.service_fee)
            .required("currency", &self.currency)
            .finish()
    }
}
