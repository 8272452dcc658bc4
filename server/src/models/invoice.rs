use agency_store::{Collection, Filter, Sort};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{collections, parse_reference, Reference, Resource, Sequence};
use crate::error::ApiResult;
use crate::pagination::ListParams;
use crate::stats::checked_sum;
use crate::validation::{parse_date, ValidationError, Validator};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Invoice {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    pub client_id: Option<String>,
    pub issue_date: String,
    pub due_date: String,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Resource for Invoice {
    const COLLECTION: Collection = collections::INVOICES;
    const NAME: &'static str = "Invoice";
    const SEARCH_FIELDS: &'static [&'static str] = &["invoiceNumber", "status", "notes"];
    const IMMUTABLE_FIELDS: &'static [&'static str] = &["invoiceNumber"];
    const SEQUENCE: Option<Sequence> = Some(Sequence::new("INV").keep_supplied());

    fn default_sort() -> Vec<Sort> {
        vec![Sort::desc("issueDate"), Sort::newest_first()]
    }

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
        Some(&mut self.invoice_number)
    }

    /// Line amounts and totals are always derived from quantities and prices.
    fn prepare(&mut self) -> ApiResult<()> {
        let too_large = |field: &str| ValidationError::new(field, "is too large");
        for item in &mut self.items {
            item.amount = item
                .quantity
                .checked_mul(item.unit_price)
                .ok_or_else(|| too_large("items.quantity"))?
                .round_dp(2);
        }
        self.subtotal = checked_sum(self.items.iter().map(|item| item.amount)).ok_or_else(|| too_large("items"))?;
        self.total = self.subtotal.checked_add(self.tax).ok_or_else(|| too_large("total"))?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        parse_reference("clientId", &self.client_id)?;
        let mut validator = Validator::new()
            .required_opt("clientId", &self.client_id)
            .required("issueDate", &self.issue_date)
            .date("issueDate", &self.issue_date)
            .required("dueDate", &self.due_date)
            .date("dueDate", &self.due_date)
            .check(!self.items.is_empty(), "items", "must contain at least one item")
            .non_negative("tax", self.tax)
            .within_limit("tax", self.tax)
            .within_limit("total", self.total);

        if let (Some(issued), Some(due)) = (parse_date(&self.issue_date), parse_date(&self.due_date)) {
            validator = validator.check(due >= issued, "dueDate", "must not be before issueDate");
        }
        for item in &self.items {
            validator = validator
                .required("items.description", &item.description)
                .positive("items.quantity", item.quantity)
                .within_limit("items.quantity", item.quantity)
                .non_negative("items.unitPrice", item.unit_price)
                .within_limit("items.unitPrice", item.unit_price);
        }
        validator.finish()
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
    use crate::error::ApiError;
    use serde_json::json;
    use uuid::Uuid;

    fn invoice() -> Invoice {
        serde_json::from_value(json!({
            "clientId": Uuid::new_v4().to_string(),
            "issueDate": "2024-05-01",
            "dueDate": "2024-05-31",
            "tax": "5.00",
            "items": [
                { "description": "Visa service", "quantity": 2, "unitPrice": "150.25" },
                { "description": "Courier", "quantity": "1", "unitPrice": 20, "amount": 999 }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn totals_are_recomputed() {
        let mut inv = invoice();
        inv.prepare().unwrap();

        assert_eq!(inv.items[0].amount, Decimal::new(30050, 2));
        assert_eq!(inv.items[1].amount, Decimal::from(20));
        assert_eq!(inv.subtotal, Decimal::new(32050, 2));
        assert_eq!(inv.total, Decimal::new(32550, 2));
        assert!(inv.validate().is_ok());
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let mut inv = invoice();
        inv.items[0].quantity = Decimal::MAX;
        let err = inv.prepare().unwrap_err();
        assert!(matches!(err, ApiError::Validation(ref v) if v.field == "items.quantity"));

        let mut inv = invoice();
        inv.items[0].quantity = Decimal::from(crate::validation::MAX_AMOUNT) + Decimal::ONE;
        inv.items[0].unit_price = Decimal::ONE;
        inv.prepare().unwrap();
        assert_eq!(inv.validate().unwrap_err().field, "items.quantity");
    }

    #[test]
    fn due_date_follows_issue_date() {
        let mut inv = invoice();
        inv.due_date = "2024-04-01".into();
        assert_eq!(inv.validate().unwrap_err().field, "dueDate");
    }

    #[test]
    fn needs_items() {
        let mut inv = invoice();
        inv.items.clear();
        assert_eq!(inv.validate().unwrap_err().field, "items");
    }
}
