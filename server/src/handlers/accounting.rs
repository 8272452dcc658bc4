use agency_store::{Filter, FindQuery, Sort};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{public, resource_routes};
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::models::{FeeStructure, Invoice, InvoiceStatus, Payment, PaymentKind, PaymentStatus, Record};
use crate::stats::{checked_sum, percentage_change, profit_margin};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(summary))
        .route("/commissions", get(commissions))
        .nest("/transactions", resource_routes::<Payment>())
        .nest("/fee-structures", resource_routes::<FeeStructure>())
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

fn day(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Completed payments of `kind` dated in `[from, to)`.
fn settled(kind: PaymentKind, from: NaiveDate, to: NaiveDate) -> FindQuery {
    FindQuery::new().with_filter(
        Filter::eq("kind", kind.as_str())
            .and(Filter::eq("status", PaymentStatus::Completed.as_str()))
            .and(Filter::gte("date", day(from)))
            .and(Filter::lt("date", day(to))),
    )
}

fn overflow(what: &str) -> ApiError {
    ApiError::internal(anyhow::anyhow!("{what} exceeds the decimal range"))
}

fn total(payments: &[Record<Payment>]) -> ApiResult<Decimal> {
    checked_sum(payments.iter().map(|p| p.body.amount)).ok_or_else(|| overflow("payment total"))
}

fn commission_total(payments: &[Record<Payment>]) -> ApiResult<Decimal> {
    checked_sum(payments.iter().filter_map(|p| p.body.commission)).ok_or_else(|| overflow("commission total"))
}

#[derive(Debug, Serialize)]
pub struct Period {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default, Serialize)]
pub struct InvoiceBucket {
    pub count: u64,
    pub amount: Decimal,
}

#[derive(Debug, Default, Serialize)]
pub struct InvoiceSummary {
    pub pending: InvoiceBucket,
    pub overdue: InvoiceBucket,
    pub paid: InvoiceBucket,
}

impl InvoiceSummary {
    fn from_invoices(invoices: &[Record<Invoice>]) -> ApiResult<Self> {
        let mut summary = Self::default();
        for invoice in invoices {
            let bucket = match invoice.body.status {
                InvoiceStatus::Pending => &mut summary.pending,
                InvoiceStatus::Overdue => &mut summary.overdue,
                InvoiceStatus::Paid => &mut summary.paid,
                InvoiceStatus::Draft | InvoiceStatus::Cancelled => continue,
            };
            bucket.count += 1;
            bucket.amount = bucket
                .amount
                .checked_add(invoice.body.total)
                .ok_or_else(|| overflow("invoice total"))?;
        }
        Ok(summary)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingSummary {
    pub period: Period,
    pub income: Decimal,
    pub previous_income: Decimal,
    pub expenses: Decimal,
    pub net_profit: Decimal,
    pub profit_margin: Decimal,
    pub income_change: String,
    pub invoices: InvoiceSummary,
    pub total_commissions: Decimal,
}

/// GET /api/accounting
/// The current calendar month against the one before it.
pub async fn summary(State(state): State<AppState>, _session: Session) -> ApiResult<Json<AccountingSummary>> {
    let start = month_start(Utc::now().date_naive());
    let next = month_start(start + Duration::days(32));
    let previous = month_start(start - Duration::days(1));

    let payments = state.repo::<Payment>();
    let invoice_repo = state.repo::<Invoice>();
    let current_income = settled(PaymentKind::Income, start, next);
    let current_expenses = settled(PaymentKind::Expense, start, next);
    let last_income = settled(PaymentKind::Income, previous, start);
    let invoices = FindQuery::new().with_filter(Filter::is_in(
        "status",
        [
            InvoiceStatus::Pending.as_str(),
            InvoiceStatus::Overdue.as_str(),
            InvoiceStatus::Paid.as_str(),
        ],
    ));

    let ((income, _), (expenses, _), (previous_income, _), (invoices, _)) = tokio::try_join!(
        payments.find(&current_income),
        payments.find(&current_expenses),
        payments.find(&last_income),
        invoice_repo.find(&invoices),
    )?;

    let income_total = total(&income)?;
    let expense_total = total(&expenses)?;
    let previous_total = total(&previous_income)?;
    let income_change = percentage_change(
        income_total.to_f64().unwrap_or_default(),
        previous_total.to_f64().unwrap_or_default(),
    );

    Ok(Json(AccountingSummary {
        period: Period {
            from: day(start),
            to: day(next),
        },
        income: income_total,
        previous_income: previous_total,
        expenses: expense_total,
        net_profit: income_total
            .checked_sub(expense_total)
            .ok_or_else(|| overflow("net profit"))?,
        profit_margin: profit_margin(income_total, expense_total).ok_or_else(|| overflow("profit margin"))?,
        income_change,
        invoices: InvoiceSummary::from_invoices(&invoices)?,
        total_commissions: commission_total(&income)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CommissionParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Commissions {
    pub transactions: Vec<Value>,
    pub count: usize,
    pub total_commission: Decimal,
}

/// GET /api/accounting/commissions?from=&to=
pub async fn commissions(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(params): ApiQuery<CommissionParams>,
) -> ApiResult<Json<Commissions>> {
    let mut filter = Filter::eq("kind", PaymentKind::Income.as_str())
        .and(Filter::eq("status", PaymentStatus::Completed.as_str()));
    if let Some(from) = params.from.as_deref() {
        filter = filter.and(Filter::gte("date", from));
    }
    if let Some(to) = params.to.as_deref() {
        filter = filter.and(Filter::lt("date", to));
    }
    let query = FindQuery::new()
        .with_filter(filter)
        .sort_by(Sort::desc("date"))
        .sort_by(Sort::newest_first());

    let (records, _) = state.repo::<Payment>().find(&query).await?;
    let earning: Vec<Record<Payment>> = records
        .into_iter()
        .filter(|p| p.body.commission.is_some_and(|c| c > Decimal::ZERO))
        .collect();

    let transactions = earning.iter().map(public).collect::<ApiResult<Vec<_>>>()?;
    Ok(Json(Commissions {
        count: transactions.len(),
        total_commission: commission_total(&earning)?,
        transactions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn month_bounds() {
        assert_eq!(month_start(date("2024-03-17")), date("2024-03-01"));
        assert_eq!(month_start(date("2024-03-01")), date("2024-03-01"));
        let start = date("2024-01-01");
        assert_eq!(month_start(start + Duration::days(32)), date("2024-02-01"));
        assert_eq!(month_start(start - Duration::days(1)), date("2023-12-01"));
        let end_of_month = date("2024-01-31");
        assert_eq!(month_start(month_start(end_of_month) + Duration::days(32)), date("2024-02-01"));
    }

    #[test]
    fn invoice_buckets_skip_drafts() {
        let now = Utc::now();
        let record = |status: InvoiceStatus, total: i64| Record {
            id: uuid::Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            body: Invoice {
                status,
                total: Decimal::new(total, 0),
                ..Invoice::default()
            },
        };
        let summary = InvoiceSummary::from_invoices(&[
            record(InvoiceStatus::Pending, 100),
            record(InvoiceStatus::Pending, 50),
            record(InvoiceStatus::Paid, 20),
            record(InvoiceStatus::Draft, 999),
        ])
        .unwrap();
        assert_eq!(summary.pending.count, 2);
        assert_eq!(summary.pending.amount, Decimal::new(150, 0));
        assert_eq!(summary.paid.count, 1);
        assert_eq!(summary.overdue.count, 0);
    }

    #[test]
    fn stored_totals_that_overflow_are_errors() {
        let now = Utc::now();
        let payment = |amount: Decimal| Record {
            id: uuid::Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            body: Payment {
                amount,
                commission: Some(amount),
                ..Payment::default()
            },
        };
        let huge = "50000000000000000000000000000".parse().unwrap();
        let payments = [payment(huge), payment(huge)];
        assert!(matches!(total(&payments), Err(ApiError::Internal(_))));
        assert!(matches!(commission_total(&payments), Err(ApiError::Internal(_))));
        assert_eq!(total(&payments[..1]).unwrap(), huge);
    }
}
