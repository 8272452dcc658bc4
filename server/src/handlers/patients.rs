use agency_store::{Filter, FindQuery};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{public, resource_routes};
use crate::auth::Session;
use crate::error::ApiResult;
use crate::extract::ApiQuery;
use crate::models::{Patient, Resource};
use crate::AppState;

const DEFAULT_SEARCH_LIMIT: u64 = 10;
const MAX_SEARCH_LIMIT: u64 = 50;

pub fn routes() -> Router<AppState> {
    resource_routes::<Patient>().route("/search", get(search))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub patients: Vec<Value>,
    pub count: usize,
}

/// GET /api/patients/search?q=&limit=
/// Quick lookup for pickers. A blank query returns nothing rather than
/// every patient.
pub async fn search(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<Json<SearchResults>> {
    let term = params.q.as_deref().unwrap_or("").trim();
    if term.is_empty() {
        return Ok(Json(SearchResults {
            patients: Vec::new(),
            count: 0,
        }));
    }

    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);
    let query = FindQuery::new()
        .with_filter(Filter::search(Patient::SEARCH_FIELDS, term))
        .with_sorts(Patient::default_sort())
        .with_limit(limit);

    let (records, _) = state.repo::<Patient>().find(&query).await?;
    let patients = records.iter().map(public).collect::<ApiResult<Vec<_>>>()?;

    tracing::debug!("✓ Patient search '{}' returned {}", term, patients.len());
    Ok(Json(SearchResults {
        count: patients.len(),
        patients,
    }))
}
