use axum::extract::State;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::resource::{public_page, resource_routes};
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiQuery;
use crate::models::{LearningGuideline, RejectionTip, Resource, SopDocument, VisaKnowledge};
use crate::pagination::{ListParams, Paginated};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/visa", resource_routes::<VisaKnowledge>())
        .nest("/sop", resource_routes::<SopDocument>())
        .nest("/guidelines", resource_routes::<LearningGuideline>())
        .nest("/rejection-tips", resource_routes::<RejectionTip>())
}

#[derive(Debug, Deserialize)]
pub struct HelpParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct HelpResults {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub results: Paginated<Value>,
}

async fn lookup<T: Resource>(state: &AppState, params: &ListParams) -> ApiResult<Paginated<Value>> {
    public_page(state.repo::<T>().list(params, state.max_page_size).await?)
}

/// GET /api/knowledge-help?type=visa|sop|guidelines|rejection-tips&q=
pub async fn help(
    State(state): State<AppState>,
    _session: Session,
    ApiQuery(params): ApiQuery<HelpParams>,
) -> ApiResult<Json<HelpResults>> {
    let kind = params
        .kind
        .ok_or_else(|| ApiError::bad_request("Query parameter 'type' is required"))?;
    let list = ListParams {
        q: params.q,
        page: params.page,
        limit: params.limit,
        ..ListParams::default()
    };

    let results = match kind.as_str() {
        "visa" => lookup::<VisaKnowledge>(&state, &list).await?,
        "sop" => lookup::<SopDocument>(&state, &list).await?,
        "guidelines" => lookup::<LearningGuideline>(&state, &list).await?,
        "rejection-tips" => lookup::<RejectionTip>(&state, &list).await?,
        other => return Err(ApiError::bad_request(format!("Unknown knowledge type '{other}'"))),
    };
    Ok(Json(HelpResults { kind, results }))
}
