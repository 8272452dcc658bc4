use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use super::resource::{parse_id, public, resource_routes};
use crate::auth::Session;
use crate::error::ApiResult;
use crate::extract::{ApiJson, ApiPath};
use crate::models::visa::StatusChange;
use crate::models::{VisaApplication, VisaStatus};
use crate::workflow::check_transition;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    resource_routes::<VisaApplication>().route("/:id/transition", post(transition))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub to: VisaStatus,
    pub note: Option<String>,
}

/// POST /api/visa-applications/:id/transition
pub async fn transition(
    State(state): State<AppState>,
    session: Session,
    ApiPath(id): ApiPath<String>,
    ApiJson(request): ApiJson<TransitionRequest>,
) -> ApiResult<Json<Value>> {
    let repo = state.repo::<VisaApplication>();
    let id = parse_id::<VisaApplication>(&id)?;
    let mut application = repo.get_or_404(id).await?.body;

    let from = application.status;
    if let Err(err) = check_transition(from, request.to, session.role) {
        tracing::warn!("Visa application {} transition refused: {}", id, err);
        return Err(err.into());
    }

    let now = Utc::now();
    let today = now.date_naive().format("%Y-%m-%d").to_string();
    match request.to {
        VisaStatus::Submitted => application.submission_date = Some(today),
        VisaStatus::Approved | VisaStatus::Rejected => application.decision_date = Some(today),
        VisaStatus::Draft => application.decision_date = None,
        VisaStatus::UnderReview | VisaStatus::Locked => {}
    }
    application.status = request.to;
    application.history.push(StatusChange {
        from,
        to: request.to,
        by: session.user_id.to_string(),
        at: now,
        note: request.note.filter(|n| !n.trim().is_empty()),
    });

    let record = repo.save(id, &application).await?;
    tracing::info!(
        "✓ Visa application {} moved from {} to {}",
        id,
        from.as_str(),
        request.to.as_str()
    );
    Ok(Json(public(&record)?))
}
