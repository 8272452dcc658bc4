use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::resource::public;
use crate::auth::password::verify_password;
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::{Resource, User};
use crate::validation::ValidationError;
use crate::AppState;

/// Fields a user may change on their own profile.
const EDITABLE_FIELDS: &[&str] = &["name", "email", "phone", "specialization"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(show).put(update))
        .route("/password", put(change_password))
}

/// GET /api/profile
pub async fn show(State(state): State<AppState>, session: Session) -> ApiResult<Json<Value>> {
    let user = state.repo::<User>().get_or_404(session.user_id).await?;
    Ok(Json(public(&user)?))
}

/// PUT /api/profile
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let Value::Object(changes) = changes else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };
    let allowed: Map<String, Value> = changes
        .into_iter()
        .filter(|(key, _)| EDITABLE_FIELDS.contains(&key.as_str()))
        .collect();

    let user = state
        .repo::<User>()
        .update(session.user_id, Value::Object(allowed))
        .await?;
    Ok(Json(public(&user)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

/// PUT /api/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    session: Session,
    ApiJson(change): ApiJson<PasswordChange>,
) -> ApiResult<Json<Value>> {
    let repo = state.repo::<User>();
    let mut user = repo.get_or_404(session.user_id).await?.body;

    let current_ok = user
        .password_hash
        .as_deref()
        .is_some_and(|hash| verify_password(&change.current_password, hash));
    if !current_ok {
        tracing::warn!("Password change refused for user {}", session.user_id);
        return Err(ValidationError::new("currentPassword", "is incorrect").into());
    }

    user.password = Some(change.new_password);
    user.prepare().map_err(|err| match err {
        ApiError::Validation(e) if e.field == "password" => ValidationError::new("newPassword", e.message).into(),
        other => other,
    })?;
    repo.save(session.user_id, &user).await?;

    tracing::info!("✓ Password changed for user {}", session.user_id);
    Ok(Json(json!({ "message": "Password updated successfully" })))
}
