use agency_store::{Filter, StoredDocument};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::{collections, Settings};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/", get(show).put(update))
}

/// Objects merge key by key; anything else in `changes` replaces the target.
pub fn merge(target: &mut Value, changes: Value) {
    match (target, changes) {
        (Value::Object(target), Value::Object(changes)) => {
            for (key, value) in changes {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => merge(existing, value),
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, changes) => *target = changes,
    }
}

async fn stored(state: &AppState, session: &Session) -> ApiResult<Option<StoredDocument>> {
    Ok(state
        .store
        .find_one(&collections::SETTINGS, &Filter::eq("ownerId", session.user_id.to_string()))
        .await?)
}

/// GET /api/settings
pub async fn show(State(state): State<AppState>, session: Session) -> ApiResult<Json<Settings>> {
    let settings = match stored(&state, &session).await? {
        Some(doc) => serde_json::from_value(doc.data).map_err(ApiError::internal)?,
        None => Settings {
            owner_id: Some(session.user_id.to_string()),
            ..Settings::default()
        },
    };
    Ok(Json(settings))
}

/// PUT /api/settings
/// Merges the payload over the caller's settings and upserts the result.
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiJson(changes): ApiJson<Value>,
) -> ApiResult<Json<Settings>> {
    if !changes.is_object() {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    }
    let existing = stored(&state, &session).await?;
    let mut merged = match &existing {
        Some(doc) => doc.data.clone(),
        None => serde_json::to_value(Settings::default()).map_err(ApiError::internal)?,
    };
    merge(&mut merged, changes);

    let mut settings: Settings =
        serde_json::from_value(merged).map_err(|e| ApiError::bad_request(format!("Invalid settings: {e}")))?;
    settings.owner_id = Some(session.user_id.to_string());
    settings.validate()?;

    let data = serde_json::to_value(&settings).map_err(ApiError::internal)?;
    match existing {
        Some(doc) => {
            state
                .store
                .replace(&collections::SETTINGS, doc.id, data)
                .await?
                .ok_or(ApiError::NotFound("Settings"))?;
        }
        None => {
            state.store.insert(&collections::SETTINGS, data).await?;
        }
    }

    tracing::info!("✓ Settings saved for user {}", session.user_id);
    Ok(Json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_recursive() {
        let mut target = json!({
            "theme": "light",
            "notifications": { "email": true, "sms": false }
        });
        merge(&mut target, json!({ "theme": "dark", "notifications": { "sms": true } }));
        assert_eq!(
            target,
            json!({
                "theme": "dark",
                "notifications": { "email": true, "sms": true }
            })
        );
    }

    #[test]
    fn non_objects_replace() {
        let mut target = json!({ "notifications": { "email": true } });
        merge(&mut target, json!({ "notifications": null }));
        assert_eq!(target, json!({ "notifications": null }));
    }
}
