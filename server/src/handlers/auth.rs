use agency_store::Filter;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;

use super::resource::public;
use crate::auth::password::{generate_otp, hash_password, verify_password};
use crate::auth::session::{purge_expired_revocations, revoke};
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::models::{Record, User};
use crate::AppState;

const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    pub otp: Option<String>,
}

async fn credentials_match(state: &AppState, request: &LoginRequest) -> ApiResult<Option<Record<User>>> {
    let email = request.email.trim().to_lowercase();
    let user = state
        .repo::<User>()
        .find_one(&Filter::eq("email", email.as_str()))
        .await?;
    Ok(user.filter(|user| {
        user.body.active
            && user
                .body
                .password_hash
                .as_deref()
                .is_some_and(|hash| verify_password(&request.password, hash))
    }))
}

/// POST /api/auth/login
/// Users with two-factor enabled get a one-time code on the first call and
/// must repeat the call with `otp`.
pub async fn login(State(state): State<AppState>, ApiJson(request): ApiJson<LoginRequest>) -> ApiResult<Response> {
    let Some(Record { id, body: mut user, .. }) = credentials_match(&state, &request).await? else {
        tracing::warn!("Failed login for {}", request.email.trim());
        return Err(ApiError::InvalidCredentials);
    };
    let repo = state.repo::<User>();
    let now = Utc::now();

    if user.two_factor {
        let Some(code) = request.otp.as_deref().map(str::trim).filter(|c| !c.is_empty()) else {
            let code = generate_otp();
            user.otp_hash = Some(hash_password(&code)?);
            user.otp_expires_at = Some(now + Duration::minutes(OTP_TTL_MINUTES));
            repo.save(id, &user).await?;
            state.otp.send(&user.email, &code).await.map_err(ApiError::internal)?;

            tracing::info!("✓ One-time code issued for user {}", id);
            return Ok((StatusCode::ACCEPTED, Json(json!({ "otpRequired": true }))).into_response());
        };

        let valid = match (&user.otp_hash, user.otp_expires_at) {
            (Some(hash), Some(expires_at)) => expires_at > now && verify_password(code, hash),
            _ => false,
        };
        if !valid {
            tracing::warn!("Rejected one-time code for user {}", id);
            return Err(ApiError::InvalidCredentials);
        }
        user.otp_hash = None;
        user.otp_expires_at = None;
    }

    user.last_login_at = Some(now);
    let record = repo.save(id, &user).await?;
    let issued = state.sessions.issue(id, user.role)?;

    tracing::info!("✓ User {} signed in", id);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, state.sessions.cookie(&issued))],
        Json(json!({
            "token": issued.token,
            "expiresAt": issued.expires_at,
            "user": public(&record)?,
        })),
    )
        .into_response())
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, session: Session) -> ApiResult<Response> {
    revoke(&state.store, &session).await?;
    if let Err(e) = purge_expired_revocations(&state.store, Utc::now()).await {
        tracing::warn!("Failed to purge expired revocations: {}", e);
    }

    tracing::info!("✓ User {} signed out", session.user_id);
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, state.sessions.clear_cookie())],
        Json(json!({ "message": "Logged out successfully" })),
    )
        .into_response())
}
