use anyhow::Context;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use agency_store::{Filter, FindQuery, SharedStore, StoreResult};
use serde_json::json;

use crate::error::ApiError;
use crate::models::{collections, Role, User};
use crate::repository::Repository;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

/// Signing keys and cookie policy for session tokens (HS256).
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
    cookie_secure: bool,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl: Duration, cookie_secure: bool) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
            cookie_secure,
        }
    }

    pub fn issue(&self, user_id: Uuid, role: Role) -> anyhow::Result<IssuedToken> {
        self.issue_at(user_id, role, Utc::now())
    }

    fn issue_at(&self, user_id: Uuid, role: Role, now: DateTime<Utc>) -> anyhow::Result<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign session token")?;

        Ok(IssuedToken {
            token,
            jti: claims.jti,
            expires_at,
        })
    }

    /// Checks signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let validation = Validation::new(Algorithm::HS256);
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation).map(|data| data.claims)
    }

    pub fn cookie(&self, token: &IssuedToken) -> String {
        let max_age = (token.expires_at - Utc::now()).num_seconds().max(0);
        let mut cookie = format!(
            "{SESSION_COOKIE}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}",
            token.token
        );
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    pub fn clear_cookie(&self) -> String {
        let mut cookie = format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0");
        if self.cookie_secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Session token from the `session` cookie, else from a bearer header.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string());

    from_cookie.or_else(|| {
        headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// The signed-in caller. The role is read from the user record on every
/// request, so role changes apply to live sessions.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
    pub jti: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("This action requires administrator privileges"))
        }
    }
}

/// Rejects `session`'s token until it would have expired anyway.
pub async fn revoke(store: &SharedStore, session: &Session) -> StoreResult<()> {
    store
        .insert(
            &collections::REVOKED_SESSIONS,
            json!({
                "jti": session.jti,
                "expiresAt": session.expires_at,
                "exp": session.expires_at.timestamp(),
            }),
        )
        .await?;
    Ok(())
}

/// Deletes revocations whose tokens no longer verify on their own.
pub async fn purge_expired_revocations(store: &SharedStore, now: DateTime<Utc>) -> StoreResult<u64> {
    let expired = FindQuery::new().with_filter(Filter::lt("exp", now.timestamp()));
    let page = store.find(&collections::REVOKED_SESSIONS, &expired).await?;
    let mut removed = 0;
    for doc in page.documents {
        if store.delete(&collections::REVOKED_SESSIONS, doc.id).await? {
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::debug!("✓ Purged {} expired session revocations", removed);
    }
    Ok(removed)
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }

        let token = token_from_headers(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let claims = state.sessions.verify(&token).map_err(|e| {
            tracing::warn!("Rejected session token: {}", e);
            ApiError::Unauthorized
        })?;
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| ApiError::Unauthorized)?;

        let revoked = state
            .store
            .find_one(&collections::REVOKED_SESSIONS, &Filter::eq("jti", claims.jti.as_str()))
            .await?;
        if revoked.is_some() {
            tracing::warn!("Rejected revoked session {}", claims.jti);
            return Err(ApiError::Unauthorized);
        }

        let user = Repository::<User>::new(state.store.clone())
            .get(user_id)
            .await?
            .filter(|user| user.body.active)
            .ok_or(ApiError::Unauthorized)?;

        let session = Session {
            user_id,
            role: user.body.role,
            jti: claims.jti,
            expires_at: DateTime::from_timestamp(claims.exp, 0).unwrap_or_else(Utc::now),
        };
        parts.extensions.insert(session.clone());
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> SessionKeys {
        SessionKeys::new(b"0123456789abcdef0123456789abcdef", Duration::hours(12), false)
    }

    #[test]
    fn tokens_round_trip() {
        let keys = keys();
        let user = Uuid::new_v4();
        let issued = keys.issue(user, Role::Doctor).unwrap();

        let claims = keys.verify(&issued.token).unwrap();
        assert_eq!(claims.sub, user.to_string());
        assert_eq!(claims.role, Role::Doctor);
        assert_eq!(claims.jti, issued.jti);
    }

    #[test]
    fn expired_and_foreign_tokens_fail() {
        let keys = keys();
        let old = keys
            .issue_at(Uuid::new_v4(), Role::Staff, Utc::now() - Duration::days(2))
            .unwrap();
        assert!(keys.verify(&old.token).is_err());

        let other = SessionKeys::new(b"another-secret-another-secret-xx", Duration::hours(1), false);
        let foreign = other.issue(Uuid::new_v4(), Role::Admin).unwrap();
        assert!(keys.verify(&foreign.token).is_err());
    }

    #[test]
    fn cookie_attributes() {
        let keys = SessionKeys::new(b"0123456789abcdef0123456789abcdef", Duration::hours(1), true);
        let issued = keys.issue(Uuid::new_v4(), Role::Staff).unwrap();
        let cookie = keys.cookie(&issued);
        assert!(cookie.starts_with(&format!("session={}; HttpOnly; SameSite=Lax; Path=/", issued.token)));
        assert!(cookie.ends_with("; Secure"));
        assert!(keys.clear_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn expired_revocations_are_purged() {
        let store: SharedStore = std::sync::Arc::new(agency_store::MemoryStore::new());
        let now = Utc::now();
        let session = |expires_at: DateTime<Utc>| Session {
            user_id: Uuid::new_v4(),
            role: Role::Staff,
            jti: Uuid::new_v4().to_string(),
            expires_at,
        };
        let live = session(now + Duration::hours(1));
        revoke(&store, &session(now - Duration::hours(1))).await.unwrap();
        revoke(&store, &live).await.unwrap();

        assert_eq!(purge_expired_revocations(&store, now).await.unwrap(), 1);
        assert_eq!(purge_expired_revocations(&store, now).await.unwrap(), 0);
        let kept = store
            .find_one(&collections::REVOKED_SESSIONS, &Filter::eq("jti", live.jti.as_str()))
            .await
            .unwrap();
        assert!(kept.is_some());
    }

    #[test]
    fn token_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(token_from_headers(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));

        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; session=xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));

        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }
}
