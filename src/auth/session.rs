//! Cookie-backed sessions and the extractors that resolve them.
//!
//! Handlers receive the caller's identity as a parameter:
//! - [`CurrentUser`] requires a live session and otherwise redirects to the
//!   login page, remembering where the caller was going
//! - [`MaybeUser`] resolves the session if there is one

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::COOKIE;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use chrono::Utc;
use uuid::Uuid;

use crate::models::User;
use crate::state::AppState;
use crate::utils::error::AppError;

pub const SESSION_COOKIE: &str = "eventhub_session";

/// `Set-Cookie` value that stores the session id.
pub fn session_cookie(session_id: Uuid, max_age_secs: i64, secure: bool) -> HeaderValue {
    let mut cookie = format!(
        "{SESSION_COOKIE}={session_id}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    // Built only from a UUID, digits and fixed ASCII.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("eventhub_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Reads the session id out of any `Cookie` header.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session_id: Uuid,
}

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.user.id
    }
}

/// The caller if a live session exists.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<CurrentUser>);

async fn resolve(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(session_id) = session_id_from_headers(&parts.headers) else {
        return Ok(None);
    };
    let Some(session) = state.store.find_session(session_id).await? else {
        return Ok(None);
    };
    if session.is_expired(Utc::now()) {
        state.store.delete_session(session.id).await?;
        tracing::debug!(user_id = session.user_id, "Discarded expired session");
        return Ok(None);
    }
    let Some(user) = state.store.find_user_by_id(session.user_id).await? else {
        return Ok(None);
    };

    Ok(Some(CurrentUser { user, session_id }))
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve(parts, state).await?.ok_or_else(|| AppError::LoginRequired {
            next: parts
                .uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_else(|| "/".to_string()),
        })
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(resolve(parts, state).await?))
    }
}
