use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{
    clear_session_cookie, hash_password, session_cookie, verify_password, CurrentUser,
};
use crate::forms::auth::safe_next;
use crate::forms::{LoginForm, RegisterForm};
use crate::models::{NewUser, Session};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::view;

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
struct FormPage {
    form: &'static str,
    fields: &'static [&'static str],
    next: Option<String>,
}

const LOGIN_FIELDS: &[&str] = &["username", "password"];
const REGISTER_FIELDS: &[&str] = &[
    "username",
    "email",
    "password",
    "confirm",
    "first_name",
    "last_name",
    "phone",
    "address",
];

/// Runs password hashing off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, AppError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("Password task failed: {e}")))
}

pub async fn login_page(Query(query): Query<NextQuery>) -> Response {
    view(FormPage {
        form: "login",
        fields: LOGIN_FIELDS,
        next: query.next,
    })
}

pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    form.validate().map_err(AppError::Validation)?;

    let username = form.username.trim().to_string();
    let user = state.store.find_user_by_username(&username).await?;

    let verified = match &user {
        Some(user) => {
            let password = form.password;
            let hash = user.password_hash.clone();
            blocking(move || verify_password(&password, &hash)).await?
        }
        None => false,
    };
    let user = match user {
        Some(user) if verified => user,
        _ => {
            warn!(username = %username, "Failed login attempt");
            return Err(AppError::Unauthorized(
                "Incorrect username or password".to_string(),
            ));
        }
    };

    let session = Session::new(user.id, state.config.session_ttl);
    state.store.insert_session(&session).await?;
    info!(user_id = user.id, "User logged in");

    let cookie = session_cookie(
        session.id,
        state.config.session_ttl.num_seconds(),
        state.config.secure_cookies,
    );
    let target = safe_next(query.next.as_deref());
    Ok(([(SET_COOKIE, cookie)], Redirect::to(target)).into_response())
}

pub async fn register_page() -> Response {
    view(FormPage {
        form: "register",
        fields: REGISTER_FIELDS,
        next: None,
    })
}

pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response, AppError> {
    let registration = form.validate().map_err(AppError::Validation)?;

    if state
        .store
        .user_exists(&registration.username, &registration.email)
        .await?
    {
        return Err(AppError::Conflict(
            "Username or email already in use".to_string(),
        ));
    }

    let password = registration.password;
    let password_hash = blocking(move || hash_password(&password)).await??;

    let user = state
        .store
        .insert_user(NewUser {
            username: registration.username,
            first_name: registration.first_name,
            last_name: registration.last_name,
            email: registration.email,
            password_hash,
            phone: registration.phone,
            address: registration.address,
        })
        .await?;
    info!(user_id = user.id, username = %user.username, "User registered");

    Ok(Redirect::to("/login").into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    state.store.delete_session(current.session_id).await?;
    info!(user_id = current.id(), "User logged out");

    Ok(([(SET_COOKIE, clear_session_cookie())], Redirect::to("/")).into_response())
}
