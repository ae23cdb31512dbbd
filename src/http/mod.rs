//! HTTP transport for the authentication flow.
//!
//! Handlers translate JSON bodies into [`AuthFlow`] calls and map every
//! [`AuthError`] onto a status code through its `IntoResponse` impl. Session
//! tokens travel in the `token` cookie; a `Bearer` header is accepted too.

pub mod cookie;
pub mod error;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router, async_trait};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AuthError;
use crate::auth::{
    ApprovalStatus, AuthFlow, IdentityKind, LoginSuccess, NewInstitute, SessionClaims,
};
use cookie::{build_clear_cookie, build_session_cookie, extract_token};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<AuthFlow>,
}

/// Builds the router with all authentication and administration routes.
pub fn router(flow: Arc<AuthFlow>) -> Router {
    Router::new()
        .route("/challenge", post(request_challenge))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/profile", get(profile))
        .route(
            "/admin/institutes",
            post(register_institute).get(list_institutes),
        )
        .route("/admin/institutes/approve", put(approve_institute))
        .route("/admin/institutes/revoke", put(revoke_institute))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { flow })
}

/// CORS policy for a browser frontend served from `origin`.
///
/// Credentials are allowed so the session cookie is sent cross-origin.
pub fn cors_layer(origin: &str) -> Result<CorsLayer, AuthError> {
    let origin = HeaderValue::from_str(origin)
        .map_err(|_| AuthError::ConfigError(format!("Invalid CORS origin: {origin}")))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true))
}

/// Claims of a verified session, any role.
pub struct Session(pub SessionClaims);

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        state.flow.verify_session(&token).map(Session)
    }
}

/// Claims of a verified government session.
pub struct Government(pub SessionClaims);

#[async_trait]
impl FromRequestParts<AppState> for Government {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Session(claims) = Session::from_request_parts(parts, state).await?;
        state.flow.require_government(&claims)?;
        Ok(Government(claims))
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AuthError::BadRequest(rejection.body_text()))
}

fn with_cookie(cookie: String, body: serde_json::Value) -> Result<Response, AuthError> {
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| AuthError::CryptoError(format!("Invalid cookie header: {e}")))?;
    Ok(([(SET_COOKIE, cookie)], Json(body)).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeRequest {
    #[serde(default, alias = "walletAddress")]
    identity_key: Option<String>,
}

async fn request_challenge(
    State(state): State<AppState>,
    body: Result<Json<ChallengeRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, AuthError> {
    let request = json_body(body)?;
    let identity_key = request
        .identity_key
        .ok_or_else(|| AuthError::BadRequest("identityKey is required".to_string()))?;

    let entry = state.flow.request_challenge(&identity_key).await?;
    Ok(Json(json!({
        "message": entry.challenge,
        "expiresAt": entry.expires_at,
    })))
}

/// Login body; the populated fields choose wallet or credential login.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct LoginRequest {
    #[serde(alias = "walletAddress")]
    identity_key: Option<String>,
    signature: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let request = json_body(body)?;
    let flow = &state.flow;

    match request {
        LoginRequest {
            identity_key: Some(identity_key),
            signature: Some(signature),
            ..
        } => {
            let LoginSuccess {
                identity_key,
                session,
            } = flow.login_with_signature(&identity_key, &signature).await?;
            with_cookie(
                build_session_cookie(&session.token, flow.config()),
                json!({ "identityKey": identity_key, "message": "Login successful" }),
            )
        }
        LoginRequest {
            username: Some(username),
            password: Some(password),
            ..
        } => {
            let success = flow.login_with_password(&username, &password).await?;
            with_cookie(
                build_session_cookie(&success.session.token, flow.config()),
                json!({ "role": IdentityKind::Government, "message": "Login successful" }),
            )
        }
        _ => Err(AuthError::BadRequest(
            "Provide identityKey and signature, or username and password".to_string(),
        )),
    }
}

async fn logout(State(state): State<AppState>, Session(claims): Session) -> Result<Response, AuthError> {
    tracing::info!(identity_key = %claims.identity_key, role = %claims.role, "logout");
    with_cookie(
        build_clear_cookie(state.flow.config()),
        json!({ "message": "Logout successful" }),
    )
}

async fn profile(State(state): State<AppState>, Session(claims): Session) -> Result<Response, AuthError> {
    let profile = state.flow.profile(&claims).await?;
    Ok(Json(profile).into_response())
}

async fn register_institute(
    State(state): State<AppState>,
    Government(_): Government,
    body: Result<Json<NewInstitute>, JsonRejection>,
) -> Result<Response, AuthError> {
    let institute = json_body(body)?;
    let record = state.flow.approvals().register_institute(institute).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Registration submitted",
        "institute": record,
    }))
    .into_response())
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

async fn list_institutes(
    State(state): State<AppState>,
    Government(_): Government,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Response, AuthError> {
    let Query(query) = query.map_err(|rejection| AuthError::BadRequest(rejection.body_text()))?;
    let status = query
        .status
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ApprovalStatus>())
        .transpose()?;

    let records = state.flow.approvals().list_institutes(status).await?;
    Ok(Json(records).into_response())
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ApprovalRequest {
    id: String,
    wallet_address: String,
}

async fn approve_institute(
    State(state): State<AppState>,
    Government(_): Government,
    body: Result<Json<ApprovalRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let request = json_body(body)?;
    let receipt = state
        .flow
        .approvals()
        .approve(&request.id, &request.wallet_address)
        .await?;
    Ok(Json(json!({
        "success": true,
        "txHash": receipt.tx_hash,
        "message": "Institute approved",
        "institute": receipt.record,
    }))
    .into_response())
}

async fn revoke_institute(
    State(state): State<AppState>,
    Government(_): Government,
    body: Result<Json<ApprovalRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let request = json_body(body)?;
    let receipt = state
        .flow
        .approvals()
        .revoke(&request.id, &request.wallet_address)
        .await?;
    Ok(Json(json!({
        "success": true,
        "txHash": receipt.tx_hash,
        "message": "Institute revoked",
        "institute": receipt.record,
    }))
    .into_response())
}
