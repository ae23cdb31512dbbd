//! Session cookie formatting and extraction.

use axum::http::HeaderMap;
use axum::http::header::{AUTHORIZATION, COOKIE};

use crate::auth::AuthConfig;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "token";

/// Builds the `Set-Cookie` value that stores `token` for `config.access_ttl`.
pub fn build_session_cookie(token: &str, config: &AuthConfig) -> String {
    format_cookie(token, config.access_ttl.as_secs(), config)
}

/// Builds a `Set-Cookie` value that clears the session cookie with the same attributes.
pub fn build_clear_cookie(config: &AuthConfig) -> String {
    format_cookie("", 0, config)
}

fn format_cookie(value: &str, max_age: u64, config: &AuthConfig) -> String {
    let mut cookie = format!("{SESSION_COOKIE}={value}; HttpOnly; Path=/; Max-Age={max_age}");
    if config.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie.push_str(&format!("; SameSite={}", config.cookie_same_site));
    cookie
}

/// Extracts the session token from the `token` cookie or an `Authorization: Bearer` header.
///
/// The cookie wins when both are present.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
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
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
    })
}
