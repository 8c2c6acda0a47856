//! Request gate for protected routes.
//!
//! A request starts unauthenticated and becomes authenticated only when its
//! `Authorization` header carries a token that verifies. The gate keeps no
//! state between requests.

use super::token::TokenIssuer;
use axum::http::{header, HeaderMap};

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    /// No token supplied.
    Missing,
    /// A token was supplied but did not verify.
    Invalid,
}

/// Outcome of running the gate over one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Continue(AuthContext),
    ShortCircuit(AuthRejection),
}

/// Pull the token out of the `Authorization` header.
///
/// Accepts `Bearer <token>` as well as the bare token. Blank values count
/// as missing.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    let raw = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())?
        .trim();
    let token = match raw.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        // A scheme with nothing after it
        None if raw.eq_ignore_ascii_case("bearer") => "",
        _ => raw,
    };
    (!token.is_empty()).then_some(token)
}

/// Run the gate against a request's headers.
pub fn evaluate(headers: &HeaderMap, tokens: &TokenIssuer) -> GateDecision {
    let Some(token) = extract_token(headers) else {
        return GateDecision::ShortCircuit(AuthRejection::Missing);
    };

    match tokens.verify(token) {
        Ok(claims) => GateDecision::Continue(AuthContext {
            user_id: claims.id,
            email: claims.email,
        }),
        Err(e) => {
            tracing::warn!("Rejected bearer token: {e}");
            GateDecision::ShortCircuit(AuthRejection::Invalid)
        }
    }
}
