//! Bearer-token gate for protected routes.

use axum::extract::{Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use super::token::epoch_secs;
use super::TokenIssuer;
use crate::error::{ServiceError, TokenRejection};

/// Identity attached to a request once its token has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSubject {
    pub username: String,
}

/// Decides whether an inbound call carries a valid token.
///
/// No token → `Unauthenticated(Missing)` (401). A token that is malformed,
/// forged or expired → `Unauthenticated(Invalid)` (403). Otherwise the
/// verified subject.
#[derive(Debug, Clone)]
pub struct AccessGate {
    issuer: Arc<TokenIssuer>,
}

impl AccessGate {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self { issuer }
    }

    pub fn admit(&self, headers: &HeaderMap) -> Result<AuthenticatedSubject, ServiceError> {
        self.admit_at(headers, epoch_secs())
    }

    pub fn admit_at(
        &self,
        headers: &HeaderMap,
        now: u64,
    ) -> Result<AuthenticatedSubject, ServiceError> {
        let token = bearer_token(headers)
            .ok_or(ServiceError::Unauthenticated(TokenRejection::Missing))?;

        match self.issuer.verify_at(token, now) {
            Ok(username) => Ok(AuthenticatedSubject { username }),
            Err(reason) => {
                tracing::warn!(%reason, "Rejected bearer token");
                Err(ServiceError::Unauthenticated(TokenRejection::Invalid))
            }
        }
    }
}

/// The credential presented in `Authorization: <scheme> <token>`.
///
/// Only the second word counts: no header or no second word is "no token".
/// The scheme is not checked here, so `Basic abc` presents `abc`, which then
/// fails verification as an invalid token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split_whitespace().nth(1))
}

/// Middleware: admit the request or short-circuit with 401/403.
///
/// On success the [`AuthenticatedSubject`] is available to handlers as an
/// `Extension`.
pub async fn require_subject(
    State(gate): State<AccessGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let subject = gate.admit(request.headers())?;
    request.extensions_mut().insert(subject);
    Ok(next.run(request).await)
}
