//! Bearer-token authentication.
//!
//! A token is `<account_id>:<expires_at>:<signature>` where the signature is
//! the HMAC-SHA256 hex digest of `<account_id>:<expires_at>` keyed on
//! `AUTH_TOKEN_SECRET`. Stateless on purpose: nothing to look up or revoke
//! server-side, expiry rides inside the signed payload.
//!
//! Admin routes use a separate shared secret (`ADMIN_TOKEN`) compared in
//! constant time, same as the account-token signature check.

use axum::extract::{FromRequestParts, Request};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use http::header::AUTHORIZATION;
use http::request::Parts;
use http::{HeaderMap, StatusCode};
use ring::hmac;

use crate::db::models::account::AccountId;
use crate::util::constant_time_cmp;
use crate::util::env::Var;
use crate::var;

pub const BEARER_PREFIX: &str = "Bearer ";

/// The authenticated caller, stashed in request extensions by
/// [`require_auth`] and pulled back out by the extractor impl below.
#[derive(Debug, Clone)]
pub struct AuthAccount(pub AccountId);

fn sign_payload(account_id: &str, expires_at: i64, secret: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, format!("{account_id}:{expires_at}").as_bytes());

    hex::encode(tag.as_ref())
}

/// Mints a token for `account_id` that is valid until `expires_at` (unix
/// seconds).
pub fn issue_token(account_id: &AccountId, expires_at: i64, secret: &str) -> String {
    let signature = sign_payload(&account_id.0, expires_at, secret);
    format!("{}:{expires_at}:{signature}", account_id.0)
}

fn verify_token(token: &str, secret: &str, now: i64) -> Result<AccountId, StatusCode> {
    let mut parts = token.splitn(3, ':');
    let (Some(account_id), Some(expires_at), Some(signature)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(StatusCode::BAD_REQUEST);
    };

    let expires_at = expires_at
        .parse::<i64>()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    // signature first, so a forged token learns nothing from the expiry check
    let expected = sign_payload(account_id, expires_at, secret);
    if !constant_time_cmp(signature, &expected) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    if expires_at <= now {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(AccountId(account_id.to_string()))
}

fn bearer_value(headers: &HeaderMap) -> Result<&str, StatusCode> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    header
        .strip_prefix(BEARER_PREFIX)
        .ok_or(StatusCode::BAD_REQUEST)
}

/// Layered over every route that acts on behalf of an account.
pub async fn require_auth(mut req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers().clone();
    let token = bearer_value(&headers)?;

    let secret = var!(Var::AuthTokenSecret)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let account_id = verify_token(token, secret, Utc::now().timestamp())?;
    req.extensions_mut().insert(AuthAccount(account_id));

    Ok(next.run(req).await)
}

/// Layered over the admin surface; checks the shared admin secret.
pub async fn verify_admin_ident(req: Request, next: Next) -> Result<Response, StatusCode> {
    let headers = req.headers().clone();
    let token = bearer_value(&headers)?;

    let admin_token = var!(Var::AdminToken)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !constant_time_cmp(token, admin_token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(req).await)
}

impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthAccount>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    fn account() -> AccountId {
        AccountId("9c7a2f6e-1d44-4c1b-9b21-1f0d3a6d1a55".to_string())
    }

    #[test]
    fn test_issued_token_verifies() {
        let token = issue_token(&account(), 2_000_000_000, SECRET);
        let verified = verify_token(&token, SECRET, 1_900_000_000).unwrap();

        assert_eq!(verified, account());
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token(&account(), 1_000, SECRET);

        assert_eq!(
            verify_token(&token, SECRET, 2_000).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_tampered_expiry_rejected() {
        let token = issue_token(&account(), 1_000, SECRET);
        let forged = token.replacen(":1000:", ":2000000000:", 1);

        assert_eq!(
            verify_token(&forged, SECRET, 1_900_000_000).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token(&account(), 2_000_000_000, "other-secret");

        assert_eq!(
            verify_token(&token, SECRET, 1_900_000_000).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_malformed_token_rejected() {
        assert_eq!(
            verify_token("no-delimiters-here", SECRET, 0).unwrap_err(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            verify_token("id:not-a-number:sig", SECRET, 0).unwrap_err(),
            StatusCode::BAD_REQUEST
        );
    }
}
