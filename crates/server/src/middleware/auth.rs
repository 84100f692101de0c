use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::ApiClient;
use crate::AppState;

impl FromRequestParts<Arc<AppState>> for ApiClient {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let ip = client_ip(&parts.headers);

        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| {
                tracing::warn!(ip = ?ip, "Request without bearer token");
                AppError::Unauthorized("Invalid authorization header".into())
            })?;

        if !verify_api_key(bearer.token(), &state.config.api_key_salt, &state.config.api_key_hash) {
            tracing::warn!(ip = ?ip, "Invalid API key attempt");
            return Err(AppError::Unauthorized("Invalid API key".into()));
        }

        tracing::debug!(ip = ?ip, "API key accepted");
        Ok(ApiClient { ip })
    }
}

/// First hop of `X-Forwarded-For`, the address handlers log for mutations.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Hex SHA-256 of `token` followed by `salt`; the form stored in `API_KEY`.
pub fn hash_api_key(token: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_api_key(token: &str, salt: &str, expected_hash: &str) -> bool {
    let actual = hash_api_key(token, salt);
    constant_time_eq(actual.as_bytes(), expected_hash.trim().to_ascii_lowercase().as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub struct GeneratedKey {
    pub token: String,
    pub salt: String,
    pub hash: String,
}

/// Fresh random token and salt, 32 bytes each, hex encoded.
pub fn generate_api_key() -> GeneratedKey {
    let mut rng = rand::thread_rng();
    let mut token = [0u8; 32];
    let mut salt = [0u8; 32];
    rng.fill_bytes(&mut token);
    rng.fill_bytes(&mut salt);

    let token = hex::encode(token);
    let salt = hex::encode(salt);
    let hash = hash_api_key(&token, &salt);
    GeneratedKey { token, salt, hash }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn client_ip_is_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), None);

        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));

        headers.insert("x-forwarded-for", HeaderValue::from_static(" "));
        assert_eq!(client_ip(&headers), None);
    }

    #[test]
    fn hash_is_salted_sha256() {
        // sha256("abc")
        assert_eq!(
            hash_api_key("ab", "c"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_api_key("token", "salt-a"), hash_api_key("token", "salt-b"));
    }

    #[test]
    fn verifies_generated_keys() {
        let key = generate_api_key();
        assert_eq!(key.token.len(), 64);
        assert!(verify_api_key(&key.token, &key.salt, &key.hash));
        assert!(verify_api_key(&key.token, &key.salt, &key.hash.to_uppercase()));
        assert!(!verify_api_key("wrong", &key.salt, &key.hash));
        assert!(!verify_api_key(&key.token, &key.salt, ""));
    }
}
