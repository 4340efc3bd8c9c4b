//! API key authentication extractor (`spec.md` §6), adapted from the
//! `routes/auth.rs::AuthUser` extractor shape — a bearer-token extractor
//! becomes a header-hash extractor, since this service has no login flow
//! of its own.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use sha2::{Digest, Sha256};

use crate::db::models::ApiClient;
use crate::db::repository::ApiClientRepository;
use crate::error::AppError;
use crate::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Exposed (not just used internally) so integration tests can seed an
/// `ApiClient` row with a hash that matches what this extractor computes.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extractor for an authenticated `ApiClient`. Resolves the `X-API-Key`
/// header to its SHA-256 hash and looks up the owning client; rate limiting
/// itself happens in the handler, since it needs the client's configured
/// `rate_limit` and must still run after a successful lookup.
pub struct ApiKeyAuth(pub ApiClient);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::MissingApiKey)?;

        let hash = hash_api_key(api_key);
        let client = ApiClientRepository::find_by_api_key_hash(&state.db, &hash)
            .await?
            .ok_or(AppError::InvalidApiKey)?;

        if !client.active {
            return Err(AppError::ClientInactive);
        }

        Ok(ApiKeyAuth(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_stable_and_hex_encoded() {
        let a = hash_api_key("secret-key-1");
        let b = hash_api_key("secret-key-1");
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn distinct_keys_hash_differently() {
        assert_ne!(hash_api_key("key-a"), hash_api_key("key-b"));
    }
}
