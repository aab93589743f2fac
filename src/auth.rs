//! Bearer-token session authentication. Login issues a random token whose
//! sha256 is stored; only the hash is ever at rest.

use axum::http::{HeaderMap, StatusCode, header};
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::AppState;
use crate::models::user::User;
use crate::store;

fn random_chars(len: usize) -> String {
    let mut rng = rand::rng();
    let chars: Vec<char> = "abcdefghijklmnopqrstuvwxyz0123456789".chars().collect();
    (0..len).map(|_| chars[rng.random_range(0..chars.len())]).collect()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn generate_session_token() -> String {
    random_chars(64)
}

pub fn hash_token(token: &str) -> String {
    sha256_hex(token)
}

/// Salted hash stored as `salt$digest`.
pub fn hash_password(password: &str) -> String {
    let salt = random_chars(16);
    let digest = sha256_hex(&format!("{salt}{password}"));
    format!("{salt}${digest}")
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    sha256_hex(&format!("{salt}{password}")) == digest
}

/// Extract the bearer token from the request headers, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Resolve the caller to a user or fail with a 401 naming the attempted
/// action ("view metrics", "update a client", ...).
pub fn require_user(
    state: &AppState,
    headers: &HeaderMap,
    action: &str,
) -> Result<User, (StatusCode, String)> {
    let denied = || {
        (
            StatusCode::UNAUTHORIZED,
            format!("You must be logged in to {action}"),
        )
    };
    let token = bearer_token(headers).ok_or_else(denied)?;
    let user = state
        .store
        .session_user(&hash_token(token), &store::now_utc())
        .map_err(|e| {
            tracing::error!("session lookup failed: {e}");
            denied()
        })?;
    user.ok_or_else(denied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_tokens_are_long_lowercase_alnum() {
        let token = generate_session_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn token_hash_is_deterministic() {
        assert_eq!(hash_token("abc"), hash_token("abc"));
        assert_ne!(hash_token("abc"), hash_token("abd"));
    }

    #[test]
    fn password_verification_round_trips() {
        let stored = hash_password("hunter22");
        assert!(verify_password("hunter22", &stored));
        assert!(!verify_password("hunter23", &stored));
    }

    #[test]
    fn distinct_salts_per_hash() {
        assert_ne!(hash_password("same"), hash_password("same"));
    }

    #[test]
    fn malformed_stored_hash_never_verifies() {
        assert!(!verify_password("anything", "no-separator"));
    }
}
