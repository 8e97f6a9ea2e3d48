//! Opaque token, cookie, and expiry mechanics for sessions.

use axum::http::{header::InvalidHeaderValue, HeaderMap, HeaderValue};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

pub const SESSION_COOKIE_NAME: &str = "gatehouse_session";

const TOKEN_BYTES: usize = 32;

/// Fresh opaque token; the value handed to the client and never stored.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Base64UrlUnpadded::encode_string(&bytes)
}

/// Only the hash ever reaches the database.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    Base64UrlUnpadded::encode_string(&digest)
}

#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub ttl_days: i64,
    pub remember_ttl_days: i64,
}

impl SessionPolicy {
    pub fn ttl(&self, remember: bool) -> Duration {
        Duration::days(if remember {
            self.remember_ttl_days
        } else {
            self.ttl_days
        })
    }

    pub fn expiry_at(&self, created_at: OffsetDateTime, remember: bool) -> OffsetDateTime {
        created_at + self.ttl(remember)
    }
}

pub fn session_cookie(
    token: &str,
    max_age: Duration,
) -> Result<HeaderValue, InvalidHeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.whole_seconds()
    ))
}

pub fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("gatehouse_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Pull the session token out of the `Cookie` header, if present.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let raw = header.to_str().ok()?;
    for pair in raw.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let Some(key) = parts.next() else { continue };
        if key == SESSION_COOKIE_NAME {
            return parts.next().filter(|v| !v.is_empty()).map(str::to_string);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Session;
    use time::macros::datetime;
    use uuid::Uuid;

    fn session_created_at(created_at: OffsetDateTime, policy: SessionPolicy) -> Session {
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: hash_token("tok"),
            remember: false,
            created_at,
            expires_at: policy.expiry_at(created_at, false),
        }
    }

    #[test]
    fn default_session_valid_at_29_days_invalid_at_31() {
        let policy = SessionPolicy {
            ttl_days: 30,
            remember_ttl_days: 60,
        };
        let created = datetime!(2025-01-01 00:00 UTC);
        let session = session_created_at(created, policy);

        assert!(session.is_active(created + Duration::days(29)));
        assert!(!session.is_active(created + Duration::days(31)));
    }

    #[test]
    fn remember_me_extends_expiry() {
        let policy = SessionPolicy {
            ttl_days: 30,
            remember_ttl_days: 60,
        };
        let created = datetime!(2025-01-01 00:00 UTC);
        let plain = policy.expiry_at(created, false);
        let extended = policy.expiry_at(created, true);
        assert_eq!(extended - plain, Duration::days(30));
    }

    #[test]
    fn tokens_are_unique_and_url_safe() {
        let a = generate_token();
        let b = generate_token();
        assert_ne!(a, b);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn hash_is_stable_and_differs_from_token() {
        let token = generate_token();
        assert_eq!(hash_token(&token), hash_token(&token));
        assert_ne!(hash_token(&token), token);
    }

    #[test]
    fn cookie_roundtrip_through_header() {
        let token = generate_token();
        let cookie = session_cookie(&token, Duration::days(30)).expect("valid header");

        let mut headers = HeaderMap::new();
        // A browser echoes back only the name=value pair.
        let pair = cookie
            .to_str()
            .expect("ascii cookie")
            .split(';')
            .next()
            .expect("name=value")
            .to_string();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {pair}")).expect("valid header"),
        );

        assert_eq!(extract_session_token(&headers), Some(token));
    }

    #[test]
    fn missing_or_foreign_cookies_yield_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_session_token(&headers), None);

        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; other=1"),
        );
        assert_eq!(extract_session_token(&headers), None);
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let value = clear_session_cookie();
        let text = value.to_str().expect("ascii cookie");
        assert!(text.starts_with(SESSION_COOKIE_NAME));
        assert!(text.contains("Max-Age=0"));
    }
}
