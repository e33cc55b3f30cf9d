use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use jobboard_core::{Actor, User, UserId};

use crate::problem::ProblemResponse;
use crate::router::AppState;

pub const SESSION_COOKIE: &str = "jobboard_session";

/// Issues and checks the HS256 tokens carried by the session cookie.
#[derive(Clone)]
pub struct SessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    secure_cookies: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SessionClaims {
    pub sub: UserId,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Invalid(String),
    #[error("session expired")]
    Expired,
    #[error("failed to sign session token: {0}")]
    Sign(jsonwebtoken::errors::Error),
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl_secs: u64, secure_cookies: bool) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs: i64::try_from(ttl_secs).unwrap_or(i64::MAX),
            secure_cookies,
        }
    }

    pub fn issue(&self, user: &User, now: DateTime<Utc>) -> Result<String, SessionError> {
        let iat = now.timestamp();
        let claims = SessionClaims {
            sub: user.id,
            role: user.role.as_str().to_string(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(SessionError::Sign)
    }

    /// Expiry is checked against the supplied clock rather than the system time.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, SessionError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| SessionError::Invalid(format!("{err}")))?
            .claims;
        if now.timestamp() >= claims.exp {
            return Err(SessionError::Expired);
        }
        Ok(claims)
    }

    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure_cookies)
            .build()
    }

    pub fn removal_cookie(&self) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}

/// The caller of a request, resolved from the session cookie or a bearer token.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser {
    pub actor: Actor,
    pub user: Option<User>,
}

impl CurrentUser {
    pub fn anonymous() -> Self {
        Self::default()
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ProblemResponse;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(Self::anonymous());
        };
        let claims = match state.sessions().validate(&token, state.now()) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(stage = "session", error = %err, "ignoring session token");
                return Ok(Self::anonymous());
            }
        };

        // The stored role wins over the one in the token.
        match state.service().resolve_user(claims.sub).await {
            Ok(Some(user)) => Ok(Self {
                actor: Actor::user(user.id, user.role),
                user: Some(user),
            }),
            Ok(None) => Ok(Self::anonymous()),
            Err(err) => {
                error!(stage = "session", error = %err, "failed to resolve session user");
                Err(ProblemResponse::internal("failed to resolve session"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use jobboard_core::Role;

    fn user() -> User {
        User {
            id: 7,
            username: "jane".into(),
            email: "jane@example.com".into(),
            role: Role::Employer,
            profile_picture: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn issued_tokens_validate_until_expiry() {
        let manager = SessionManager::new(b"secret", 3600, false);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let token = manager.issue(&user(), now).expect("sign");

        let claims = manager
            .validate(&token, now + Duration::minutes(59))
            .expect("valid");
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.role, "employer");

        let err = manager
            .validate(&token, now + Duration::hours(1))
            .unwrap_err();
        assert!(matches!(err, SessionError::Expired));
    }

    #[test]
    fn tokens_signed_with_other_keys_are_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let token = SessionManager::new(b"other", 3600, false)
            .issue(&user(), now)
            .expect("sign");
        let err = SessionManager::new(b"secret", 3600, false)
            .validate(&token, now)
            .unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
    }

    #[test]
    fn cookie_flags_follow_environment() {
        let cookie = SessionManager::new(b"secret", 60, true).cookie("token".into());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn bearer_header_is_accepted_when_no_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));

        headers.insert(header::COOKIE, "jobboard_session=xyz".parse().unwrap());
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
    }
}
