use crate::models::Claims;
use actix_web::{
    body::{EitherBody, MessageBody},
    dev::{ServiceRequest, ServiceResponse},
    http::{header, StatusCode},
    middleware::Next,
    web, Error, HttpMessage, HttpResponse,
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Lifetime of every issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

impl TokenError {
    /// Status the auth gate answers with when verification fails.
    pub fn status(&self) -> StatusCode {
        match self {
            TokenError::BadSignature | TokenError::Expired => StatusCode::UNAUTHORIZED,
            TokenError::Malformed(_) => StatusCode::BAD_REQUEST,
            TokenError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed(err.to_string()),
        }
    }
}

/// Issues and verifies HS256 session tokens. Stateless: nothing is stored
/// server-side, so a token stays valid until it expires.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &SecretString) -> Self {
        let key = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(key),
            decoding: DecodingKey::from_secret(key),
            validation,
        }
    }

    /// Sign a token for `username` valid for [`TOKEN_TTL_HOURS`].
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue(&self, username: &str) -> Result<String, TokenError> {
        self.issue_at(username, Utc::now())
    }

    /// Sign a token as if it had been minted at `issued_at`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Signing` if encoding fails.
    pub fn issue_at(&self, username: &str, issued_at: DateTime<Utc>) -> Result<String, TokenError> {
        let expires_at = issued_at + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            username: username.to_owned(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(TokenError::Signing)
    }

    /// Check signature and expiry and return the decoded claims.
    ///
    /// # Errors
    ///
    /// `BadSignature` if the token was not signed with this key, `Expired`
    /// once `exp` has passed, `Malformed` for anything structurally wrong.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(TokenError::from)
    }
}

enum Rejection {
    Missing,
    Unreadable,
    Invalid(TokenError),
}

impl Rejection {
    fn into_response(self) -> HttpResponse {
        match self {
            Rejection::Missing => HttpResponse::Unauthorized().body("Missing authorization token"),
            Rejection::Unreadable => HttpResponse::BadRequest().body("Unreadable authorization header"),
            Rejection::Invalid(err) => {
                let message = match err {
                    TokenError::BadSignature | TokenError::Expired => "Invalid or expired token",
                    _ => "Malformed token",
                };
                HttpResponse::build(err.status()).body(message)
            }
        }
    }
}

/// The raw `Authorization` value is the token; a `Bearer ` prefix is tolerated.
fn token_from(req: &ServiceRequest) -> Result<String, Rejection> {
    let value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(Rejection::Missing)?
        .to_str()
        .map_err(|_| Rejection::Unreadable)?
        .trim();

    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return Err(Rejection::Missing);
    }
    Ok(token.to_owned())
}

/// Gate for protected routes: the wrapped service only runs once the token
/// verifies. Verified claims go into request extensions.
pub async fn require_token(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<EitherBody<impl MessageBody>>, Error> {
    let Some(tokens) = req.app_data::<web::Data<TokenService>>().cloned() else {
        return Err(actix_web::error::ErrorInternalServerError(
            "token service not configured",
        ));
    };

    let verified = token_from(&req).and_then(|token| tokens.verify(&token).map_err(Rejection::Invalid));

    match verified {
        Ok(claims) => {
            tracing::debug!(username = %claims.username, path = %req.path(), "token accepted");
            req.extensions_mut().insert(claims);
            let res = next.call(req).await?;
            Ok(res.map_into_left_body())
        }
        Err(rejection) => {
            tracing::debug!(path = %req.path(), "request rejected by auth gate");
            let response = rejection.into_response();
            Ok(req.into_response(response).map_into_right_body())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::SECRET;

    fn service() -> TokenService {
        TokenService::new(&SecretString::from(SECRET.to_string()))
    }

    /// Replace the character in the middle of `segment` (0 = header, 1 = payload, 2 = signature).
    fn tamper(token: &str, segment: usize) -> String {
        let mut parts: Vec<String> = token.split('.').map(str::to_owned).collect();
        let target = &mut parts[segment];
        let mid = target.len() / 2;
        let original = target.as_bytes()[mid];
        let replacement = if original == b'A' { 'B' } else { 'A' };
        target.replace_range(mid..=mid, &replacement.to_string());
        parts.join(".")
    }

    #[test]
    fn test_issue_then_verify() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();

        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.exp - claims.iat, TOKEN_TTL_HOURS * 3600);
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn test_tampered_signature_rejected() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();

        let err = tokens.verify(&tamper(&token, 2)).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();

        let err = tokens.verify(&tamper(&token, 1)).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_header_rejected() {
        let tokens = service();
        let token = tokens.issue("alice").unwrap();
        let header_len = token.find('.').unwrap();

        for pos in 0..header_len {
            let mut forged = token.clone();
            let replacement = if &forged[pos..=pos] == "A" { "B" } else { "A" };
            forged.replace_range(pos..=pos, replacement);
            assert!(tokens.verify(&forged).is_err(), "flip at {pos} accepted");
        }
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other = TokenService::new(&SecretString::from(
            "another-secret-another-secret-123".to_string(),
        ));
        let token = other.issue("alice").unwrap();

        let err = service().verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::BadSignature));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) - Duration::seconds(5);
        let token = tokens.issue_at("alice", issued).unwrap();

        let err = tokens.verify(&token).unwrap_err();
        assert!(matches!(err, TokenError::Expired));
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_token_near_expiry_still_valid() {
        let tokens = service();
        let issued = Utc::now() - Duration::hours(TOKEN_TTL_HOURS) + Duration::minutes(1);
        let token = tokens.issue_at("alice", issued).unwrap();

        assert!(tokens.verify(&token).is_ok());
    }

    #[test]
    fn test_garbage_is_malformed() {
        let err = service().verify("not-a-token").unwrap_err();
        assert!(matches!(err, TokenError::Malformed(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
