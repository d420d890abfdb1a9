//! Bearer-token authentication.
//!
//! Access tokens are compact JWTs signed with HMAC-SHA256 (`HS256`) by the identity service, which shares
//! [`AuthConfig::token_secret`] with this server. The server only ever verifies tokens in production. [`TokenIssuer`]
//! exists for operators' tooling and for tests.
//!
//! The custom claims are deliberately small: the subject (a customer, vendor or administrator id) and a single
//! [`Role`]. Expiry lives in the registered `exp` claim and is checked by `jwt_compact`'s time options.
use std::{
    fmt::Display,
    future::{ready, Ready},
    sync::Arc,
};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Duration;
use dispatch_engine::db_types::VendorId;
use jwt_compact::{
    alg::{Hs256, Hs256Key},
    AlgorithmExt,
    Claims,
    Header,
    ParseError,
    TimeOptions,
    UntrustedToken,
    ValidationError,
};
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Vendor,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Vendor => write!(f, "vendor"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated actor's id.
    pub sub: String,
    pub role: Role,
}

impl JwtClaims {
    pub fn new<S: Into<String>>(sub: S, role: Role) -> Self {
        Self { sub: sub.into(), role }
    }

    /// The vendor this token speaks for, if it was issued to a vendor.
    pub fn vendor_id(&self) -> Option<VendorId> {
        (self.role == Role::Vendor).then(|| VendorId::from(self.sub.as_str()))
    }
}

/// Handlers behind [`crate::middleware::JwtMiddlewareFactory`] can take the verified claims as an argument.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    let (scheme, token) = header_value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

fn signing_key(config: &AuthConfig) -> Arc<Hs256Key> {
    Arc::new(Hs256Key::new(config.token_secret.reveal()))
}

fn parse_error(e: ParseError) -> AuthError {
    AuthError::PoorlyFormattedToken(e.to_string())
}

fn validation_error(e: ValidationError) -> AuthError {
    match e {
        ValidationError::Expired => AuthError::TokenExpired,
        ValidationError::MalformedClaims(_) | ValidationError::MalformedSignature(_) => {
            AuthError::PoorlyFormattedToken(e.to_string())
        },
        e => AuthError::ValidationError(e.to_string()),
    }
}

//-------------------------------------------------  TokenIssuer  ------------------------------------------------------
pub struct TokenIssuer {
    key: Arc<Hs256Key>,
    time_options: TimeOptions,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: signing_key(config), time_options: TimeOptions::default() }
    }

    /// Signs `claims` into a token that expires `valid_for` from now.
    pub fn issue_token(&self, claims: &JwtClaims, valid_for: Duration) -> Result<String, AuthError> {
        let header = Header::empty().with_token_type("JWT");
        let claims = Claims::new(claims.clone()).set_duration_and_issuance(&self.time_options, valid_for);
        Hs256.token(&header, &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}

//-------------------------------------------------  TokenVerifier  ----------------------------------------------------
#[derive(Clone)]
pub struct TokenVerifier {
    key: Arc<Hs256Key>,
    bare_identity: bool,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenVerifier")
    }
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: signing_key(config), bare_identity: false }
    }

    /// A verifier that, besides signed tokens, accepts unsigned `"<role>:<subject>"` identities. Test builds only.
    #[cfg(any(test, feature = "test_utils"))]
    pub fn insecure_bare_identity(config: &AuthConfig) -> Self {
        warn!("🔐️ Bare identities are accepted by this verifier. This must never happen outside of tests.");
        Self { key: signing_key(config), bare_identity: true }
    }

    pub fn verify(&self, token: &str) -> Result<JwtClaims, AuthError> {
        if self.bare_identity {
            if let Some(claims) = bare_identity(token) {
                return Ok(claims);
            }
        }
        let untrusted_token = UntrustedToken::new(token).map_err(parse_error)?;
        let token = Hs256.validator::<JwtClaims>(&self.key).validate(&untrusted_token).map_err(validation_error)?;
        let claims = token.claims();
        claims.validate_expiration(&TimeOptions::default()).map_err(|e| {
            debug!("🔐️ Rejected a token for {}. {e}", claims.custom.sub);
            validation_error(e)
        })?;
        trace!("🔐️ Token verified for {} ({})", claims.custom.sub, claims.custom.role);
        Ok(claims.custom.clone())
    }
}

#[cfg(any(test, feature = "test_utils"))]
fn bare_identity(token: &str) -> Option<JwtClaims> {
    let (role, sub) = token.split_once(':')?;
    let role = serde_json::from_value::<Role>(serde_json::Value::String(role.to_string())).ok()?;
    Some(JwtClaims::new(sub, role))
}

#[cfg(not(any(test, feature = "test_utils")))]
fn bare_identity(_token: &str) -> Option<JwtClaims> {
    None
}
