use anyhow::ensure;
use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::user::{Claims, UserSummary};

/// Cookies with this prefix must not carry a Domain attribute.
const HOST_ONLY_PREFIX: &str = "__Host-";

/// Authentication failures. Every variant maps to 401 except `Signing`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing or malformed Authorization header")]
    MissingCredential,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token issuer")]
    IssuerMismatch,

    #[error("invalid token audience")]
    AudienceMismatch,

    #[error("malformed token")]
    MalformedToken,

    /// The token verified but its subject is not a user id.
    #[error("token does not identify a user")]
    MissingIdentity,

    #[error("could not sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Everything the token service needs, fixed at startup.
#[derive(Clone)]
pub struct TokenConfig {
    pub issuer: String,
    pub audience: String,
    pub secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub cookie_name: String,
    pub cookie_path: String,
    pub cookie_domain: String,
}

/// An access/refresh pair minted for one login.
///
/// Only the access token and CSRF secret are serialized. The refresh token
/// travels in a cookie.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    #[serde(skip)]
    pub refresh_token: String,
    pub csrf_secret: String,
    #[serde(skip)]
    pub refresh_expires_at: i64,
}

/// Issues and verifies HMAC-signed JWTs.
///
/// Access and refresh tokens share the secret, issuer and audience and differ
/// only in lifetime. Verification is stateless: there is no revocation list.
pub struct TokenService {
    config: TokenConfig,
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenService {
    pub fn new(config: TokenConfig) -> anyhow::Result<Self> {
        ensure!(!config.secret.is_empty(), "JWT signing secret must not be empty");
        ensure!(
            config.access_ttl > Duration::zero() && config.refresh_ttl > Duration::zero(),
            "token lifetimes must be positive"
        );
        if config.secret.len() < 32 {
            tracing::warn!("JWT signing secret is shorter than 32 bytes");
        }

        // Only the HMAC family is accepted. A token whose header names any
        // other algorithm fails before its signature is even looked at.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        validation.set_audience(&[config.audience.as_str()]);
        // Expiry and issuer are checked by hand in `verify_at` so the clock can
        // be pinned and the failures come back in a fixed order.
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            config,
        })
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    pub fn issue(&self, identity: &UserSummary) -> Result<TokenPair, AuthError> {
        self.issue_at(identity, Utc::now().timestamp())
    }

    /// Mints a pair as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, identity: &UserSummary, now: i64) -> Result<TokenPair, AuthError> {
        let access_claims = self.claims_for(identity, now, self.config.access_ttl);
        let refresh_claims = self.claims_for(identity, now, self.config.refresh_ttl);

        let header = Header::new(Algorithm::HS256);
        let access_token =
            encode(&header, &access_claims, &self.encoding).map_err(AuthError::Signing)?;
        let refresh_token =
            encode(&header, &refresh_claims, &self.encoding).map_err(AuthError::Signing)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            csrf_secret: Uuid::new_v4().simple().to_string(),
            refresh_expires_at: refresh_claims.exp,
        })
    }

    fn claims_for(&self, identity: &UserSummary, now: i64, ttl: Duration) -> Claims {
        Claims {
            sub: identity.id.to_string(),
            first_name: identity.first_name.clone(),
            last_name: identity.last_name.clone(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
            iat: now,
            exp: now + ttl.num_seconds(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Verifies a token as if the current time were `now` (unix seconds).
    ///
    /// Checks run in order: algorithm family and signature, expiry, issuer.
    /// A token is still valid at exactly `exp` and expired one second later.
    pub fn verify_at(&self, token: &str, now: i64) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::InvalidSignature
                }
                ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
                _ => AuthError::MalformedToken,
            }
        })?;
        let claims = data.claims;

        if now > claims.exp {
            return Err(AuthError::TokenExpired);
        }
        if claims.iss != self.config.issuer {
            return Err(AuthError::IssuerMismatch);
        }

        Ok(claims)
    }

    /// Pulls the bearer token out of an Authorization header value and verifies it.
    pub fn authenticate(&self, header: Option<&str>) -> Result<Claims, AuthError> {
        let token = bearer_token(header)?;
        self.verify(token)
    }

    /// Trades a refresh token for a fresh pair.
    pub fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verify(refresh_token)?;
        let identity = identity_from_claims(&claims)?;
        self.issue(&identity)
    }

    /// The cookie that carries a pair's refresh token.
    ///
    /// HttpOnly, Secure and SameSite=Strict, scoped to the configured path and
    /// expiring with the refresh token itself.
    pub fn refresh_cookie(&self, pair: &TokenPair) -> Cookie<'static> {
        let mut builder = Cookie::build((
            self.config.cookie_name.clone(),
            pair.refresh_token.clone(),
        ))
        .path(self.config.cookie_path.clone())
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::seconds(self.config.refresh_ttl.num_seconds()));

        if let Ok(expires) = OffsetDateTime::from_unix_timestamp(pair.refresh_expires_at) {
            builder = builder.expires(expires);
        }
        if !self.config.cookie_name.starts_with(HOST_ONLY_PREFIX) {
            builder = builder.domain(self.config.cookie_domain.clone());
        }

        builder.build()
    }

    /// An already-expired cookie that overwrites the refresh cookie on the client.
    pub fn expired_refresh_cookie(&self) -> Cookie<'static> {
        let mut builder = Cookie::build((self.config.cookie_name.clone(), String::new()))
            .path(self.config.cookie_path.clone())
            .http_only(true)
            .secure(true)
            .same_site(SameSite::Strict)
            .max_age(time::Duration::ZERO)
            .expires(OffsetDateTime::UNIX_EPOCH);

        if !self.config.cookie_name.starts_with(HOST_ONLY_PREFIX) {
            builder = builder.domain(self.config.cookie_domain.clone());
        }

        builder.build()
    }
}

/// Extracts the token from `Bearer <token>`.
///
/// The header must be exactly two space-separated parts and the scheme must
/// be the literal `Bearer`.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or(AuthError::MissingCredential)?;
    let parts: Vec<&str> = header.split(' ').collect();

    match parts.as_slice() {
        ["Bearer", token] if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MissingCredential),
    }
}

/// Rebuilds the identity a token was issued for.
pub fn identity_from_claims(claims: &Claims) -> Result<UserSummary, AuthError> {
    let id = claims
        .sub
        .parse::<i64>()
        .map_err(|_| AuthError::MissingIdentity)?;

    Ok(UserSummary {
        id,
        first_name: claims.first_name.clone(),
        last_name: claims.last_name.clone(),
    })
}
