use std::marker::PhantomData;

use async_trait::async_trait;
use jsonwebtoken::{DecodingKey, Validation};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use super::{discovery::fetch_discovery, jwks::fetch_jwks};
use crate::services::claims::{Claims, CustomClaims, RegisteredClaims};
use crate::services::jws::{self, JwsError};

const LEEWAY_SECONDS: u64 = 60;

/// One trusted issuer and the audiences accepted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorConfig {
    pub issuer_url: String,
    pub audiences: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ValidatorBuildError {
    #[error("no issuers configured")]
    NoIssuers,

    #[error("invalid issuer url '{url}': {reason}")]
    InvalidIssuer { url: String, reason: &'static str },

    #[error("issuer '{0}' has no audiences")]
    NoAudiences(String),
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("malformed token: {0}")]
    Malformed(#[from] JwsError),

    #[error("token has no 'iss' claim")]
    MissingIssuer,

    #[error("no validator configured for issuer '{0}'")]
    UnknownIssuer(String),

    #[error("token header has no 'kid'")]
    MissingKid,

    #[error("failed to fetch {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to fetch {what}: HTTP {status}")]
    Status {
        what: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("issuer mismatch: expected '{expected}', got '{actual}'")]
    IssuerMismatch { expected: String, actual: String },

    #[error("key '{0}' not found in JWKS")]
    UnknownKey(String),

    #[error("invalid JWK: {0}")]
    Jwk(#[source] jsonwebtoken::errors::Error),

    #[error("token verification failed: {0}")]
    Jwt(#[source] jsonwebtoken::errors::Error),

    #[error("custom claims rejected: {0}")]
    CustomClaims(String),

    #[error("validator unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum ClaimsError {
    #[error("invalid registered claims: {0}")]
    Registered(#[source] serde_json::Error),

    #[error("invalid custom claims: {0}")]
    Custom(#[source] serde_json::Error),
}

/// Payload of a token that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedClaims {
    payload: Map<String, Value>,
}

impl ValidatedClaims {
    /// Split the payload into registered claims and the caller's custom claims type.
    pub fn extract<C: DeserializeOwned>(&self) -> Result<(RegisteredClaims, C), ClaimsError> {
        let value = Value::Object(self.payload.clone());
        let registered = RegisteredClaims::deserialize(&value).map_err(ClaimsError::Registered)?;
        let custom = serde_json::from_value(value).map_err(ClaimsError::Custom)?;
        Ok((registered, custom))
    }
}

impl From<Map<String, Value>> for ValidatedClaims {
    fn from(payload: Map<String, Value>) -> Self {
        Self { payload }
    }
}

#[async_trait]
pub trait TokenValidator: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<ValidatedClaims, ValidationError>;
}

#[derive(Debug, Clone)]
struct IssuerValidator {
    issuer: String,
    audiences: Vec<String>,
}

impl IssuerValidator {
    fn matches(&self, iss: &str) -> bool {
        self.issuer.trim_end_matches('/') == iss.trim_end_matches('/')
    }
}

/// Validates tokens from any of the configured issuers.
///
/// `C` is the custom claims type every validated token must also satisfy.
pub struct MultiValidator<C> {
    issuers: Vec<IssuerValidator>,
    http: reqwest::Client,
    _claims: PhantomData<fn() -> C>,
}

impl<C> std::fmt::Debug for MultiValidator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultiValidator")
            .field("issuers", &self.issuers)
            .finish()
    }
}

impl<C: CustomClaims> MultiValidator<C> {
    pub fn new(
        configs: Vec<ValidatorConfig>,
        http: reqwest::Client,
    ) -> Result<Self, ValidatorBuildError> {
        if configs.is_empty() {
            return Err(ValidatorBuildError::NoIssuers);
        }

        let issuers = configs
            .into_iter()
            .map(|config| {
                validate_issuer_url(&config.issuer_url)?;
                if config.audiences.iter().all(|a| a.trim().is_empty()) {
                    return Err(ValidatorBuildError::NoAudiences(config.issuer_url));
                }
                Ok(IssuerValidator {
                    issuer: config.issuer_url,
                    audiences: config.audiences,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            issuers,
            http,
            _claims: PhantomData,
        })
    }
}

#[async_trait]
impl<C: CustomClaims + 'static> TokenValidator for MultiValidator<C> {
    async fn validate_token(&self, token: &str) -> Result<ValidatedClaims, ValidationError> {
        let parsed = jws::parse_signed(token)?;
        let preview: Claims = parsed.unverified_claims()?;

        let iss = preview.iss.ok_or(ValidationError::MissingIssuer)?;
        let issuer = self
            .issuers
            .iter()
            .find(|v| v.matches(&iss))
            .ok_or_else(|| ValidationError::UnknownIssuer(iss.clone()))?;

        let kid = parsed
            .header()
            .kid
            .clone()
            .ok_or(ValidationError::MissingKid)?;

        let discovery = fetch_discovery(&self.http, &issuer.issuer).await?;
        let jwks = fetch_jwks(&self.http, &discovery.jwks_uri).await?;

        let jwk = jwks
            .find(&kid)
            .ok_or_else(|| ValidationError::UnknownKey(kid.clone()))?;
        let key = DecodingKey::from_jwk(jwk).map_err(ValidationError::Jwk)?;

        let mut validation = Validation::new(parsed.header().alg);
        validation.set_issuer(&[iss.as_str()]);
        validation.set_audience(&issuer.audiences);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.validate_nbf = true;
        validation.leeway = LEEWAY_SECONDS;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)
            .map_err(ValidationError::Jwt)?;

        let custom: C = serde_json::from_value(Value::Object(data.claims.clone()))
            .map_err(|e| ValidationError::CustomClaims(e.to_string()))?;
        custom.validate().map_err(ValidationError::CustomClaims)?;

        tracing::debug!(issuer = %issuer.issuer, kid = %kid, "token validated");

        Ok(data.claims.into())
    }
}

/// Stands in when the real validator could not be built; every validation fails with the
/// construction error.
#[derive(Debug, Clone)]
pub struct UnavailableValidator {
    reason: String,
}

impl UnavailableValidator {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl TokenValidator for UnavailableValidator {
    async fn validate_token(&self, _token: &str) -> Result<ValidatedClaims, ValidationError> {
        Err(ValidationError::Unavailable(self.reason.clone()))
    }
}

/// Issuer URLs must be https (http is allowed for localhost), without query, fragment or
/// userinfo.
fn validate_issuer_url(issuer: &str) -> Result<(), ValidatorBuildError> {
    let invalid = |reason| ValidatorBuildError::InvalidIssuer {
        url: issuer.to_string(),
        reason,
    };

    let url = url::Url::parse(issuer).map_err(|_| invalid("not a valid URL"))?;

    let is_localhost = matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    );
    if url.scheme() != "https" && !(url.scheme() == "http" && is_localhost) {
        return Err(invalid("must use https"));
    }
    if url.query().is_some() {
        return Err(invalid("must not have a query string"));
    }
    if url.fragment().is_some() {
        return Err(invalid("must not have a fragment"));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("must not have userinfo"));
    }

    Ok(())
}
