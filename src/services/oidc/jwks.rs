use jsonwebtoken::jwk::JwkSet;
use reqwest::header::ACCEPT;

use super::ValidationError;

/// Fetch the provider's signing keys. Not cached: every validation sees the current set.
pub async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, ValidationError> {
    let response = http
        .get(jwks_uri)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|source| ValidationError::Fetch {
            what: "JWKS",
            source,
        })?;

    if !response.status().is_success() {
        return Err(ValidationError::Status {
            what: "JWKS",
            status: response.status(),
        });
    }

    response
        .json::<JwkSet>()
        .await
        .map_err(|source| ValidationError::Fetch {
            what: "JWKS",
            source,
        })
}
