//! OIDC discovery document fetching.

use reqwest::header::ACCEPT;
use serde::Deserialize;

use super::ValidationError;

/// OIDC discovery document (partial)
#[derive(Debug, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
}

/// Fetch `<issuer>/.well-known/openid-configuration` and check it describes `issuer`.
pub async fn fetch_discovery(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<DiscoveryDocument, ValidationError> {
    let issuer = issuer.trim_end_matches('/');
    let url = format!("{}/.well-known/openid-configuration", issuer);

    let response = http
        .get(&url)
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(|source| ValidationError::Fetch {
            what: "discovery document",
            source,
        })?;

    if !response.status().is_success() {
        return Err(ValidationError::Status {
            what: "discovery document",
            status: response.status(),
        });
    }

    let doc: DiscoveryDocument =
        response
            .json()
            .await
            .map_err(|source| ValidationError::Fetch {
                what: "discovery document",
                source,
            })?;

    if doc.issuer.trim_end_matches('/') != issuer {
        return Err(ValidationError::IssuerMismatch {
            expected: issuer.to_string(),
            actual: doc.issuer,
        });
    }

    Ok(doc)
}
