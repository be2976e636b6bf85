//! JWT claim sets shown by the debug endpoint.
//!
//! - `Claims`: whatever the payload says, read without verification.
//! - `RegisteredClaims`: the standard claims of a token that passed validation.
//! - `FlyClaims`: the Fly.io machine identity claims carried next to them.

use serde::{Deserialize, Deserializer, Serialize};

/// Unverified claims. Every field is optional because nothing about the payload is trusted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Kept in the shape the token used, a single string or an array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<Audience>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub exp: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Registered claims of a validated token.
///
/// `iss`, `aud` and `exp` are required by the validator, so they are plain values here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    pub iss: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,
    #[serde(deserialize_with = "deserialize_audience")]
    pub aud: Vec<String>,
    #[serde(deserialize_with = "deserialize_numeric_date")]
    pub exp: i64,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub nbf: Option<i64>,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_numeric_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// Application-specific claims validated alongside the registered ones.
pub trait CustomClaims: serde::de::DeserializeOwned + Send {
    /// Extra checks on top of signature/issuer/audience/expiry.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Claims Fly.io adds to machine OIDC tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlyClaims {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub app_name: Option<String>,
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub org_name: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
    #[serde(default)]
    pub machine_name: Option<String>,
    #[serde(default)]
    pub machine_version: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_digest: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

impl CustomClaims for FlyClaims {}

/// `aud` as it appears on the wire: a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Audience::One(one) => vec![one],
            Audience::Many(many) => many,
        }
    }
}

pub(crate) fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Audience>::deserialize(deserializer)?
        .map(Audience::into_vec)
        .unwrap_or_default())
}

// NumericDate (RFC 7519) may carry fractional seconds; they are truncated.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumericDate {
    Seconds(i64),
    Fractional(f64),
}

impl NumericDate {
    fn seconds(self) -> i64 {
        match self {
            NumericDate::Seconds(secs) => secs,
            NumericDate::Fractional(secs) => secs.trunc() as i64,
        }
    }
}

fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(NumericDate::deserialize(deserializer)?.seconds())
}

fn deserialize_optional_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<NumericDate>::deserialize(deserializer)?.map(NumericDate::seconds))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn audience_accepts_string_or_array() {
        let single: Claims = serde_json::from_value(json!({"aud": "https://fly.io/acme"})).unwrap();
        assert_eq!(single.aud, Some(Audience::One("https://fly.io/acme".to_string())));

        let many: Claims = serde_json::from_value(json!({"aud": ["a", "b"]})).unwrap();
        assert_eq!(
            many.aud.map(Audience::into_vec),
            Some(vec!["a".to_string(), "b".to_string()])
        );

        let null: Claims = serde_json::from_value(json!({"aud": null})).unwrap();
        assert!(null.aud.is_none());

        let registered: RegisteredClaims = serde_json::from_value(json!({
            "iss": "https://oidc.fly.io/acme",
            "aud": "https://fly.io/acme",
            "exp": 1_900_000_000,
        }))
        .unwrap();
        assert_eq!(registered.aud, vec!["https://fly.io/acme".to_string()]);
    }

    #[test]
    fn audience_keeps_its_shape_when_displayed() {
        let single: Claims = serde_json::from_value(json!({"aud": "https://fly.io/acme"})).unwrap();
        assert_eq!(
            serde_json::to_value(&single).unwrap(),
            json!({"aud": "https://fly.io/acme"})
        );

        let many: Claims = serde_json::from_value(json!({"aud": ["a", "b"]})).unwrap();
        assert_eq!(serde_json::to_value(&many).unwrap(), json!({"aud": ["a", "b"]}));
    }

    #[test]
    fn numeric_dates_may_be_fractional() {
        let claims: Claims = serde_json::from_value(json!({
            "exp": 1_900_000_000.5,
            "nbf": 1_899_999_000.999,
            "iat": 1_899_999_000,
        }))
        .unwrap();
        assert_eq!(claims.exp, Some(1_900_000_000));
        assert_eq!(claims.nbf, Some(1_899_999_000));
        assert_eq!(claims.iat, Some(1_899_999_000));

        let registered: RegisteredClaims = serde_json::from_value(json!({
            "iss": "https://oidc.fly.io/acme",
            "aud": ["https://fly.io/acme"],
            "exp": 1_900_000_000.5,
            "iat": 1_899_999_000.25,
        }))
        .unwrap();
        assert_eq!(registered.exp, 1_900_000_000);
        assert_eq!(registered.iat, Some(1_899_999_000));
    }

    #[test]
    fn numeric_dates_reject_strings() {
        assert!(serde_json::from_value::<Claims>(json!({"exp": "tomorrow"})).is_err());
    }

    #[test]
    fn empty_claims_serialize_to_empty_object() {
        assert_eq!(serde_json::to_value(Claims::default()).unwrap(), json!({}));
    }

    #[test]
    fn registered_claims_require_exp() {
        let err = serde_json::from_value::<RegisteredClaims>(json!({
            "iss": "https://oidc.fly.io/acme",
            "aud": "https://fly.io/acme",
        }));
        assert!(err.is_err());
    }

    #[test]
    fn fly_claims_ignore_unknown_fields() {
        let claims: FlyClaims = serde_json::from_value(json!({
            "app_name": "debugger",
            "region": "nrt",
            "something_else": 1,
        }))
        .unwrap();
        assert_eq!(claims.app_name.as_deref(), Some("debugger"));
        assert_eq!(claims.region.as_deref(), Some("nrt"));
        assert!(claims.org_id.is_none());
    }
}
