/*
 * Responsibility
 * - token 取得 → 署名未検証 decode → OIDC 検証 → DebugResult 組み立て
 * - 各段階の失敗は DebugResult.errors に積み、後続段階は止めない
 * - エラーは tracing に出してから errors に積む (ログとレスポンスは別経路)
 */
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::claims::{Claims, FlyClaims, RegisteredClaims};
use crate::services::jws;
use crate::services::oidc::TokenValidator;
use crate::services::token_source::TokenSource;

/// Pipeline stage an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Token,
    Parse,
    Decode,
    Validate,
    Extract,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DebugError {
    pub stage: Stage,
    pub message: String,
}

/// Diagnostic payload for one request. Keys are PascalCase; empty fields are omitted.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DebugResult {
    /// Never populated; kept so clients reading the key keep working.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_token: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<DebugError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_claims: Option<RegisteredClaims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Claims>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl DebugResult {
    fn push_error(&mut self, stage: Stage, message: String) {
        self.errors.push(DebugError { stage, message });
    }

    #[cfg(test)]
    pub fn errors_in(&self, stage: Stage) -> impl Iterator<Item = &DebugError> {
        self.errors.iter().filter(move |e| e.stage == stage)
    }
}

/// Fetches a token and reports what the decoder and the validator make of it.
pub struct TokenDebugger {
    source: Arc<dyn TokenSource>,
    validator: Arc<dyn TokenValidator>,
}

impl TokenDebugger {
    pub fn new(source: Arc<dyn TokenSource>, validator: Arc<dyn TokenValidator>) -> Self {
        Self { source, validator }
    }

    pub async fn run(&self) -> DebugResult {
        let mut out = DebugResult::default();

        // A failed fetch yields no token at all, so there is nothing to decode or validate
        // and AccessToken/Expiry stay unset.
        let token = match self.source.token().await {
            Ok(token) => token,
            Err(err) => {
                tracing::error!(error = %err, "error getting token");
                out.push_error(Stage::Token, format!("error getting token: {}", err));
                return out;
            }
        };

        tracing::debug!(token_type = %token.token_type, expiry = ?token.expiry, "token obtained");

        out.access_token = Some(token.access_token.clone()).filter(|t| !t.is_empty());
        out.expiry = token.expiry;

        decode_unverified(&token.access_token, &mut out);
        self.validate(&token.access_token, &mut out).await;

        out
    }

    async fn validate(&self, raw: &str, out: &mut DebugResult) {
        let validated = match self.validator.validate_token(raw).await {
            Ok(validated) => validated,
            Err(err) => {
                tracing::error!(error = %err, token = %raw, "error validating token");
                out.push_error(
                    Stage::Validate,
                    format!("error validating token: {}: {}", err, raw),
                );
                return;
            }
        };

        match validated.extract::<FlyClaims>() {
            Ok((registered, fly)) => {
                tracing::debug!(
                    sub = %registered.sub,
                    app = ?fly.app_name,
                    machine = ?fly.machine_id,
                    "validated fly token"
                );
                out.registered_claims = Some(registered);
            }
            Err(err) => {
                tracing::error!(error = %err, token = %raw, "error extracting claims");
                out.push_error(Stage::Extract, format!("error extracting claims: {}", err));
            }
        }
    }
}

fn decode_unverified(raw: &str, out: &mut DebugResult) {
    let parsed = match jws::parse_signed(raw) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::error!(error = %err, token = %raw, "error parsing token");
            out.push_error(Stage::Parse, format!("error parsing token: {}: {}", err, raw));
            return;
        }
    };

    match parsed.unverified_claims::<Claims>() {
        Ok(claims) => out.claims = Some(claims),
        Err(err) => {
            tracing::error!(error = %err, token = %raw, "error decoding token");
            out.push_error(Stage::Decode, format!("error decoding token: {}: {}", err, raw));
        }
    }
}
