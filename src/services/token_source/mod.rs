/*
 * Responsibility
 * - access token の取得元 (TokenSource) の抽象
 * - 実装は fly.rs (Fly.io machine API)
 */
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod fly;

pub use fly::FlyTokenSource;

/// Token handed out by a `TokenSource`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    /// Usually "Bearer"
    pub token_type: String,
    /// `None` when the source cannot tell.
    pub expiry: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
pub enum TokenSourceError {
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] hyper::http::Error),

    #[error("invalid request body: {0}")]
    Body(#[from] serde_json::Error),

    #[error("unexpected status {status}: {body}")]
    Status {
        status: hyper::StatusCode,
        body: String,
    },

    #[error("empty token in response")]
    EmptyToken,
}

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<AccessToken, TokenSourceError>;
}
