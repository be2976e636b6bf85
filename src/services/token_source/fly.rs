//! Fly.io machine identity tokens.
//!
//! Machines expose an API on a unix socket (`/.fly/api` by default). `POST /v1/tokens/oidc`
//! returns a freshly minted OIDC token as plain text. The optional `aud` selects the audience;
//! without it Fly uses `https://fly.io/<org>`.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, header};
use hyper_util::rt::TokioIo;
use serde::Serialize;
use tokio::net::UnixStream;

use super::{AccessToken, TokenSource, TokenSourceError};
use crate::services::{claims::Claims, jws};

const OIDC_TOKEN_PATH: &str = "/v1/tokens/oidc";

#[derive(Debug, Clone)]
pub struct FlyTokenSource {
    socket_path: PathBuf,
    audience: Option<String>,
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    aud: Option<&'a str>,
}

impl FlyTokenSource {
    pub fn new(socket_path: impl Into<PathBuf>, audience: Option<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            audience,
        }
    }

    async fn request_token(&self) -> Result<String, TokenSourceError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|source| TokenSourceError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(err) = conn.await {
                tracing::debug!(error = %err, "fly api connection closed with error");
            }
        });

        let body = serde_json::to_vec(&TokenRequest {
            aud: self.audience.as_deref(),
        })?;

        let req = Request::builder()
            .method(Method::POST)
            .uri(OIDC_TOKEN_PATH)
            .header(header::HOST, "localhost")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))?;

        let res = sender.send_request(req).await?;
        let status = res.status();
        let bytes = res.into_body().collect().await?.to_bytes();
        let text = String::from_utf8_lossy(&bytes).trim().to_string();

        if !status.is_success() {
            return Err(TokenSourceError::Status { status, body: text });
        }
        if text.is_empty() {
            return Err(TokenSourceError::EmptyToken);
        }

        Ok(text)
    }
}

#[async_trait]
impl TokenSource for FlyTokenSource {
    async fn token(&self) -> Result<AccessToken, TokenSourceError> {
        let access_token = self.request_token().await?;
        let expiry = expiry_from_token(&access_token);

        tracing::debug!(expiry = ?expiry, "fetched fly oidc token");

        Ok(AccessToken {
            access_token,
            token_type: "Bearer".to_string(),
            expiry,
        })
    }
}

// Fly does not send an expiry alongside the token; read it from the payload.
fn expiry_from_token(raw: &str) -> Option<DateTime<Utc>> {
    let claims: Claims = jws::parse_signed(raw).ok()?.unverified_claims().ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, body::Bytes as AxumBytes, extract::State, http::StatusCode, routing::post};
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::json;
    use tokio::net::UnixListener;

    use super::*;

    #[derive(Clone, Default)]
    struct FakeFlyApi {
        requests: Arc<Mutex<Vec<serde_json::Value>>>,
        reply: Arc<Mutex<(u16, String)>>,
    }

    async fn issue(State(api): State<FakeFlyApi>, body: AxumBytes) -> (StatusCode, String) {
        let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        api.requests.lock().unwrap().push(value);
        let (status, text) = api.reply.lock().unwrap().clone();
        (StatusCode::from_u16(status).unwrap(), text)
    }

    fn serve(dir: &tempfile::TempDir, api: FakeFlyApi) -> PathBuf {
        let path = dir.path().join("api.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let app = Router::new()
            .route(OIDC_TOKEN_PATH, post(issue))
            .with_state(api);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        path
    }

    fn signed(exp: i64) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"iss": "https://oidc.fly.io/acme", "exp": exp}),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn fetches_token_and_reads_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeFlyApi::default();
        let token = signed(1_900_000_000);
        *api.reply.lock().unwrap() = (200, format!("{}\n", token));
        let path = serve(&dir, api.clone());

        let source = FlyTokenSource::new(&path, Some("https://fly.io/acme".to_string()));
        let got = source.token().await.unwrap();

        assert_eq!(got.access_token, token);
        assert_eq!(got.token_type, "Bearer");
        assert_eq!(got.expiry, DateTime::from_timestamp(1_900_000_000, 0));
        assert_eq!(
            api.requests.lock().unwrap().as_slice(),
            &[json!({"aud": "https://fly.io/acme"})]
        );
    }

    #[tokio::test]
    async fn omits_audience_when_unset() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeFlyApi::default();
        *api.reply.lock().unwrap() = (200, "opaque-token".to_string());
        let path = serve(&dir, api.clone());

        let got = FlyTokenSource::new(&path, None).token().await.unwrap();

        assert_eq!(got.access_token, "opaque-token");
        assert!(got.expiry.is_none());
        assert_eq!(api.requests.lock().unwrap().as_slice(), &[json!({})]);
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeFlyApi::default();
        *api.reply.lock().unwrap() = (403, "not allowed".to_string());
        let path = serve(&dir, api);

        let err = FlyTokenSource::new(&path, None).token().await.unwrap_err();
        match err {
            TokenSourceError::Status { status, body } => {
                assert_eq!(status.as_u16(), 403);
                assert_eq!(body, "not allowed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_body_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let api = FakeFlyApi::default();
        *api.reply.lock().unwrap() = (200, "  ".to_string());
        let path = serve(&dir, api);

        let err = FlyTokenSource::new(&path, None).token().await.unwrap_err();
        assert!(matches!(err, TokenSourceError::EmptyToken));
    }

    #[test]
    fn fractional_expiry_is_truncated() {
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"iss": "https://oidc.fly.io/acme", "exp": 1_900_000_000.75}),
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();

        assert_eq!(
            expiry_from_token(&token),
            DateTime::from_timestamp(1_900_000_000, 0)
        );
    }

    #[tokio::test]
    async fn missing_socket_is_a_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FlyTokenSource::new(dir.path().join("absent.sock"), None);

        let err = source.token().await.unwrap_err();
        assert!(matches!(err, TokenSourceError::Connect { .. }));
        assert!(err.to_string().contains("absent.sock"));
    }
}
