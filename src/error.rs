/*
 * Responsibility
 * - 起動/serve 時のアプリ共通エラー (AppError)
 * - リクエスト処理中のエラーは HTTP status にせず DebugResult.errors に積む
 */
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
