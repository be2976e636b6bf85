/*
 * Responsibility
 * - 環境変数 (.env 含む) からの設定読み込み
 * - Fly API socket / OIDC issuer / audience の既定値は固定リテラル
 * - 不正な値は起動失敗
 */
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::services::oidc::ValidatorConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FLY_API_SOCKET: &str = "/.fly/api";
pub const DEFAULT_OIDC_ISSUER_URL: &str = "https://oidc.fly.io/pat-downey";
pub const DEFAULT_OIDC_AUDIENCE: &str = "https://fly.io/pat-downey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub fly_api_socket: PathBuf,
    pub fly_token_audience: Option<String>,

    pub validators: Vec<ValidatorConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid("PORT"))?,
            None => DEFAULT_PORT,
        };

        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = lookup("APP_ENV")
            .map(|v| AppEnv::parse(&v))
            .unwrap_or(AppEnv::Development);

        let fly_api_socket = lookup("FLY_API_SOCKET")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_FLY_API_SOCKET));

        let fly_token_audience = lookup("FLY_TOKEN_AUDIENCE")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let issuer_url = lookup("OIDC_ISSUER_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_OIDC_ISSUER_URL.to_string());

        let audiences = match lookup("OIDC_AUDIENCES") {
            Some(raw) => {
                let list = raw
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>();
                if list.is_empty() {
                    return Err(ConfigError::Missing("OIDC_AUDIENCES"));
                }
                list
            }
            None => vec![DEFAULT_OIDC_AUDIENCE.to_string()],
        };

        Ok(Self {
            addr,
            app_env,
            fly_api_socket,
            fly_token_audience,
            validators: vec![ValidatorConfig {
                issuer_url,
                audiences,
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_match_fly_deployment() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.fly_api_socket, PathBuf::from("/.fly/api"));
        assert!(config.fly_token_audience.is_none());
        assert_eq!(config.validators.len(), 1);
        assert_eq!(
            config.validators[0].issuer_url,
            "https://oidc.fly.io/pat-downey"
        );
        assert_eq!(
            config.validators[0].audiences,
            vec!["https://fly.io/pat-downey".to_string()]
        );
    }

    #[test]
    fn overrides_are_trimmed_and_split() {
        let config = config_from(&[
            ("PORT", "9090"),
            ("APP_ENV", "Prod"),
            ("FLY_TOKEN_AUDIENCE", " https://fly.io/acme "),
            ("OIDC_ISSUER_URL", "https://oidc.fly.io/acme"),
            ("OIDC_AUDIENCES", "https://fly.io/acme, api://acme ,"),
        ])
        .unwrap();

        assert_eq!(config.addr.port(), 9090);
        assert!(config.app_env.is_production());
        assert_eq!(
            config.fly_token_audience.as_deref(),
            Some("https://fly.io/acme")
        );
        assert_eq!(config.validators[0].issuer_url, "https://oidc.fly.io/acme");
        assert_eq!(
            config.validators[0].audiences,
            vec!["https://fly.io/acme".to_string(), "api://acme".to_string()]
        );
    }

    #[test]
    fn invalid_port_fails() {
        let err = config_from(&[("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("PORT")));
    }

    #[test]
    fn blank_audience_list_fails() {
        let err = config_from(&[("OIDC_AUDIENCES", " , ")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OIDC_AUDIENCES")));
    }
}
