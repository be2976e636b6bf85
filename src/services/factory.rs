/// Factory: build the token debugger from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::services::claims::FlyClaims;
use crate::services::debug::TokenDebugger;
use crate::services::oidc::{MultiValidator, TokenValidator, UnavailableValidator};
use crate::services::token_source::FlyTokenSource;

pub fn build_debugger(config: &Config) -> Result<Arc<TokenDebugger>, AppError> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("fly-token-debug/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let source = Arc::new(FlyTokenSource::new(
        config.fly_api_socket.clone(),
        config.fly_token_audience.clone(),
    ));
    let validator = build_validator(config, http);

    Ok(Arc::new(TokenDebugger::new(source, validator)))
}

// Built once. On failure the error is logged here and every later validation reports it;
// there is no retry.
fn build_validator(config: &Config, http: reqwest::Client) -> Arc<dyn TokenValidator> {
    match MultiValidator::<FlyClaims>::new(config.validators.clone(), http) {
        Ok(validator) => {
            tracing::info!(issuers = ?config.validators, "oidc validator ready");
            Arc::new(validator)
        }
        Err(err) => {
            tracing::error!(error = %err, "error creating validator");
            Arc::new(UnavailableValidator::new(format!(
                "error creating validator: {}",
                err
            )))
        }
    }
}
