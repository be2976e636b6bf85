/*
 * Responsibility
 * - debug 用 URL 構造
 * - 認証は掛けない (read-only の診断用)
 */
use axum::{Router, routing::get};

use crate::api::debug::handlers::fly_token;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/debug/fly-token", get(fly_token))
}
