/*
 * Responsibility
 * - HTTP surface の公開ポイント (routes() の re-export など)
 */
pub mod debug;
pub mod health;

use axum::Router;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(debug::routes())
}
