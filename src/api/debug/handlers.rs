/*
 * Responsibility
 * - GET /debug/fly-token
 * - query/body は見ない
 * - 内部の失敗に関係なく常に 200 + application/json (エラーは body の Errors に入る)
 */
use axum::{
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

pub async fn fly_token(State(state): State<AppState>) -> Response {
    let result = state.debugger.run().await;

    let body = serde_json::to_vec(&result).unwrap_or_else(|err| {
        tracing::error!(error = %err, "error encoding debug result");
        b"{}".to_vec()
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response()
}
