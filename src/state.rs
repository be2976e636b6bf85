/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - debugger: token source + validator (起動時に一度だけ生成, 以降 read-only)
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use crate::services::debug::TokenDebugger;

#[derive(Clone)]
pub struct AppState {
    pub debugger: Arc<TokenDebugger>,
}

impl AppState {
    pub fn new(debugger: Arc<TokenDebugger>) -> Self {
        Self { debugger }
    }
}
