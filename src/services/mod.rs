/*
 * Responsibility
 * - token 取得 / JWS decode / OIDC 検証 / debug pipeline
 */
pub mod claims;
pub mod debug;
pub mod factory;
pub mod jws;
pub mod oidc;
pub mod token_source;
