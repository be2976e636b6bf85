//! Compact JWS parsing for display purposes.
//!
//! Nothing here checks a signature. `unverified_claims` must never feed a trust decision;
//! that is the validator's job.

use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use jsonwebtoken::Header;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwsError {
    #[error("compact JWS must have 3 segments, found {0}")]
    Segments(usize),

    #[error("empty {0} segment")]
    EmptySegment(&'static str),

    #[error("invalid header: {0}")]
    Header(#[source] jsonwebtoken::errors::Error),

    #[error("invalid {segment} encoding: {source}")]
    Encoding {
        segment: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A structurally valid compact JWS whose signature has not been checked.
#[derive(Debug, Clone)]
pub struct SignedToken {
    header: Header,
    payload: Vec<u8>,
}

/// Parse `header.payload.signature`, decoding the header and both base64url segments.
pub fn parse_signed(raw: &str) -> Result<SignedToken, JwsError> {
    let segments: Vec<&str> = raw.trim().split('.').collect();
    if segments.len() != 3 {
        return Err(JwsError::Segments(segments.len()));
    }

    for (name, segment) in ["header", "payload", "signature"].into_iter().zip(&segments) {
        if segment.is_empty() {
            return Err(JwsError::EmptySegment(name));
        }
    }

    let header = jsonwebtoken::decode_header(raw.trim()).map_err(JwsError::Header)?;
    let payload = decode_segment("payload", segments[1])?;
    decode_segment("signature", segments[2])?;

    Ok(SignedToken { header, payload })
}

impl SignedToken {
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Deserialize the payload without verifying the signature.
    pub fn unverified_claims<T: DeserializeOwned>(&self) -> Result<T, JwsError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

fn decode_segment(segment: &'static str, input: &str) -> Result<Vec<u8>, JwsError> {
    URL_SAFE_NO_PAD
        .decode(input)
        .or_else(|_| URL_SAFE.decode(input))
        .map_err(|source| JwsError::Encoding { segment, source })
}
