// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Token lifecycle: decoding and expiry checks for access tokens.
//!
//! Tokens are three dot-separated segments (`header.payload.signature`); only
//! the payload is inspected. Signatures are never verified here, that is the
//! server's job. Every malformation collapses to "no payload", so callers treat
//! a broken token exactly like an expired one.
//!
//! Each time-dependent check has an `_at` variant taking "now" in Unix seconds.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;

use crate::clock::{ClockSource, SystemClock};

/// Refresh once a token has this many minutes (or fewer) left.
pub const REFRESH_THRESHOLD_MINUTES: u64 = 10;

const SEGMENT_DELIMITER: char = '.';

/// Base64url that accepts payloads with or without trailing padding.
const BASE64_URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Claims carried in the middle segment of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub subject_id: Option<String>,
    pub subject_role: Option<String>,
    /// Unix seconds.
    pub issued_at: Option<i64>,
    /// Unix seconds.
    pub expires_at: i64,
}

/// Claim spellings seen in the wild, resolved into [`TokenPayload`].
#[derive(Deserialize)]
struct RawClaims {
    #[serde(rename = "subjectId")]
    subject_id: Option<Value>,
    #[serde(rename = "userId")]
    user_id: Option<Value>,
    sub: Option<Value>,
    #[serde(rename = "subjectRole")]
    subject_role: Option<Value>,
    role: Option<Value>,
    iat: Option<i64>,
    #[serde(rename = "issuedAt")]
    issued_at: Option<i64>,
    exp: Option<i64>,
    #[serde(rename = "expiresAt")]
    expires_at: Option<i64>,
}

impl RawClaims {
    fn into_payload(self) -> Option<TokenPayload> {
        let expires_at = self.exp.or(self.expires_at)?;
        Some(TokenPayload {
            subject_id: claim_string(self.subject_id)
                .or_else(|| claim_string(self.user_id))
                .or_else(|| claim_string(self.sub)),
            subject_role: claim_string(self.subject_role).or_else(|| claim_string(self.role)),
            issued_at: self.iat.or(self.issued_at),
            expires_at,
        })
    }
}

/// Accepts string or numeric identifiers; anything else (or blank) is absent.
fn claim_string(value: Option<Value>) -> Option<String> {
    let s = match value? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl TokenPayload {
    /// True unless `expires_at` is strictly in the future.
    pub fn is_expired_at(&self, now_secs: i64) -> bool {
        self.expires_at <= now_secs
    }

    /// Seconds left before expiry, clamped to zero.
    pub fn seconds_to_expiry_at(&self, now_secs: i64) -> u64 {
        self.expires_at.saturating_sub(now_secs).max(0) as u64
    }

    /// Whole minutes left before expiry, clamped to zero.
    pub fn minutes_to_expiry_at(&self, now_secs: i64) -> u64 {
        self.seconds_to_expiry_at(now_secs) / 60
    }

    /// Both identity claims are present and the token has not expired.
    pub fn is_valid_at(&self, now_secs: i64) -> bool {
        self.subject_id.is_some() && self.subject_role.is_some() && !self.is_expired_at(now_secs)
    }
}

/// Decodes the payload segment of a token.
///
/// Returns `None` unless the token has exactly three segments, the middle one
/// is base64url, and it parses as a JSON object with an expiry claim.
pub fn decode(token: &str) -> Option<TokenPayload> {
    let segments: Vec<&str> = token.split(SEGMENT_DELIMITER).collect();
    if segments.len() != 3 {
        return None;
    }
    let bytes = BASE64_URL_LENIENT.decode(segments[1]).ok()?;
    let claims: RawClaims = serde_json::from_slice(&bytes).ok()?;
    claims.into_payload()
}

fn now_secs() -> i64 {
    SystemClock.now_secs()
}

pub fn is_expired(token: &str) -> bool {
    is_expired_at(token, now_secs())
}

pub fn is_expired_at(token: &str, now_secs: i64) -> bool {
    decode(token).is_none_or(|p| p.is_expired_at(now_secs))
}

pub fn time_to_expiry_minutes(token: &str) -> u64 {
    time_to_expiry_minutes_at(token, now_secs())
}

/// `floor((expires_at - now) / 60)`, clamped to zero; zero if undecodable.
pub fn time_to_expiry_minutes_at(token: &str, now_secs: i64) -> u64 {
    decode(token).map_or(0, |p| p.minutes_to_expiry_at(now_secs))
}

pub fn is_valid(token: &str) -> bool {
    is_valid_at(token, now_secs())
}

pub fn is_valid_at(token: &str, now_secs: i64) -> bool {
    decode(token).is_some_and(|p| p.is_valid_at(now_secs))
}

/// True once the token is within [`REFRESH_THRESHOLD_MINUTES`] of expiry.
///
/// Undecodable tokens report zero minutes left and therefore need refresh.
pub fn should_refresh(token: &str) -> bool {
    should_refresh_at(token, now_secs(), REFRESH_THRESHOLD_MINUTES)
}

pub fn should_refresh_at(token: &str, now_secs: i64, threshold_minutes: u64) -> bool {
    time_to_expiry_minutes_at(token, now_secs) <= threshold_minutes
}

#[cfg(test)]
#[path = "token_tests.rs"]
mod tests;
