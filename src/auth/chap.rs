// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! CHAP with MD5 (RFC 1994, algorithm 5 in RFC 7143 terms).
//!
//! These helpers are not driven by the login flow, which always offers
//! `AuthMethod=None`.

use std::collections::HashMap;

use md5::{Digest, Md5};

use crate::{
    error::{IscsiError, IscsiResult},
    models::text::kv::iter_key_value_pairs,
};

pub const CHAP_RESPONSE_LEN: usize = 16;

/// `MD5(id || secret || challenge)`.
pub fn compute_chap_response(
    id: u8,
    secret: &[u8],
    challenge: &[u8],
) -> [u8; CHAP_RESPONSE_LEN] {
    let mut hasher = Md5::new();
    hasher.update([id]);
    hasher.update(secret);
    hasher.update(challenge);
    let mut out = [0u8; CHAP_RESPONSE_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Wire form of `CHAP_R`: `0x` followed by upper-case hex.
pub fn format_chap_response(response: &[u8]) -> String {
    format!("0x{}", hex::encode_upper(response))
}

/// `CHAP_I` / `CHAP_C` as sent by the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapChallenge {
    pub id: u8,
    pub challenge: Vec<u8>,
}

impl ChapChallenge {
    /// `CHAP_N` / `CHAP_R` pairs answering this challenge.
    pub fn answer(&self, username: &str, secret: &[u8]) -> HashMap<String, String> {
        let r = compute_chap_response(self.id, secret, &self.challenge);
        HashMap::from([
            ("CHAP_N".to_owned(), username.to_owned()),
            ("CHAP_R".to_owned(), format_chap_response(&r)),
        ])
    }
}

fn auth_err(msg: impl Into<String>) -> IscsiError {
    IscsiError::AuthenticationFailed(msg.into())
}

/// Pulls `CHAP_I` and `CHAP_C` out of a login data segment. Only the hex
/// encoding of `CHAP_C` is accepted.
pub fn parse_chap_challenge(data: &[u8]) -> IscsiResult<ChapChallenge> {
    let mut id = None;
    let mut challenge = None;

    for (k, v) in iter_key_value_pairs(data) {
        match k {
            "CHAP_I" => {
                let n = v
                    .trim()
                    .parse::<u8>()
                    .map_err(|_| auth_err(format!("bad CHAP_I {v:?}")))?;
                id = Some(n);
            },
            "CHAP_C" => {
                let v = v.trim();
                let digits = v
                    .strip_prefix("0x")
                    .or_else(|| v.strip_prefix("0X"))
                    .ok_or_else(|| auth_err(format!("CHAP_C is not hex encoded: {v:?}")))?;
                let bytes = hex::decode(digits)
                    .map_err(|e| auth_err(format!("bad CHAP_C: {e}")))?;
                challenge = Some(bytes);
            },
            _ => {},
        }
    }

    Ok(ChapChallenge {
        id: id.ok_or_else(|| auth_err("missing CHAP_I"))?,
        challenge: challenge.ok_or_else(|| auth_err("missing CHAP_C"))?,
    })
}
