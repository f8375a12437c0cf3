// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SendTargets reply parsing.
//!
//! A reply is a sequence of `TargetName=<iqn>` entries, each followed by
//! zero or more `TargetAddress=<host>[:<port>][,<tag>]` entries that belong
//! to it.

use crate::models::text::kv::iter_key_value_pairs;

pub const DEFAULT_PORT: u16 = 3260;
pub const DEFAULT_GROUP_TAG: u16 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portal {
    pub address: String,
    pub port: u16,
    pub group_tag: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredTarget {
    pub iqn: String,
    pub portals: Vec<Portal>,
}

/// Parses a SendTargets text segment. Addresses that appear before any
/// `TargetName` are dropped.
pub fn parse_send_targets(data: &[u8]) -> Vec<DiscoveredTarget> {
    let mut out: Vec<DiscoveredTarget> = Vec::new();
    for (k, v) in iter_key_value_pairs(data) {
        match k {
            "TargetName" => out.push(DiscoveredTarget {
                iqn: v.to_owned(),
                portals: Vec::new(),
            }),
            "TargetAddress" => {
                if let Some(t) = out.last_mut() {
                    t.portals.push(parse_portal_address(v));
                }
            },
            _ => {},
        }
    }
    out
}

/// Parses `host[:port][,tag]`; bracketed IPv6 hosts are accepted. Missing or
/// unparseable port and tag fall back to 3260 and 1.
pub fn parse_portal_address(s: &str) -> Portal {
    let (addr, tag) = match s.split_once(',') {
        Some((a, t)) => (a, t.trim().parse().unwrap_or(DEFAULT_GROUP_TAG)),
        None => (s, DEFAULT_GROUP_TAG),
    };

    let (host, port) = if let Some(rest) = addr.strip_prefix('[') {
        match rest.split_once(']') {
            Some((h, tail)) => (h, tail.strip_prefix(':')),
            None => (rest, None),
        }
    } else {
        match addr.split_once(':') {
            Some((h, p)) => (h, Some(p)),
            None => (addr, None),
        }
    };

    Portal {
        address: host.to_owned(),
        port: port.and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT),
        group_tag: tag,
    }
}
