// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! `key=value\0` text segments carried by Login and Text PDUs.

use std::collections::HashMap;

/// Parses a text data segment into a map.
///
/// Lenient: invalid UTF-8 yields an empty map, empty entries and entries
/// without `=` are dropped, and the value keeps everything after the first
/// `=`. Later duplicates win.
pub fn parse_key_value_pairs(bytes: &[u8]) -> HashMap<String, String> {
    iter_key_value_pairs(bytes)
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
}

/// Walks the entries of a text segment in wire order. Keys that repeat
/// (e.g. `TargetName` in a SendTargets reply) are all yielded.
pub fn iter_key_value_pairs(bytes: &[u8]) -> impl Iterator<Item = (&str, &str)> {
    let text = std::str::from_utf8(bytes).unwrap_or_default();
    text.split('\0')
        .filter(|e| !e.is_empty())
        .filter_map(|e| e.split_once('='))
}

/// Encodes pairs sorted by key, each terminated by a single NUL.
pub fn encode_key_value_pairs(pairs: &HashMap<String, String>) -> Vec<u8> {
    let mut keys: Vec<&String> = pairs.keys().collect();
    keys.sort();

    let mut out = Vec::new();
    for k in keys {
        out.extend_from_slice(k.as_bytes());
        out.push(b'=');
        out.extend_from_slice(pairs[k].as_bytes());
        out.push(0);
    }
    out
}

/// Encodes an ordered list of pairs verbatim.
pub fn encode_ordered_pairs<'a, I>(pairs: I) -> Vec<u8>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = Vec::new();
    for (k, v) in pairs {
        out.extend_from_slice(k.as_bytes());
        out.push(b'=');
        out.extend_from_slice(v.as_bytes());
        out.push(0);
    }
    out
}
