// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Boolean iSCSI value, `Yes` / `No` on the wire.
///
/// YAML may spell it as a native boolean, `0`/`1`, or any case of
/// `yes`/`no`/`true`/`false`.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "YesNoRepr")]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum YesNoRepr {
    Bool(bool),
    Int(u64),
    Text(String),
}

impl TryFrom<YesNoRepr> for YesNo {
    type Error = String;

    fn try_from(r: YesNoRepr) -> Result<Self, Self::Error> {
        match r {
            YesNoRepr::Bool(b) => Ok(b.into()),
            YesNoRepr::Int(0) => Ok(YesNo::No),
            YesNoRepr::Int(1) => Ok(YesNo::Yes),
            YesNoRepr::Int(n) => Err(format!("expected Yes or No, got {n}")),
            YesNoRepr::Text(s) => match s.to_ascii_lowercase().as_str() {
                "yes" | "true" | "1" => Ok(YesNo::Yes),
                "no" | "false" | "0" => Ok(YesNo::No),
                _ => Err(format!("expected Yes or No, got {s:?}")),
            },
        }
    }
}

impl Serialize for YesNo {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

impl From<bool> for YesNo {
    fn from(b: bool) -> Self {
        if b { YesNo::Yes } else { YesNo::No }
    }
}

impl YesNo {
    pub fn as_bool(self) -> bool {
        self == YesNo::Yes
    }

    pub fn as_str(self) -> &'static str {
        if self.as_bool() { "Yes" } else { "No" }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session type requested in the Security stage.
#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    #[serde(alias = "discovery", alias = "DISCOVERY")]
    Discovery,
    #[default]
    #[serde(alias = "normal", alias = "NORMAL")]
    Normal,
}

impl SessionType {
    pub fn is_discovery(self) -> bool {
        self == SessionType::Discovery
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::Discovery => "Discovery",
            SessionType::Normal => "Normal",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HeaderDigest / DataDigest algorithm.
#[derive(Deserialize, Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Digest {
    #[default]
    #[serde(alias = "none", alias = "NONE")]
    None,
    #[serde(alias = "crc32c")]
    CRC32C,
}

impl Digest {
    /// Reads a negotiated digest value; a target answer of `CRC32C,None`
    /// resolves to its first entry.
    pub fn from_wire(v: &str) -> Self {
        match v.split(',').next().map(str::trim) {
            Some(s) if s.eq_ignore_ascii_case("CRC32C") => Digest::CRC32C,
            _ => Digest::None,
        }
    }

    pub fn enabled(self) -> bool {
        self == Digest::CRC32C
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Digest::None => "None",
            Digest::CRC32C => "CRC32C",
        }
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
