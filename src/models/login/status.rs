//! Status-Class / Status-Detail pair of a Login Response (RFC 7143 §11.13.5).

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

/// The status classes as per RFC 7143 §11.13.5
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// target accepted the request
    Success,
    /// initiator must follow TargetAddress
    Redirection,
    /// mistake on initiator side; do not retry
    InitiatorError,
    /// target temporarily cannot fulfil; may retry
    TargetError,
    Unknown(u8),
}

impl From<u8> for StatusClass {
    fn from(b: u8) -> Self {
        match b {
            0 => StatusClass::Success,
            1 => StatusClass::Redirection,
            2 => StatusClass::InitiatorError,
            3 => StatusClass::TargetError,
            other => StatusClass::Unknown(other),
        }
    }
}

impl From<StatusClass> for u8 {
    fn from(class: StatusClass) -> Self {
        match class {
            StatusClass::Success => 0x00,
            StatusClass::Redirection => 0x01,
            StatusClass::InitiatorError => 0x02,
            StatusClass::TargetError => 0x03,
            StatusClass::Unknown(v) => v,
        }
    }
}

impl fmt::Display for StatusClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusClass::Success => f.write_str("Success"),
            StatusClass::Redirection => f.write_str("Redirection"),
            StatusClass::InitiatorError => f.write_str("Initiator Error"),
            StatusClass::TargetError => f.write_str("Target Error"),
            StatusClass::Unknown(v) => write!(f, "Unknown class 0x{v:02x}"),
        }
    }
}

/// Human-readable name of a Status-Detail, interpreted within its class.
pub fn detail_name(class: StatusClass, detail: u8) -> Option<&'static str> {
    Some(match (class, detail) {
        (StatusClass::Success, 0x00) => "Success",
        (StatusClass::Redirection, 0x01) => "Target moved temporarily",
        (StatusClass::Redirection, 0x02) => "Target moved permanently",
        (StatusClass::InitiatorError, 0x00) => "Initiator error",
        (StatusClass::InitiatorError, 0x01) => "Authentication failure",
        (StatusClass::InitiatorError, 0x02) => "Authorization failure",
        (StatusClass::InitiatorError, 0x03) => "Not found",
        (StatusClass::InitiatorError, 0x04) => "Target removed",
        (StatusClass::InitiatorError, 0x05) => "Unsupported version",
        (StatusClass::InitiatorError, 0x06) => "Too many connections",
        (StatusClass::InitiatorError, 0x07) => "Missing parameter",
        (StatusClass::InitiatorError, 0x08) => "Can't include in session",
        (StatusClass::InitiatorError, 0x09) => "Session type not supported",
        (StatusClass::InitiatorError, 0x0a) => "Session does not exist",
        (StatusClass::InitiatorError, 0x0b) => "Invalid during login",
        (StatusClass::TargetError, 0x00) => "Target error",
        (StatusClass::TargetError, 0x01) => "Service unavailable",
        (StatusClass::TargetError, 0x02) => "Out of resources",
        _ => return None,
    })
}

/// Class and detail as they arrive in a Login Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginStatus {
    pub class: u8,
    pub detail: u8,
}

impl LoginStatus {
    pub const fn new(class: u8, detail: u8) -> Self {
        Self { class, detail }
    }

    #[inline]
    pub fn status_class(self) -> StatusClass {
        StatusClass::from(self.class)
    }

    #[inline]
    pub const fn is_success(self) -> bool {
        self.class == 0
    }
}

impl fmt::Display for LoginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.status_class();
        match detail_name(class, self.detail) {
            Some(name) => write!(f, "{class}: {name}"),
            None => write!(f, "{class}: detail 0x{:02x}", self.detail),
        }
    }
}
