// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Helpers for encoding / decoding the very first byte of every iSCSI
//! **Basic-Header-Segment** (BHS).
//!
//! ```text
//!  7   6   5   4   3   2   1   0      bit position
//! +---+---+---------------------------+
//! | . | I |        OPCODE (6 bits)    |  ← first BHS octet
//! +---+---+---------------------------+
//! ```
//!
//! * **I** – *Immediate* flag.
//! * **OPCODE** – 6-bit operation code identifying the PDU type.
//!
//! Bit 7 is reserved; it is ignored on decode and never set on encode.

use core::fmt;

use crate::error::IscsiError;

/// Mask that selects the lower 6 bits (**OPCODE**) from the first BHS byte.
pub const OPCODE_MASK: u8 = 0b0011_1111;
/// Mask that selects the **I** bit from the first BHS byte.
pub const I_MASK: u8 = 0b0100_0000;

/// All op-codes understood by the codec.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    #[default]
    NopOut = 0x00,
    ScsiCommandReq = 0x01,
    TaskMgmtReq = 0x02,
    LoginReq = 0x03,
    TextReq = 0x04,
    ScsiDataOut = 0x05,
    LogoutReq = 0x06,
    SnackReq = 0x10,
    NopIn = 0x20,
    ScsiCommandResp = 0x21,
    TaskMgmtResp = 0x22,
    LoginResp = 0x23,
    TextResp = 0x24,
    ScsiDataIn = 0x25,
    LogoutResp = 0x26,
    ReadyToTransfer = 0x31,
    AsyncMsg = 0x32,
    Reject = 0x3F,
}

impl Opcode {
    #[inline]
    pub fn from_u6(v: u8) -> Option<Self> {
        Some(match v & OPCODE_MASK {
            0x00 => Self::NopOut,
            0x01 => Self::ScsiCommandReq,
            0x02 => Self::TaskMgmtReq,
            0x03 => Self::LoginReq,
            0x04 => Self::TextReq,
            0x05 => Self::ScsiDataOut,
            0x06 => Self::LogoutReq,
            0x10 => Self::SnackReq,
            0x20 => Self::NopIn,
            0x21 => Self::ScsiCommandResp,
            0x22 => Self::TaskMgmtResp,
            0x23 => Self::LoginResp,
            0x24 => Self::TextResp,
            0x25 => Self::ScsiDataIn,
            0x26 => Self::LogoutResp,
            0x31 => Self::ReadyToTransfer,
            0x32 => Self::AsyncMsg,
            0x3F => Self::Reject,
            _ => return None,
        })
    }

    /// `true` for PDUs sent by the initiator.
    #[inline]
    pub const fn is_request(self) -> bool {
        (self as u8) < 0x20
    }
}

impl From<Opcode> for u8 {
    fn from(op: Opcode) -> u8 {
        op as u8
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}(0x{:02x})", *self as u8)
    }
}

/// Typed representation of the very first BHS byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BhsOpcode {
    /// Immediate delivery (**I** bit).
    pub immediate: bool,
    pub opcode: Opcode,
}

impl BhsOpcode {
    pub const fn new(opcode: Opcode) -> Self {
        Self {
            immediate: false,
            opcode,
        }
    }

    pub const fn immediate(opcode: Opcode) -> Self {
        Self {
            immediate: true,
            opcode,
        }
    }
}

impl TryFrom<u8> for BhsOpcode {
    type Error = IscsiError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let code = byte & OPCODE_MASK;
        let opcode = Opcode::from_u6(code).ok_or(IscsiError::InvalidOpcode(code))?;
        Ok(Self {
            immediate: (byte & I_MASK) != 0,
            opcode,
        })
    }
}

impl From<BhsOpcode> for u8 {
    fn from(b: BhsOpcode) -> u8 {
        let mut raw = b.opcode as u8;
        if b.immediate {
            raw |= I_MASK;
        }
        raw
    }
}
