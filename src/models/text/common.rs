// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

bitflags::bitflags! {
    /// Byte 1 of Text Request / Text Response.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TextFlags: u8 {
        const FINAL     = 0b1000_0000; // bit7
        const CONTINUE  = 0b0100_0000; // bit6
    }
}

/// Target Transfer Tag value meaning "no continuation".
pub const RESERVED_TAG: u32 = 0xFFFF_FFFF;

// opcode-specific offsets shared by request and response
pub(super) const OS_TTT: usize = 0;
pub(super) const OS_SN: usize = 4;
pub(super) const OS_EXP_SN: usize = 8;
pub(super) const OS_MAX_CMD_SN: usize = 12;
