// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub const TEST_UNIT_READY_OPCODE: u8 = 0x00;

/// TEST UNIT READY (6). Every byte, the opcode included, is zero.
#[inline]
pub fn test_unit_ready() -> [u8; 6] {
    [TEST_UNIT_READY_OPCODE, 0, 0, 0, 0, 0]
}
