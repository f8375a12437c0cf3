// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ(10) and WRITE(10).
//!
//! Layout (SBC):
//!   [0]     operation code
//!   [1]     protect / DPO / FUA, left zero
//!   [2..6]  LBA, big-endian
//!   [6]     group number
//!   [7..9]  transfer length in blocks, big-endian
//!   [9]     control

pub const READ10_OPCODE: u8 = 0x28;
pub const WRITE10_OPCODE: u8 = 0x2A;

fn rw10(opcode: u8, lba: u32, blocks: u16) -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = opcode;
    cdb[2..6].copy_from_slice(&lba.to_be_bytes());
    cdb[7..9].copy_from_slice(&blocks.to_be_bytes());
    cdb
}

/// READ(10) of `blocks` logical blocks starting at `lba`.
#[inline]
pub fn read10(lba: u32, blocks: u16) -> [u8; 10] {
    rw10(READ10_OPCODE, lba, blocks)
}

/// WRITE(10) of `blocks` logical blocks starting at `lba`.
#[inline]
pub fn write10(lba: u32, blocks: u16) -> [u8; 10] {
    rw10(WRITE10_OPCODE, lba, blocks)
}
