// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::mem::size_of;

use zerocopy::{
    FromBytes, Immutable, KnownLayout,
    byteorder::{BigEndian, U32},
};

use crate::error::{IscsiError, IscsiResult};

pub const READ_CAPACITY10_OPCODE: u8 = 0x25;

/// READ CAPACITY(10) asking for the last LBA of the whole medium.
#[inline]
pub fn read_capacity10() -> [u8; 10] {
    let mut cdb = [0u8; 10];
    cdb[0] = READ_CAPACITY10_OPCODE;
    cdb
}

/// The 8-byte parameter data returned by READ CAPACITY(10).
#[repr(C)]
#[derive(FromBytes, KnownLayout, Immutable, Debug)]
pub struct Capacity10 {
    /// Last addressable LBA.
    pub max_lba: U32<BigEndian>,
    /// Logical block length in bytes.
    pub block_len: U32<BigEndian>,
}

impl Capacity10 {
    pub fn block_count(&self) -> u64 {
        u64::from(self.max_lba.get()) + 1
    }

    pub fn total_bytes(&self) -> u64 {
        self.block_count() * u64::from(self.block_len.get())
    }

    /// The medium is too large for the 10-byte form and READ CAPACITY(16)
    /// is needed.
    pub fn overflows(&self) -> bool {
        self.max_lba.get() == u32::MAX
    }
}

pub fn parse_read_capacity10(buf: &[u8]) -> IscsiResult<&Capacity10> {
    Capacity10::ref_from_prefix(buf)
        .map(|(cap, _)| cap)
        .map_err(|_| IscsiError::InsufficientData {
            needed: size_of::<Capacity10>(),
            available: buf.len(),
        })
}
