// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Standard INQUIRY (EVPD=0).
//!
//! CDB layout (SPC):
//!   [0] 0x12
//!   [1] EVPD, zero here
//!   [2] page code
//!   [3] reserved
//!   [4] allocation length
//!   [5] control

use crate::error::{IscsiError, IscsiResult};

pub const INQUIRY_OPCODE: u8 = 0x12;

/// Allocation length that covers the fixed part of standard INQUIRY data.
pub const STANDARD_INQUIRY_LEN: u8 = 36;

#[inline]
pub fn inquiry(allocation_len: u8) -> [u8; 6] {
    [INQUIRY_OPCODE, 0, 0, 0, allocation_len, 0]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InquiryData {
    pub peripheral_qualifier: u8,
    pub device_type: u8,
    pub removable: bool,
    pub version: u8,
    pub vendor_id: String,
    pub product_id: String,
    pub product_rev: String,
}

/// Reads the fixed 36-byte head of standard INQUIRY data.
pub fn parse_inquiry(buf: &[u8]) -> IscsiResult<InquiryData> {
    let needed = usize::from(STANDARD_INQUIRY_LEN);
    if buf.len() < needed {
        return Err(IscsiError::InsufficientData {
            needed,
            available: buf.len(),
        });
    }
    Ok(InquiryData {
        peripheral_qualifier: buf[0] >> 5,
        device_type: buf[0] & 0x1F,
        removable: buf[1] & 0x80 != 0,
        version: buf[2],
        vendor_id: ascii_field(&buf[8..16]),
        product_id: ascii_field(&buf[16..32]),
        product_rev: ascii_field(&buf[32..36]),
    })
}

fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '?' })
        .collect::<String>()
        .trim()
        .to_owned()
}
