// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The 48-byte **Basic Header Segment** shared by every iSCSI PDU.
//!
//! ```text
//! byte  0      opcode (bit6 = Immediate, bits5..0 = opcode)
//! byte  1      flags (opcode dependent)
//! bytes 2..4   aux   (opcode dependent, zero for Login/Text)
//! byte  4      TotalAHSLength (4-byte words)
//! bytes 5..8   DataSegmentLength (24-bit BE)
//! bytes 8..16  LUN (BE)
//! bytes 16..20 Initiator Task Tag (BE)
//! bytes 20..48 opcode-specific (28 bytes)
//! ```

use crate::{
    error::{IscsiError, IscsiResult},
    models::opcode::BhsOpcode,
};

/// Size of the BHS on the wire.
pub const BHS_LEN: usize = 48;
/// Size of the opcode-specific tail of the BHS.
pub const OPCODE_SPECIFIC_LEN: usize = 28;
/// Largest value representable by the 24-bit DataSegmentLength field.
pub const MAX_DATA_SEGMENT_LEN: u32 = 0x00FF_FFFF;

/// Decoded BHS. `opcode_specific` is kept as an opaque 28-byte region that
/// the typed projections (`models::login`, `models::text`, ...) overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicHeaderSegment {
    /// Raw first byte, including the Immediate bit.
    pub opcode: u8,
    pub flags: u8,
    pub aux: [u8; 2],
    pub total_ahs_length: u8,
    pub data_segment_length: u32,
    pub lun: u64,
    pub initiator_task_tag: u32,
    pub opcode_specific: Vec<u8>,
}

impl Default for BasicHeaderSegment {
    fn default() -> Self {
        Self {
            opcode: 0,
            flags: 0,
            aux: [0; 2],
            total_ahs_length: 0,
            data_segment_length: 0,
            lun: 0,
            initiator_task_tag: 0,
            opcode_specific: vec![0; OPCODE_SPECIFIC_LEN],
        }
    }
}

impl BasicHeaderSegment {
    pub fn new(opcode: impl Into<u8>) -> Self {
        Self {
            opcode: opcode.into(),
            ..Self::default()
        }
    }

    /// Typed view of the opcode byte.
    pub fn bhs_opcode(&self) -> IscsiResult<BhsOpcode> {
        BhsOpcode::try_from(self.opcode)
    }

    /// Number of AHS bytes that follow the BHS.
    #[inline]
    pub fn ahs_length_bytes(&self) -> usize {
        self.total_ahs_length as usize * 4
    }

    pub(crate) fn os_u16(&self, at: usize) -> u16 {
        let mut b = [0u8; 2];
        copy_out(&self.opcode_specific, at, &mut b);
        u16::from_be_bytes(b)
    }

    pub(crate) fn os_u32(&self, at: usize) -> u32 {
        let mut b = [0u8; 4];
        copy_out(&self.opcode_specific, at, &mut b);
        u32::from_be_bytes(b)
    }

    pub(crate) fn os_bytes<const N: usize>(&self, at: usize) -> [u8; N] {
        let mut b = [0u8; N];
        copy_out(&self.opcode_specific, at, &mut b);
        b
    }

    pub(crate) fn set_os(&mut self, at: usize, bytes: &[u8]) {
        if self.opcode_specific.len() < OPCODE_SPECIFIC_LEN {
            self.opcode_specific.resize(OPCODE_SPECIFIC_LEN, 0);
        }
        if let Some(dst) = self.opcode_specific.get_mut(at..at + bytes.len()) {
            dst.copy_from_slice(bytes);
        }
    }
}

// Reads past the end of a short region yield zeros; `encode_bhs` rejects
// such regions before they reach the wire.
fn copy_out(src: &[u8], at: usize, dst: &mut [u8]) {
    if let Some(s) = src.get(at..at + dst.len()) {
        dst.copy_from_slice(s);
    }
}

/// Decodes the first 48 bytes of `bytes`. Trailing bytes are ignored.
pub fn parse_bhs(bytes: &[u8]) -> IscsiResult<BasicHeaderSegment> {
    if bytes.len() < BHS_LEN {
        return Err(IscsiError::InsufficientData {
            needed: BHS_LEN,
            available: bytes.len(),
        });
    }

    let mut lun = [0u8; 8];
    lun.copy_from_slice(&bytes[8..16]);
    let mut itt = [0u8; 4];
    itt.copy_from_slice(&bytes[16..20]);

    Ok(BasicHeaderSegment {
        opcode: bytes[0],
        flags: bytes[1],
        aux: [bytes[2], bytes[3]],
        total_ahs_length: bytes[4],
        data_segment_length: u32::from_be_bytes([0, bytes[5], bytes[6], bytes[7]]),
        lun: u64::from_be_bytes(lun),
        initiator_task_tag: u32::from_be_bytes(itt),
        opcode_specific: bytes[20..BHS_LEN].to_vec(),
    })
}

/// Encodes `bhs` into its 48-byte wire form.
pub fn encode_bhs(bhs: &BasicHeaderSegment) -> IscsiResult<[u8; BHS_LEN]> {
    if bhs.data_segment_length > MAX_DATA_SEGMENT_LEN {
        return Err(IscsiError::MalformedPdu(format!(
            "DataSegmentLength {} exceeds the 24-bit maximum",
            bhs.data_segment_length
        )));
    }
    if bhs.opcode_specific.len() != OPCODE_SPECIFIC_LEN {
        return Err(IscsiError::MalformedPdu(format!(
            "opcode-specific region must be 28 bytes, got {}",
            bhs.opcode_specific.len()
        )));
    }

    let mut out = [0u8; BHS_LEN];
    out[0] = bhs.opcode;
    out[1] = bhs.flags;
    out[2..4].copy_from_slice(&bhs.aux);
    out[4] = bhs.total_ahs_length;
    out[5..8].copy_from_slice(&bhs.data_segment_length.to_be_bytes()[1..]);
    out[8..16].copy_from_slice(&bhs.lun.to_be_bytes());
    out[16..20].copy_from_slice(&bhs.initiator_task_tag.to_be_bytes());
    out[20..].copy_from_slice(&bhs.opcode_specific);
    Ok(out)
}
