// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Complete PDU framing: BHS, AHS, optional header digest, data segment
//! padded to a 4-byte boundary, optional data digest.

use crc32c::crc32c_append;

use crate::{
    error::{IscsiError, IscsiResult},
    models::{
        bhs::{BHS_LEN, BasicHeaderSegment, encode_bhs, parse_bhs},
        opcode::{BhsOpcode, Opcode},
    },
};

const DIGEST_LEN: usize = 4;

/// Number of zero bytes needed to bring `n` to a 4-byte boundary.
#[inline]
pub fn pad_len(n: usize) -> usize {
    (4 - (n % 4)) % 4
}

/// `n` rounded up to the next multiple of 4.
#[inline]
pub fn padded_len(n: usize) -> usize {
    (n + 3) & !3
}

/// Which CRC32C digests are present on the wire. Both are off until the
/// login phase has negotiated `HeaderDigest` / `DataDigest`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DigestMode {
    pub header: bool,
    pub data: bool,
}

impl DigestMode {
    pub const NONE: Self = Self {
        header: false,
        data: false,
    };
    pub const BOTH: Self = Self {
        header: true,
        data: true,
    };
}

fn crc32c_with_padding(parts: &[&[u8]], pad: usize) -> u32 {
    let mut acc = 0u32;
    for p in parts {
        if !p.is_empty() {
            acc = crc32c_append(acc, p);
        }
    }
    if pad != 0 {
        acc = crc32c_append(acc, &[0u8; 3][..pad]);
    }
    acc
}

/// CRC32C over the BHS and AHS.
pub fn compute_header_digest(bhs: &[u8], ahs: &[u8]) -> u32 {
    crc32c_with_padding(&[bhs, ahs], pad_len(ahs.len()))
}

/// CRC32C over the data segment including its padding.
pub fn compute_data_digest(data: &[u8]) -> u32 {
    crc32c_with_padding(&[data], pad_len(data.len()))
}

/// Number of bytes that follow the BHS on the wire for a PDU with this
/// header. The receive loop uses it to frame a PDU off the socket.
pub fn body_len(bhs: &BasicHeaderSegment, digests: DigestMode) -> usize {
    let data_len = bhs.data_segment_length as usize;
    let mut n = bhs.ahs_length_bytes() + padded_len(data_len);
    if digests.header {
        n += DIGEST_LEN;
    }
    if digests.data && data_len > 0 {
        n += DIGEST_LEN;
    }
    n
}

/// A decoded PDU. The data segment is stored without padding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IscsiPdu {
    pub bhs: BasicHeaderSegment,
    pub ahs: Vec<u8>,
    pub data: Vec<u8>,
}

impl IscsiPdu {
    /// Builds a PDU and keeps the BHS length fields in sync with `data`.
    pub fn new(mut bhs: BasicHeaderSegment, data: Vec<u8>) -> Self {
        bhs.data_segment_length = data.len() as u32;
        bhs.total_ahs_length = 0;
        Self {
            bhs,
            ahs: Vec::new(),
            data,
        }
    }

    pub fn bhs_opcode(&self) -> IscsiResult<BhsOpcode> {
        self.bhs.bhs_opcode()
    }

    pub fn opcode(&self) -> IscsiResult<Opcode> {
        Ok(self.bhs.bhs_opcode()?.opcode)
    }

    /// Fails unless the PDU carries `want`.
    pub fn expect_opcode(&self, want: Opcode) -> IscsiResult<()> {
        let got = self.opcode()?;
        if got != want {
            return Err(IscsiError::MalformedPdu(format!(
                "expected {want} PDU, got {got}"
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn initiator_task_tag(&self) -> u32 {
        self.bhs.initiator_task_tag
    }
}

fn take<'a>(bytes: &'a [u8], at: usize, n: usize) -> IscsiResult<&'a [u8]> {
    bytes.get(at..at + n).ok_or(IscsiError::InsufficientData {
        needed: at + n,
        available: bytes.len(),
    })
}

fn read_digest(bytes: &[u8], at: usize) -> IscsiResult<u32> {
    let raw = take(bytes, at, DIGEST_LEN)?;
    Ok(u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Decodes one PDU without digests from the start of `bytes`.
pub fn parse_pdu(bytes: &[u8]) -> IscsiResult<IscsiPdu> {
    parse_pdu_with_digests(bytes, DigestMode::NONE)
}

/// Decodes one PDU, verifying whichever digests `digests` enables.
/// Padding is consumed but never validated.
pub fn parse_pdu_with_digests(bytes: &[u8], digests: DigestMode) -> IscsiResult<IscsiPdu> {
    let bhs = parse_bhs(bytes)?;
    let mut off = BHS_LEN;

    let ahs_len = bhs.ahs_length_bytes();
    let ahs = take(bytes, off, ahs_len)?.to_vec();
    off += ahs_len;

    if digests.header {
        let got = read_digest(bytes, off)?;
        let want = compute_header_digest(&bytes[..BHS_LEN], &ahs);
        if got != want {
            return Err(IscsiError::HeaderDigestMismatch { got, want });
        }
        off += DIGEST_LEN;
    }

    let data_len = bhs.data_segment_length as usize;
    let data = take(bytes, off, padded_len(data_len))?[..data_len].to_vec();
    off += padded_len(data_len);

    if digests.data && data_len > 0 {
        let got = read_digest(bytes, off)?;
        let want = compute_data_digest(&data);
        if got != want {
            return Err(IscsiError::DataDigestMismatch { got, want });
        }
    }

    Ok(IscsiPdu { bhs, ahs, data })
}

/// Encodes a PDU without digests.
pub fn encode_pdu(pdu: &IscsiPdu) -> IscsiResult<Vec<u8>> {
    encode_pdu_with_digests(pdu, DigestMode::NONE)
}

/// Encodes a PDU, appending the digests `digests` enables. The BHS length
/// fields must describe `ahs` and `data` exactly.
pub fn encode_pdu_with_digests(pdu: &IscsiPdu, digests: DigestMode) -> IscsiResult<Vec<u8>> {
    if pdu.bhs.data_segment_length as usize != pdu.data.len() {
        return Err(IscsiError::MalformedPdu(format!(
            "DataSegmentLength {} does not match data segment of {} bytes",
            pdu.bhs.data_segment_length,
            pdu.data.len()
        )));
    }
    if pdu.bhs.ahs_length_bytes() != pdu.ahs.len() {
        return Err(IscsiError::MalformedPdu(format!(
            "TotalAHSLength {} words does not match {} AHS bytes",
            pdu.bhs.total_ahs_length,
            pdu.ahs.len()
        )));
    }

    let header = encode_bhs(&pdu.bhs)?;
    let mut out = Vec::with_capacity(BHS_LEN + body_len(&pdu.bhs, digests));
    out.extend_from_slice(&header);
    out.extend_from_slice(&pdu.ahs);
    if digests.header {
        out.extend_from_slice(&compute_header_digest(&header, &pdu.ahs).to_be_bytes());
    }
    if !pdu.data.is_empty() {
        out.extend_from_slice(&pdu.data);
        out.resize(out.len() + pad_len(pdu.data.len()), 0);
        if digests.data {
            out.extend_from_slice(&compute_data_digest(&pdu.data).to_be_bytes());
        }
    }
    Ok(out)
}
