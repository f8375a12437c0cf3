// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_initiator_rs::{
    error::IscsiError,
    models::{
        bhs::{BHS_LEN, BasicHeaderSegment, encode_bhs, parse_bhs},
        opcode::{BhsOpcode, Opcode},
        parse::{PduView, TypedPdu},
        pdu::{
            DigestMode, IscsiPdu, body_len, compute_data_digest, compute_header_digest,
            encode_pdu, encode_pdu_with_digests, parse_pdu, parse_pdu_with_digests,
        },
    },
};

use crate::unit_tests::load_fixture;

#[test]
fn test_bhs_fields_from_fixture() -> Result<()> {
    let bytes = load_fixture("login_request.hex")?;
    let bhs = parse_bhs(&bytes)?;

    assert_eq!(bhs.opcode, 0x43);
    let op = bhs.bhs_opcode()?;
    assert!(op.immediate);
    assert_eq!(op.opcode, Opcode::LoginReq);
    assert_eq!(bhs.flags, 0x81);
    assert_eq!(bhs.total_ahs_length, 0);
    assert_eq!(bhs.data_segment_length, 125);
    assert_eq!(bhs.initiator_task_tag, 1);
    assert_eq!(bhs.opcode_specific.len(), 28);

    assert_eq!(&encode_bhs(&bhs)?[..], &bytes[..BHS_LEN]);
    Ok(())
}

#[test]
fn test_short_buffer_is_insufficient() {
    match parse_pdu(&[0u8; 20]) {
        Err(IscsiError::InsufficientData { needed, available }) => {
            assert_eq!(needed, 48);
            assert_eq!(available, 20);
        },
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_truncated_data_segment_is_insufficient() -> Result<()> {
    let bytes = load_fixture("login_request.hex")?;
    let err = parse_pdu(&bytes[..100]).expect_err("data segment is cut short");
    assert!(matches!(err, IscsiError::InsufficientData { .. }));
    assert!(err.is_codec());
    Ok(())
}

#[test]
fn test_data_segment_is_padded_on_encode() -> Result<()> {
    let pdu = IscsiPdu::new(
        BasicHeaderSegment::new(BhsOpcode::new(Opcode::NopOut)),
        b"abcde".to_vec(),
    );
    let wire = encode_pdu(&pdu)?;
    assert_eq!(wire.len(), BHS_LEN + 8);
    assert_eq!(&wire[5..8], &[0, 0, 5]);
    assert_eq!(&wire[BHS_LEN + 5..], &[0, 0, 0]);

    let back = parse_pdu(&wire)?;
    assert_eq!(back.data, b"abcde");
    Ok(())
}

#[test]
fn test_ahs_is_carried_between_bhs_and_data() -> Result<()> {
    let mut pdu = IscsiPdu::new(BasicHeaderSegment::new(Opcode::NopOut), b"xy".to_vec());
    pdu.ahs = vec![0x00, 0x02, 0x01, 0x00];
    pdu.bhs.total_ahs_length = 1;

    let wire = encode_pdu(&pdu)?;
    assert_eq!(wire.len(), BHS_LEN + 4 + 4);
    assert_eq!(&wire[BHS_LEN..BHS_LEN + 4], &[0x00, 0x02, 0x01, 0x00]);
    assert_eq!(&wire[BHS_LEN + 4..BHS_LEN + 6], b"xy");

    let back = parse_pdu(&wire)?;
    assert_eq!(back.ahs, pdu.ahs);
    assert_eq!(back.data, b"xy");
    Ok(())
}

#[test]
fn test_ahs_length_must_match() {
    let mut pdu = IscsiPdu::new(BasicHeaderSegment::new(Opcode::NopOut), Vec::new());
    pdu.bhs.total_ahs_length = 2;
    pdu.ahs = vec![0; 4];
    assert!(matches!(encode_pdu(&pdu), Err(IscsiError::MalformedPdu(_))));
}

#[test]
fn test_oversized_segment_length_is_malformed() {
    let bhs = BasicHeaderSegment {
        data_segment_length: 0x0100_0000,
        ..BasicHeaderSegment::default()
    };
    assert!(matches!(encode_bhs(&bhs), Err(IscsiError::MalformedPdu(_))));
}

#[test]
fn test_opcode_specific_region_must_be_28_bytes() {
    for len in [27, 29, 0] {
        let bhs = BasicHeaderSegment {
            opcode_specific: vec![0; len],
            ..BasicHeaderSegment::default()
        };
        match encode_bhs(&bhs) {
            Err(IscsiError::MalformedPdu(msg)) => assert!(msg.contains("28 bytes"), "{msg}"),
            other => panic!("{len}-byte region accepted: {other:?}"),
        }
    }
}

#[test]
fn test_bhs_round_trip_keeps_every_field() -> Result<()> {
    let bhs = BasicHeaderSegment {
        opcode: 0x41,
        flags: 0xA5,
        aux: [0x5A, 0xC3],
        total_ahs_length: 7,
        data_segment_length: 0x00AB_CDEF,
        lun: 0x0102_0304_0506_0708,
        initiator_task_tag: 0xDEAD_BEEF,
        opcode_specific: (1..=28).collect(),
    };
    let wire = encode_bhs(&bhs)?;
    assert_eq!(wire[0], 0x41);
    assert_eq!(&wire[5..8], &[0xAB, 0xCD, 0xEF]);
    assert_eq!(&wire[8..16], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(wire[20], 1);
    assert_eq!(wire[47], 28);

    let back = parse_bhs(&wire)?;
    assert_eq!(back, bhs);
    assert_eq!(encode_bhs(&back)?, wire);
    Ok(())
}

#[test]
fn test_digests_from_fixture() -> Result<()> {
    let bytes = load_fixture("data_in_digests.hex")?;
    assert_eq!(bytes.len(), 48 + 4 + 8 + 4);

    let bhs = parse_bhs(&bytes)?;
    assert_eq!(body_len(&bhs, DigestMode::BOTH), bytes.len() - BHS_LEN);

    assert_eq!(compute_header_digest(&bytes[..BHS_LEN], &[]), 0x4481_4B2A);
    assert_eq!(compute_data_digest(b"hello"), 0x9003_EDB3);

    let pdu = parse_pdu_with_digests(&bytes, DigestMode::BOTH)?;
    assert_eq!(pdu.data, b"hello");
    assert_eq!(pdu.bhs.lun, 1 << 48);

    let again = encode_pdu_with_digests(&pdu, DigestMode::BOTH)?;
    assert_eq!(again, bytes);
    Ok(())
}

#[test]
fn test_header_digest_mismatch() -> Result<()> {
    let mut bytes = load_fixture("data_in_digests.hex")?;
    bytes[19] ^= 0x01;
    match parse_pdu_with_digests(&bytes, DigestMode::BOTH) {
        Err(IscsiError::HeaderDigestMismatch { got, .. }) => assert_eq!(got, 0x4481_4B2A),
        other => panic!("unexpected: {other:?}"),
    }
    Ok(())
}

#[test]
fn test_data_digest_mismatch() -> Result<()> {
    let mut bytes = load_fixture("data_in_digests.hex")?;
    bytes[BHS_LEN + 4] = b'j';
    assert!(matches!(
        parse_pdu_with_digests(&bytes, DigestMode::BOTH),
        Err(IscsiError::DataDigestMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_data_digest_skipped_for_empty_segment() -> Result<()> {
    let pdu = IscsiPdu::new(BasicHeaderSegment::new(Opcode::NopOut), Vec::new());
    let wire = encode_pdu_with_digests(&pdu, DigestMode::BOTH)?;
    assert_eq!(wire.len(), BHS_LEN + 4);
    parse_pdu_with_digests(&wire, DigestMode::BOTH)?;
    Ok(())
}

#[test]
fn test_unknown_opcode_is_rejected_by_typed_parse() -> Result<()> {
    let mut bytes = load_fixture("login_request.hex")?;
    bytes[0] = 0x1F;
    let pdu = parse_pdu(&bytes)?;
    assert!(matches!(pdu.opcode(), Err(IscsiError::InvalidOpcode(0x1F))));
    assert!(matches!(
        TypedPdu::parse(pdu),
        Err(IscsiError::InvalidOpcode(0x1F))
    ));
    Ok(())
}

#[test]
fn test_typed_parse_keeps_untyped_opcodes() -> Result<()> {
    let mut bhs = BasicHeaderSegment::new(Opcode::NopIn);
    bhs.initiator_task_tag = 0x55;
    let pdu = IscsiPdu::new(bhs, Vec::new());
    let typed = TypedPdu::parse(pdu.clone())?;

    assert!(matches!(typed, TypedPdu::Other(_)));
    assert_eq!(typed.opcode()?, Opcode::NopIn);
    assert_eq!(typed.task_tag(), 0x55);
    assert_eq!(typed.to_iscsi_pdu(), pdu);
    Ok(())
}
