// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    error::IscsiResult,
    models::{
        bhs::BasicHeaderSegment,
        opcode::{BhsOpcode, Opcode},
        pdu::IscsiPdu,
        text::{
            common::{OS_EXP_SN, OS_SN, OS_TTT, RESERVED_TAG, TextFlags},
            kv::{encode_key_value_pairs, parse_key_value_pairs},
        },
    },
};

/// Text Request (opcode 0x04).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRequest {
    pub immediate: bool,
    pub flags: TextFlags,
    pub lun: u64,
    pub initiator_task_tag: u32,
    /// `0xFFFFFFFF` unless continuing a target-split response.
    pub target_transfer_tag: u32,
    pub cmd_sn: u32,
    pub exp_stat_sn: u32,
    pub key_value_pairs: HashMap<String, String>,
}

impl TextRequest {
    /// `SendTargets=All` discovery request, single final PDU.
    pub fn send_targets(itt: u32, cmd_sn: u32, exp_stat_sn: u32) -> Self {
        Self {
            immediate: true,
            flags: TextFlags::FINAL,
            lun: 0,
            initiator_task_tag: itt,
            target_transfer_tag: RESERVED_TAG,
            cmd_sn,
            exp_stat_sn,
            key_value_pairs: HashMap::from([("SendTargets".to_owned(), "All".to_owned())]),
        }
    }
}

pub fn parse_text_request(pdu: &IscsiPdu) -> IscsiResult<TextRequest> {
    pdu.expect_opcode(Opcode::TextReq)?;
    let bhs = &pdu.bhs;
    Ok(TextRequest {
        immediate: bhs.bhs_opcode()?.immediate,
        flags: TextFlags::from_bits_truncate(bhs.flags),
        lun: bhs.lun,
        initiator_task_tag: bhs.initiator_task_tag,
        target_transfer_tag: bhs.os_u32(OS_TTT),
        cmd_sn: bhs.os_u32(OS_SN),
        exp_stat_sn: bhs.os_u32(OS_EXP_SN),
        key_value_pairs: parse_key_value_pairs(&pdu.data),
    })
}

pub fn encode_text_request(req: &TextRequest) -> IscsiPdu {
    let op = BhsOpcode {
        immediate: req.immediate,
        opcode: Opcode::TextReq,
    };
    let mut bhs = BasicHeaderSegment::new(op);
    bhs.flags = req.flags.bits();
    bhs.lun = req.lun;
    bhs.initiator_task_tag = req.initiator_task_tag;
    bhs.set_os(OS_TTT, &req.target_transfer_tag.to_be_bytes());
    bhs.set_os(OS_SN, &req.cmd_sn.to_be_bytes());
    bhs.set_os(OS_EXP_SN, &req.exp_stat_sn.to_be_bytes());
    IscsiPdu::new(bhs, encode_key_value_pairs(&req.key_value_pairs))
}
