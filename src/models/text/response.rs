// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    error::IscsiResult,
    models::{
        bhs::BasicHeaderSegment,
        opcode::Opcode,
        pdu::IscsiPdu,
        text::{
            common::{OS_EXP_SN, OS_MAX_CMD_SN, OS_SN, OS_TTT, TextFlags},
            kv::parse_key_value_pairs,
        },
    },
};

/// Text Response (opcode 0x24). The data segment is kept raw because
/// SendTargets replies repeat keys and their order matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextResponse {
    pub flags: TextFlags,
    pub lun: u64,
    pub initiator_task_tag: u32,
    pub target_transfer_tag: u32,
    pub stat_sn: u32,
    pub exp_cmd_sn: u32,
    pub max_cmd_sn: u32,
    pub data: Vec<u8>,
}

impl TextResponse {
    #[inline]
    pub fn is_final(&self) -> bool {
        self.flags.contains(TextFlags::FINAL)
    }

    /// Map view of the data segment (last duplicate wins).
    pub fn key_value_pairs(&self) -> HashMap<String, String> {
        parse_key_value_pairs(&self.data)
    }
}

pub fn parse_text_response(pdu: &IscsiPdu) -> IscsiResult<TextResponse> {
    pdu.expect_opcode(Opcode::TextResp)?;
    let bhs = &pdu.bhs;
    Ok(TextResponse {
        flags: TextFlags::from_bits_truncate(bhs.flags),
        lun: bhs.lun,
        initiator_task_tag: bhs.initiator_task_tag,
        target_transfer_tag: bhs.os_u32(OS_TTT),
        stat_sn: bhs.os_u32(OS_SN),
        exp_cmd_sn: bhs.os_u32(OS_EXP_SN),
        max_cmd_sn: bhs.os_u32(OS_MAX_CMD_SN),
        data: pdu.data.clone(),
    })
}

pub fn encode_text_response(resp: &TextResponse) -> IscsiPdu {
    let mut bhs = BasicHeaderSegment::new(Opcode::TextResp);
    bhs.flags = resp.flags.bits();
    bhs.lun = resp.lun;
    bhs.initiator_task_tag = resp.initiator_task_tag;
    bhs.set_os(OS_TTT, &resp.target_transfer_tag.to_be_bytes());
    bhs.set_os(OS_SN, &resp.stat_sn.to_be_bytes());
    bhs.set_os(OS_EXP_SN, &resp.exp_cmd_sn.to_be_bytes());
    bhs.set_os(OS_MAX_CMD_SN, &resp.max_cmd_sn.to_be_bytes());
    IscsiPdu::new(bhs, resp.data.clone())
}
