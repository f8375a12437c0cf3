// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    error::IscsiResult,
    models::{
        bhs::BasicHeaderSegment,
        command::common::{ResponseCode, ScsiStatus},
        opcode::Opcode,
        pdu::IscsiPdu,
    },
};

bitflags::bitflags! {
    /// Byte 1 of SCSI Response. Bit 7 is always set on the wire.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScsiResponseFlags: u8 {
        const FINAL = 0x80;
        const BIDI_OVERFLOW = 0x10;
        const BIDI_UNDERFLOW = 0x08;
        const OVERFLOW = 0x04;
        const UNDERFLOW = 0x02;
    }
}

const OS_SNACK_TAG: usize = 0;
const OS_STAT_SN: usize = 4;
const OS_EXP_CMD_SN: usize = 8;
const OS_MAX_CMD_SN: usize = 12;
const OS_EXP_DATA_SN: usize = 16;
const OS_BIDI_RESIDUAL: usize = 20;
const OS_RESIDUAL: usize = 24;

/// SCSI Response (opcode 0x21). Response and status live in BHS bytes 2-3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiCommandResponse {
    pub flags: ScsiResponseFlags,
    pub response: ResponseCode,
    pub status: ScsiStatus,
    pub initiator_task_tag: u32,
    pub snack_tag: u32,
    pub stat_sn: u32,
    pub exp_cmd_sn: u32,
    pub max_cmd_sn: u32,
    pub exp_data_sn: u32,
    pub bidi_residual_count: u32,
    pub residual_count: u32,
    /// SenseLength-prefixed sense data followed by any response data.
    pub data: Vec<u8>,
}

impl ScsiCommandResponse {
    /// Sense bytes from the data segment, if any.
    pub fn sense_data(&self) -> Option<&[u8]> {
        let len_bytes = self.data.get(..2)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        if len == 0 {
            return None;
        }
        self.data.get(2..2 + len)
    }
}

pub fn parse_scsi_response(pdu: &IscsiPdu) -> IscsiResult<ScsiCommandResponse> {
    pdu.expect_opcode(Opcode::ScsiCommandResp)?;
    let bhs = &pdu.bhs;
    Ok(ScsiCommandResponse {
        flags: ScsiResponseFlags::from_bits_truncate(bhs.flags),
        response: ResponseCode::from(bhs.aux[0]),
        status: ScsiStatus::from(bhs.aux[1]),
        initiator_task_tag: bhs.initiator_task_tag,
        snack_tag: bhs.os_u32(OS_SNACK_TAG),
        stat_sn: bhs.os_u32(OS_STAT_SN),
        exp_cmd_sn: bhs.os_u32(OS_EXP_CMD_SN),
        max_cmd_sn: bhs.os_u32(OS_MAX_CMD_SN),
        exp_data_sn: bhs.os_u32(OS_EXP_DATA_SN),
        bidi_residual_count: bhs.os_u32(OS_BIDI_RESIDUAL),
        residual_count: bhs.os_u32(OS_RESIDUAL),
        data: pdu.data.clone(),
    })
}

pub fn encode_scsi_response(resp: &ScsiCommandResponse) -> IscsiPdu {
    let mut bhs = BasicHeaderSegment::new(Opcode::ScsiCommandResp);
    bhs.flags = (resp.flags | ScsiResponseFlags::FINAL).bits();
    bhs.aux = [resp.response.into(), resp.status.into()];
    bhs.initiator_task_tag = resp.initiator_task_tag;
    bhs.set_os(OS_SNACK_TAG, &resp.snack_tag.to_be_bytes());
    bhs.set_os(OS_STAT_SN, &resp.stat_sn.to_be_bytes());
    bhs.set_os(OS_EXP_CMD_SN, &resp.exp_cmd_sn.to_be_bytes());
    bhs.set_os(OS_MAX_CMD_SN, &resp.max_cmd_sn.to_be_bytes());
    bhs.set_os(OS_EXP_DATA_SN, &resp.exp_data_sn.to_be_bytes());
    bhs.set_os(OS_BIDI_RESIDUAL, &resp.bidi_residual_count.to_be_bytes());
    bhs.set_os(OS_RESIDUAL, &resp.residual_count.to_be_bytes());
    IscsiPdu::new(bhs, resp.data.clone())
}
