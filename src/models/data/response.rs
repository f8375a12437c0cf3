// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    error::{IscsiError, IscsiResult},
    models::{
        bhs::BasicHeaderSegment, data::common::DataInFlags, opcode::Opcode, pdu::IscsiPdu,
    },
};

const OS_TTT: usize = 0;
const OS_STAT_SN: usize = 4;
const OS_EXP_CMD_SN: usize = 8;
const OS_MAX_CMD_SN: usize = 12;
const OS_DATA_SN: usize = 16;
const OS_BUFFER_OFFSET: usize = 20;
const OS_RESIDUAL: usize = 24;

/// SCSI Data-In (opcode 0x25). The status byte (BHS byte 3) and StatSN are
/// meaningful only when `S` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiDataIn {
    pub flags: DataInFlags,
    pub status: u8,
    pub lun: u64,
    pub initiator_task_tag: u32,
    pub target_transfer_tag: u32,
    pub stat_sn: u32,
    pub exp_cmd_sn: u32,
    pub max_cmd_sn: u32,
    pub data_sn: u32,
    pub buffer_offset: u32,
    pub residual_count: u32,
    pub data: Vec<u8>,
}

impl ScsiDataIn {
    #[inline]
    pub fn has_status(&self) -> bool {
        self.flags.contains(DataInFlags::S)
    }
}

pub fn parse_data_in(pdu: &IscsiPdu) -> IscsiResult<ScsiDataIn> {
    pdu.expect_opcode(Opcode::ScsiDataIn)?;
    let bhs = &pdu.bhs;
    let flags = DataInFlags::from_bits_truncate(bhs.flags);
    if flags.contains(DataInFlags::S) && !flags.contains(DataInFlags::FINAL) {
        return Err(IscsiError::ProtocolViolation(
            "Data-In with S bit set must also carry F".into(),
        ));
    }
    Ok(ScsiDataIn {
        flags,
        status: bhs.aux[1],
        lun: bhs.lun,
        initiator_task_tag: bhs.initiator_task_tag,
        target_transfer_tag: bhs.os_u32(OS_TTT),
        stat_sn: bhs.os_u32(OS_STAT_SN),
        exp_cmd_sn: bhs.os_u32(OS_EXP_CMD_SN),
        max_cmd_sn: bhs.os_u32(OS_MAX_CMD_SN),
        data_sn: bhs.os_u32(OS_DATA_SN),
        buffer_offset: bhs.os_u32(OS_BUFFER_OFFSET),
        residual_count: bhs.os_u32(OS_RESIDUAL),
        data: pdu.data.clone(),
    })
}

pub fn encode_data_in(d: &ScsiDataIn) -> IscsiPdu {
    let mut bhs = BasicHeaderSegment::new(Opcode::ScsiDataIn);
    bhs.flags = d.flags.bits();
    bhs.aux = [0, d.status];
    bhs.lun = d.lun;
    bhs.initiator_task_tag = d.initiator_task_tag;
    bhs.set_os(OS_TTT, &d.target_transfer_tag.to_be_bytes());
    bhs.set_os(OS_STAT_SN, &d.stat_sn.to_be_bytes());
    bhs.set_os(OS_EXP_CMD_SN, &d.exp_cmd_sn.to_be_bytes());
    bhs.set_os(OS_MAX_CMD_SN, &d.max_cmd_sn.to_be_bytes());
    bhs.set_os(OS_DATA_SN, &d.data_sn.to_be_bytes());
    bhs.set_os(OS_BUFFER_OFFSET, &d.buffer_offset.to_be_bytes());
    bhs.set_os(OS_RESIDUAL, &d.residual_count.to_be_bytes());
    IscsiPdu::new(bhs, d.data.clone())
}
