// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    error::{IscsiError, IscsiResult},
    models::{
        bhs::BasicHeaderSegment,
        command::common::ScsiCommandRequestFlags,
        opcode::{BhsOpcode, Opcode},
        pdu::IscsiPdu,
    },
};

const OS_EDTL: usize = 0;
const OS_CMD_SN: usize = 4;
const OS_EXP_STAT_SN: usize = 8;
const OS_CDB: usize = 12;
pub const CDB_LEN: usize = 16;

/// SCSI Command (opcode 0x01).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScsiCommandRequest {
    pub immediate: bool,
    pub flags: ScsiCommandRequestFlags,
    pub lun: u64,
    pub initiator_task_tag: u32,
    pub expected_data_transfer_length: u32,
    pub cmd_sn: u32,
    pub exp_stat_sn: u32,
    pub cdb: [u8; CDB_LEN],
    /// Immediate (unsolicited) write data.
    pub data: Vec<u8>,
}

impl ScsiCommandRequest {
    /// Copies a CDB of up to 16 bytes, zero-filling the remainder.
    pub fn set_cdb(&mut self, cdb: &[u8]) -> IscsiResult<()> {
        if cdb.len() > CDB_LEN {
            return Err(IscsiError::MalformedPdu(format!(
                "CDB of {} bytes needs an AHS, which is not supported",
                cdb.len()
            )));
        }
        self.cdb = [0; CDB_LEN];
        self.cdb[..cdb.len()].copy_from_slice(cdb);
        Ok(())
    }
}

pub fn parse_scsi_command(pdu: &IscsiPdu) -> IscsiResult<ScsiCommandRequest> {
    pdu.expect_opcode(Opcode::ScsiCommandReq)?;
    let bhs = &pdu.bhs;
    Ok(ScsiCommandRequest {
        immediate: bhs.bhs_opcode()?.immediate,
        flags: ScsiCommandRequestFlags::from_bits_retain(bhs.flags),
        lun: bhs.lun,
        initiator_task_tag: bhs.initiator_task_tag,
        expected_data_transfer_length: bhs.os_u32(OS_EDTL),
        cmd_sn: bhs.os_u32(OS_CMD_SN),
        exp_stat_sn: bhs.os_u32(OS_EXP_STAT_SN),
        cdb: bhs.os_bytes(OS_CDB),
        data: pdu.data.clone(),
    })
}

pub fn encode_scsi_command(req: &ScsiCommandRequest) -> IscsiPdu {
    let mut bhs = BasicHeaderSegment::new(BhsOpcode {
        immediate: req.immediate,
        opcode: Opcode::ScsiCommandReq,
    });
    bhs.flags = req.flags.bits();
    bhs.lun = req.lun;
    bhs.initiator_task_tag = req.initiator_task_tag;
    bhs.set_os(OS_EDTL, &req.expected_data_transfer_length.to_be_bytes());
    bhs.set_os(OS_CMD_SN, &req.cmd_sn.to_be_bytes());
    bhs.set_os(OS_EXP_STAT_SN, &req.exp_stat_sn.to_be_bytes());
    bhs.set_os(OS_CDB, &req.cdb);
    IscsiPdu::new(bhs, req.data.clone())
}
