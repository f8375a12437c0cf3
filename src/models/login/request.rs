// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    error::IscsiResult,
    models::{
        bhs::BasicHeaderSegment,
        login::common::{LoginFlags, Stage},
        opcode::{BhsOpcode, Opcode},
        pdu::{IscsiPdu, encode_pdu},
        text::kv::{encode_key_value_pairs, parse_key_value_pairs},
    },
};

// offsets inside the 28-byte opcode-specific region
pub(super) const OS_VERSION_MAX: usize = 0;
pub(super) const OS_VERSION_MIN: usize = 1;
pub(super) const OS_ISID: usize = 4;
pub(super) const OS_TSIH: usize = 10;
const OS_CID: usize = 12;
pub(super) const OS_SN: usize = 16;
pub(super) const OS_EXP_SN: usize = 20;

/// Login Request (opcode 0x03). Stage codes are kept raw so that a
/// reserved value survives a decode/encode cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginRequest {
    pub transit: bool,
    pub cont: bool,
    pub csg: u8,
    pub nsg: u8,
    pub version_max: u8,
    pub version_min: u8,
    pub isid: [u8; 6],
    pub tsih: u16,
    pub initiator_task_tag: u32,
    pub cid: u16,
    pub cmd_sn: u32,
    pub exp_stat_sn: u32,
    pub key_value_pairs: HashMap<String, String>,
}

impl LoginRequest {
    pub fn flags(&self) -> LoginFlags {
        LoginFlags::from_codes(self.transit, self.cont, self.csg, self.nsg)
    }

    pub fn set_stages(&mut self, csg: Stage, nsg: Stage) {
        self.csg = csg as u8;
        self.nsg = nsg as u8;
    }

    /// Builds the PDU; the Immediate bit is always set on login requests.
    pub fn to_pdu(&self) -> IscsiPdu {
        let mut bhs = BasicHeaderSegment::new(BhsOpcode::immediate(Opcode::LoginReq));
        bhs.flags = self.flags().bits();
        bhs.initiator_task_tag = self.initiator_task_tag;
        bhs.set_os(OS_VERSION_MAX, &[self.version_max, self.version_min]);
        bhs.set_os(OS_ISID, &self.isid);
        bhs.set_os(OS_TSIH, &self.tsih.to_be_bytes());
        bhs.set_os(OS_CID, &self.cid.to_be_bytes());
        bhs.set_os(OS_SN, &self.cmd_sn.to_be_bytes());
        bhs.set_os(OS_EXP_SN, &self.exp_stat_sn.to_be_bytes());
        IscsiPdu::new(bhs, encode_key_value_pairs(&self.key_value_pairs))
    }
}

pub fn parse_login_request(pdu: &IscsiPdu) -> IscsiResult<LoginRequest> {
    pdu.expect_opcode(Opcode::LoginReq)?;
    let bhs = &pdu.bhs;
    let flags = LoginFlags::from_bits_retain(bhs.flags);
    Ok(LoginRequest {
        transit: flags.transit(),
        cont: flags.cont(),
        csg: flags.csg_code(),
        nsg: flags.nsg_code(),
        version_max: bhs.os_bytes::<1>(OS_VERSION_MAX)[0],
        version_min: bhs.os_bytes::<1>(OS_VERSION_MIN)[0],
        isid: bhs.os_bytes(OS_ISID),
        tsih: bhs.os_u16(OS_TSIH),
        initiator_task_tag: bhs.initiator_task_tag,
        cid: bhs.os_u16(OS_CID),
        cmd_sn: bhs.os_u32(OS_SN),
        exp_stat_sn: bhs.os_u32(OS_EXP_SN),
        key_value_pairs: parse_key_value_pairs(&pdu.data),
    })
}

/// Serializes a Login Request into wire bytes.
pub fn encode_login_request(req: &LoginRequest) -> IscsiResult<Vec<u8>> {
    encode_pdu(&req.to_pdu())
}
