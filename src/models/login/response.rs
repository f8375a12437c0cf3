// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    error::IscsiResult,
    models::{
        bhs::BasicHeaderSegment,
        login::{
            common::LoginFlags,
            request::{OS_EXP_SN, OS_ISID, OS_SN, OS_TSIH, OS_VERSION_MAX, OS_VERSION_MIN},
            status::LoginStatus,
        },
        opcode::Opcode,
        pdu::{IscsiPdu, encode_pdu},
        text::kv::{encode_key_value_pairs, parse_key_value_pairs},
    },
};

const OS_STATUS: usize = 12;
const OS_MAX_CMD_SN: usize = 24;

/// Login Response (opcode 0x23).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoginResponse {
    pub transit: bool,
    pub cont: bool,
    pub csg: u8,
    pub nsg: u8,
    pub version_max: u8,
    pub version_active: u8,
    pub isid: [u8; 6],
    pub tsih: u16,
    pub initiator_task_tag: u32,
    pub stat_sn: u32,
    pub exp_cmd_sn: u32,
    pub max_cmd_sn: u32,
    pub status_class: u8,
    pub status_detail: u8,
    pub key_value_pairs: HashMap<String, String>,
}

impl LoginResponse {
    pub fn status(&self) -> LoginStatus {
        LoginStatus::new(self.status_class, self.status_detail)
    }

    pub fn flags(&self) -> LoginFlags {
        LoginFlags::from_codes(self.transit, self.cont, self.csg, self.nsg)
    }

    pub fn to_pdu(&self) -> IscsiPdu {
        let mut bhs = BasicHeaderSegment::new(Opcode::LoginResp);
        bhs.flags = self.flags().bits();
        bhs.initiator_task_tag = self.initiator_task_tag;
        bhs.set_os(OS_VERSION_MAX, &[self.version_max, self.version_active]);
        bhs.set_os(OS_ISID, &self.isid);
        bhs.set_os(OS_TSIH, &self.tsih.to_be_bytes());
        bhs.set_os(OS_STATUS, &[self.status_class, self.status_detail]);
        bhs.set_os(OS_SN, &self.stat_sn.to_be_bytes());
        bhs.set_os(OS_EXP_SN, &self.exp_cmd_sn.to_be_bytes());
        bhs.set_os(OS_MAX_CMD_SN, &self.max_cmd_sn.to_be_bytes());
        IscsiPdu::new(bhs, encode_key_value_pairs(&self.key_value_pairs))
    }
}

pub fn parse_login_response(pdu: &IscsiPdu) -> IscsiResult<LoginResponse> {
    pdu.expect_opcode(Opcode::LoginResp)?;
    let bhs = &pdu.bhs;
    let flags = LoginFlags::from_bits_retain(bhs.flags);
    let [status_class, status_detail] = bhs.os_bytes::<2>(OS_STATUS);
    Ok(LoginResponse {
        transit: flags.transit(),
        cont: flags.cont(),
        csg: flags.csg_code(),
        nsg: flags.nsg_code(),
        version_max: bhs.os_bytes::<1>(OS_VERSION_MAX)[0],
        version_active: bhs.os_bytes::<1>(OS_VERSION_MIN)[0],
        isid: bhs.os_bytes(OS_ISID),
        tsih: bhs.os_u16(OS_TSIH),
        initiator_task_tag: bhs.initiator_task_tag,
        stat_sn: bhs.os_u32(OS_SN),
        exp_cmd_sn: bhs.os_u32(OS_EXP_SN),
        max_cmd_sn: bhs.os_u32(OS_MAX_CMD_SN),
        status_class,
        status_detail,
        key_value_pairs: parse_key_value_pairs(&pdu.data),
    })
}

/// Serializes a Login Response into wire bytes. Used by target doubles.
pub fn encode_login_response(resp: &LoginResponse) -> IscsiResult<Vec<u8>> {
    encode_pdu(&resp.to_pdu())
}
