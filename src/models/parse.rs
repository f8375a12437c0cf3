// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use enum_dispatch::enum_dispatch;

use crate::{
    error::IscsiResult,
    models::{
        command::{
            request::{ScsiCommandRequest, encode_scsi_command, parse_scsi_command},
            response::{ScsiCommandResponse, encode_scsi_response, parse_scsi_response},
        },
        data::response::{ScsiDataIn, encode_data_in, parse_data_in},
        login::{
            request::{LoginRequest, parse_login_request},
            response::{LoginResponse, parse_login_response},
        },
        opcode::Opcode,
        pdu::IscsiPdu,
        text::{
            request::{TextRequest, encode_text_request, parse_text_request},
            response::{TextResponse, encode_text_response, parse_text_response},
        },
    },
};

/// Operations every typed projection supports.
#[enum_dispatch]
pub trait PduView {
    fn task_tag(&self) -> u32;

    /// Back to the generic container.
    fn to_iscsi_pdu(&self) -> IscsiPdu;
}

impl PduView for LoginRequest {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        self.to_pdu()
    }
}

impl PduView for LoginResponse {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        self.to_pdu()
    }
}

impl PduView for TextRequest {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        encode_text_request(self)
    }
}

impl PduView for TextResponse {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        encode_text_response(self)
    }
}

impl PduView for ScsiCommandRequest {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        encode_scsi_command(self)
    }
}

impl PduView for ScsiCommandResponse {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        encode_scsi_response(self)
    }
}

impl PduView for ScsiDataIn {
    fn task_tag(&self) -> u32 {
        self.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        encode_data_in(self)
    }
}

impl PduView for IscsiPdu {
    fn task_tag(&self) -> u32 {
        self.bhs.initiator_task_tag
    }

    fn to_iscsi_pdu(&self) -> IscsiPdu {
        self.clone()
    }
}

/// A PDU projected onto its opcode-specific view. Opcodes without a
/// dedicated projection stay as [`IscsiPdu`] in `Other`.
#[enum_dispatch(PduView)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedPdu {
    LoginRequest(LoginRequest),
    LoginResponse(LoginResponse),
    TextRequest(TextRequest),
    TextResponse(TextResponse),
    ScsiCommandRequest(ScsiCommandRequest),
    ScsiCommandResponse(ScsiCommandResponse),
    ScsiDataIn(ScsiDataIn),
    Other(IscsiPdu),
}

impl TypedPdu {
    pub fn opcode(&self) -> IscsiResult<Opcode> {
        Ok(match self {
            TypedPdu::LoginRequest(_) => Opcode::LoginReq,
            TypedPdu::LoginResponse(_) => Opcode::LoginResp,
            TypedPdu::TextRequest(_) => Opcode::TextReq,
            TypedPdu::TextResponse(_) => Opcode::TextResp,
            TypedPdu::ScsiCommandRequest(_) => Opcode::ScsiCommandReq,
            TypedPdu::ScsiCommandResponse(_) => Opcode::ScsiCommandResp,
            TypedPdu::ScsiDataIn(_) => Opcode::ScsiDataIn,
            TypedPdu::Other(p) => p.opcode()?,
        })
    }

    /// Projects a decoded PDU by its opcode. Fails with `InvalidOpcode` for
    /// codes outside the opcode table.
    pub fn parse(pdu: IscsiPdu) -> IscsiResult<Self> {
        Ok(match pdu.opcode()? {
            Opcode::LoginReq => TypedPdu::LoginRequest(parse_login_request(&pdu)?),
            Opcode::LoginResp => TypedPdu::LoginResponse(parse_login_response(&pdu)?),
            Opcode::TextReq => TypedPdu::TextRequest(parse_text_request(&pdu)?),
            Opcode::TextResp => TypedPdu::TextResponse(parse_text_response(&pdu)?),
            Opcode::ScsiCommandReq => {
                TypedPdu::ScsiCommandRequest(parse_scsi_command(&pdu)?)
            },
            Opcode::ScsiCommandResp => {
                TypedPdu::ScsiCommandResponse(parse_scsi_response(&pdu)?)
            },
            Opcode::ScsiDataIn => TypedPdu::ScsiDataIn(parse_data_in(&pdu)?),
            _ => TypedPdu::Other(pdu),
        })
    }
}
