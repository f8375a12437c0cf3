// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

bitflags::bitflags! {
    /// Byte 1 of a SCSI Command PDU. The low three bits carry the task
    /// attribute.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ScsiCommandRequestFlags: u8 {
        const FINAL = 0x80;
        const READ  = 0x40;
        const WRITE = 0x20;
        const ATTR  = 0x07;
    }
}

impl ScsiCommandRequestFlags {
    pub fn task_attribute(self) -> TaskAttribute {
        TaskAttribute::from(self.bits())
    }

    /// Replaces the attribute bits, keeping F/R/W.
    pub fn with_task_attribute(self, attr: TaskAttribute) -> Self {
        Self::from_bits_retain((self - Self::ATTR).bits() | u8::from(attr))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAttribute {
    Untagged,
    Simple,
    Ordered,
    HeadOfQueue,
    Aca,
    Reserved(u8),
}

const TASK_ATTRIBUTES: [TaskAttribute; 5] = [
    TaskAttribute::Untagged,
    TaskAttribute::Simple,
    TaskAttribute::Ordered,
    TaskAttribute::HeadOfQueue,
    TaskAttribute::Aca,
];

impl From<u8> for TaskAttribute {
    fn from(bits: u8) -> Self {
        let code = bits & 0x07;
        TASK_ATTRIBUTES
            .get(usize::from(code))
            .copied()
            .unwrap_or(TaskAttribute::Reserved(code))
    }
}

impl From<TaskAttribute> for u8 {
    fn from(attr: TaskAttribute) -> Self {
        match attr {
            TaskAttribute::Reserved(code) => code & 0x07,
            known => TASK_ATTRIBUTES
                .iter()
                .position(|a| *a == known)
                .map_or(0, |i| i as u8),
        }
    }
}

/// Service response, byte 2 of a SCSI Response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    CommandCompleted,
    TargetFailure,
    VendorSpecific(u8),
    Reserved(u8),
}

impl From<u8> for ResponseCode {
    fn from(b: u8) -> Self {
        match b {
            0x00 => Self::CommandCompleted,
            0x01 => Self::TargetFailure,
            0x80..=0xFF => Self::VendorSpecific(b),
            _ => Self::Reserved(b),
        }
    }
}

impl From<ResponseCode> for u8 {
    fn from(c: ResponseCode) -> Self {
        match c {
            ResponseCode::CommandCompleted => 0x00,
            ResponseCode::TargetFailure => 0x01,
            ResponseCode::VendorSpecific(v) | ResponseCode::Reserved(v) => v,
        }
    }
}

/// SAM status byte, carried by SCSI Response and by Data-In with S=1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScsiStatus {
    Good,
    CheckCondition,
    Busy,
    ReservationConflict,
    TaskSetFull,
    AcaActive,
    TaskAborted,
    Other(u8),
}

const STATUS_CODES: [(u8, ScsiStatus, &str); 7] = [
    (0x00, ScsiStatus::Good, "GOOD"),
    (0x02, ScsiStatus::CheckCondition, "CHECK CONDITION"),
    (0x08, ScsiStatus::Busy, "BUSY"),
    (0x18, ScsiStatus::ReservationConflict, "RESERVATION CONFLICT"),
    (0x28, ScsiStatus::TaskSetFull, "TASK SET FULL"),
    (0x30, ScsiStatus::AcaActive, "ACA ACTIVE"),
    (0x40, ScsiStatus::TaskAborted, "TASK ABORTED"),
];

impl ScsiStatus {
    pub fn is_good(self) -> bool {
        self == Self::Good
    }
}

impl From<u8> for ScsiStatus {
    fn from(b: u8) -> Self {
        STATUS_CODES
            .iter()
            .find(|(code, ..)| *code == b)
            .map_or(Self::Other(b), |(_, s, _)| *s)
    }
}

impl From<ScsiStatus> for u8 {
    fn from(s: ScsiStatus) -> Self {
        match s {
            ScsiStatus::Other(v) => v,
            known => STATUS_CODES
                .iter()
                .find(|(_, st, _)| *st == known)
                .map_or(0, |(code, ..)| *code),
        }
    }
}

impl fmt::Display for ScsiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match STATUS_CODES.iter().find(|(_, st, _)| st == self) {
            Some((code, _, name)) => write!(f, "{name} ({code:#04x})"),
            None => write!(f, "status {:#04x}", u8::from(*self)),
        }
    }
}
