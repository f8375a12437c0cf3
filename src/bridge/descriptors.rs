// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Fixed-layout records exchanged with the block-device driver through
//! shared memory. Host byte order is little-endian; padding is explicit so
//! the Rust layout matches the C structs byte for byte.

use std::mem::size_of;

use zerocopy::{
    FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{LittleEndian, U16, U32, U64},
};

use crate::{
    error::{IscsiError, IscsiResult},
    models::command::common::ScsiStatus,
};

pub const CDB_MAX_LEN: usize = 16;
pub const SENSE_MAX_LEN: usize = 244;

/// Byte size of the command queue region (driver -> daemon).
pub const COMMAND_QUEUE_BYTES: usize = 64 * 1024;
/// Byte size of the completion queue region (daemon -> driver).
pub const COMPLETION_QUEUE_BYTES: usize = 64 * 1024;
pub const COMMAND_QUEUE_DEPTH: usize = COMMAND_QUEUE_BYTES / size_of::<ScsiCommandDescriptor>();
pub const COMPLETION_QUEUE_DEPTH: usize =
    COMPLETION_QUEUE_BYTES / size_of::<ScsiCompletionDescriptor>();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirection {
    None,
    /// Device to host.
    Read,
    /// Host to device.
    Write,
    Unknown(u8),
}

impl From<u8> for DataDirection {
    fn from(b: u8) -> Self {
        match b {
            0 => DataDirection::None,
            1 => DataDirection::Read,
            2 => DataDirection::Write,
            other => DataDirection::Unknown(other),
        }
    }
}

impl From<DataDirection> for u8 {
    fn from(d: DataDirection) -> Self {
        match d {
            DataDirection::None => 0,
            DataDirection::Read => 1,
            DataDirection::Write => 2,
            DataDirection::Unknown(b) => b,
        }
    }
}

/// One SCSI command handed over by the driver (80 bytes).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct ScsiCommandDescriptor {
    /// Driver-side task identifier.
    pub task_tag: U64<LittleEndian>,
    pub target_id: U32<LittleEndian>,
    _pad0: [u8; 4],
    pub lun: U64<LittleEndian>,
    pub cdb: [u8; CDB_MAX_LEN],
    /// 6, 10, 12 or 16.
    pub cdb_length: u8,
    pub data_direction: u8,
    _pad1: [u8; 2],
    pub transfer_length: U32<LittleEndian>,
    /// Offset of the payload inside the shared data pool.
    pub data_buffer_offset: U32<LittleEndian>,
    _reserved: [u8; 28],
}

const _: () = assert!(size_of::<ScsiCommandDescriptor>() == 80);

impl ScsiCommandDescriptor {
    pub fn new(
        task_tag: u64,
        lun: u64,
        cdb: &[u8],
        direction: DataDirection,
        transfer_length: u32,
    ) -> IscsiResult<Self> {
        if cdb.is_empty() || cdb.len() > CDB_MAX_LEN {
            return Err(IscsiError::MalformedPdu(format!(
                "CDB length {} outside 1..=16",
                cdb.len()
            )));
        }
        let mut d = Self::new_zeroed();
        d.task_tag.set(task_tag);
        d.lun.set(lun);
        d.cdb[..cdb.len()].copy_from_slice(cdb);
        d.cdb_length = cdb.len() as u8;
        d.data_direction = direction.into();
        d.transfer_length.set(transfer_length);
        Ok(d)
    }

    /// The meaningful prefix of `cdb`.
    pub fn cdb_bytes(&self) -> &[u8] {
        &self.cdb[..usize::from(self.cdb_length).min(CDB_MAX_LEN)]
    }

    pub fn direction(&self) -> DataDirection {
        self.data_direction.into()
    }

    pub fn from_prefix(buf: &[u8]) -> IscsiResult<Self> {
        Self::read_from_prefix(buf)
            .map(|(d, _)| d)
            .map_err(|_| IscsiError::InsufficientData {
                needed: size_of::<Self>(),
                available: buf.len(),
            })
    }
}

/// Completion written back for one command (280 bytes).
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct ScsiCompletionDescriptor {
    pub task_tag: U64<LittleEndian>,
    pub initiator_task_tag: U32<LittleEndian>,
    pub scsi_status: u8,
    /// 0 = command completed at target, 1 = target failure.
    pub service_response: u8,
    pub sense_length: U16<LittleEndian>,
    pub sense_data: [u8; SENSE_MAX_LEN],
    pub data_transfer_count: U32<LittleEndian>,
    pub residual_count: U32<LittleEndian>,
    _reserved: [u8; 12],
}

const _: () = assert!(size_of::<ScsiCompletionDescriptor>() == 280);

impl ScsiCompletionDescriptor {
    pub fn new(task_tag: u64, itt: u32, status: ScsiStatus, transfer_count: u32) -> Self {
        let mut c = Self::new_zeroed();
        c.task_tag.set(task_tag);
        c.initiator_task_tag.set(itt);
        c.scsi_status = status.into();
        c.data_transfer_count.set(transfer_count);
        c
    }

    /// Attaches sense data, truncated to the 244-byte field.
    pub fn with_sense(mut self, sense: &[u8]) -> Self {
        let n = sense.len().min(SENSE_MAX_LEN);
        self.sense_data[..n].copy_from_slice(&sense[..n]);
        self.sense_length.set(n as u16);
        self
    }

    pub fn status(&self) -> ScsiStatus {
        self.scsi_status.into()
    }

    pub fn sense(&self) -> &[u8] {
        &self.sense_data[..usize::from(self.sense_length.get()).min(SENSE_MAX_LEN)]
    }

    pub fn from_prefix(buf: &[u8]) -> IscsiResult<Self> {
        Self::read_from_prefix(buf)
            .map(|(c, _)| c)
            .map_err(|_| IscsiError::InsufficientData {
                needed: size_of::<Self>(),
                available: buf.len(),
            })
    }
}
