// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI Command Descriptor Blocks for the commands the initiator issues
//! itself. Each builder returns the CDB at its natural length; the SCSI
//! Command PDU pads it to 16 bytes.

pub mod inquiry;
pub mod read_capacity;
pub mod read_write;
pub mod test_unit_ready;
