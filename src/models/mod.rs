//! This module defines the data structures for iSCSI PDUs.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Defines the 48-byte Basic Header Segment.
pub mod bhs;
/// Defines the structures for SCSI Command and SCSI Response PDUs.
pub mod command;
/// Defines the structures for Data-In PDUs.
pub mod data;
/// Defines the structures for Login PDUs.
pub mod login;
/// Defines the iSCSI opcode enumeration.
pub mod opcode;
/// Defines typed dispatch over decoded PDUs.
pub mod parse;
/// Defines complete PDU framing, padding and digests.
pub mod pdu;
/// Defines the structures for Text PDUs and key/value segments.
pub mod text;
