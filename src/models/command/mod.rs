// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Flags, task attributes, response and status codes.
pub mod common;
/// SCSI Command PDU.
pub mod request;
/// SCSI Response PDU.
pub mod response;
