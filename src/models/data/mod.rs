// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Data-In flags.
pub mod common;
/// SCSI Data-In PDU.
pub mod response;
