//! Client-side iSCSI initiator core: PDU codec, login negotiation, session
//! tracking and the driver bridge.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// CHAP helpers and credential storage.
pub mod auth;
/// Shared-memory queues towards the block-device driver.
pub mod bridge;
/// Handles configuration and logging.
pub mod cfg;
/// Connection, login driver and session table.
pub mod client;
/// SCSI CDB builders and response parsers.
pub mod control_block;
/// Typed error taxonomy.
pub mod error;
/// Defines the data structures for iSCSI PDUs.
pub mod models;
/// Login state machine and operational parameter negotiation.
pub mod state_machine;
