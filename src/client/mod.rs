//! Transport, login driver and session table.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Timeout helper and the raw framed PDU.
pub mod common;
/// TCP connection with a background receive task.
pub mod connection;
/// Drives the login state machine and SendTargets over a connection.
pub mod login;
/// Tracks sessions and their connections.
pub mod session_manager;
