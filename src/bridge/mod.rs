//! Shared-memory bridge between the block-device driver and the daemon.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Answers queued SCSI commands.
pub mod command_loop;
/// The `DriverBridge` seam and its in-memory implementation.
pub mod connector;
/// Command and completion records in their C layout.
pub mod descriptors;
/// Fixed-capacity FIFO backing the queues.
pub mod ring_buffer;
