// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Drains the driver's command queue and answers every command.
//!
//! No PDUs are sent yet: each command is given an ITT and completed with
//! GOOD status and a zero transfer count within the same step, so no ITT
//! outlives its command.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    bridge::{
        connector::{DriverBridge, HBA_ONLINE},
        descriptors::{ScsiCommandDescriptor, ScsiCompletionDescriptor},
    },
    error::IscsiResult,
    models::command::common::ScsiStatus,
    state_machine::login_states::RESERVED_TASK_TAG,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoopStats {
    pub completed: u64,
    pub failed: u64,
}

#[derive(Debug)]
pub struct CommandLoop<B> {
    bridge: Arc<B>,
    cancel: CancellationToken,
    next_itt: u32,
    stats: LoopStats,
}

impl<B: DriverBridge + 'static> CommandLoop<B> {
    pub fn new(bridge: Arc<B>, cancel: CancellationToken) -> Self {
        Self {
            bridge,
            cancel,
            next_itt: 1,
            stats: LoopStats::default(),
        }
    }

    /// Connects to the driver, maps the queues and opens a driver session.
    /// Returns the driver session id.
    pub async fn start(&self) -> IscsiResult<u64> {
        self.bridge.connect().await?;
        self.bridge.map_shared_memory().await?;
        let status = self.bridge.hba_status().await?;
        if status != HBA_ONLINE {
            warn!(status, "HBA is not online");
        }
        let session = self.bridge.create_session().await?;
        info!(session, status, "driver bridge ready");
        Ok(session)
    }

    /// ITTs run 1..=0xFFFFFFFE and wrap back to 1.
    fn allocate_itt(&mut self) -> u32 {
        let itt = self.next_itt;
        self.next_itt = self.next_itt.wrapping_add(1);
        if self.next_itt == RESERVED_TASK_TAG || self.next_itt == 0 {
            self.next_itt = 1;
        }
        itt
    }

    async fn process(&mut self, cmd: ScsiCommandDescriptor) {
        let task_tag = cmd.task_tag.get();
        let itt = self.allocate_itt();
        debug!(
            task_tag,
            itt,
            lun = cmd.lun.get(),
            opcode = cmd.cdb_bytes().first().copied().unwrap_or_default(),
            "processing command"
        );

        let status = ScsiStatus::Good;
        let completion = ScsiCompletionDescriptor::new(task_tag, itt, status, 0);
        match self.bridge.write_completion(completion).await {
            Ok(()) => {
                debug!(task_tag, itt, %status, "command completed");
                self.stats.completed += 1;
            },
            Err(e) => {
                warn!(task_tag, itt, error = %e, "failed to write completion");
                self.stats.failed += 1;
            },
        }
    }

    /// Runs until the cancellation token fires, then disconnects the
    /// bridge.
    pub async fn run(mut self) -> LoopStats {
        let bridge = Arc::clone(&self.bridge);
        loop {
            while !self.cancel.is_cancelled() {
                match bridge.read_next_command().await {
                    Some(cmd) => self.process(cmd).await,
                    None => break,
                }
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = bridge.command_ready() => {},
            }
        }
        bridge.disconnect().await;
        info!(
            completed = self.stats.completed,
            failed = self.stats.failed,
            "command loop stopped"
        );
        self.stats
    }
}
