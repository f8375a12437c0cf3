// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashSet, time::Duration};

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::{
    bridge::{
        descriptors::{
            COMMAND_QUEUE_DEPTH, COMPLETION_QUEUE_DEPTH, ScsiCommandDescriptor,
            ScsiCompletionDescriptor,
        },
        ring_buffer::RingBuffer,
    },
    error::{IscsiError, IscsiResult},
};

/// HBA status value reported when the adapter is online.
pub const HBA_ONLINE: u64 = 1;
/// Poll period used by bridges that cannot signal new commands.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The daemon's view of the block-device driver: a command queue to drain
/// and a completion queue to fill.
pub trait DriverBridge: Send + Sync {
    fn connect(&self) -> impl Future<Output = IscsiResult<()>> + Send;

    /// Maps the command, completion and data regions. Requires `connect`.
    fn map_shared_memory(&self) -> impl Future<Output = IscsiResult<()>> + Send;

    fn hba_status(&self) -> impl Future<Output = IscsiResult<u64>> + Send;

    fn create_session(&self) -> impl Future<Output = IscsiResult<u64>> + Send;

    fn destroy_session(&self, id: u64) -> impl Future<Output = IscsiResult<()>> + Send;

    fn has_pending_commands(&self) -> impl Future<Output = bool> + Send;

    fn read_next_command(
        &self,
    ) -> impl Future<Output = Option<ScsiCommandDescriptor>> + Send;

    fn write_completion(
        &self,
        completion: ScsiCompletionDescriptor,
    ) -> impl Future<Output = IscsiResult<()>> + Send;

    /// Resolves once a command may be waiting. Polls by default.
    fn command_ready(&self) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(POLL_INTERVAL)
    }

    fn disconnect(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug)]
struct BridgeState {
    connected: bool,
    mapped: bool,
    commands: RingBuffer<ScsiCommandDescriptor>,
    completions: RingBuffer<ScsiCompletionDescriptor>,
    sessions: HashSet<u64>,
    next_session: u64,
}

/// In-process bridge: the queues are plain ring buffers and the "driver"
/// side is driven through [`submit_command`](Self::submit_command) and
/// [`take_completion`](Self::take_completion).
#[derive(Debug)]
pub struct MemoryBridge {
    state: Mutex<BridgeState>,
    ready: Notify,
}

impl MemoryBridge {
    pub fn new(command_depth: usize, completion_depth: usize) -> IscsiResult<Self> {
        Ok(Self {
            state: Mutex::new(BridgeState {
                connected: false,
                mapped: false,
                commands: RingBuffer::new(command_depth)?,
                completions: RingBuffer::new(completion_depth)?,
                sessions: HashSet::new(),
                next_session: 1,
            }),
            ready: Notify::new(),
        })
    }

    /// Queues sized like the 64 KiB shared-memory regions.
    pub fn with_default_queues() -> IscsiResult<Self> {
        Self::new(COMMAND_QUEUE_DEPTH, COMPLETION_QUEUE_DEPTH)
    }

    /// Driver side: enqueue a command and wake the reader.
    pub async fn submit_command(&self, cmd: ScsiCommandDescriptor) -> IscsiResult<()> {
        self.state.lock().await.commands.push(cmd)?;
        self.ready.notify_one();
        Ok(())
    }

    /// Driver side: dequeue the oldest completion.
    pub async fn take_completion(&self) -> Option<ScsiCompletionDescriptor> {
        self.state.lock().await.completions.pop()
    }

    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

impl DriverBridge for MemoryBridge {
    async fn connect(&self) -> IscsiResult<()> {
        let mut st = self.state.lock().await;
        if st.connected {
            return Err(IscsiError::AlreadyConnected);
        }
        st.connected = true;
        debug!("bridge connected");
        Ok(())
    }

    async fn map_shared_memory(&self) -> IscsiResult<()> {
        let mut st = self.state.lock().await;
        if !st.connected {
            return Err(IscsiError::NotConnected);
        }
        st.mapped = true;
        Ok(())
    }

    async fn hba_status(&self) -> IscsiResult<u64> {
        let st = self.state.lock().await;
        if !st.connected {
            return Err(IscsiError::NotConnected);
        }
        Ok(if st.mapped { HBA_ONLINE } else { 0 })
    }

    async fn create_session(&self) -> IscsiResult<u64> {
        let mut st = self.state.lock().await;
        if !st.connected {
            return Err(IscsiError::NotConnected);
        }
        let id = st.next_session;
        st.next_session += 1;
        st.sessions.insert(id);
        Ok(id)
    }

    async fn destroy_session(&self, id: u64) -> IscsiResult<()> {
        let mut st = self.state.lock().await;
        if st.sessions.remove(&id) {
            Ok(())
        } else {
            Err(IscsiError::SessionNotFound(id.to_string()))
        }
    }

    async fn has_pending_commands(&self) -> bool {
        let st = self.state.lock().await;
        st.mapped && !st.commands.is_empty()
    }

    async fn read_next_command(&self) -> Option<ScsiCommandDescriptor> {
        let mut st = self.state.lock().await;
        if !st.mapped {
            return None;
        }
        st.commands.pop()
    }

    async fn write_completion(&self, completion: ScsiCompletionDescriptor) -> IscsiResult<()> {
        let mut st = self.state.lock().await;
        if !st.mapped {
            return Err(IscsiError::NotConnected);
        }
        st.completions.push(completion)?;
        Ok(())
    }

    async fn command_ready(&self) {
        self.ready.notified().await;
    }

    async fn disconnect(&self) {
        let mut st = self.state.lock().await;
        st.connected = false;
        st.mapped = false;
        st.sessions.clear();
        debug!("bridge disconnected");
    }
}
