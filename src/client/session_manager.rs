// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU32, AtomicUsize, Ordering},
    },
};

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    cfg::config::Config,
    client::{connection::Connection, login},
    error::IscsiError,
    models::text::discovery::DiscoveredTarget,
    state_machine::login_states::{LoginStateMachine, LoginTarget},
};

/// One tracked session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub target_iqn: String,
    /// `host:port` the session was opened against.
    pub portal: String,
    pub connected_at: DateTime<Utc>,
    pub isid: [u8; 6],
    pub tsih: u16,
    /// Operational parameters agreed during login. Empty for sessions
    /// registered through [`SessionManager::track_session`].
    pub parameters: HashMap<String, String>,
}

/// Session table shared between tasks. Sessions are keyed by a random
/// UUID-style id; each logged-in session also owns its [`Connection`].
#[derive(Debug)]
pub struct SessionManager {
    sessions: DashMap<String, SessionInfo>,
    connections: DashMap<String, Arc<Connection>>,
    isid_counter: AtomicU32,
    /// Logins between the limit check and the session insert.
    logins_in_progress: AtomicUsize,
    max_sessions: u32,
}

/// A reserved place under `max_sessions`, held for the duration of one
/// login. Dropping it frees the place; a successful login has taken it
/// over by inserting its session first.
struct SessionSlot<'a>(&'a AtomicUsize);

impl Drop for SessionSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn new_session_id() -> String {
    // RFC 4122 version 4 layout.
    let v = (rand::random::<u128>() & !((0xF000_u128 << 64) | (0xC000_u128 << 48)))
        | (0x4000_u128 << 64)
        | (0x8000_u128 << 48);
    format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        v >> 96,
        (v >> 80) & 0xFFFF,
        (v >> 64) & 0xFFFF,
        (v >> 48) & 0xFFFF,
        v & 0xFFFF_FFFF_FFFF
    )
}

impl SessionManager {
    pub fn new(max_sessions: u32) -> Self {
        Self {
            sessions: DashMap::new(),
            connections: DashMap::new(),
            isid_counter: AtomicU32::new(0),
            logins_in_progress: AtomicUsize::new(0),
            max_sessions,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.runtime.max_sessions)
    }

    /// ISID with byte 0 = 0x00 and bytes 1..=5 taken from the low 40 bits of
    /// `(unix_seconds << 32) | counter`. The counter is bumped before use, so
    /// ISIDs from one manager never repeat until it wraps.
    pub fn generate_isid(&self) -> [u8; 6] {
        let counter = self
            .isid_counter
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);
        let secs = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
        let b = ((secs << 32) | u64::from(counter)).to_be_bytes();
        [0x00, b[3], b[4], b[5], b[6], b[7]]
    }

    /// Counts sessions and logins still in progress against the limit, so
    /// concurrent logins cannot overshoot it.
    fn reserve_slot(&self) -> Result<SessionSlot<'_>> {
        let in_progress = self.logins_in_progress.fetch_add(1, Ordering::AcqRel);
        let slot = SessionSlot(&self.logins_in_progress);
        ensure!(
            self.sessions.len() + in_progress < self.max_sessions as usize,
            IscsiError::InvalidState(format!(
                "session limit of {} reached",
                self.max_sessions
            ))
        );
        Ok(slot)
    }

    fn insert(&self, mut info: SessionInfo) -> String {
        loop {
            let id = new_session_id();
            if let Entry::Vacant(slot) = self.sessions.entry(id.clone()) {
                info.id.clone_from(&id);
                slot.insert(info);
                return id;
            }
        }
    }

    /// Registers a session and returns its fresh id.
    pub fn track_session(&self, target_iqn: &str, portal: &str) -> String {
        let id = self.insert(SessionInfo {
            id: String::new(),
            target_iqn: target_iqn.to_owned(),
            portal: portal.to_owned(),
            connected_at: Utc::now(),
            isid: [0; 6],
            tsih: 0,
            parameters: HashMap::new(),
        });
        debug!(%id, target_iqn, portal, "session tracked");
        id
    }

    /// Forgets a session. Unknown ids are ignored. A connection registered
    /// for the session is dropped without a graceful close; use
    /// [`disconnect_session`](Self::disconnect_session) for that.
    pub fn remove_session(&self, id: &str) {
        if self.sessions.remove(id).is_some() {
            debug!(%id, "session removed");
        }
        self.connections.remove(id);
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn get_session(&self, id: &str) -> Option<SessionInfo> {
        self.sessions.get(id).map(|e| e.value().clone())
    }

    pub fn connection(&self, id: &str) -> Option<Arc<Connection>> {
        self.connections.get(id).map(|e| Arc::clone(e.value()))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Connects to `host:port`, logs in to `target_iqn` as a Normal session
    /// and tracks the result together with its connection.
    pub async fn login(
        &self,
        cfg: &Config,
        host: &str,
        port: u16,
        target_iqn: &str,
    ) -> Result<String> {
        let _slot = self.reserve_slot()?;

        let conn = Arc::new(Connection::new());
        conn.connect(host, port, cfg.runtime.connect_timeout)
            .await
            .with_context(|| format!("failed to connect to {host}:{port}"))?;

        let isid = self.generate_isid();
        let mut sm = LoginStateMachine::new(isid);
        sm.set_initiator_alias(&cfg.login.identity.initiator_alias);
        let outcome = match login::login(
            &conn,
            &mut sm,
            &cfg.login.identity.initiator_name,
            &LoginTarget::Normal(target_iqn.to_owned()),
            &cfg.login.negotiation,
            cfg.runtime.login_timeout,
        )
        .await
        {
            Ok(o) => o,
            Err(e) => {
                conn.disconnect().await;
                return Err(e.context(format!("login to {target_iqn} failed")));
            },
        };

        let id = self.insert(SessionInfo {
            id: String::new(),
            target_iqn: target_iqn.to_owned(),
            portal: format!("{host}:{port}"),
            connected_at: Utc::now(),
            isid,
            tsih: sm.tsih(),
            parameters: outcome.parameters,
        });
        self.connections.insert(id.clone(), conn);
        info!(%id, target_iqn, host, port, tsih = sm.tsih(), "session established");
        Ok(id)
    }

    /// Runs a Discovery session against `host:port` and returns what the
    /// target reports for `SendTargets=All`. The session is not tracked.
    pub async fn discover(
        &self,
        cfg: &Config,
        host: &str,
        port: u16,
    ) -> Result<Vec<DiscoveredTarget>> {
        let conn = Connection::new();
        conn.connect(host, port, cfg.runtime.connect_timeout)
            .await
            .with_context(|| format!("failed to connect to {host}:{port}"))?;

        let mut sm = LoginStateMachine::new(self.generate_isid());
        sm.set_initiator_alias(&cfg.login.identity.initiator_alias);
        let wait = cfg.runtime.login_timeout;
        let res: Result<Vec<DiscoveredTarget>> = async {
            login::login(
                &conn,
                &mut sm,
                &cfg.login.identity.initiator_name,
                &LoginTarget::Discovery,
                &cfg.login.negotiation,
                wait,
            )
            .await?;
            login::send_targets(&conn, &mut sm, wait).await
        }
        .await;

        conn.disconnect().await;
        res.with_context(|| format!("discovery against {host}:{port} failed"))
    }

    /// Closes the session's connection and forgets the session.
    pub async fn disconnect_session(&self, id: &str) -> Result<()> {
        let Some((_, info)) = self.sessions.remove(id) else {
            return Err(IscsiError::SessionNotFound(id.to_owned()).into());
        };
        match self.connections.remove(id) {
            Some((_, conn)) => conn.disconnect().await,
            None => warn!(%id, "session had no connection"),
        }
        info!(%id, target_iqn = %info.target_iqn, "session disconnected");
        Ok(())
    }

    /// Disconnects every tracked session.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            if let Err(e) = self.disconnect_session(&id).await {
                warn!(%id, error = %e, "disconnect failed");
            }
        }
    }
}
