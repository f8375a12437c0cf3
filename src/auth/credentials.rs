// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use dashmap::DashMap;
use tracing::debug;

use crate::{
    cfg::config::ChapConfig,
    error::{IscsiError, IscsiResult},
};

/// CHAP username and secret for one target.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl From<&ChapConfig> for Credential {
    fn from(c: &ChapConfig) -> Self {
        Self {
            username: c.username.clone(),
            secret: c.secret.clone(),
        }
    }
}

/// Credentials keyed by target IQN.
pub trait CredentialStore: Send + Sync {
    /// Stores `cred` for `iqn`, replacing any previous entry.
    fn store(&self, iqn: &str, cred: Credential) -> IscsiResult<()>;
    fn retrieve(&self, iqn: &str) -> IscsiResult<Credential>;
    /// Deleting an absent entry is not an error.
    fn delete(&self, iqn: &str) -> IscsiResult<()>;
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: DashMap<String, Credential>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn store(&self, iqn: &str, cred: Credential) -> IscsiResult<()> {
        if iqn.is_empty() {
            return Err(IscsiError::Credential("empty target IQN".into()));
        }
        debug!(iqn, username = %cred.username, "credential stored");
        self.entries.insert(iqn.to_owned(), cred);
        Ok(())
    }

    fn retrieve(&self, iqn: &str) -> IscsiResult<Credential> {
        self.entries
            .get(iqn)
            .map(|e| e.value().clone())
            .ok_or_else(|| IscsiError::Credential(format!("no credential for {iqn}")))
    }

    fn delete(&self, iqn: &str) -> IscsiResult<()> {
        self.entries.remove(iqn);
        Ok(())
    }
}
