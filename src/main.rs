// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{env, sync::Arc};

use anyhow::{Context, Result, ensure};
use iscsi_initiator_rs::{
    cfg::{
        config::{Config, resolve_config_path},
        logger::init_logger,
    },
    client::session_manager::SessionManager,
};
use tokio::{main, signal};
use tracing::info;

const CONFIG_ENV: &str = "ISCSI_CONFIG";
const LOGGER_CONFIG_ENV: &str = "ISCSI_LOGGER_CONFIG";

#[main]
async fn main() -> Result<()> {
    let logger_path =
        env::var(LOGGER_CONFIG_ENV).unwrap_or_else(|_| "tests/config_logger.yaml".into());
    let _guard = init_logger(&logger_path)?;

    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| "tests/config.yaml".into());
    let config = resolve_config_path(&config_path)
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")?;

    let host = config.runtime.target_address.as_str();
    ensure!(!host.is_empty(), "runtime.TargetAddress is not set");
    let port = config.runtime.target_port;

    let manager = Arc::new(SessionManager::from_config(&config));
    if config.login.identity.session_type.is_discovery() {
        for t in manager.discover(&config, host, port).await? {
            info!(iqn = %t.iqn, portals = ?t.portals, "discovered target");
        }
        return Ok(());
    }

    let id = manager
        .login(&config, host, port, &config.login.identity.target_name)
        .await?;

    for s in manager.list_sessions() {
        info!(session = ?s, "tracked session");
    }

    signal::ctrl_c().await.context("failed to wait for Ctrl-C")?;
    manager.disconnect_session(&id).await?;
    Ok(())
}
