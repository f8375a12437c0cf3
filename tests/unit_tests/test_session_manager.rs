// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashSet, sync::Arc};

use anyhow::Result;
use iscsi_initiator_rs::{
    cfg::config::Config, client::session_manager::SessionManager, error::IscsiError,
};

#[test]
fn test_isids_are_distinct_with_zero_type_byte() {
    let mgr = SessionManager::new(16);
    let isids: Vec<[u8; 6]> = (0..64).map(|_| mgr.generate_isid()).collect();

    assert!(isids.iter().all(|i| i[0] == 0x00));
    let unique: HashSet<_> = isids.iter().collect();
    assert_eq!(unique.len(), isids.len());
}

#[test]
fn test_isids_distinct_across_threads() -> Result<()> {
    let mgr = Arc::new(SessionManager::new(16));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let m = Arc::clone(&mgr);
            std::thread::spawn(move || (0..100).map(|_| m.generate_isid()).collect::<Vec<_>>())
        })
        .collect();

    let mut all = HashSet::new();
    for h in handles {
        for isid in h.join().map_err(|_| anyhow::anyhow!("thread panicked"))? {
            assert!(all.insert(isid), "duplicate ISID {isid:02x?}");
        }
    }
    assert_eq!(all.len(), 400);
    Ok(())
}

#[test]
fn test_track_list_get_remove() {
    let mgr = SessionManager::new(16);
    let a = mgr.track_session("iqn.2025-08.example:a", "10.0.0.1:3260");
    let b = mgr.track_session("iqn.2025-08.example:b", "10.0.0.2:3260");
    assert_ne!(a, b);
    assert_eq!(mgr.session_count(), 2);

    let info = mgr.get_session(&a).expect("tracked");
    assert_eq!(info.id, a);
    assert_eq!(info.target_iqn, "iqn.2025-08.example:a");
    assert_eq!(info.portal, "10.0.0.1:3260");
    assert!(info.parameters.is_empty());
    assert!(mgr.connection(&a).is_none());

    let mut iqns: Vec<String> = mgr.list_sessions().into_iter().map(|s| s.target_iqn).collect();
    iqns.sort();
    assert_eq!(iqns, vec!["iqn.2025-08.example:a", "iqn.2025-08.example:b"]);

    mgr.remove_session(&a);
    assert!(mgr.get_session(&a).is_none());
    assert_eq!(mgr.session_count(), 1);

    // unknown ids are ignored
    mgr.remove_session("no-such-session");
    assert_eq!(mgr.session_count(), 1);
}

#[test]
fn test_session_info_serializes() -> Result<()> {
    let mgr = SessionManager::new(4);
    let id = mgr.track_session("iqn.2025-08.example:a", "10.0.0.1:3260");
    let info = mgr.get_session(&id).expect("tracked");
    let v = serde_json::to_value(&info)?;
    assert_eq!(v["id"], id);
    assert_eq!(v["target_iqn"], "iqn.2025-08.example:a");
    assert!(v["connected_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn test_disconnect_unknown_session() {
    let mgr = SessionManager::new(4);
    let err = mgr
        .disconnect_session("missing")
        .await
        .expect_err("unknown session");
    assert!(matches!(
        err.downcast_ref::<IscsiError>(),
        Some(IscsiError::SessionNotFound(id)) if id == "missing"
    ));
}

#[tokio::test]
async fn test_session_limit_is_enforced_before_connecting() -> Result<()> {
    let cfg = Config::load_from_file("tests/config.yaml")?;
    let mgr = SessionManager::new(1);
    mgr.track_session("iqn.2025-08.example:a", "10.0.0.1:3260");

    // port 9 is never dialled: the limit check comes first
    let err = mgr
        .login(&cfg, "127.0.0.1", 9, "iqn.2025-08.example:b")
        .await
        .expect_err("limit reached");
    assert!(matches!(
        err.downcast_ref::<IscsiError>(),
        Some(IscsiError::InvalidState(_))
    ));
    assert_eq!(mgr.session_count(), 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_forgets_everything() {
    let mgr = SessionManager::new(4);
    mgr.track_session("iqn.a", "h:1");
    mgr.track_session("iqn.b", "h:2");
    mgr.shutdown().await;
    assert_eq!(mgr.session_count(), 0);
}
