// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_initiator_rs::{
    cfg::enums::Digest,
    client::session_manager::SessionManager,
    models::text::{common::RESERVED_TAG, discovery::Portal},
};

use crate::integration_tests::{
    common::{MOCK_HOST, load_config},
    mock_target::{MockOptions, MockTarget, SPLIT_TTT},
};

fn targets() -> Vec<(String, Vec<String>)> {
    vec![
        (
            "iqn.2025-08.example:disk0".into(),
            vec!["10.0.0.5:3260,1".into(), "[fe80::1]:3261,2".into()],
        ),
        ("iqn.2025-08.example:disk1".into(), vec!["10.0.0.6".into()]),
        ("iqn.2025-08.example:disk2".into(), vec![]),
    ]
}

fn portal(address: &str, port: u16, group_tag: u16) -> Portal {
    Portal {
        address: address.into(),
        port,
        group_tag,
    }
}

#[tokio::test]
async fn test_discovery_lists_targets_and_portals() -> Result<()> {
    let cfg = load_config()?;
    let target = MockTarget::start(MockOptions {
        targets: targets(),
        ..MockOptions::default()
    })
    .await?;
    let mgr = SessionManager::from_config(&cfg);

    let found = mgr.discover(&cfg, MOCK_HOST, target.port()).await?;
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].iqn, "iqn.2025-08.example:disk0");
    assert_eq!(
        found[0].portals,
        vec![portal("10.0.0.5", 3260, 1), portal("fe80::1", 3261, 2)]
    );
    assert_eq!(found[1].portals, vec![portal("10.0.0.6", 3260, 1)]);
    assert!(found[2].portals.is_empty());
    assert_eq!(mgr.session_count(), 0);

    let seen = target.finish().await?;
    let first = &seen.login_requests[0];
    assert_eq!(
        first.key_value_pairs.get("SessionType").map(String::as_str),
        Some("Discovery")
    );
    assert!(!first.key_value_pairs.contains_key("TargetName"));

    assert_eq!(seen.text_requests.len(), 1);
    let req = &seen.text_requests[0];
    assert_eq!(req.target_transfer_tag, RESERVED_TAG);
    assert_eq!(
        req.key_value_pairs.get("SendTargets").map(String::as_str),
        Some("All")
    );
    assert_ne!(req.initiator_task_tag, first.initiator_task_tag);
    Ok(())
}

#[tokio::test]
async fn test_split_send_targets_reply_is_reassembled() -> Result<()> {
    let cfg = load_config()?;
    let target = MockTarget::start(MockOptions {
        targets: targets(),
        split_text: true,
        ..MockOptions::default()
    })
    .await?;
    let mgr = SessionManager::from_config(&cfg);

    let found = mgr.discover(&cfg, MOCK_HOST, target.port()).await?;
    let iqns: Vec<&str> = found.iter().map(|t| t.iqn.as_str()).collect();
    assert_eq!(
        iqns,
        [
            "iqn.2025-08.example:disk0",
            "iqn.2025-08.example:disk1",
            "iqn.2025-08.example:disk2"
        ]
    );

    let seen = target.finish().await?;
    assert_eq!(seen.text_requests.len(), 2);
    let (first, second) = (&seen.text_requests[0], &seen.text_requests[1]);
    assert_eq!(first.target_transfer_tag, RESERVED_TAG);
    assert_eq!(second.target_transfer_tag, SPLIT_TTT);
    assert_eq!(second.initiator_task_tag, first.initiator_task_tag);
    assert!(second.key_value_pairs.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_discovery_with_digests() -> Result<()> {
    let mut cfg = load_config()?;
    cfg.login.negotiation.header_digest = Digest::CRC32C;
    cfg.login.negotiation.data_digest = Digest::CRC32C;
    let target = MockTarget::start(MockOptions {
        targets: targets(),
        digests: true,
        split_text: true,
        ..MockOptions::default()
    })
    .await?;
    let mgr = SessionManager::from_config(&cfg);

    let found = mgr.discover(&cfg, MOCK_HOST, target.port()).await?;
    assert_eq!(found.len(), 3);
    assert_eq!(found[0].portals.len(), 2);

    let seen = target.finish().await?;
    assert_eq!(seen.text_requests.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_discovery_with_no_targets() -> Result<()> {
    let cfg = load_config()?;
    let target = MockTarget::start(MockOptions::default()).await?;
    let mgr = SessionManager::from_config(&cfg);

    let found = mgr.discover(&cfg, MOCK_HOST, target.port()).await?;
    assert!(found.is_empty());
    target.finish().await?;
    Ok(())
}
