// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use iscsi_initiator_rs::{
    client::connection::{Connection, SharedDigests, read_pdu},
    error::IscsiError,
    models::{
        bhs::BasicHeaderSegment,
        opcode::Opcode,
        pdu::{DigestMode, IscsiPdu, encode_pdu_with_digests},
    },
};
use tokio::{io::AsyncWriteExt, net::TcpListener};

use crate::integration_tests::common::MOCK_HOST;

const SHORT: Duration = Duration::from_millis(100);

async fn wait_until_closed(conn: &Connection) -> bool {
    for _ in 0..50 {
        if !conn.is_connected() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

#[tokio::test]
async fn test_silent_target_times_out() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    // hold the socket open without ever answering
    let holder = tokio::spawn(async move {
        let (sock, _) = listener.accept().await?;
        tokio::time::sleep(Duration::from_secs(1)).await;
        drop(sock);
        anyhow::Ok(())
    });

    let conn = Connection::new();
    conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await?;
    assert!(conn.is_connected());
    assert!(matches!(
        conn.recv_raw(SHORT).await,
        Err(IscsiError::ConnectionTimeout)
    ));

    assert!(matches!(
        conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await,
        Err(IscsiError::AlreadyConnected)
    ));

    conn.disconnect().await;
    assert!(!conn.is_connected());
    assert!(matches!(
        conn.recv_raw(SHORT).await,
        Err(IscsiError::NotConnected)
    ));
    holder.abort();
    Ok(())
}

#[tokio::test]
async fn test_send_before_connect_is_rejected() {
    let conn = Connection::new();
    assert!(!conn.is_connected());
    assert!(matches!(
        conn.send(&[0u8; 48]).await,
        Err(IscsiError::NotConnected)
    ));
    assert!(matches!(
        conn.recv_raw(SHORT).await,
        Err(IscsiError::NotConnected)
    ));
    // disconnecting an idle connection is harmless
    conn.disconnect().await;
}

#[tokio::test]
async fn test_target_hangup_marks_connection_dead() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let closer = tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await?;
        sock.shutdown().await?;
        anyhow::Ok(())
    });

    let conn = Connection::new();
    conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await?;
    closer.await??;

    assert!(wait_until_closed(&conn).await, "receive loop kept running");
    assert!(matches!(
        conn.recv_raw(SHORT).await,
        Err(IscsiError::NotConnected)
    ));
    assert!(matches!(
        conn.send(&[0u8; 48]).await,
        Err(IscsiError::NotConnected)
    ));
    Ok(())
}

#[tokio::test]
async fn test_read_pdu_frames_ahs_padding_and_digests() -> Result<()> {
    let mut bhs = BasicHeaderSegment::new(Opcode::NopIn);
    bhs.initiator_task_tag = 0x55;
    let mut pdu = IscsiPdu::new(bhs, b"abcde".to_vec());
    pdu.ahs = vec![0x00, 0x02, 0x01, 0x00];
    pdu.bhs.total_ahs_length = 1;

    let wire = encode_pdu_with_digests(&pdu, DigestMode::BOTH)?;
    // BHS, AHS, header digest, 5 data bytes padded to 8, data digest
    assert_eq!(wire.len(), 48 + 4 + 4 + 8 + 4);

    let (mut client, mut server) = tokio::io::duplex(256);
    // two PDUs back to back: framing must not over-read the first
    let mut both = wire.clone();
    both.extend_from_slice(&wire);
    server.write_all(&both).await?;
    drop(server);

    let digests = SharedDigests::new(DigestMode::BOTH);
    for _ in 0..2 {
        let raw = read_pdu(&mut client, &digests).await?;
        assert_eq!(raw.wire_len(), wire.len());
        assert_eq!(raw.digests, DigestMode::BOTH);
        let back = raw.decode()?;
        assert_eq!(back.ahs, pdu.ahs);
        assert_eq!(back.data, b"abcde");
        assert_eq!(back.initiator_task_tag(), 0x55);
    }

    let eof = read_pdu(&mut client, &digests).await;
    assert!(matches!(eof, Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    Ok(())
}

#[tokio::test]
async fn test_corrupted_data_digest_is_caught_on_decode() -> Result<()> {
    let pdu = IscsiPdu::new(BasicHeaderSegment::new(Opcode::NopIn), b"hello".to_vec());
    let mut wire = encode_pdu_with_digests(&pdu, DigestMode::BOTH)?;
    let last = wire.len() - 1;
    wire[last] ^= 0xFF;

    let (mut client, mut server) = tokio::io::duplex(256);
    server.write_all(&wire).await?;

    let raw = read_pdu(&mut client, &SharedDigests::new(DigestMode::BOTH)).await?;
    assert!(matches!(
        raw.decode(),
        Err(IscsiError::DataDigestMismatch { .. })
    ));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reconnect_stays_alive() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let acceptor = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((sock, _)) = listener.accept().await {
            held.push(sock);
        }
    });

    let conn = Connection::new();
    for round in 0..50 {
        conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await?;
        conn.disconnect().await;
        conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await?;
        // give the previous receive task time to wind down
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(conn.is_connected(), "reconnect {round} reported dead");
        conn.send(&[]).await?;
        conn.disconnect().await;
    }
    acceptor.abort();
    Ok(())
}

#[tokio::test]
async fn test_disconnect_wakes_pending_receive() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let holder = tokio::spawn(async move {
        let (sock, _) = listener.accept().await?;
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(sock);
        anyhow::Ok(())
    });

    let conn = Arc::new(Connection::new());
    conn.connect(MOCK_HOST, port, Duration::from_secs(2)).await?;

    let waiter = {
        let conn = Arc::clone(&conn);
        tokio::spawn(async move { conn.recv_raw(Duration::from_secs(5)).await })
    };
    // let the receiver park on the channel
    tokio::time::sleep(Duration::from_millis(50)).await;
    conn.disconnect().await;

    let res = tokio::time::timeout(Duration::from_secs(1), waiter).await??;
    assert!(matches!(res, Err(IscsiError::NotConnected)));
    assert!(matches!(
        conn.send(&[0u8; 48]).await,
        Err(IscsiError::NotConnected)
    ));
    holder.abort();
    Ok(())
}
