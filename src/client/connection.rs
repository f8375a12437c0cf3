// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! One TCP connection to a target portal.
//!
//! The socket is split on connect: the write half sits behind an async
//! mutex, the read half is moved into a receive task that frames PDUs off
//! the stream and publishes them on a channel. `recv_pdu` waits on that
//! channel with a single timeout.

use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
    time::Duration,
};

use bytes::BytesMut;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{
        TcpStream,
        tcp::{OwnedReadHalf, OwnedWriteHalf},
    },
    sync::{Mutex, mpsc},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    client::common::{RawPdu, io_with_timeout},
    error::{IscsiError, IscsiResult},
    models::{
        bhs::{BHS_LEN, parse_bhs},
        pdu::{DigestMode, IscsiPdu, body_len, encode_pdu_with_digests},
    },
};

/// Depth of the channel between the receive task and `recv_pdu`.
const RX_QUEUE_DEPTH: usize = 64;
/// Upper bound for a single `write_all` on the socket.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

const HEADER_BIT: u8 = 0b01;
const DATA_BIT: u8 = 0b10;

/// Digest mode shared between the sender and the receive task. The
/// receive task samples it once per PDU, right after the BHS arrives.
#[derive(Debug, Clone, Default)]
pub struct SharedDigests(Arc<AtomicU8>);

impl SharedDigests {
    pub fn new(mode: DigestMode) -> Self {
        let cell = Self::default();
        cell.set(mode);
        cell
    }

    pub fn get(&self) -> DigestMode {
        let bits = self.0.load(Ordering::Acquire);
        DigestMode {
            header: bits & HEADER_BIT != 0,
            data: bits & DATA_BIT != 0,
        }
    }

    pub fn set(&self, mode: DigestMode) {
        let mut bits = 0;
        if mode.header {
            bits |= HEADER_BIT;
        }
        if mode.data {
            bits |= DATA_BIT;
        }
        self.0.store(bits, Ordering::Release);
    }
}

/// Socket generation in the high bits, liveness in bit 0. A receive task
/// may only clear liveness for the generation it was started with, so a
/// late exit of an old task cannot mark a newer socket dead.
#[derive(Debug, Default)]
struct LinkState(AtomicU64);

impl LinkState {
    /// Marks a new socket live and returns its generation. Callers
    /// serialize `open` among themselves.
    fn open(&self) -> u64 {
        let generation = (self.0.load(Ordering::Acquire) >> 1).wrapping_add(1);
        self.0.store((generation << 1) | 1, Ordering::Release);
        generation
    }

    fn close_generation(&self, generation: u64) {
        let _ = self.0.compare_exchange(
            (generation << 1) | 1,
            generation << 1,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn close(&self) {
        self.0.fetch_and(!1, Ordering::AcqRel);
    }

    fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire) & 1 == 1
    }
}

/// Reads exactly one PDU: the 48-byte BHS, then everything its length
/// fields and the current digest mode say follows it.
pub async fn read_pdu<R>(r: &mut R, digests: &SharedDigests) -> io::Result<RawPdu>
where
    R: AsyncRead + Unpin,
{
    let mut header = BytesMut::zeroed(BHS_LEN);
    r.read_exact(&mut header).await?;
    let bhs =
        parse_bhs(&header).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let mode = digests.get();
    let mut payload = BytesMut::zeroed(body_len(&bhs, mode));
    r.read_exact(&mut payload).await?;

    Ok(RawPdu {
        header: header.freeze(),
        payload: payload.freeze(),
        digests: mode,
    })
}

async fn receive_loop(
    mut reader: OwnedReadHalf,
    tx: mpsc::Sender<RawPdu>,
    digests: SharedDigests,
    link: Arc<LinkState>,
    generation: u64,
    cancel: CancellationToken,
) {
    loop {
        let res = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("receive loop cancelled");
                break;
            },
            r = read_pdu(&mut reader, &digests) => r,
        };
        match res {
            Ok(raw) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(raw) => if sent.is_err() {
                        debug!("receiver dropped, stopping receive loop");
                        break;
                    },
                }
            },
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                info!("target closed the connection");
                break;
            },
            Err(e) => {
                warn!(error = %e, "receive loop failed");
                break;
            },
        }
    }
    link.close_generation(generation);
}

/// A framed iSCSI connection. All methods take `&self`; share it behind an
/// `Arc`.
#[derive(Debug)]
pub struct Connection {
    writer: Mutex<Option<OwnedWriteHalf>>,
    rx: Mutex<Option<mpsc::Receiver<RawPdu>>>,
    cancel: Mutex<Option<CancellationToken>>,
    link: Arc<LinkState>,
    digests: SharedDigests,
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection {
    pub fn new() -> Self {
        Self {
            writer: Mutex::new(None),
            rx: Mutex::new(None),
            cancel: Mutex::new(None),
            link: Arc::new(LinkState::default()),
            digests: SharedDigests::new(DigestMode::NONE),
        }
    }

    /// Opens the TCP connection and starts the receive task.
    ///
    /// A connection whose receive task has ended (target hung up, read
    /// error) may be connected again.
    pub async fn connect(
        &self,
        host: &str,
        port: u16,
        connect_timeout: Duration,
    ) -> IscsiResult<()> {
        let mut cancel_slot = self.cancel.lock().await;
        if self.is_connected() {
            return Err(IscsiError::AlreadyConnected);
        }
        if let Some(old) = cancel_slot.take() {
            old.cancel();
        }

        let cancel = CancellationToken::new();
        let stream = io_with_timeout(
            "connect",
            TcpStream::connect((host, port)),
            connect_timeout,
            &cancel,
        )
        .await?;
        stream.set_nodelay(true).map_err(IscsiError::ConnectionFailed)?;
        let peer = stream.peer_addr().ok();
        let (reader, writer) = stream.into_split();

        let (tx, rx) = mpsc::channel(RX_QUEUE_DEPTH);
        self.digests.set(DigestMode::NONE);
        *self.writer.lock().await = Some(writer);
        *self.rx.lock().await = Some(rx);
        let generation = self.link.open();

        tokio::spawn(receive_loop(
            reader,
            tx,
            self.digests.clone(),
            Arc::clone(&self.link),
            generation,
            cancel.clone(),
        ));
        *cancel_slot = Some(cancel);

        info!(host, port, ?peer, "connected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_open()
    }

    /// Turns CRC32C digests on or off for both directions.
    pub fn set_digests(&self, mode: DigestMode) {
        debug!(header = mode.header, data = mode.data, "digest mode changed");
        self.digests.set(mode);
    }

    pub fn digests(&self) -> DigestMode {
        self.digests.get()
    }

    /// Writes already-encoded bytes to the socket.
    pub async fn send(&self, bytes: &[u8]) -> IscsiResult<()> {
        if !self.is_connected() {
            return Err(IscsiError::NotConnected);
        }
        let cancel = self.cancel.lock().await.clone().unwrap_or_default();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(IscsiError::NotConnected)?;
        io_with_timeout("send", writer.write_all(bytes), SEND_TIMEOUT, &cancel).await
    }

    /// Encodes `pdu` with the current digest mode and sends it.
    pub async fn send_pdu(&self, pdu: &IscsiPdu) -> IscsiResult<()> {
        let bytes = encode_pdu_with_digests(pdu, self.digests.get())?;
        self.send(&bytes).await
    }

    /// Waits for the next framed PDU.
    pub async fn recv_raw(&self, wait: Duration) -> IscsiResult<RawPdu> {
        let mut guard = self.rx.lock().await;
        let rx = guard.as_mut().ok_or(IscsiError::NotConnected)?;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(Some(raw)) => Ok(raw),
            Ok(None) => Err(IscsiError::NotConnected),
            Err(_) => Err(IscsiError::ConnectionTimeout),
        }
    }

    /// Waits for the next PDU and decodes it, checking digests.
    pub async fn recv_pdu(&self, wait: Duration) -> IscsiResult<IscsiPdu> {
        self.recv_raw(wait).await?.decode()
    }

    /// Stops the receive task and closes the socket. Safe to call more than
    /// once.
    pub async fn disconnect(&self) {
        if let Some(cancel) = self.cancel.lock().await.take() {
            cancel.cancel();
        }
        self.link.close();
        let shutdown = match self.writer.lock().await.take() {
            Some(mut w) => w.shutdown().await,
            None => Ok(()),
        };
        if let Err(e) = shutdown {
            debug!(error = %e, "socket shutdown failed");
        }
        *self.rx.lock().await = None;
        info!("disconnected");
    }
}
