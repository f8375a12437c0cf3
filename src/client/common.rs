// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{IscsiError, IscsiResult},
    models::pdu::{DigestMode, IscsiPdu, parse_pdu_with_digests},
};

/// Runs an I/O future under a deadline and a cancellation token, mapping
/// the outcome onto the connection error variants.
pub(super) async fn io_with_timeout<F, T>(
    label: &'static str,
    fut: F,
    io_timeout: Duration,
    cancel: &CancellationToken,
) -> IscsiResult<T>
where
    F: Future<Output = std::io::Result<T>>,
{
    tokio::select! {
        _ = cancel.cancelled() => {
            debug!(label, "cancelled");
            Err(IscsiError::NotConnected)
        },
        res = timeout(io_timeout, fut) => {
            match res {
                Ok(Ok(v)) => Ok(v),
                Ok(Err(e)) => Err(IscsiError::ConnectionFailed(e)),
                Err(_) => {
                    debug!(label, ?io_timeout, "timed out");
                    Err(IscsiError::ConnectionTimeout)
                },
            }
        }
    }
}

/// Represents a raw, unparsed iSCSI PDU as framed off the socket.
///
/// `header` is exactly the 48-byte BHS; `payload` holds everything that
/// followed it for this PDU (AHS, header digest, padded data, data digest).
/// `digests` is the mode that was in force when the PDU was framed.
#[derive(Debug, Clone)]
pub struct RawPdu {
    pub header: Bytes,
    pub payload: Bytes,
    pub digests: DigestMode,
}

impl RawPdu {
    /// Total number of bytes this PDU occupied on the wire.
    pub fn wire_len(&self) -> usize {
        self.header.len() + self.payload.len()
    }

    /// Decodes the framed bytes, verifying digests when enabled.
    pub fn decode(&self) -> IscsiResult<IscsiPdu> {
        let mut buf = BytesMut::with_capacity(self.wire_len());
        buf.extend_from_slice(&self.header);
        buf.extend_from_slice(&self.payload);
        parse_pdu_with_digests(&buf, self.digests)
    }
}
