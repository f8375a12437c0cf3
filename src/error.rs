// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Typed error taxonomy shared by the codec, the login state machine and the
//! connection layer.
//!
//! Low layers return [`IscsiError`] directly. Orchestration code wraps it in
//! `anyhow::Error` with context; callers that need to branch on the failure
//! class recover it with `err.downcast_ref::<IscsiError>()`.

use thiserror::Error;

use crate::bridge::ring_buffer::RingBufferError;

/// Every failure the initiator core can report.
#[derive(Debug, Error)]
pub enum IscsiError {
    // --- framing / codec ---
    /// Fewer bytes were available than the structure requires.
    #[error("insufficient data: need {needed} bytes, have {available}")]
    InsufficientData { needed: usize, available: usize },
    /// A structural invariant was violated while encoding or decoding.
    #[error("malformed PDU: {0}")]
    MalformedPdu(String),
    #[error("invalid opcode: 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("header digest mismatch: got {got:#010x}, want {want:#010x}")]
    HeaderDigestMismatch { got: u32, want: u32 },
    #[error("data digest mismatch: got {got:#010x}, want {want:#010x}")]
    DataDigestMismatch { got: u32, want: u32 },

    // --- protocol semantics ---
    #[error("login failed: class={status_class} detail={status_detail}")]
    LoginFailed { status_class: u8, status_detail: u8 },
    #[error("invalid login stage transition: {current} -> {next}")]
    InvalidLoginStage { current: u8, next: u8 },
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
    #[error("invalid state for operation: {0}")]
    InvalidState(String),
    /// The per-connection task tag space is used up (0xFFFFFFFF is reserved).
    #[error("initiator task tag space exhausted")]
    TaskTagExhausted,

    // --- connection ---
    #[error("not connected to target")]
    NotConnected,
    #[error("already connected")]
    AlreadyConnected,
    #[error("connection timeout")]
    ConnectionTimeout,
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    // --- resources ---
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("target not found: {0}")]
    TargetNotFound(String),
    #[error("session already exists: {0}")]
    SessionAlreadyExists(String),
    /// A shared-memory queue of the driver bridge refused the operation.
    #[error(transparent)]
    Queue(#[from] RingBufferError),

    // --- security ---
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("credential store error: {0}")]
    Credential(String),
}

impl IscsiError {
    /// Framing/byte-level failures, as opposed to handshake semantics.
    pub fn is_codec(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. }
                | Self::MalformedPdu(_)
                | Self::InvalidOpcode(_)
                | Self::HeaderDigestMismatch { .. }
                | Self::DataDigestMismatch { .. }
        )
    }

    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::AlreadyConnected
                | Self::ConnectionTimeout
                | Self::ConnectionFailed(_)
        )
    }
}

/// Shorthand used by the codec and state machine layers.
pub type IscsiResult<T> = Result<T, IscsiError>;
