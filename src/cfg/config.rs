// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};

use crate::cfg::enums::{Digest, SessionType, YesNo};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Parameters that travel over the wire during Login.
    pub login: LoginConfig,
    /// Implementation/runtime parameters that live outside the iSCSI protocol.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct LoginConfig {
    /// Session identity (SessionType, Initiator, Target).
    pub identity: Identity,
    /// Authentication strategy (AuthMethod / CHAP).
    #[serde(default)]
    pub auth: AuthConfig,
    /// The initiator's operational offer.
    #[serde(default)]
    pub negotiation: Negotiation,
}

/// Identity parameters reported during Login.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Identity {
    #[serde(default, rename = "SessionType")]
    pub session_type: SessionType,

    #[serde(rename = "InitiatorName")]
    /// Initiator IQN (mandatory).
    pub initiator_name: String,

    #[serde(default, rename = "InitiatorAlias")]
    pub initiator_alias: String,

    #[serde(default, rename = "TargetName")]
    /// Required for Normal sessions; ignored during Discovery.
    pub target_name: String,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
#[serde(tag = "AuthMethod")]
pub enum AuthConfig {
    #[default]
    #[serde(rename = "None")]
    None,
    /// Kept as configuration only; the login flow always offers
    /// `AuthMethod=None`.
    #[serde(rename = "CHAP")]
    Chap(ChapConfig),
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ChapConfig {
    /// Username advertised via CHAP_N.
    pub username: String,
    /// Shared secret used to generate CHAP_R.
    pub secret: String,
}

fn default_max_recv_data_segment_length() -> u32 {
    262_144
}
fn default_max_burst_length() -> u32 {
    262_144
}
fn default_first_burst_length() -> u32 {
    65_536
}
fn default_time2wait() -> u32 {
    2
}
fn default_time2retain() -> u32 {
    20
}
fn default_max_outstanding_r2t() -> u32 {
    1
}
fn yes() -> YesNo {
    YesNo::Yes
}

/// Operational keys offered in the Operational stage. Every field falls
/// back to the fixed initiator default when absent from the YAML.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Negotiation {
    #[serde(default, rename = "HeaderDigest")]
    pub header_digest: Digest,
    #[serde(default, rename = "DataDigest")]
    pub data_digest: Digest,
    #[serde(
        default = "default_max_recv_data_segment_length",
        rename = "MaxRecvDataSegmentLength"
    )]
    pub max_recv_data_segment_length: u32,
    #[serde(default = "default_max_burst_length", rename = "MaxBurstLength")]
    pub max_burst_length: u32,
    #[serde(default = "default_first_burst_length", rename = "FirstBurstLength")]
    pub first_burst_length: u32,
    #[serde(default = "default_time2wait", rename = "DefaultTime2Wait")]
    pub default_time2wait: u32,
    #[serde(default = "default_time2retain", rename = "DefaultTime2Retain")]
    pub default_time2retain: u32,
    #[serde(default = "default_max_outstanding_r2t", rename = "MaxOutstandingR2T")]
    pub max_outstanding_r2t: u32,
    #[serde(default, rename = "ErrorRecoveryLevel")]
    pub error_recovery_level: u32,
    #[serde(default = "yes", rename = "InitialR2T")]
    pub initial_r2t: YesNo,
    #[serde(default = "yes", rename = "ImmediateData")]
    pub immediate_data: YesNo,
    #[serde(default = "yes", rename = "DataPDUInOrder")]
    pub data_pdu_in_order: YesNo,
    #[serde(default = "yes", rename = "DataSequenceInOrder")]
    pub data_sequence_in_order: YesNo,
}

impl Default for Negotiation {
    fn default() -> Self {
        Self {
            header_digest: Digest::None,
            data_digest: Digest::None,
            max_recv_data_segment_length: default_max_recv_data_segment_length(),
            max_burst_length: default_max_burst_length(),
            first_burst_length: default_first_burst_length(),
            default_time2wait: default_time2wait(),
            default_time2retain: default_time2retain(),
            max_outstanding_r2t: default_max_outstanding_r2t(),
            error_recovery_level: 0,
            initial_r2t: YesNo::Yes,
            immediate_data: YesNo::Yes,
            data_pdu_in_order: YesNo::Yes,
            data_sequence_in_order: YesNo::Yes,
        }
    }
}

impl Negotiation {
    /// The eleven merge-ruled operational keys as wire strings.
    pub fn operational_parameters(&self) -> HashMap<String, String> {
        [
            (
                "MaxRecvDataSegmentLength",
                self.max_recv_data_segment_length.to_string(),
            ),
            ("MaxBurstLength", self.max_burst_length.to_string()),
            ("FirstBurstLength", self.first_burst_length.to_string()),
            ("DefaultTime2Wait", self.default_time2wait.to_string()),
            ("DefaultTime2Retain", self.default_time2retain.to_string()),
            ("MaxOutstandingR2T", self.max_outstanding_r2t.to_string()),
            ("ErrorRecoveryLevel", self.error_recovery_level.to_string()),
            ("InitialR2T", self.initial_r2t.to_string()),
            ("ImmediateData", self.immediate_data.to_string()),
            ("DataPDUInOrder", self.data_pdu_in_order.to_string()),
            ("DataSequenceInOrder", self.data_sequence_in_order.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
    }

    /// What goes into the Operational-stage Login Request: the merge-ruled
    /// keys plus the digest preferences.
    pub fn login_offer(&self) -> HashMap<String, String> {
        let mut m = self.operational_parameters();
        m.insert("HeaderDigest".into(), self.header_digest.to_string());
        m.insert("DataDigest".into(), self.data_digest.to_string());
        m
    }
}

fn default_target_port() -> u16 {
    3260
}
fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_max_sessions() -> u32 {
    16
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct RuntimeConfig {
    #[serde(default, rename = "TargetAddress")]
    /// Host name or IP of the portal used by the bootstrap binary.
    pub target_address: String,

    #[serde(default = "default_target_port", rename = "TargetPort")]
    pub target_port: u16,

    #[serde(default = "default_timeout", rename = "ConnectTimeout", with = "serde_secs")]
    /// Timeout for establishing the TCP connection.
    pub connect_timeout: Duration,

    #[serde(default = "default_timeout", rename = "LoginTimeout", with = "serde_secs")]
    /// Upper bound for waiting on any single login / text response.
    pub login_timeout: Duration,

    #[serde(default = "default_max_sessions", rename = "MaxSessions")]
    /// Limit on the number of simultaneously tracked sessions.
    pub max_sessions: u32,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            target_address: String::new(),
            target_port: default_target_port(),
            connect_timeout: default_timeout(),
            login_timeout: default_timeout(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {path:?}"))?;
        Self::from_yaml(&s)
    }

    pub fn from_yaml(s: &str) -> Result<Self> {
        let mut cfg: Config =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        let n = &mut self.login.negotiation;

        // Discovery sessions always run at ERL=0.
        if self.login.identity.session_type.is_discovery() {
            n.error_recovery_level = 0;
        }

        ensure!(
            !self.login.identity.initiator_name.is_empty(),
            "InitiatorName must not be empty"
        );
        if self.login.identity.session_type == SessionType::Normal {
            ensure!(
                !self.login.identity.target_name.is_empty(),
                "TargetName is required for Normal session"
            );
        }

        ensure!(
            (512..=0x00FF_FFFF).contains(&n.max_recv_data_segment_length),
            "MaxRecvDataSegmentLength must be in 512..=16777215"
        );
        ensure!(
            n.first_burst_length <= n.max_burst_length,
            "FirstBurstLength must not exceed MaxBurstLength"
        );
        ensure!(n.error_recovery_level <= 2, "ErrorRecoveryLevel must be 0..=2");
        ensure!(n.max_outstanding_r2t >= 1, "MaxOutstandingR2T must be >= 1");

        ensure!(self.runtime.max_sessions >= 1, "MaxSessions must be >= 1");
        ensure!(
            !self.runtime.connect_timeout.is_zero(),
            "ConnectTimeout must be > 0"
        );
        ensure!(!self.runtime.login_timeout.is_zero(), "LoginTimeout must be > 0");

        Ok(())
    }
}

/// Resolves `rel` against the working directory and canonicalizes it.
pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    abs.canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))
}

/// Serde helpers for representing `Duration` as a number of seconds.
mod serde_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
