// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Login phase bookkeeping for one connection.
//!
//! The machine builds Login Requests and folds Login Responses into its
//! state: sequence numbers, TSIH, the running key/value map and the stage.
//! It does no I/O; `client::login` drives it over a connection.
//!
//! ```text
//! Free ─build─▶ SecurityNegotiation ─T,NSG=1─▶ OperationalNegotiation
//!                      │                              │
//!                      └────────────T,NSG=3───────────┴─▶ FullFeaturePhase
//! any stage ── class≠0 / NSG=2 / backwards ──▶ Failed(reason)
//! ```

use std::{collections::HashMap, fmt};

use tracing::{debug, info, warn};

use crate::{
    error::{IscsiError, IscsiResult},
    models::login::{
        common::Stage, request::LoginRequest, response::LoginResponse, status::LoginStatus,
    },
};

/// 0xFFFFFFFF is reserved and never handed out.
pub const RESERVED_TASK_TAG: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginState {
    Free,
    SecurityNegotiation,
    OperationalNegotiation,
    FullFeaturePhase,
    Failed(String),
}

impl LoginState {
    fn rank(&self) -> u8 {
        match self {
            LoginState::Free => 0,
            LoginState::SecurityNegotiation => 1,
            LoginState::OperationalNegotiation => 2,
            LoginState::FullFeaturePhase | LoginState::Failed(_) => 3,
        }
    }

    /// Stage code as it would appear in CSG.
    pub fn stage_code(&self) -> u8 {
        match self {
            LoginState::Free | LoginState::SecurityNegotiation => 0,
            LoginState::OperationalNegotiation => 1,
            LoginState::FullFeaturePhase | LoginState::Failed(_) => 3,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, LoginState::Failed(_))
    }
}

impl From<Stage> for LoginState {
    fn from(s: Stage) -> Self {
        match s {
            Stage::Security => LoginState::SecurityNegotiation,
            Stage::Operational => LoginState::OperationalNegotiation,
            Stage::FullFeature => LoginState::FullFeaturePhase,
        }
    }
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoginState::Free => f.write_str("Free"),
            LoginState::SecurityNegotiation => f.write_str("SecurityNegotiation"),
            LoginState::OperationalNegotiation => f.write_str("OperationalNegotiation"),
            LoginState::FullFeaturePhase => f.write_str("FullFeaturePhase"),
            LoginState::Failed(r) => write!(f, "Failed({r})"),
        }
    }
}

/// What the Security-stage request asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginTarget {
    /// Normal session with the named target.
    Normal(String),
    /// Discovery session (no TargetName).
    Discovery,
}

#[derive(Debug, Clone)]
pub struct LoginStateMachine {
    state: LoginState,
    isid: [u8; 6],
    cid: u16,
    tsih: u16,
    itt: u32,
    login_itt: u32,
    cmd_sn: u32,
    exp_stat_sn: u32,
    initiator_alias: Option<String>,
    negotiated: HashMap<String, String>,
}

impl LoginStateMachine {
    pub fn new(isid: [u8; 6]) -> Self {
        Self {
            state: LoginState::Free,
            isid,
            cid: 0,
            tsih: 0,
            itt: 0,
            login_itt: 0,
            cmd_sn: 0,
            exp_stat_sn: 0,
            initiator_alias: None,
            negotiated: HashMap::new(),
        }
    }

    /// `InitiatorAlias` sent with the first Security request. Empty clears
    /// it.
    pub fn set_initiator_alias(&mut self, alias: &str) {
        self.initiator_alias = (!alias.is_empty()).then(|| alias.to_owned());
    }

    fn ensure_not_failed(&self, op: &str) -> IscsiResult<()> {
        if let LoginState::Failed(reason) = &self.state {
            return Err(IscsiError::InvalidState(format!(
                "{op} on failed login ({reason})"
            )));
        }
        Ok(())
    }

    fn ensure_logging_in(&self, op: &str) -> IscsiResult<()> {
        self.ensure_not_failed(op)?;
        if self.state == LoginState::FullFeaturePhase {
            return Err(IscsiError::InvalidState(format!(
                "{op} after login completed"
            )));
        }
        Ok(())
    }

    fn fail(&mut self, reason: String) {
        warn!(isid = %hex::encode(self.isid), %reason, "login failed");
        self.state = LoginState::Failed(reason);
    }

    /// Next initiator task tag, strictly increasing from 1.
    pub fn generate_itt(&mut self) -> IscsiResult<u32> {
        self.ensure_not_failed("generate_itt")?;
        if self.itt >= RESERVED_TASK_TAG - 1 {
            return Err(IscsiError::TaskTagExhausted);
        }
        self.itt += 1;
        Ok(self.itt)
    }

    /// Security-stage request for a Normal session, as the minimal login
    /// would send it.
    pub fn build_initial_login_pdu(
        &mut self,
        initiator_name: &str,
    ) -> IscsiResult<LoginRequest> {
        let mut req = self.start_login(initiator_name)?;
        req.key_value_pairs.insert("SessionType".into(), "Normal".into());
        Ok(req)
    }

    /// Security-stage request carrying `TargetName` for a Normal session or
    /// `SessionType=Discovery`.
    pub fn build_login_pdu(
        &mut self,
        initiator_name: &str,
        target: &LoginTarget,
    ) -> IscsiResult<LoginRequest> {
        let mut req = self.start_login(initiator_name)?;
        let kv = &mut req.key_value_pairs;
        match target {
            LoginTarget::Normal(iqn) => {
                kv.insert("SessionType".into(), "Normal".into());
                kv.insert("TargetName".into(), iqn.clone());
            },
            LoginTarget::Discovery => {
                kv.insert("SessionType".into(), "Discovery".into());
            },
        }
        Ok(req)
    }

    fn start_login(&mut self, initiator_name: &str) -> IscsiResult<LoginRequest> {
        self.ensure_logging_in("build_login_pdu")?;
        if self.state != LoginState::Free {
            return Err(IscsiError::InvalidState(format!(
                "login already started ({})",
                self.state
            )));
        }
        let itt = self.generate_itt()?;
        self.login_itt = itt;

        let mut req = self.request(Stage::Security, Stage::Operational, true);
        req.tsih = 0;
        req.key_value_pairs = HashMap::from([
            ("InitiatorName".to_owned(), initiator_name.to_owned()),
            ("AuthMethod".to_owned(), "None".to_owned()),
        ]);
        if let Some(alias) = &self.initiator_alias {
            req.key_value_pairs
                .insert("InitiatorAlias".to_owned(), alias.clone());
        }

        self.state = LoginState::SecurityNegotiation;
        debug!(itt, isid = %hex::encode(self.isid), "login started");
        Ok(req)
    }

    /// Operational-stage request asking to move to Full Feature Phase.
    pub fn build_operational_login_pdu(
        &mut self,
        params: &HashMap<String, String>,
    ) -> IscsiResult<LoginRequest> {
        self.ensure_logging_in("build_operational_login_pdu")?;
        if self.state != LoginState::OperationalNegotiation {
            return Err(IscsiError::InvalidState(format!(
                "operational request in {}",
                self.state
            )));
        }
        let mut req = self.request(Stage::Operational, Stage::FullFeature, true);
        req.key_value_pairs = params.clone();
        Ok(req)
    }

    /// Empty request in the current stage, used to pull the remainder of a
    /// response that had the Continue bit set.
    pub fn build_continue_login_pdu(&mut self) -> IscsiResult<LoginRequest> {
        self.ensure_logging_in("build_continue_login_pdu")?;
        let stage = match self.state {
            LoginState::SecurityNegotiation => Stage::Security,
            LoginState::OperationalNegotiation => Stage::Operational,
            _ => {
                return Err(IscsiError::InvalidState(format!(
                    "continue request in {}",
                    self.state
                )));
            },
        };
        Ok(self.request(stage, stage, false))
    }

    fn request(&self, csg: Stage, nsg: Stage, transit: bool) -> LoginRequest {
        let mut req = LoginRequest {
            transit,
            isid: self.isid,
            tsih: self.tsih,
            initiator_task_tag: self.login_itt,
            cid: self.cid,
            cmd_sn: self.cmd_sn,
            exp_stat_sn: self.exp_stat_sn,
            ..LoginRequest::default()
        };
        req.set_stages(csg, nsg);
        req
    }

    /// Folds a Login Response into the machine.
    pub fn process_login_response(&mut self, resp: &LoginResponse) -> IscsiResult<()> {
        self.ensure_logging_in("process_login_response")?;

        let status: LoginStatus = resp.status();
        if !status.is_success() {
            let err = IscsiError::LoginFailed {
                status_class: resp.status_class,
                status_detail: resp.status_detail,
            };
            self.fail(format!("{status}"));
            return Err(err);
        }

        self.exp_stat_sn = resp.stat_sn.wrapping_add(1);
        self.cmd_sn = resp.exp_cmd_sn;
        if resp.tsih != 0 {
            self.tsih = resp.tsih;
        }
        for (k, v) in &resp.key_value_pairs {
            self.negotiated.insert(k.clone(), v.clone());
        }

        if !resp.transit {
            return Ok(());
        }

        let current = self.state.stage_code();
        let next = match Stage::try_from(resp.nsg) {
            Ok(s) => LoginState::from(s),
            Err(_) => {
                self.fail(format!("reserved next stage {}", resp.nsg));
                return Err(IscsiError::InvalidLoginStage {
                    current,
                    next: resp.nsg,
                });
            },
        };
        if next.rank() < self.state.rank() {
            self.fail(format!("backwards transition {} -> {next}", self.state));
            return Err(IscsiError::InvalidLoginStage {
                current,
                next: resp.nsg,
            });
        }

        if next != self.state {
            info!(from = %self.state, to = %next, tsih = self.tsih, "login stage change");
            self.state = next;
        }
        Ok(())
    }

    /// Sequence bookkeeping for responses received in Full Feature Phase.
    pub fn record_full_feature_status(
        &mut self,
        stat_sn: u32,
        exp_cmd_sn: u32,
    ) -> IscsiResult<()> {
        self.ensure_not_failed("record_full_feature_status")?;
        if self.state != LoginState::FullFeaturePhase {
            return Err(IscsiError::InvalidState(format!(
                "full feature status in {}",
                self.state
            )));
        }
        self.exp_stat_sn = stat_sn.wrapping_add(1);
        self.cmd_sn = exp_cmd_sn;
        Ok(())
    }

    pub fn current_state(&self) -> &LoginState {
        &self.state
    }

    pub fn isid(&self) -> [u8; 6] {
        self.isid
    }

    pub fn tsih(&self) -> u16 {
        self.tsih
    }

    pub fn cmd_sn(&self) -> u32 {
        self.cmd_sn
    }

    pub fn exp_stat_sn(&self) -> u32 {
        self.exp_stat_sn
    }

    /// ITT shared by every request of this login.
    pub fn login_itt(&self) -> u32 {
        self.login_itt
    }

    pub fn negotiated_parameter(&self, key: &str) -> Option<&str> {
        self.negotiated.get(key).map(String::as_str)
    }

    pub fn negotiated_parameters(&self) -> &HashMap<String, String> {
        &self.negotiated
    }
}
