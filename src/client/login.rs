// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, time::Duration};

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::{
    cfg::{config::Negotiation, enums::Digest},
    client::connection::Connection,
    error::IscsiError,
    models::{
        login::{
            request::{LoginRequest, encode_login_request},
            response::LoginResponse,
        },
        parse::TypedPdu,
        pdu::DigestMode,
        text::{
            common::TextFlags,
            discovery::{DiscoveredTarget, parse_send_targets},
            request::{TextRequest, encode_text_request},
            response::TextResponse,
        },
    },
    state_machine::{
        login_states::{LoginState, LoginStateMachine, LoginTarget},
        negotiator::ParameterNegotiator,
    },
};

/// Login exchanges a target may drag a single login out to before we give
/// up on it.
pub const MAX_LOGIN_ROUNDS: usize = 16;
/// Same bound for a SendTargets reply split over several Text Responses.
pub const MAX_TEXT_ROUNDS: usize = 64;

/// What a completed login leaves behind.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Merged operational parameters plus the agreed digests.
    pub parameters: HashMap<String, String>,
    pub digests: DigestMode,
}

fn describe(pdu: &TypedPdu) -> String {
    pdu.opcode()
        .map_or_else(|e| e.to_string(), |op| op.to_string())
}

async fn send_login(conn: &Connection, req: &LoginRequest) -> Result<()> {
    let bytes = encode_login_request(req)?;
    debug!(
        csg = req.csg,
        nsg = req.nsg,
        transit = req.transit,
        keys = req.key_value_pairs.len(),
        "sending login request"
    );
    conn.send(&bytes).await.context("failed to send login request")
}

async fn recv_login(conn: &Connection, wait: Duration) -> Result<LoginResponse> {
    let pdu = conn
        .recv_pdu(wait)
        .await
        .context("waiting for login response")?;
    match TypedPdu::parse(pdu)? {
        TypedPdu::LoginResponse(r) => Ok(r),
        other => bail!(IscsiError::ProtocolViolation(format!(
            "expected Login Response, got {}",
            describe(&other)
        ))),
    }
}

/// Runs the Login phase on `conn` until Full Feature Phase.
///
/// On success the connection's digest mode is switched to whatever the
/// target agreed to, so the next PDU in either direction carries them.
pub async fn login(
    conn: &Connection,
    sm: &mut LoginStateMachine,
    initiator_name: &str,
    target: &LoginTarget,
    negotiation: &Negotiation,
    wait: Duration,
) -> Result<LoginOutcome> {
    let offer = negotiation.login_offer();
    let first = sm.build_login_pdu(initiator_name, target)?;
    send_login(conn, &first).await?;

    let mut offered = false;
    for _ in 0..MAX_LOGIN_ROUNDS {
        let resp = recv_login(conn, wait).await?;
        sm.process_login_response(&resp)?;

        let next = if resp.cont {
            sm.build_continue_login_pdu()?
        } else {
            let state = sm.current_state().clone();
            match state {
                LoginState::FullFeaturePhase => return Ok(finish(conn, sm, negotiation)),
                LoginState::OperationalNegotiation if !offered => {
                    offered = true;
                    sm.build_operational_login_pdu(&offer)?
                },
                // Target answered our offer without transit; keep asking to
                // move on with nothing new to say.
                LoginState::OperationalNegotiation => {
                    sm.build_operational_login_pdu(&HashMap::new())?
                },
                LoginState::SecurityNegotiation => {
                    bail!(IscsiError::ProtocolViolation(
                        "target stayed in the Security stage; authentication is not supported"
                            .into()
                    ))
                },
                other => bail!(IscsiError::InvalidState(format!(
                    "unexpected login state {other}"
                ))),
            }
        };
        send_login(conn, &next).await?;
    }

    bail!(IscsiError::ProtocolViolation(format!(
        "login did not complete within {MAX_LOGIN_ROUNDS} exchanges"
    )))
}

fn finish(
    conn: &Connection,
    sm: &LoginStateMachine,
    negotiation: &Negotiation,
) -> LoginOutcome {
    let mut negotiator = ParameterNegotiator::from_config(negotiation);
    let mut parameters = negotiator.negotiate(sm.negotiated_parameters()).clone();

    let header = sm
        .negotiated_parameter("HeaderDigest")
        .map(Digest::from_wire)
        .unwrap_or_default();
    let data = sm
        .negotiated_parameter("DataDigest")
        .map(Digest::from_wire)
        .unwrap_or_default();
    parameters.insert("HeaderDigest".into(), header.to_string());
    parameters.insert("DataDigest".into(), data.to_string());

    let digests = DigestMode {
        header: header.enabled(),
        data: data.enabled(),
    };
    conn.set_digests(digests);

    info!(
        tsih = sm.tsih(),
        isid = %hex::encode(sm.isid()),
        header_digest = %header,
        data_digest = %data,
        "login complete"
    );
    LoginOutcome {
        parameters,
        digests,
    }
}

async fn recv_text(conn: &Connection, wait: Duration) -> Result<TextResponse> {
    let pdu = conn
        .recv_pdu(wait)
        .await
        .context("waiting for text response")?;
    match TypedPdu::parse(pdu)? {
        TypedPdu::TextResponse(r) => Ok(r),
        other => bail!(IscsiError::ProtocolViolation(format!(
            "expected Text Response, got {}",
            describe(&other)
        ))),
    }
}

/// `SendTargets=All` over a logged-in discovery connection. Continuation
/// responses (F=0) are pulled with empty requests echoing the target's
/// transfer tag.
pub async fn send_targets(
    conn: &Connection,
    sm: &mut LoginStateMachine,
    wait: Duration,
) -> Result<Vec<DiscoveredTarget>> {
    let itt = sm.generate_itt()?;
    let mut req = TextRequest::send_targets(itt, sm.cmd_sn(), sm.exp_stat_sn());
    let mut collected = Vec::new();

    for _ in 0..MAX_TEXT_ROUNDS {
        conn.send_pdu(&encode_text_request(&req))
            .await
            .context("failed to send text request")?;

        let resp = recv_text(conn, wait).await?;
        if resp.initiator_task_tag != itt {
            bail!(IscsiError::ProtocolViolation(format!(
                "text response for ITT {:#x}, expected {itt:#x}",
                resp.initiator_task_tag
            )));
        }
        sm.record_full_feature_status(resp.stat_sn, resp.exp_cmd_sn)?;
        collected.extend_from_slice(&resp.data);

        if resp.is_final() {
            let targets = parse_send_targets(&collected);
            info!(count = targets.len(), "SendTargets complete");
            return Ok(targets);
        }

        req = TextRequest {
            flags: TextFlags::FINAL,
            target_transfer_tag: resp.target_transfer_tag,
            cmd_sn: sm.cmd_sn(),
            exp_stat_sn: sm.exp_stat_sn(),
            key_value_pairs: HashMap::new(),
            ..req
        };
    }

    bail!(IscsiError::ProtocolViolation(format!(
        "SendTargets reply spans more than {MAX_TEXT_ROUNDS} responses"
    )))
}
