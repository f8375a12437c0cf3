// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use anyhow::Result;
use iscsi_initiator_rs::{
    error::IscsiError,
    models::{
        login::{
            common::{LoginFlags, Stage},
            request::{encode_login_request, parse_login_request},
            response::{LoginResponse, encode_login_response, parse_login_response},
            status::StatusClass,
        },
        pdu::parse_pdu,
    },
    state_machine::login_states::{LoginState, LoginStateMachine, LoginTarget},
};

use crate::unit_tests::load_fixture;

const ISID: [u8; 6] = [0, 2, 61, 0, 0, 14];
const INITIATOR: &str = "iqn.2004-10.com.ubuntu:01:c676ed18968f";
const TARGET: &str = "iqn.2025-08.example:disk0";

fn response(csg: Stage, nsg: Stage, transit: bool) -> LoginResponse {
    LoginResponse {
        transit,
        csg: csg as u8,
        nsg: nsg as u8,
        isid: ISID,
        tsih: 1,
        initiator_task_tag: 1,
        stat_sn: 0,
        exp_cmd_sn: 1,
        max_cmd_sn: 64,
        ..LoginResponse::default()
    }
}

fn started() -> Result<LoginStateMachine> {
    let mut sm = LoginStateMachine::new(ISID);
    sm.build_login_pdu(INITIATOR, &LoginTarget::Normal(TARGET.into()))?;
    Ok(sm)
}

#[test]
fn test_login_request_matches_fixture() -> Result<()> {
    let expected = load_fixture("login_request.hex")?;

    let mut sm = LoginStateMachine::new(ISID);
    let req = sm.build_login_pdu(INITIATOR, &LoginTarget::Normal(TARGET.into()))?;
    assert_eq!(req.initiator_task_tag, 1);
    assert_eq!(sm.current_state(), &LoginState::SecurityNegotiation);

    assert_eq!(encode_login_request(&req)?, expected);
    Ok(())
}

#[test]
fn test_login_request_parse() -> Result<()> {
    let bytes = load_fixture("login_request.hex")?;
    let req = parse_login_request(&parse_pdu(&bytes)?)?;

    assert!(req.transit);
    assert!(!req.cont);
    assert_eq!(req.csg, Stage::Security as u8);
    assert_eq!(req.nsg, Stage::Operational as u8);
    assert_eq!(req.isid, ISID);
    assert_eq!(req.tsih, 0);
    assert_eq!(req.cmd_sn, 0);
    assert_eq!(req.flags(), LoginFlags::new(true, false, Stage::Security, Stage::Operational));
    assert_eq!(
        req.key_value_pairs.get("InitiatorName").map(String::as_str),
        Some(INITIATOR)
    );
    assert_eq!(
        req.key_value_pairs.get("TargetName").map(String::as_str),
        Some(TARGET)
    );
    assert_eq!(
        req.key_value_pairs.get("AuthMethod").map(String::as_str),
        Some("None")
    );
    Ok(())
}

#[test]
fn test_login_response_parse() -> Result<()> {
    let bytes = load_fixture("login_response.hex")?;
    let resp = parse_login_response(&parse_pdu(&bytes)?)?;

    assert!(resp.transit);
    assert_eq!(resp.csg, 1);
    assert_eq!(resp.nsg, 3);
    assert_eq!(resp.isid, ISID);
    assert_eq!(resp.tsih, 1);
    assert_eq!(resp.stat_sn, 5);
    assert_eq!(resp.exp_cmd_sn, 1);
    assert_eq!(resp.max_cmd_sn, 64);
    assert!(resp.status().is_success());
    assert_eq!(resp.status().status_class(), StatusClass::Success);
    assert_eq!(
        resp.key_value_pairs
            .get("MaxRecvDataSegmentLength")
            .map(String::as_str),
        Some("65536")
    );

    assert_eq!(encode_login_response(&resp)?, bytes);
    Ok(())
}

#[test]
fn test_login_to_parse_rejects_other_opcodes() -> Result<()> {
    let bytes = load_fixture("login_response.hex")?;
    assert!(matches!(
        parse_login_request(&parse_pdu(&bytes)?),
        Err(IscsiError::MalformedPdu(_))
    ));
    Ok(())
}

#[test]
fn test_security_to_operational_to_full_feature() -> Result<()> {
    let mut sm = started()?;

    let mut r = response(Stage::Security, Stage::Operational, true);
    r.stat_sn = 10;
    sm.process_login_response(&r)?;
    assert_eq!(sm.current_state(), &LoginState::OperationalNegotiation);
    assert_eq!(sm.exp_stat_sn(), 11);
    assert_eq!(sm.cmd_sn(), 1);
    assert_eq!(sm.tsih(), 1);

    let offer = HashMap::from([("MaxBurstLength".to_owned(), "65536".to_owned())]);
    let req = sm.build_operational_login_pdu(&offer)?;
    assert!(req.transit);
    assert_eq!(req.csg, 1);
    assert_eq!(req.nsg, 3);
    assert_eq!(req.tsih, 1);
    assert_eq!(req.exp_stat_sn, 11);
    assert_eq!(req.initiator_task_tag, sm.login_itt());

    let mut r = response(Stage::Operational, Stage::FullFeature, true);
    r.stat_sn = 11;
    r.exp_cmd_sn = 2;
    r.tsih = 0;
    r.key_value_pairs = HashMap::from([("MaxBurstLength".to_owned(), "16384".to_owned())]);
    sm.process_login_response(&r)?;
    assert_eq!(sm.current_state(), &LoginState::FullFeaturePhase);
    assert_eq!(sm.exp_stat_sn(), 12);
    assert_eq!(sm.cmd_sn(), 2);
    // a zero TSIH in a later response leaves the assigned one alone
    assert_eq!(sm.tsih(), 1);
    assert_eq!(sm.negotiated_parameter("MaxBurstLength"), Some("16384"));
    Ok(())
}

#[test]
fn test_security_straight_to_full_feature() -> Result<()> {
    let mut sm = started()?;
    sm.process_login_response(&response(Stage::Security, Stage::FullFeature, true))?;
    assert_eq!(sm.current_state(), &LoginState::FullFeaturePhase);
    Ok(())
}

#[test]
fn test_failed_status_moves_to_failed() -> Result<()> {
    let mut sm = started()?;
    let mut r = response(Stage::Security, Stage::Operational, true);
    r.status_class = 2;
    r.status_detail = 5;

    match sm.process_login_response(&r) {
        Err(IscsiError::LoginFailed {
            status_class,
            status_detail,
        }) => {
            assert_eq!(status_class, 2);
            assert_eq!(status_detail, 5);
        },
        other => panic!("unexpected: {other:?}"),
    }
    assert!(sm.current_state().is_failed());

    // failed is terminal
    assert!(matches!(
        sm.process_login_response(&response(Stage::Security, Stage::Operational, true)),
        Err(IscsiError::InvalidState(_))
    ));
    assert!(matches!(sm.generate_itt(), Err(IscsiError::InvalidState(_))));
    Ok(())
}

#[test]
fn test_reserved_next_stage_is_rejected() -> Result<()> {
    let mut sm = started()?;
    let mut r = response(Stage::Security, Stage::Operational, true);
    r.nsg = 2;
    assert!(matches!(
        sm.process_login_response(&r),
        Err(IscsiError::InvalidLoginStage { next: 2, .. })
    ));
    assert!(sm.current_state().is_failed());
    Ok(())
}

#[test]
fn test_backwards_transition_is_rejected() -> Result<()> {
    let mut sm = started()?;
    sm.process_login_response(&response(Stage::Security, Stage::Operational, true))?;

    let r = response(Stage::Operational, Stage::Security, true);
    match sm.process_login_response(&r) {
        Err(IscsiError::InvalidLoginStage { current, next }) => {
            assert_eq!(current, 1);
            assert_eq!(next, 0);
        },
        other => panic!("unexpected: {other:?}"),
    }
    assert!(sm.current_state().is_failed());
    Ok(())
}

#[test]
fn test_full_feature_is_terminal_for_login() -> Result<()> {
    let mut sm = started()?;
    sm.process_login_response(&response(Stage::Security, Stage::FullFeature, true))?;

    assert!(matches!(
        sm.process_login_response(&response(Stage::FullFeature, Stage::FullFeature, true)),
        Err(IscsiError::InvalidState(_))
    ));
    assert!(matches!(
        sm.build_continue_login_pdu(),
        Err(IscsiError::InvalidState(_))
    ));
    assert!(matches!(
        sm.build_login_pdu(INITIATOR, &LoginTarget::Discovery),
        Err(IscsiError::InvalidState(_))
    ));
    // sequence tracking still works once the session is up
    sm.record_full_feature_status(40, 7)?;
    assert_eq!(sm.exp_stat_sn(), 41);
    assert_eq!(sm.cmd_sn(), 7);
    Ok(())
}

#[test]
fn test_continue_keeps_stage_and_builds_empty_request() -> Result<()> {
    let mut sm = started()?;
    let mut r = response(Stage::Security, Stage::Security, false);
    r.cont = true;
    r.key_value_pairs = HashMap::from([("TargetAlias".to_owned(), "disk".to_owned())]);
    sm.process_login_response(&r)?;
    assert_eq!(sm.current_state(), &LoginState::SecurityNegotiation);
    assert_eq!(sm.negotiated_parameter("TargetAlias"), Some("disk"));

    let req = sm.build_continue_login_pdu()?;
    assert!(!req.transit);
    assert!(!req.cont);
    assert_eq!(req.csg, 0);
    assert_eq!(req.nsg, 0);
    assert!(req.key_value_pairs.is_empty());
    assert_eq!(req.initiator_task_tag, sm.login_itt());
    Ok(())
}

#[test]
fn test_operational_request_needs_operational_stage() -> Result<()> {
    let mut sm = started()?;
    assert!(matches!(
        sm.build_operational_login_pdu(&HashMap::new()),
        Err(IscsiError::InvalidState(_))
    ));

    let mut fresh = LoginStateMachine::new(ISID);
    assert!(matches!(
        fresh.build_continue_login_pdu(),
        Err(IscsiError::InvalidState(_))
    ));
    Ok(())
}

#[test]
fn test_itt_is_strictly_increasing() -> Result<()> {
    let mut sm = LoginStateMachine::new(ISID);
    let first = sm.generate_itt()?;
    let second = sm.generate_itt()?;
    let third = sm.generate_itt()?;
    assert_eq!(first, 1);
    assert!(first < second && second < third);
    Ok(())
}

#[test]
fn test_discovery_login_has_no_target_name() -> Result<()> {
    let mut sm = LoginStateMachine::new(ISID);
    let req = sm.build_login_pdu(INITIATOR, &LoginTarget::Discovery)?;
    assert_eq!(
        req.key_value_pairs.get("SessionType").map(String::as_str),
        Some("Discovery")
    );
    assert!(!req.key_value_pairs.contains_key("TargetName"));

    let mut minimal = LoginStateMachine::new(ISID);
    let req = minimal.build_initial_login_pdu(INITIATOR)?;
    assert_eq!(
        req.key_value_pairs.get("SessionType").map(String::as_str),
        Some("Normal")
    );
    Ok(())
}

#[test]
fn test_initiator_alias_is_sent_only_when_set() -> Result<()> {
    let mut plain = LoginStateMachine::new(ISID);
    let req = plain.build_login_pdu(INITIATOR, &LoginTarget::Normal(TARGET.into()))?;
    assert!(!req.key_value_pairs.contains_key("InitiatorAlias"));

    let mut named = LoginStateMachine::new(ISID);
    named.set_initiator_alias("lab-host");
    let req = named.build_login_pdu(INITIATOR, &LoginTarget::Discovery)?;
    assert_eq!(
        req.key_value_pairs.get("InitiatorAlias").map(String::as_str),
        Some("lab-host")
    );

    let mut cleared = LoginStateMachine::new(ISID);
    cleared.set_initiator_alias("lab-host");
    cleared.set_initiator_alias("");
    let req = cleared.build_initial_login_pdu(INITIATOR)?;
    assert!(!req.key_value_pairs.contains_key("InitiatorAlias"));
    Ok(())
}
