// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use iscsi_initiator_rs::{
    cfg::{config::Negotiation, enums::YesNo},
    state_machine::negotiator::ParameterNegotiator,
};

fn target(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}

fn get<'a>(m: &'a HashMap<String, String>, k: &str) -> Option<&'a str> {
    m.get(k).map(String::as_str)
}

#[test]
fn test_numeric_keys_take_minimum_or_maximum() {
    let mut n = ParameterNegotiator::new();
    let out = n.negotiate(&target(&[
        ("MaxRecvDataSegmentLength", "8192"),
        ("MaxBurstLength", "1048576"),
        ("FirstBurstLength", "4096"),
        ("MaxOutstandingR2T", "4"),
        ("ErrorRecoveryLevel", "2"),
        ("DefaultTime2Wait", "5"),
        ("DefaultTime2Retain", "0"),
    ]));

    assert_eq!(get(out, "MaxRecvDataSegmentLength"), Some("8192"));
    assert_eq!(get(out, "MaxBurstLength"), Some("262144"));
    assert_eq!(get(out, "FirstBurstLength"), Some("4096"));
    assert_eq!(get(out, "MaxOutstandingR2T"), Some("1"));
    assert_eq!(get(out, "ErrorRecoveryLevel"), Some("0"));
    assert_eq!(get(out, "DefaultTime2Wait"), Some("5"));
    assert_eq!(get(out, "DefaultTime2Retain"), Some("20"));
}

#[test]
fn test_boolean_keys() {
    let mut n = ParameterNegotiator::from_config(&Negotiation {
        immediate_data: YesNo::No,
        ..Negotiation::default()
    });
    let out = n.negotiate(&target(&[
        ("InitialR2T", "No"),
        ("ImmediateData", "Yes"),
        ("DataPDUInOrder", "yes"),
        ("DataSequenceInOrder", "Yes"),
    ]));

    assert_eq!(get(out, "InitialR2T"), Some("No"));
    assert_eq!(get(out, "ImmediateData"), Some("Yes"));
    // only the exact spelling "Yes" counts as true
    assert_eq!(get(out, "DataPDUInOrder"), Some("No"));
    assert_eq!(get(out, "DataSequenceInOrder"), Some("Yes"));
}

#[test]
fn test_unknown_keys_dropped_and_missing_keys_kept() {
    let mut n = ParameterNegotiator::new();
    let out = n
        .negotiate(&target(&[
            ("TargetPortalGroupTag", "1"),
            ("X-vendor.example", "1"),
        ]))
        .clone();

    assert!(!out.contains_key("TargetPortalGroupTag"));
    assert!(!out.contains_key("X-vendor.example"));
    assert_eq!(out.len(), 11);
    assert_eq!(&out, n.initiator_parameters());
}

#[test]
fn test_garbage_numbers_become_zero() {
    let mut n = ParameterNegotiator::new();
    let out = n.negotiate(&target(&[
        ("MaxBurstLength", "lots"),
        ("DefaultTime2Wait", "-1"),
    ]));
    assert_eq!(get(out, "MaxBurstLength"), Some("0"));
    assert_eq!(get(out, "DefaultTime2Wait"), Some("2"));
}

#[test]
fn test_negotiate_replaces_previous_result() {
    let mut n = ParameterNegotiator::new();
    assert_eq!(n.negotiated_parameters(), n.initiator_parameters());

    n.negotiate(&target(&[("MaxBurstLength", "512")]));
    assert_eq!(get(n.negotiated_parameters(), "MaxBurstLength"), Some("512"));

    n.negotiate(&target(&[("FirstBurstLength", "1024")]));
    let out = n.negotiated_parameters();
    assert_eq!(get(out, "MaxBurstLength"), Some("262144"));
    assert_eq!(get(out, "FirstBurstLength"), Some("1024"));
}

#[test]
fn test_config_offer_includes_digests() {
    let offer = Negotiation::default().login_offer();
    assert_eq!(offer.len(), 13);
    assert_eq!(get(&offer, "HeaderDigest"), Some("None"));
    assert_eq!(get(&offer, "DataDigest"), Some("None"));
    assert_eq!(get(&offer, "InitialR2T"), Some("Yes"));
}
