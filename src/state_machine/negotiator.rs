// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Operational parameter negotiation (RFC 7143 §13).
//!
//! Each key the initiator knows has a merge rule. Keys the target sends
//! that the initiator does not know are dropped; keys the target never
//! mentions keep the initiator's value.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use tracing::debug;

use crate::cfg::config::Negotiation;

/// Fixed initiator offer used by [`ParameterNegotiator::new`].
pub static INITIATOR_DEFAULTS: Lazy<HashMap<String, String>> =
    Lazy::new(|| Negotiation::default().operational_parameters());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeRule {
    Min,
    Max,
    And,
    Or,
    TargetWins,
}

fn rule_for(key: &str) -> MergeRule {
    match key {
        "MaxRecvDataSegmentLength"
        | "MaxBurstLength"
        | "FirstBurstLength"
        | "MaxOutstandingR2T"
        | "ErrorRecoveryLevel" => MergeRule::Min,
        "DefaultTime2Wait" | "DefaultTime2Retain" => MergeRule::Max,
        "InitialR2T" | "DataPDUInOrder" | "DataSequenceInOrder" => MergeRule::And,
        "ImmediateData" => MergeRule::Or,
        _ => MergeRule::TargetWins,
    }
}

// Unparseable numbers count as 0.
fn num(v: &str) -> u32 {
    v.trim().parse().unwrap_or(0)
}

fn yes(v: &str) -> bool {
    v == "Yes"
}

fn yes_no(b: bool) -> String {
    if b { "Yes" } else { "No" }.to_owned()
}

fn merge(key: &str, ours: &str, theirs: &str) -> String {
    match rule_for(key) {
        MergeRule::Min => num(ours).min(num(theirs)).to_string(),
        MergeRule::Max => num(ours).max(num(theirs)).to_string(),
        MergeRule::And => yes_no(yes(ours) && yes(theirs)),
        MergeRule::Or => yes_no(yes(ours) || yes(theirs)),
        MergeRule::TargetWins => theirs.to_owned(),
    }
}

#[derive(Debug, Clone)]
pub struct ParameterNegotiator {
    initiator: HashMap<String, String>,
    negotiated: Option<HashMap<String, String>>,
}

impl Default for ParameterNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterNegotiator {
    /// Negotiator offering the fixed initiator defaults.
    pub fn new() -> Self {
        Self {
            initiator: INITIATOR_DEFAULTS.clone(),
            negotiated: None,
        }
    }

    /// Negotiator offering the operational keys from configuration.
    pub fn from_config(n: &Negotiation) -> Self {
        Self {
            initiator: n.operational_parameters(),
            negotiated: None,
        }
    }

    /// Merges the target's answer into a fresh result, replacing whatever a
    /// previous call produced.
    pub fn negotiate(&mut self, target: &HashMap<String, String>) -> &HashMap<String, String> {
        let mut out = self.initiator.clone();
        for (key, theirs) in target {
            if let Some(ours) = self.initiator.get(key) {
                out.insert(key.clone(), merge(key, ours, theirs));
            }
        }
        debug!(negotiated = ?out, "operational parameters negotiated");
        self.negotiated.insert(out)
    }

    /// Result of the last [`negotiate`](Self::negotiate), or the initiator
    /// offer if none has run yet.
    pub fn negotiated_parameters(&self) -> &HashMap<String, String> {
        self.negotiated.as_ref().unwrap_or(&self.initiator)
    }

    pub fn initiator_parameters(&self) -> &HashMap<String, String> {
        &self.initiator
    }
}
