//! This module contains the login state machine and parameter negotiation.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// State machine for the Login phase.
pub mod login_states;
/// Operational parameter merge rules.
pub mod negotiator;
