//! CHAP helpers and credential storage.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// CHAP (MD5) response computation and challenge parsing.
pub mod chap;
/// Per-target CHAP credential storage.
pub mod credentials;
