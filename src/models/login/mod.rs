// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Login flags byte and stage codes.
pub mod common;
/// Login Request projection.
pub mod request;
/// Login Response projection.
pub mod response;
/// Status-Class / Status-Detail interpretation.
pub mod status;
