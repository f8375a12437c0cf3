// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Flags and offsets shared by Text Request and Text Response.
pub mod common;
/// SendTargets discovery reply parsing.
pub mod discovery;
/// `key=value\0` segment encoding.
pub mod kv;
pub mod request;
pub mod response;
