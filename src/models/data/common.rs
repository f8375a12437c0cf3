// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

bitflags::bitflags! {
    /// Byte 1 of SCSI Data-In.
    #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DataInFlags: u8 {
        /// Final
        const FINAL = 1 << 7;
        /// Acknowledge (DataACK SNACK, ERL>0)
        const A = 1 << 6;
        /// Residual Overflow, meaningful only with S
        const O = 1 << 2;
        /// Residual Underflow, meaningful only with S
        const U = 1 << 1;
        /// Status present; requires FINAL
        const S = 1 << 0;
    }
}
