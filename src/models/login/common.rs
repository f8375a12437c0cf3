// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use crate::error::{IscsiError, IscsiResult};

bitflags::bitflags! {
    /// Byte 1 of Login Request / Login Response.
    ///
    /// Layout (RFC 7143):
    ///   bit7: TRANSIT
    ///   bit6: CONTINUE
    ///   bits3..2: CSG (Current Stage)
    ///   bits1..0: NSG (Next Stage)
    #[derive(Default, Clone, Copy, PartialEq, Eq)]
    pub struct LoginFlags: u8 {
        /// Transit bit (next stage)
        const TRANSIT = 0x80;
        /// Continue bit (more text)
        const CONTINUE = 0x40;
        /// Current Stage bits (bits 3-2)
        const CSG_MASK = 0b0000_1100;
        /// Next Stage bits (bits 1-0)
        const NSG_MASK = 0b0000_0011;
    }
}

impl LoginFlags {
    pub fn new(transit: bool, cont: bool, csg: Stage, nsg: Stage) -> Self {
        Self::from_codes(transit, cont, csg as u8, nsg as u8)
    }

    /// Packs raw stage codes; only their low two bits are kept.
    pub fn from_codes(transit: bool, cont: bool, csg: u8, nsg: u8) -> Self {
        let mut f = Self::from_bits_retain(((csg & 0b11) << 2) | (nsg & 0b11));
        f.set(Self::TRANSIT, transit);
        f.set(Self::CONTINUE, cont);
        f
    }

    #[inline]
    pub fn transit(self) -> bool {
        self.contains(Self::TRANSIT)
    }

    #[inline]
    pub fn cont(self) -> bool {
        self.contains(Self::CONTINUE)
    }

    /// Raw CSG code (0..=3).
    #[inline]
    pub fn csg_code(self) -> u8 {
        (self.bits() & Self::CSG_MASK.bits()) >> 2
    }

    /// Raw NSG code (0..=3).
    #[inline]
    pub fn nsg_code(self) -> u8 {
        self.bits() & Self::NSG_MASK.bits()
    }
}

impl fmt::Debug for LoginFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if self.transit() {
            parts.push("TRANSIT");
        }
        if self.cont() {
            parts.push("CONTINUE");
        }

        match self.csg_code() {
            0 => parts.push("CSG=Security"),
            1 => parts.push("CSG=Operational"),
            3 => parts.push("CSG=FullFeature"),
            _ => parts.push("CSG=Reserved"),
        }

        match self.nsg_code() {
            0 => parts.push("NSG=Security"),
            1 => parts.push("NSG=Operational"),
            3 => parts.push("NSG=FullFeature"),
            _ => parts.push("NSG=Reserved"),
        }

        write!(f, "LoginFlags({})", parts.join("|"))
    }
}

/// Login stage codes. Code 2 is reserved and has no variant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Stage {
    #[default]
    Security = 0,
    Operational = 1,
    FullFeature = 3,
}

impl TryFrom<u8> for Stage {
    type Error = IscsiError;

    /// Rejects the reserved code 2. `current` is unknown here, so the error
    /// reports the code on both sides.
    fn try_from(code: u8) -> IscsiResult<Self> {
        match code {
            0 => Ok(Stage::Security),
            1 => Ok(Stage::Operational),
            3 => Ok(Stage::FullFeature),
            other => Err(IscsiError::InvalidLoginStage {
                current: other,
                next: other,
            }),
        }
    }
}
