// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! The one-byte packed license field.
//!
//! Bits 0..=4 select a license family, bits 5..=7 the version within that
//! family. The set is closed: bytes outside it survive a decode as
//! [`LicenseCode::Unknown`] so they round-trip, but they never validate.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

const FAMILY_MASK: u8 = 0x1f;
const VERSION_SHIFT: u8 = 5;

/// Every license a board may declare for its PCB or firmware.
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromPrimitive)]
pub enum License {
    Invalid = 0x00,
    Mit = 0x01,
    BsdSimple = 0x02,
    BsdNew = 0x22,
    BsdIsc = 0x42,
    ApacheV2 = 0x43,
    GplV2 = 0x44,
    GplV3 = 0x64,
    LgplV21 = 0x45,
    LgplV3 = 0x65,
    Cc0V1 = 0x26,
    CcByV10 = 0x27,
    CcByV20 = 0x47,
    CcByV30 = 0x67,
    CcByV40 = 0x87,
    CcBySaV10 = 0x28,
    CcBySaV20 = 0x48,
    CcBySaV30 = 0x68,
    CcBySaV40 = 0x88,
    TaprV10 = 0x29,
    CernV11 = 0x2a,
    CernV12 = 0x4a,
    Proprietary = 0xff,
}

impl License {
    pub fn from_byte(byte: u8) -> Option<License> {
        License::from_u8(byte)
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn family(self) -> u8 {
        self.byte() & FAMILY_MASK
    }

    pub fn version(self) -> u8 {
        self.byte() >> VERSION_SHIFT
    }

    /// The short name used in board definition files.
    pub fn name(self) -> &'static str {
        match self {
            License::Invalid => "Invalid",
            License::Mit => "MIT",
            License::BsdSimple => "BSD-simple",
            License::BsdNew => "BSD-new",
            License::BsdIsc => "BSD-ISC",
            License::ApacheV2 => "Apache-2.0",
            License::GplV2 => "GPL-2.0",
            License::GplV3 => "GPL-3.0",
            License::LgplV21 => "LGPL-2.1",
            License::LgplV3 => "LGPL-3.0",
            License::Cc0V1 => "CC0-1.0",
            License::CcByV10 => "CC-BY-1.0",
            License::CcByV20 => "CC-BY-2.0",
            License::CcByV30 => "CC-BY-3.0",
            License::CcByV40 => "CC-BY-4.0",
            License::CcBySaV10 => "CC-BY-SA-1.0",
            License::CcBySaV20 => "CC-BY-SA-2.0",
            License::CcBySaV30 => "CC-BY-SA-3.0",
            License::CcBySaV40 => "CC-BY-SA-4.0",
            License::TaprV10 => "TAPR-1.0",
            License::CernV11 => "CERN-OHL-1.1",
            License::CernV12 => "CERN-OHL-1.2",
            License::Proprietary => "Proprietary",
        }
    }

    pub fn from_name(name: &str) -> Option<License> {
        ALL.iter().copied().find(|l| l.name() == name)
    }
}

const ALL: [License; 23] = [
    License::Invalid,
    License::Mit,
    License::BsdSimple,
    License::BsdNew,
    License::BsdIsc,
    License::ApacheV2,
    License::GplV2,
    License::GplV3,
    License::LgplV21,
    License::LgplV3,
    License::Cc0V1,
    License::CcByV10,
    License::CcByV20,
    License::CcByV30,
    License::CcByV40,
    License::CcBySaV10,
    License::CcBySaV20,
    License::CcBySaV30,
    License::CcBySaV40,
    License::TaprV10,
    License::CernV11,
    License::CernV12,
    License::Proprietary,
];

impl std::fmt::Display for License {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A license byte as read back from an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LicenseCode {
    Known(License),
    Unknown(u8),
}

impl LicenseCode {
    pub fn from_byte(byte: u8) -> LicenseCode {
        match License::from_byte(byte) {
            Some(license) => LicenseCode::Known(license),
            None => LicenseCode::Unknown(byte),
        }
    }

    pub fn byte(self) -> u8 {
        match self {
            LicenseCode::Known(license) => license.byte(),
            LicenseCode::Unknown(byte) => byte,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_packing() {
        assert_eq!(License::Mit.family(), 1);
        assert_eq!(License::Mit.version(), 0);
        assert_eq!(License::BsdIsc.family(), 2);
        assert_eq!(License::BsdIsc.version(), 2);
        assert_eq!(License::GplV3.family(), 4);
        assert_eq!(License::GplV3.version(), 3);
        assert_eq!(License::CcBySaV40.family(), 8);
        assert_eq!(License::CcBySaV40.version(), 4);
        assert_eq!(License::Proprietary.byte(), 0xff);
    }

    #[test]
    fn test_families_are_distinct() {
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert_ne!(a.byte(), b.byte());
                }
            }
        }
    }

    #[test]
    fn test_byte_roundtrip() {
        for license in ALL {
            assert_eq!(License::from_byte(license.byte()), Some(license));
            assert_eq!(
                LicenseCode::from_byte(license.byte()),
                LicenseCode::Known(license)
            );
        }
    }

    #[test]
    fn test_name_roundtrip() {
        for license in ALL {
            assert_eq!(License::from_name(license.name()), Some(license));
        }
        assert_eq!(License::from_name("WTFPL"), None);
    }

    #[test]
    fn test_unknown_bytes_are_preserved() {
        assert_eq!(License::from_byte(0x7b), None);
        let code = LicenseCode::from_byte(0x7b);
        assert_eq!(code, LicenseCode::Unknown(0x7b));
        assert_eq!(code.byte(), 0x7b);
    }
}
