// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! The 256-byte Opsis composite image.
//!
//! Boards whose EEPROM also boots the FX2 USB controller share the one chip
//! between two consumers. The FX2 walks its segment chain from byte zero;
//! the board tooling finds the atom container inside one of those segments:
//!
//! ```text
//! 0x00..      FX2 header {0xC0, vid, pid, did, config}
//! ...         stage-2 bootloader data segments
//! ...         atom container segment, load address 0xE000
//! ...         terminator segment (length bit 15 set, CPU start address)
//! 0x7F        outer CRC-8 over [0x00, 0xF8) with this byte excluded
//! 0x80..0xF8  padding, all 0xFF
//! 0xF8..0x100 EUI-48/EUI-64, programmed by the EEPROM vendor
//! ```
//!
//! The vendor MAC region is written after the board is flashed, so the
//! outer CRC stops at 0xF8.

use crate::error::{AppendError, BuildError, IntegrityError};
use crate::{crc, fx2, Atom, ToBytes, TofeEep, OPSIS_MAGIC};

pub const IMAGE_SIZE: usize = 256;
/// Offset of the outer CRC byte; also the end of the FX2 segment region.
pub const OUTER_CRC_OFFSET: usize = 0x7f;
const PAD_START: usize = 0x80;
/// Start of the vendor-programmed MAC region.
pub const MAC_OFFSET: usize = 0xf8;
/// Scratch-RAM address the atom container segment is loaded to.
pub const ATOM_SEGMENT_ADDR: u16 = 0xe000;
const CPU_START_ADDR: u16 = 0x0000;

/// A complete composite image, always 256 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpsisImage {
    bytes: [u8; IMAGE_SIZE],
}

impl OpsisImage {
    /// Assemble an image from a stage-2 bootloader blob and the board's
    /// atoms, using the Opsis container magic.
    pub fn build(stage2: &[u8], atoms: &[Atom]) -> Result<OpsisImage, BuildError> {
        OpsisImage::build_with_magic(OPSIS_MAGIC, stage2, atoms)
    }

    /// As [`build`](OpsisImage::build) with a caller-chosen container magic.
    pub fn build_with_magic(
        magic: &[u8],
        stage2: &[u8],
        atoms: &[Atom],
    ) -> Result<OpsisImage, BuildError> {
        fx2::check_stage2(stage2)?;

        // Segment headers for the atom container and the terminator ride
        // along with the blob inside the FX2 region.
        let overhead = stage2.len() + 2 * fx2::SEGMENT_HEADER_LEN;
        let mut eep = TofeEep::with_capacity(magic, OUTER_CRC_OFFSET.saturating_sub(overhead));
        for atom in atoms {
            eep.append(atom)?;
        }
        let used = overhead + eep.len();
        if used > OUTER_CRC_OFFSET {
            return Err(AppendError::CapacityExceeded {
                needed: used,
                available: OUTER_CRC_OFFSET,
                capacity: OUTER_CRC_OFFSET,
            }
            .into());
        }

        let mut bytes = [0u8; IMAGE_SIZE];
        bytes[..stage2.len()].copy_from_slice(stage2);
        let mut tail = Vec::with_capacity(used - stage2.len());
        fx2::push_segment_header(&mut tail, eep.len(), ATOM_SEGMENT_ADDR);
        eep.to_bytes(&mut tail);
        fx2::push_terminator(&mut tail, CPU_START_ADDR);
        bytes[stage2.len()..used].copy_from_slice(&tail);

        for byte in &mut bytes[PAD_START..MAC_OFFSET] {
            *byte = 0xff;
        }
        bytes[OUTER_CRC_OFFSET] = crc::crc_excluding(&bytes[..MAC_OFFSET], OUTER_CRC_OFFSET);
        Ok(OpsisImage { bytes })
    }

    /// Validate a 256-byte EEPROM dump and take ownership of it.
    pub fn parse(bytes: &[u8]) -> Result<OpsisImage, IntegrityError> {
        let bytes: [u8; IMAGE_SIZE] =
            bytes
                .try_into()
                .map_err(|_| IntegrityError::BadLength {
                    expected: IMAGE_SIZE,
                    found: bytes.len(),
                })?;
        let image = OpsisImage { bytes };
        image.check()?;
        Ok(image)
    }

    /// Validate every component on its own: the outer CRC, the padding,
    /// the FX2 segment chain and the embedded atom container.
    pub fn check(&self) -> Result<(), IntegrityError> {
        let stored = self.bytes[OUTER_CRC_OFFSET];
        let computed = crc::crc_excluding(&self.bytes[..MAC_OFFSET], OUTER_CRC_OFFSET);
        if stored != computed {
            return Err(IntegrityError::BadCrc { stored, computed });
        }

        for (i, &byte) in self.bytes[PAD_START..MAC_OFFSET].iter().enumerate() {
            if byte != 0xff {
                return Err(IntegrityError::BadPadding {
                    offset: PAD_START + i,
                    found: byte,
                });
            }
        }

        self.container()?;
        Ok(())
    }

    /// The embedded atom container, re-parsed out of the segment chain.
    pub fn container(&self) -> Result<TofeEep, IntegrityError> {
        let chain = fx2::Chain::parse(&self.bytes[..OUTER_CRC_OFFSET])?;
        let segment = chain
            .segments
            .last()
            .ok_or(IntegrityError::BadSegmentChain("no atom segment"))?;
        if segment.addr != ATOM_SEGMENT_ADDR {
            return Err(IntegrityError::BadSegmentChain(
                "atom segment at the wrong address",
            ));
        }
        TofeEep::parse(segment.data, OPSIS_MAGIC)
    }

    pub fn header(&self) -> Result<fx2::Header, IntegrityError> {
        fx2::Header::parse(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IMAGE_SIZE] {
        &self.bytes
    }

    /// The raw vendor MAC region.
    pub fn mac_bytes(&self) -> [u8; 8] {
        let mut mac = [0u8; 8];
        mac.copy_from_slice(&self.bytes[MAC_OFFSET..]);
        mac
    }

    /// The vendor-programmed EUI-48, when the region carries one (the
    /// first two bytes are then 0xFF filler).
    pub fn eui48(&self) -> Option<eui48::MacAddress> {
        let mac = self.mac_bytes();
        if mac[0] == 0xff && mac[1] == 0xff {
            let mut eui = [0u8; 6];
            eui.copy_from_slice(&mac[2..]);
            Some(eui48::MacAddress::new(eui))
        } else {
            None
        }
    }

    /// The region as an EUI-64: expanded from the EUI-48 with the usual
    /// FF:FE infix, or returned as stored when the chip holds a native
    /// EUI-64.
    pub fn eui64(&self) -> [u8; 8] {
        let mac = self.mac_bytes();
        if mac[0] == 0xff && mac[1] == 0xff {
            [
                mac[2], mac[3], mac[4], 0xff, 0xfe, mac[5], mac[6], mac[7],
            ]
        } else {
            mac
        }
    }
}
