// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! Library to create and parse TOFE board identification EEPROM images.
//!
//! Every TOFE (Tim's Open Factor Expansion) board carries a small I2C EEPROM
//! describing the board: who made it, where its PCB sources live, when it
//! was produced, and how the EEPROM itself is carved up. The data is a
//! stream of TLV records ("atoms") inside a CRC-protected container:
//!
//! ```text
//! Bytes   Field
//! 5       magic           b"TOFE\0" (2-byte b"OP" inside composite images)
//! 1       version         format version, 0x01
//! 1       atom_count      number of atoms in the container
//! 1       crc8            CRC-8 of the container, its own byte excluded
//! 4       total_length    bytes after this field (atoms + reversed magic)
//! N       atoms           atom_count records of {type, length, payload}
//! 5       reversed magic  the magic written backwards, e.g. b"\0EFOT"
//! ```
//!
//! Atoms are appended in non-decreasing type order and the container is
//! re-stamped (trailer, count, length, CRC) on every append, so the bytes
//! are always shippable. Boards whose EEPROM doubles as an FX2 USB boot
//! descriptor embed the container in a [`image::OpsisImage`] instead of
//! writing it standalone.

mod atom;
mod record;
mod url;
mod varint;

pub mod crc;
pub mod error;
pub mod fx2;
pub mod image;
pub mod license;

pub use atom::{Atom, AtomFamily, AtomType, AtomView, MAX_PAYLOAD, TIMESTAMP_EPOCH};
pub use error::{AppendError, BuildError, DecodeError, IntegrityError, ValueError};
pub use image::OpsisImage;
pub use license::{License, LicenseCode};

use record::{LenWidth, Layout};

/// Magic of a standalone container at the start of a dedicated EEPROM.
pub const TOFE_MAGIC: &[u8] = b"TOFE\0";
/// Magic of a container embedded in an Opsis composite image.
pub const OPSIS_MAGIC: &[u8] = b"OP";

/// The only container format version this library reads or writes.
pub const FORMAT_VERSION: u8 = 0x01;

/// Capacity used by [`TofeEep::new`]: the largest deployed TOFE EEPROM.
pub const DEFAULT_CAPACITY: usize = 16 * 1024;

pub trait ToBytes {
    /// Serialized size in bytes.
    fn len(&self) -> usize;
    fn to_bytes(&self, buf: &mut Vec<u8>);
}

/// An atom container and its backing EEPROM bytes.
///
/// The container is valid from the moment it is created: `new` writes the
/// header and the reversed-magic trailer and every successful [`append`]
/// leaves the count, total length, trailer and CRC re-stamped. Reads hand
/// out [`AtomView`]s that borrow the buffer, so no view survives a
/// mutation.
///
/// [`append`]: TofeEep::append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TofeEep {
    buf: Vec<u8>,
    magic_len: usize,
    capacity: usize,
}

impl TofeEep {
    /// Create an empty container with the default EEPROM capacity.
    pub fn new(magic: &[u8]) -> TofeEep {
        TofeEep::with_capacity(magic, DEFAULT_CAPACITY)
    }

    /// Create an empty container bounded by `capacity` bytes. A capacity
    /// smaller than the empty container itself is raised to fit it.
    pub fn with_capacity(magic: &[u8], capacity: usize) -> TofeEep {
        let magic_len = magic.len();
        let mut buf = Vec::with_capacity(Self::header_len(magic_len) + magic_len);
        buf.extend_from_slice(magic);
        buf.push(FORMAT_VERSION);
        buf.push(0); // atom_count
        buf.push(0); // crc8, stamped below
        buf.extend_from_slice(&(magic_len as u32).to_le_bytes());
        buf.extend(magic.iter().rev());

        let mut eep = TofeEep {
            buf,
            magic_len,
            capacity: capacity.max(Self::header_len(magic_len) + magic_len),
        };
        eep.layout().crc_update(&mut eep.buf);
        eep
    }

    /// Re-open a serialized container. Trailing bytes past the declared
    /// length (EEPROM padding) are ignored. The returned container has
    /// passed [`check`](TofeEep::check).
    pub fn parse(bytes: &[u8], magic: &[u8]) -> Result<TofeEep, IntegrityError> {
        let magic_len = magic.len();
        let header_len = Self::header_len(magic_len);
        if bytes.len() < header_len + magic_len {
            return Err(IntegrityError::BadLength {
                expected: header_len + magic_len,
                found: bytes.len(),
            });
        }
        if &bytes[..magic_len] != magic {
            return Err(IntegrityError::BadMagic {
                field: "magic",
                expected: magic.to_vec(),
                found: bytes[..magic_len].to_vec(),
            });
        }
        let layout = Self::layout_for(magic_len);
        let declared = layout.declared_len(bytes);
        let available = bytes.len() - header_len;
        if declared < magic_len || declared > available {
            return Err(IntegrityError::LengthMismatch {
                declared,
                actual: available,
            });
        }
        let eep = TofeEep {
            buf: bytes[..header_len + declared].to_vec(),
            magic_len,
            capacity: DEFAULT_CAPACITY.max(header_len + declared),
        };
        eep.check()?;
        Ok(eep)
    }

    fn header_len(magic_len: usize) -> usize {
        // magic, version, atom_count, crc8, total_length
        magic_len + 3 + 4
    }

    fn layout_for(magic_len: usize) -> Layout {
        Layout {
            crc_offset: magic_len + 2,
            len_offset: magic_len + 3,
            len_width: LenWidth::U32,
            payload_offset: Self::header_len(magic_len),
        }
    }

    fn layout(&self) -> Layout {
        Self::layout_for(self.magic_len)
    }

    pub fn magic(&self) -> &[u8] {
        &self.buf[..self.magic_len]
    }

    pub fn version(&self) -> u8 {
        self.buf[self.magic_len]
    }

    pub fn atom_count(&self) -> u8 {
        self.buf[self.magic_len + 1]
    }

    /// The declared length: atom bytes plus the reversed-magic trailer.
    pub fn total_length(&self) -> u32 {
        self.layout().declared_len(&self.buf) as u32
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes still free before the container hits its capacity.
    pub fn leftover(&self) -> usize {
        self.capacity - self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    fn atoms_region(&self) -> &[u8] {
        &self.buf[self.layout().payload_offset..self.buf.len() - self.magic_len]
    }

    /// Walk the atom region to atom `index`, returning its type byte and
    /// payload.
    fn raw_atom(&self, index: usize) -> Result<(u8, &[u8]), DecodeError> {
        let count = self.atom_count() as usize;
        if index >= count {
            return Err(DecodeError::IndexOutOfBounds { index, count });
        }
        let base = self.layout().payload_offset;
        let region = self.atoms_region();
        let mut offset = 0;
        for i in 0..=index {
            if offset + 2 > region.len() {
                return Err(DecodeError::Truncated {
                    offset: base + offset,
                });
            }
            let len = region[offset + 1] as usize;
            if offset + 2 + len > region.len() {
                return Err(DecodeError::Truncated {
                    offset: base + offset,
                });
            }
            if i == index {
                return Ok((region[offset], &region[offset + 2..offset + 2 + len]));
            }
            offset += 2 + len;
        }
        unreachable!("loop returns at i == index");
    }

    fn last_type_byte(&self) -> Result<Option<u8>, DecodeError> {
        match self.atom_count() {
            0 => Ok(None),
            count => Ok(Some(self.raw_atom(count as usize - 1)?.0)),
        }
    }

    /// Append an atom. Atoms must arrive in non-decreasing type order and a
    /// relative URL's parent must already be present. On any error the
    /// container bytes are untouched.
    pub fn append(&mut self, atom: &Atom) -> Result<(), AppendError> {
        let count = self.atom_count();
        if count == u8::MAX {
            return Err(AppendError::CapacityExceeded {
                needed: atom.len(),
                available: 0,
                capacity: self.capacity,
            });
        }
        if let Ok(Some(prev)) = self.last_type_byte() {
            if atom.type_byte() < prev {
                return Err(AppendError::OutOfOrder {
                    prev,
                    next: atom.type_byte(),
                });
            }
        }
        if let Some(parent) = atom.parent() {
            let referent = if (parent as usize) < count as usize {
                self.raw_atom(parent as usize).ok()
            } else {
                None
            };
            let is_url = referent
                .map(|(type_byte, _)| AtomFamily::of(type_byte) == Some(AtomFamily::Url))
                .unwrap_or(false);
            if !is_url {
                return Err(AppendError::DanglingReference { parent, count });
            }
        }

        let mut bytes = Vec::with_capacity(atom.len());
        atom.to_bytes(&mut bytes);

        let layout = self.layout();
        let atom_start = self.buf.len() - self.magic_len;
        let payload_len = layout.effective_len(&self.buf) + bytes.len();
        layout.resize(&mut self.buf, payload_len, self.capacity)?;
        self.buf[atom_start..atom_start + bytes.len()].copy_from_slice(&bytes);
        self.stamp_trailer();
        self.buf[self.magic_len + 1] = count + 1;
        layout.crc_update(&mut self.buf);
        Ok(())
    }

    fn stamp_trailer(&mut self) {
        let m = self.magic_len;
        let end = self.buf.len();
        for i in 0..m {
            self.buf[end - m + i] = self.buf[m - 1 - i];
        }
    }

    /// Decode atom `index` into a typed view. Relative URLs are joined with
    /// their parent atom's absolute URL.
    pub fn get(&self, index: usize) -> Result<AtomView<'_>, DecodeError> {
        let (type_byte, payload) = self.raw_atom(index)?;
        let atype = AtomType::from_byte(type_byte).ok_or(DecodeError::UnknownType(type_byte))?;
        let view = match atom::decode_payload(atype, payload)? {
            atom::Payload::Str(text) => AtomView::String { atype, text },
            atom::Payload::Url { tld, rest } => AtomView::Url {
                atype,
                url: url::join(tld, rest).ok_or(DecodeError::MalformedPayload {
                    type_byte,
                    field: "TLD byte",
                })?,
            },
            atom::Payload::RelativeUrl { parent, path } => {
                let parent_url = self.parent_url(index, parent, type_byte)?;
                AtomView::RelativeUrl {
                    atype,
                    parent,
                    url: format!("{parent_url}/{path}"),
                }
            }
            atom::Payload::Timestamp(seconds) => AtomView::Timestamp { atype, seconds },
            atom::Payload::License(license) => AtomView::License { atype, license },
            atom::Payload::Region { offset, size } => AtomView::Region {
                atype,
                offset,
                size,
            },
        };
        Ok(view)
    }

    /// Resolve the absolute URL of a relative URL atom's parent.
    fn parent_url(&self, index: usize, parent: u8, type_byte: u8) -> Result<String, DecodeError> {
        let bad = DecodeError::MalformedPayload {
            type_byte,
            field: "parent index",
        };
        if parent as usize >= index {
            return Err(bad);
        }
        let (parent_type, parent_payload) = self.raw_atom(parent as usize)?;
        let parent_atype = AtomType::from_byte(parent_type).ok_or(bad.clone())?;
        match atom::decode_payload(parent_atype, parent_payload)? {
            atom::Payload::Url { tld, rest } => url::join(tld, rest).ok_or(bad),
            _ => Err(bad),
        }
    }

    /// Validate the container: magic trailer, version, declared length,
    /// CRC, atom ordering and every atom payload.
    pub fn check(&self) -> Result<(), IntegrityError> {
        let m = self.magic_len;
        let layout = self.layout();

        if self.version() != FORMAT_VERSION {
            return Err(IntegrityError::BadVersion(self.version()));
        }

        let declared = layout.declared_len(&self.buf);
        let actual = self.buf.len() - layout.payload_offset;
        if declared != actual {
            return Err(IntegrityError::LengthMismatch { declared, actual });
        }

        let expected: Vec<u8> = self.buf[..m].iter().rev().copied().collect();
        let found = &self.buf[self.buf.len() - m..];
        if found != expected {
            return Err(IntegrityError::BadMagic {
                field: "reversed magic",
                expected,
                found: found.to_vec(),
            });
        }

        let computed = layout.crc_compute(&self.buf);
        let stored = self.buf[layout.crc_offset];
        if stored != computed {
            return Err(IntegrityError::BadCrc { stored, computed });
        }

        self.check_atoms()?;
        Ok(())
    }

    fn check_atoms(&self) -> Result<(), IntegrityError> {
        let count = self.atom_count() as usize;
        let base = self.layout().payload_offset;
        let region = self.atoms_region();
        let mut offset = 0;
        let mut types: Vec<u8> = Vec::with_capacity(count);

        while offset < region.len() {
            if types.len() == count {
                return Err(IntegrityError::AtomCountMismatch {
                    declared: count as u8,
                    actual: count + 1,
                });
            }
            if offset + 2 > region.len() {
                return Err(DecodeError::Truncated {
                    offset: base + offset,
                }
                .into());
            }
            let type_byte = region[offset];
            let len = region[offset + 1] as usize;
            if offset + 2 + len > region.len() {
                return Err(DecodeError::Truncated {
                    offset: base + offset,
                }
                .into());
            }
            let payload = &region[offset + 2..offset + 2 + len];

            let atype =
                AtomType::from_byte(type_byte).ok_or(DecodeError::UnknownType(type_byte))?;
            if let Some(&prev) = types.last() {
                if type_byte < prev {
                    return Err(DecodeError::MalformedPayload {
                        type_byte,
                        field: "type order",
                    }
                    .into());
                }
            }
            match atom::decode_payload(atype, payload)? {
                atom::Payload::RelativeUrl { parent, .. } => {
                    let parent_is_url = types
                        .get(parent as usize)
                        .map(|&t| AtomFamily::of(t) == Some(AtomFamily::Url))
                        .unwrap_or(false);
                    if !parent_is_url {
                        return Err(DecodeError::MalformedPayload {
                            type_byte,
                            field: "parent index",
                        }
                        .into());
                    }
                }
                atom::Payload::License(license::LicenseCode::Unknown(_)) => {
                    return Err(DecodeError::MalformedPayload {
                        type_byte,
                        field: "license byte",
                    }
                    .into());
                }
                _ => {}
            }

            types.push(type_byte);
            offset += 2 + len;
        }

        if types.len() != count {
            return Err(IntegrityError::AtomCountMismatch {
                declared: count as u8,
                actual: types.len(),
            });
        }
        Ok(())
    }
}

impl ToBytes for TofeEep {
    fn len(&self) -> usize {
        self.buf.len()
    }

    fn to_bytes(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn milkymist_id_atoms() -> TofeEep {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        eep.append(&Atom::url(AtomType::Manufacturer, "numato.com").unwrap())
            .unwrap();
        eep.append(&Atom::url(AtomType::ProductId, "tofe.io/milkymist").unwrap())
            .unwrap();
        eep.append(&Atom::relative_url(AtomType::PcbRepository, 1, "r/pcb.git").unwrap())
            .unwrap();
        eep
    }

    #[test]
    fn test_empty_container_bytes() {
        let eep = TofeEep::new(TOFE_MAGIC);
        // "TOFE\0", version 1, no atoms, CRC, length 5, "\0EFOT".
        assert_eq!(
            eep.as_bytes(),
            hex::decode("544f46450001008c050000000045464f54").unwrap()
        );
        assert_eq!(eep.atom_count(), 0);
        assert_eq!(eep.total_length(), 5);
        eep.check().unwrap();
    }

    #[test]
    fn test_empty_opsis_container_bytes() {
        let eep = TofeEep::new(OPSIS_MAGIC);
        // "OP", version 1, no atoms, CRC, length 2, "PO".
        assert_eq!(
            eep.as_bytes(),
            hex::decode("4f5001002802000000504f").unwrap()
        );
        eep.check().unwrap();
    }

    #[test]
    fn test_single_atom_container_bytes() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        eep.append(&Atom::url(AtomType::Manufacturer, "https://numato.com").unwrap())
            .unwrap();
        // One 9-byte Manufacturer atom: type 0x11, length 7, TLD 0x01
        // (".com"), "numato".
        assert_eq!(
            eep.as_bytes(),
            hex::decode("544f4645000101c10e0000001107016e756d61746f0045464f54").unwrap()
        );
        assert_eq!(eep.as_bytes().len(), 26);
        eep.check().unwrap();
        assert_eq!(eep.get(0).unwrap().url(), Some("https://numato.com"));
    }

    #[test]
    fn test_relative_url_joins_parent() {
        let eep = milkymist_id_atoms();
        eep.check().unwrap();
        assert_eq!(eep.atom_count(), 3);
        assert_eq!(
            eep.get(2).unwrap().url(),
            Some("https://tofe.io/milkymist/r/pcb.git")
        );
        match eep.get(2).unwrap() {
            AtomView::RelativeUrl { parent, .. } => assert_eq!(parent, 1),
            other => panic!("wrong view: {other:?}"),
        }
    }

    #[test]
    fn test_out_of_order_append_rejected() {
        let mut eep = milkymist_id_atoms();
        let before = eep.as_bytes().to_vec();
        let err = eep
            .append(&Atom::string(AtomType::PcbRevision, "6a18").unwrap())
            .unwrap_err();
        assert_eq!(
            err,
            AppendError::OutOfOrder {
                prev: 0x20,
                next: 0x04
            }
        );
        assert_eq!(eep.as_bytes(), &before[..]);
    }

    #[test]
    fn test_equal_types_may_repeat() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        eep.append(&Atom::region(AtomType::EepromVendorData, 0x600, 256).unwrap())
            .unwrap();
        eep.append(&Atom::region(AtomType::EepromVendorData, 0x800, 2).unwrap())
            .unwrap();
        eep.check().unwrap();
        assert_eq!(eep.atom_count(), 2);
    }

    #[test]
    fn test_dangling_parent_rejected() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        let repo = Atom::relative_url(AtomType::PcbRepository, 0, "r/pcb.git").unwrap();
        assert_eq!(
            eep.append(&repo),
            Err(AppendError::DanglingReference {
                parent: 0,
                count: 0
            })
        );

        // A parent that exists but is not an absolute URL is just as bad.
        eep.append(&Atom::string(AtomType::ProductVersion, "v1.0.0").unwrap())
            .unwrap();
        assert_eq!(
            eep.append(&repo),
            Err(AppendError::DanglingReference {
                parent: 0,
                count: 1
            })
        );
    }

    #[test]
    fn test_capacity_exceeded_leaves_container_alone() {
        let mut eep = TofeEep::with_capacity(TOFE_MAGIC, 32);
        let before = eep.as_bytes().to_vec();
        let atom = Atom::string(AtomType::ProductVersion, &"x".repeat(64)).unwrap();
        let err = eep.append(&atom).unwrap_err();
        assert!(matches!(err, AppendError::CapacityExceeded { .. }));
        assert_eq!(eep.as_bytes(), &before[..]);
        eep.check().unwrap();
    }

    #[test]
    fn test_leftover_shrinks_by_atom_size() {
        let mut eep = TofeEep::with_capacity(TOFE_MAGIC, 128);
        let free = eep.leftover();
        eep.append(&Atom::string(AtomType::ProductVersion, "v1.0.0").unwrap())
            .unwrap();
        assert_eq!(eep.leftover(), free - 8);
    }

    #[test]
    fn test_append_is_serialize_plus_restamp() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        eep.append(&Atom::url(AtomType::Manufacturer, "numato.com").unwrap())
            .unwrap();
        let before = eep.as_bytes().to_vec();

        let atom = Atom::url(AtomType::ProductId, "tofe.io/milkymist").unwrap();
        let mut atom_bytes = Vec::new();
        atom.to_bytes(&mut atom_bytes);
        eep.append(&atom).unwrap();

        let mut expected = before[..before.len() - 5].to_vec();
        expected.extend_from_slice(&atom_bytes);
        expected.extend_from_slice(b"\x00EFOT");
        expected[6] = 2;
        let total = (expected.len() - 12) as u32;
        expected[8..12].copy_from_slice(&total.to_le_bytes());
        expected[7] = crc::crc_excluding(&expected, 7);

        assert_eq!(eep.as_bytes(), &expected[..]);
    }

    #[test]
    fn test_reversed_magic_after_every_append() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        let tail = |eep: &TofeEep| eep.as_bytes()[eep.as_bytes().len() - 5..].to_vec();
        assert_eq!(tail(&eep), b"\x00EFOT");
        eep.append(&Atom::string(AtomType::ProductVersion, "v1.0.0").unwrap())
            .unwrap();
        assert_eq!(tail(&eep), b"\x00EFOT");
        eep.append(&Atom::url(AtomType::Manufacturer, "numato.com").unwrap())
            .unwrap();
        assert_eq!(tail(&eep), b"\x00EFOT");
    }

    #[test]
    fn test_every_flipped_byte_is_caught() {
        let eep = milkymist_id_atoms();
        let crc_offset = 7;
        for i in 0..eep.as_bytes().len() {
            if i == crc_offset {
                continue;
            }
            let mut bytes = eep.as_bytes().to_vec();
            bytes[i] ^= 0x01;
            let corrupt = TofeEep {
                buf: bytes,
                magic_len: 5,
                capacity: eep.capacity(),
            };
            assert!(corrupt.check().is_err(), "flip at {i} went unnoticed");
        }
    }

    #[test]
    fn test_parse_roundtrip() {
        let eep = milkymist_id_atoms();
        let parsed = TofeEep::parse(eep.as_bytes(), TOFE_MAGIC).unwrap();
        assert_eq!(parsed.as_bytes(), eep.as_bytes());
        assert_eq!(parsed.atom_count(), 3);
    }

    #[test]
    fn test_parse_ignores_eeprom_padding() {
        let eep = milkymist_id_atoms();
        let mut dump = eep.as_bytes().to_vec();
        dump.resize(128, 0xff);
        let parsed = TofeEep::parse(&dump, TOFE_MAGIC).unwrap();
        assert_eq!(parsed.as_bytes(), eep.as_bytes());
    }

    #[test]
    fn test_parse_rejects_wrong_magic() {
        let eep = TofeEep::new(TOFE_MAGIC);
        let err = TofeEep::parse(eep.as_bytes(), OPSIS_MAGIC).unwrap_err();
        assert!(matches!(err, IntegrityError::BadMagic { field: "magic", .. }));
    }

    #[test]
    fn test_parse_rejects_bad_crc() {
        let eep = milkymist_id_atoms();
        let mut bytes = eep.as_bytes().to_vec();
        bytes[14] ^= 0xff;
        let err = TofeEep::parse(&bytes, TOFE_MAGIC).unwrap_err();
        assert!(matches!(err, IntegrityError::BadCrc { .. }));
    }

    #[test]
    fn test_parse_rejects_truncation() {
        let eep = milkymist_id_atoms();
        let bytes = eep.as_bytes();
        let err = TofeEep::parse(&bytes[..bytes.len() - 3], TOFE_MAGIC).unwrap_err();
        assert!(matches!(err, IntegrityError::LengthMismatch { .. }));
    }

    #[test]
    fn test_get_out_of_bounds() {
        let eep = milkymist_id_atoms();
        assert_eq!(
            eep.get(3),
            Err(DecodeError::IndexOutOfBounds { index: 3, count: 3 })
        );
    }

    #[test]
    fn test_unknown_type_byte() {
        // Hand-build a container holding a type the registry does not know.
        let mut bytes = TofeEep::new(TOFE_MAGIC).as_bytes().to_vec();
        let atom = [0x60u8, 0x01, 0xaa];
        bytes.splice(12..12, atom);
        bytes[6] = 1;
        let total = (bytes.len() - 12) as u32;
        bytes[8..12].copy_from_slice(&total.to_le_bytes());
        bytes[7] = crc::crc_excluding(&bytes, 7);

        let err = TofeEep::parse(&bytes, TOFE_MAGIC).unwrap_err();
        assert_eq!(err, IntegrityError::Atom(DecodeError::UnknownType(0x60)));
    }

    #[test]
    fn test_check_rejects_bad_version() {
        let eep = TofeEep::new(TOFE_MAGIC);
        let mut bytes = eep.as_bytes().to_vec();
        bytes[5] = 0x02;
        bytes[7] = crc::crc_excluding(&bytes, 7);
        let corrupt = TofeEep {
            buf: bytes,
            magic_len: 5,
            capacity: eep.capacity(),
        };
        assert_eq!(corrupt.check(), Err(IntegrityError::BadVersion(0x02)));
    }

    #[test]
    fn test_check_rejects_unknown_license() {
        let mut eep = TofeEep::new(TOFE_MAGIC);
        eep.append(&Atom::license(AtomType::PcbLicense, License::Mit).unwrap())
            .unwrap();
        let mut bytes = eep.as_bytes().to_vec();
        bytes[14] = 0x7b; // not in the closed set
        bytes[7] = crc::crc_excluding(&bytes, 7);
        let corrupt = TofeEep {
            buf: bytes,
            magic_len: 5,
            capacity: eep.capacity(),
        };
        assert_eq!(
            corrupt.check(),
            Err(IntegrityError::Atom(DecodeError::MalformedPayload {
                type_byte: 0x40,
                field: "license byte"
            }))
        );
        // But reading it back still yields the raw byte.
        assert!(matches!(
            corrupt.get(0),
            Ok(AtomView::License {
                license: LicenseCode::Unknown(0x7b),
                ..
            })
        ));
    }

    #[test]
    fn test_full_board_identity() {
        let mut eep = TofeEep::with_capacity(TOFE_MAGIC, 128);
        eep.append(&Atom::string(AtomType::ProductVersion, "v1.0.0").unwrap())
            .unwrap();
        eep.append(&Atom::string(AtomType::PcbRevision, "a902c70").unwrap())
            .unwrap();
        eep.append(&Atom::url(AtomType::Manufacturer, "numato.com").unwrap())
            .unwrap();
        eep.append(&Atom::url(AtomType::ProductId, "tofe.io/milkymist").unwrap())
            .unwrap();
        eep.append(&Atom::relative_url(AtomType::PcbRepository, 3, "r/pcb.git").unwrap())
            .unwrap();
        eep.append(&Atom::timestamp(AtomType::PcbProductionBatch, 1_450_787_283).unwrap())
            .unwrap();
        eep.append(&Atom::license(AtomType::PcbLicense, License::CcBySaV40).unwrap())
            .unwrap();
        eep.append(&Atom::region(AtomType::EepromTotalSize, 0, 128).unwrap())
            .unwrap();
        eep.check().unwrap();

        assert_eq!(eep.get(0).unwrap().text(), Some("v1.0.0"));
        assert_eq!(
            eep.get(4).unwrap().url(),
            Some("https://tofe.io/milkymist/r/pcb.git")
        );
        match eep.get(5).unwrap() {
            AtomView::Timestamp { seconds, .. } => assert_eq!(seconds, 1_450_787_283),
            other => panic!("wrong view: {other:?}"),
        }
        match eep.get(7).unwrap() {
            AtomView::Region { offset, size, .. } => {
                assert_eq!((offset, size), (0, 128));
            }
            other => panic!("wrong view: {other:?}"),
        }

        let parsed = TofeEep::parse(eep.as_bytes(), TOFE_MAGIC).unwrap();
        assert_eq!(parsed.as_bytes(), eep.as_bytes());
    }
}
