// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! Atoms: the TLV records a container holds.
//!
//! This implements the Atom Structure:
//! ```text
//! Bytes   Field
//! 1       type        atom type, high nibble = format family
//! 1       length      number of payload bytes
//! N       payload     interpreted per the type's format family
//! ```
//!
//! The high nibble of the type byte selects how the payload is encoded; the
//! low nibble numbers the atom within that family. An [`Atom`] is the owned,
//! validated form used while building an image; an [`AtomView`] borrows out
//! of a container when reading one back.

use crate::error::{DecodeError, ValueError};
use crate::license::{License, LicenseCode};
use crate::{url, varint};
use num_traits::FromPrimitive as _;

/// Zero point of all timestamps in the format: 2015-01-01T00:00:00Z.
pub const TIMESTAMP_EPOCH: u64 = 1_420_070_400;

/// Largest payload an atom can declare.
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// This enum implements the Atom Types:
/// ```text
/// 0x0_ = UTF-8 string
/// 0x1_ = absolute URL (TLD-compressed, https:// implied)
/// 0x2_ = relative URL (back-reference to an absolute URL atom)
/// 0x3_ = timestamp (var-int seconds past the 2015 epoch)
/// 0x4_ = license byte
/// 0x5_ = EEPROM region map entry {offset, size}
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, num_derive::FromPrimitive)]
pub enum AtomType {
    ProductVersion = 0x01,
    ProductSerial = 0x02,
    PartNumber = 0x03,
    PcbRevision = 0x04,
    FirmwareDescription = 0x05,
    FirmwareRevision = 0x06,
    EepromPartNumber = 0x07,
    Designer = 0x10,
    Manufacturer = 0x11,
    ProductId = 0x12,
    AuxiliaryUrl = 0x13,
    PcbRepository = 0x20,
    FirmwareRepository = 0x21,
    SampleCodeRepository = 0x22,
    DocumentationSite = 0x23,
    PcbProductionBatch = 0x30,
    PcbPopulationBatch = 0x31,
    FirmwareProgramDate = 0x32,
    PcbLicense = 0x40,
    FirmwareLicense = 0x41,
    EepromTotalSize = 0x50,
    EepromVendorData = 0x51,
    EepromTofeData = 0x52,
    EepromUserData = 0x53,
    EepromGuid = 0x54,
    EepromHole = 0x55,
}

impl AtomType {
    pub fn from_byte(byte: u8) -> Option<AtomType> {
        AtomType::from_u8(byte)
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn family(self) -> AtomFamily {
        // Every listed type sits in a defined family nibble.
        AtomFamily::of(self.byte()).unwrap()
    }
}

/// Payload format family, keyed on the type byte's high nibble.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AtomFamily {
    String,
    Url,
    RelativeUrl,
    Timestamp,
    License,
    Region,
}

impl AtomFamily {
    pub fn of(type_byte: u8) -> Option<AtomFamily> {
        match type_byte >> 4 {
            0x0 => Some(AtomFamily::String),
            0x1 => Some(AtomFamily::Url),
            0x2 => Some(AtomFamily::RelativeUrl),
            0x3 => Some(AtomFamily::Timestamp),
            0x4 => Some(AtomFamily::License),
            0x5 => Some(AtomFamily::Region),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            AtomFamily::String => "string",
            AtomFamily::Url => "URL",
            AtomFamily::RelativeUrl => "relative URL",
            AtomFamily::Timestamp => "timestamp",
            AtomFamily::License => "license",
            AtomFamily::Region => "size/offset",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum AtomData {
    String(String),
    /// Wire form of an absolute URL: TLD code plus the remaining
    /// domain ++ path bytes.
    Url { tld: u8, rest: String },
    RelativeUrl { parent: u8, path: String },
    /// Absolute seconds since the Unix epoch; always past
    /// [`TIMESTAMP_EPOCH`].
    Timestamp(u64),
    License(LicenseCode),
    Region { offset: u32, size: u32 },
}

/// One owned, validated atom, ready to append to a container.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Atom {
    atype: AtomType,
    data: AtomData,
}

fn check_family(atype: AtomType, family: AtomFamily) -> Result<(), ValueError> {
    if atype.family() != family {
        return Err(ValueError::WrongFamily {
            type_byte: atype.byte(),
            family: family.name(),
        });
    }
    Ok(())
}

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), ValueError> {
    if len > max {
        return Err(ValueError::TooLong { field, len, max });
    }
    Ok(())
}

impl Atom {
    /// A plain UTF-8 string atom (product version, PCB revision, ...).
    pub fn string(atype: AtomType, text: &str) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::String)?;
        check_len("string", text.len(), MAX_PAYLOAD)?;
        Ok(Atom {
            atype,
            data: AtomData::String(text.to_string()),
        })
    }

    /// An absolute URL atom. Any `scheme://` prefix is stripped and the
    /// top-level domain is table-compressed.
    pub fn url(atype: AtomType, url_str: &str) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::Url)?;
        let bare = url::strip_scheme(url_str);
        if !bare.is_ascii() {
            return Err(ValueError::NotAscii { field: "URL" });
        }
        let (domain, path) = url::split(bare);
        if domain.is_empty() {
            return Err(ValueError::EmptyUrl);
        }
        let (tld, trimmed) = url::compress(domain);
        let rest = format!("{trimmed}{path}");
        check_len("URL", 1 + rest.len(), MAX_PAYLOAD)?;
        Ok(Atom {
            atype,
            data: AtomData::Url { tld, rest },
        })
    }

    /// A relative URL atom. `parent` is the container index of an earlier
    /// absolute URL atom the path hangs off; the container checks the
    /// reference when the atom is appended.
    pub fn relative_url(atype: AtomType, parent: u8, path: &str) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::RelativeUrl)?;
        if !path.is_ascii() {
            return Err(ValueError::NotAscii { field: "URL path" });
        }
        check_len("URL path", 1 + path.len(), MAX_PAYLOAD)?;
        Ok(Atom {
            atype,
            data: AtomData::RelativeUrl {
                parent,
                path: path.to_string(),
            },
        })
    }

    /// A timestamp atom, in seconds since the Unix epoch. Values at or
    /// before 2015-01-01T00:00:00Z cannot be represented.
    pub fn timestamp(atype: AtomType, seconds: u64) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::Timestamp)?;
        if seconds <= TIMESTAMP_EPOCH {
            return Err(ValueError::TimestampBeforeEpoch(seconds));
        }
        Ok(Atom {
            atype,
            data: AtomData::Timestamp(seconds),
        })
    }

    /// A license atom.
    pub fn license(atype: AtomType, license: License) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::License)?;
        Ok(Atom {
            atype,
            data: AtomData::License(LicenseCode::Known(license)),
        })
    }

    /// An EEPROM region map atom: `{offset, size}` stored at the narrowest
    /// width (u8, u16 or u32) that holds both members.
    pub fn region(atype: AtomType, offset: u32, size: u32) -> Result<Atom, ValueError> {
        check_family(atype, AtomFamily::Region)?;
        Ok(Atom {
            atype,
            data: AtomData::Region { offset, size },
        })
    }

    pub fn atype(&self) -> AtomType {
        self.atype
    }

    pub fn type_byte(&self) -> u8 {
        self.atype.byte()
    }

    /// Relative URL parent index, if this atom carries one.
    pub(crate) fn parent(&self) -> Option<u8> {
        match self.data {
            AtomData::RelativeUrl { parent, .. } => Some(parent),
            _ => None,
        }
    }

    fn payload_len(&self) -> usize {
        match &self.data {
            AtomData::String(text) => text.len(),
            AtomData::Url { rest, .. } => 1 + rest.len(),
            AtomData::RelativeUrl { path, .. } => 1 + path.len(),
            AtomData::Timestamp(seconds) => varint::encoded_len(seconds - TIMESTAMP_EPOCH),
            AtomData::License(_) => 1,
            AtomData::Region { offset, size } => region_width(*offset, *size) * 2,
        }
    }
}

fn region_width(offset: u32, size: u32) -> usize {
    let max = offset.max(size);
    if max <= u8::MAX as u32 {
        1
    } else if max <= u16::MAX as u32 {
        2
    } else {
        4
    }
}

impl crate::ToBytes for Atom {
    fn len(&self) -> usize {
        2 + self.payload_len()
    }

    fn to_bytes(&self, buf: &mut Vec<u8>) {
        buf.push(self.atype.byte());
        buf.push(self.payload_len() as u8);
        match &self.data {
            AtomData::String(text) => buf.extend_from_slice(text.as_bytes()),
            AtomData::Url { tld, rest } => {
                buf.push(*tld);
                buf.extend_from_slice(rest.as_bytes());
            }
            AtomData::RelativeUrl { parent, path } => {
                buf.push(*parent);
                buf.extend_from_slice(path.as_bytes());
            }
            AtomData::Timestamp(seconds) => varint::encode(seconds - TIMESTAMP_EPOCH, buf),
            AtomData::License(code) => buf.push(code.byte()),
            AtomData::Region { offset, size } => match region_width(*offset, *size) {
                1 => {
                    buf.push(*offset as u8);
                    buf.push(*size as u8);
                }
                2 => {
                    buf.extend_from_slice(&(*offset as u16).to_le_bytes());
                    buf.extend_from_slice(&(*size as u16).to_le_bytes());
                }
                _ => {
                    buf.extend_from_slice(&offset.to_le_bytes());
                    buf.extend_from_slice(&size.to_le_bytes());
                }
            },
        }
    }
}

/// An atom payload decoded on its own, before any back-reference is
/// resolved. This is what [`decode_payload`] yields and what the container
/// turns into an [`AtomView`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Payload<'a> {
    Str(&'a str),
    Url { tld: u8, rest: &'a str },
    RelativeUrl { parent: u8, path: &'a str },
    Timestamp(u64),
    License(LicenseCode),
    Region { offset: u32, size: u32 },
}

/// Decode one atom payload per its type's format family.
pub(crate) fn decode_payload<'a>(
    atype: AtomType,
    payload: &'a [u8],
) -> Result<Payload<'a>, DecodeError> {
    let type_byte = atype.byte();
    fn utf8(bytes: &[u8], type_byte: u8) -> Result<&str, DecodeError> {
        std::str::from_utf8(bytes).map_err(|_| DecodeError::BadUtf8 { type_byte })
    }
    match atype.family() {
        AtomFamily::String => Ok(Payload::Str(utf8(payload, type_byte)?)),
        AtomFamily::Url => {
            let (&tld, rest) = payload.split_first().ok_or(DecodeError::MalformedPayload {
                type_byte,
                field: "TLD byte",
            })?;
            if url::expand(tld).is_none() {
                return Err(DecodeError::MalformedPayload {
                    type_byte,
                    field: "TLD byte",
                });
            }
            Ok(Payload::Url {
                tld,
                rest: utf8(rest, type_byte)?,
            })
        }
        AtomFamily::RelativeUrl => {
            let (&parent, path) = payload.split_first().ok_or(DecodeError::MalformedPayload {
                type_byte,
                field: "parent index",
            })?;
            Ok(Payload::RelativeUrl {
                parent,
                path: utf8(path, type_byte)?,
            })
        }
        AtomFamily::Timestamp => {
            let delta = varint::decode(payload).ok_or(DecodeError::MalformedPayload {
                type_byte,
                field: "timestamp var-int",
            })?;
            if delta == 0 {
                return Err(DecodeError::MalformedPayload {
                    type_byte,
                    field: "timestamp offset",
                });
            }
            Ok(Payload::Timestamp(TIMESTAMP_EPOCH + delta))
        }
        AtomFamily::License => {
            if payload.len() != 1 {
                return Err(DecodeError::MalformedPayload {
                    type_byte,
                    field: "license byte",
                });
            }
            Ok(Payload::License(LicenseCode::from_byte(payload[0])))
        }
        AtomFamily::Region => {
            let (offset, size) = match payload.len() {
                2 => (payload[0] as u32, payload[1] as u32),
                4 => (
                    u16::from_le_bytes(payload[0..2].try_into().unwrap()) as u32,
                    u16::from_le_bytes(payload[2..4].try_into().unwrap()) as u32,
                ),
                8 => (
                    u32::from_le_bytes(payload[0..4].try_into().unwrap()),
                    u32::from_le_bytes(payload[4..8].try_into().unwrap()),
                ),
                _ => {
                    return Err(DecodeError::MalformedPayload {
                        type_byte,
                        field: "size/offset width",
                    })
                }
            };
            Ok(Payload::Region { offset, size })
        }
    }
}

/// A typed, read-only view of one atom inside a container.
///
/// String views borrow the container's bytes; URL views carry the re-joined
/// absolute form, which for relative URLs includes the parent atom's URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AtomView<'a> {
    String { atype: AtomType, text: &'a str },
    Url { atype: AtomType, url: String },
    RelativeUrl { atype: AtomType, parent: u8, url: String },
    Timestamp { atype: AtomType, seconds: u64 },
    License { atype: AtomType, license: LicenseCode },
    Region { atype: AtomType, offset: u32, size: u32 },
}

impl AtomView<'_> {
    pub fn atype(&self) -> AtomType {
        match *self {
            AtomView::String { atype, .. }
            | AtomView::Url { atype, .. }
            | AtomView::RelativeUrl { atype, .. }
            | AtomView::Timestamp { atype, .. }
            | AtomView::License { atype, .. }
            | AtomView::Region { atype, .. } => atype,
        }
    }

    /// The absolute URL, for both URL families.
    pub fn url(&self) -> Option<&str> {
        match self {
            AtomView::Url { url, .. } | AtomView::RelativeUrl { url, .. } => Some(url),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            AtomView::String { text, .. } => Some(text),
            _ => None,
        }
    }
}
