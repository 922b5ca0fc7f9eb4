// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// A value handed to an atom constructor cannot be represented on the wire.
///
/// Constructors reject bad values up front, so an [`crate::Atom`] that exists
/// always serializes cleanly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// The encoded payload would not fit the one-byte atom length field.
    #[error("{field}: {len} bytes does not fit the {max} byte payload limit")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// Timestamps are stored as an offset from 2015-01-01T00:00:00Z and the
    /// offset must be strictly positive.
    #[error("timestamp {0} does not lie after 2015-01-01T00:00:00Z")]
    TimestampBeforeEpoch(u64),
    #[error("{field}: URLs are stored as ASCII")]
    NotAscii { field: &'static str },
    #[error("URL has no domain part")]
    EmptyUrl,
    /// The atom type's format family does not match the constructor used.
    #[error("atom type 0x{type_byte:02x} does not carry a {family} payload")]
    WrongFamily {
        type_byte: u8,
        family: &'static str,
    },
    /// An FX2 data segment length field only has 15 usable bits.
    #[error("segment data of {0} bytes exceeds the 15 bit segment length")]
    SegmentTooLong(usize),
}

/// Appending an atom to a container failed. The container is untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppendError {
    #[error("atom needs {needed} bytes but only {available} remain of {capacity}")]
    CapacityExceeded {
        needed: usize,
        available: usize,
        capacity: usize,
    },
    /// Atoms are kept sorted by type byte; appends must not go backwards.
    #[error("atom type 0x{next:02x} sorts before predecessor 0x{prev:02x}")]
    OutOfOrder { prev: u8, next: u8 },
    /// A relative URL must point back at an earlier absolute URL atom.
    #[error("relative URL parent {parent} is not an earlier absolute URL atom ({count} atoms present)")]
    DanglingReference { parent: u8, count: u8 },
}

/// Reading an atom back out of a container failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("atom index {index} out of bounds ({count} atoms)")]
    IndexOutOfBounds { index: usize, count: usize },
    #[error("unknown atom type 0x{0:02x}")]
    UnknownType(u8),
    #[error("atom type 0x{type_byte:02x}: malformed {field}")]
    MalformedPayload {
        type_byte: u8,
        field: &'static str,
    },
    #[error("atom type 0x{type_byte:02x}: payload is not valid UTF-8")]
    BadUtf8 { type_byte: u8 },
    #[error("atom region truncated at offset {offset}")]
    Truncated { offset: usize },
}

/// A container or composite image failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("bad {field}: expected {expected:02x?}, found {found:02x?}")]
    BadMagic {
        field: &'static str,
        expected: Vec<u8>,
        found: Vec<u8>,
    },
    #[error("CRC mismatch: stored 0x{stored:02x}, computed 0x{computed:02x}")]
    BadCrc { stored: u8, computed: u8 },
    #[error("unsupported format version 0x{0:02x}")]
    BadVersion(u8),
    #[error("record of {found} bytes, expected {expected}")]
    BadLength { expected: usize, found: usize },
    #[error("declared length {declared} disagrees with the {actual} bytes present")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("atom count {declared} disagrees with the {actual} atoms present")]
    AtomCountMismatch { declared: u8, actual: usize },
    #[error("segment chain: {0}")]
    BadSegmentChain(&'static str),
    #[error("padding byte at offset 0x{offset:02x} is 0x{found:02x}, expected 0xff")]
    BadPadding { offset: usize, found: u8 },
    #[error(transparent)]
    Atom(#[from] DecodeError),
}

/// Building a composite image failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}
