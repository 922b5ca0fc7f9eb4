// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

//! The Cypress FX2 "C0" boot descriptor.
//!
//! An FX2 USB controller booting from I2C EEPROM expects:
//! ```text
//! Bytes   Field
//! 1       0xC0        boot tag
//! 2       vid         USB vendor ID, little-endian
//! 2       pid         USB product ID, little-endian
//! 2       did         device ID, little-endian
//! 1       config      configuration byte
//! ```
//! followed by zero or more data segments
//! ```text
//! 2       length      big-endian; bit 15 set marks the last segment
//! 2       addr        big-endian load address
//! N       data        length & 0x7fff bytes
//! ```
//! The last segment carries no data; its address field is the CPU start
//! address. A stage-2 bootloader blob is the same layout without the last
//! segment, so more segments can be chained behind it.

use crate::error::{IntegrityError, ValueError};
use crate::ToBytes;

pub const BOOT_TAG: u8 = 0xc0;
pub const HEADER_LEN: usize = 8;
pub const SEGMENT_HEADER_LEN: usize = 4;
/// Bit 15 of the length field marks the last segment.
const LAST_SEGMENT_FLAG: u16 = 0x8000;
pub const MAX_SEGMENT_DATA: usize = 0x7fff;

/// USB identity of the reference Opsis board.
pub const OPSIS_VID: u16 = 0x2a19;
pub const OPSIS_PID: u16 = 0x5440;

/// The fixed 8-byte FX2 boot header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub vid: u16,
    pub pid: u16,
    pub did: u16,
    pub config: u8,
}

impl Header {
    pub fn parse(bytes: &[u8]) -> Result<Header, IntegrityError> {
        if bytes.len() < HEADER_LEN {
            return Err(IntegrityError::BadLength {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }
        if bytes[0] != BOOT_TAG {
            return Err(IntegrityError::BadMagic {
                field: "FX2 boot tag",
                expected: vec![BOOT_TAG],
                found: vec![bytes[0]],
            });
        }
        Ok(Header {
            vid: u16::from_le_bytes([bytes[1], bytes[2]]),
            pid: u16::from_le_bytes([bytes[3], bytes[4]]),
            did: u16::from_le_bytes([bytes[5], bytes[6]]),
            config: bytes[7],
        })
    }
}

impl ToBytes for Header {
    fn len(&self) -> usize {
        HEADER_LEN
    }

    fn to_bytes(&self, buf: &mut Vec<u8>) {
        buf.push(BOOT_TAG);
        buf.extend_from_slice(&self.vid.to_le_bytes());
        buf.extend_from_slice(&self.pid.to_le_bytes());
        buf.extend_from_slice(&self.did.to_le_bytes());
        buf.push(self.config);
    }
}

/// One data segment of a parsed chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    /// Offset of the segment's 4-byte header in the parsed bytes.
    pub offset: usize,
    pub addr: u16,
    pub data: &'a [u8],
}

/// A fully terminated boot descriptor: header, data segments, terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chain<'a> {
    pub header: Header,
    pub segments: Vec<Segment<'a>>,
    /// CPU start address carried by the terminator segment.
    pub start_addr: u16,
    /// Offset one past the terminator.
    pub end: usize,
}

impl<'a> Chain<'a> {
    /// Walk a terminated segment chain. Every segment must lie inside
    /// `bytes`; anything else is a [`IntegrityError::BadSegmentChain`].
    pub fn parse(bytes: &'a [u8]) -> Result<Chain<'a>, IntegrityError> {
        let header = Header::parse(bytes)?;
        let mut segments = Vec::new();
        let mut offset = HEADER_LEN;
        loop {
            if offset + SEGMENT_HEADER_LEN > bytes.len() {
                return Err(IntegrityError::BadSegmentChain(
                    "segment header out of bounds",
                ));
            }
            let raw_len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
            let addr = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]);
            let data_len = (raw_len & !LAST_SEGMENT_FLAG) as usize;
            if raw_len & LAST_SEGMENT_FLAG != 0 {
                if data_len != 0 {
                    return Err(IntegrityError::BadSegmentChain("terminator carries data"));
                }
                return Ok(Chain {
                    header,
                    segments,
                    start_addr: addr,
                    end: offset + SEGMENT_HEADER_LEN,
                });
            }
            let data_start = offset + SEGMENT_HEADER_LEN;
            if data_start + data_len > bytes.len() {
                return Err(IntegrityError::BadSegmentChain("segment data out of bounds"));
            }
            segments.push(Segment {
                offset,
                addr,
                data: &bytes[data_start..data_start + data_len],
            });
            offset = data_start + data_len;
        }
    }
}

/// Validate a stage-2 bootloader blob: an FX2 header plus data segments
/// filling the blob exactly, with no terminator (one is appended when the
/// blob is assembled into an image).
pub fn check_stage2(bytes: &[u8]) -> Result<(), IntegrityError> {
    Header::parse(bytes)?;
    let mut offset = HEADER_LEN;
    while offset < bytes.len() {
        if offset + SEGMENT_HEADER_LEN > bytes.len() {
            return Err(IntegrityError::BadSegmentChain(
                "segment header out of bounds",
            ));
        }
        let raw_len = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        if raw_len & LAST_SEGMENT_FLAG != 0 {
            return Err(IntegrityError::BadSegmentChain(
                "stage-2 blob already terminated",
            ));
        }
        let next = offset + SEGMENT_HEADER_LEN + raw_len as usize;
        if next > bytes.len() {
            return Err(IntegrityError::BadSegmentChain("segment data out of bounds"));
        }
        offset = next;
    }
    Ok(())
}

pub(crate) fn push_segment_header(buf: &mut Vec<u8>, data_len: usize, addr: u16) {
    buf.extend_from_slice(&(data_len as u16).to_be_bytes());
    buf.extend_from_slice(&addr.to_be_bytes());
}

pub(crate) fn push_terminator(buf: &mut Vec<u8>, start_addr: u16) {
    buf.extend_from_slice(&LAST_SEGMENT_FLAG.to_be_bytes());
    buf.extend_from_slice(&start_addr.to_be_bytes());
}

/// Assembles an FX2 boot descriptor front to back; used to synthesize
/// stage-2 blobs.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    buf: Vec<u8>,
}

impl ConfigBuilder {
    pub fn new(header: Header) -> ConfigBuilder {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        header.to_bytes(&mut buf);
        ConfigBuilder { buf }
    }

    /// Append a data segment loading `data` at `addr`.
    pub fn segment(&mut self, addr: u16, data: &[u8]) -> Result<&mut ConfigBuilder, ValueError> {
        if data.len() > MAX_SEGMENT_DATA {
            return Err(ValueError::SegmentTooLong(data.len()));
        }
        push_segment_header(&mut self.buf, data.len(), addr);
        self.buf.extend_from_slice(data);
        Ok(self)
    }

    /// The blob built so far, without a terminator.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opsis_header() -> Header {
        Header {
            vid: OPSIS_VID,
            pid: OPSIS_PID,
            did: 0x0000,
            config: 0x04,
        }
    }

    fn blob() -> Vec<u8> {
        let mut builder = ConfigBuilder::new(opsis_header());
        builder.segment(0x0000, &[0x90, 0xe6, 0x00]).unwrap();
        builder.segment(0xe600, &[0x01]).unwrap();
        builder.into_bytes()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = opsis_header();
        let mut buf = Vec::new();
        header.to_bytes(&mut buf);
        assert_eq!(buf, &[0xc0, 0x19, 0x2a, 0x40, 0x54, 0x00, 0x00, 0x04]);
        assert_eq!(Header::parse(&buf).unwrap(), header);
    }

    #[test]
    fn test_header_rejects_wrong_tag() {
        let err = Header::parse(&[0xc2, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, IntegrityError::BadMagic { field: "FX2 boot tag", .. }));
    }

    #[test]
    fn test_chain_walk() {
        let mut bytes = blob();
        push_terminator(&mut bytes, 0x0000);
        let chain = Chain::parse(&bytes).unwrap();
        assert_eq!(chain.header, opsis_header());
        assert_eq!(chain.segments.len(), 2);
        assert_eq!(chain.segments[0].addr, 0x0000);
        assert_eq!(chain.segments[0].data, &[0x90, 0xe6, 0x00]);
        assert_eq!(chain.segments[1].addr, 0xe600);
        assert_eq!(chain.start_addr, 0x0000);
        assert_eq!(chain.end, bytes.len());
    }

    #[test]
    fn test_chain_requires_terminator() {
        let bytes = blob();
        let err = Chain::parse(&bytes).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::BadSegmentChain("segment header out of bounds")
        );
    }

    #[test]
    fn test_chain_rejects_overlong_segment() {
        let mut bytes = blob();
        push_terminator(&mut bytes, 0x0000);
        // First segment claims more data than the buffer holds.
        bytes[HEADER_LEN + 1] = 0xf0;
        let err = Chain::parse(&bytes).unwrap_err();
        assert_eq!(
            err,
            IntegrityError::BadSegmentChain("segment data out of bounds")
        );
    }

    #[test]
    fn test_chain_rejects_terminator_with_data() {
        let mut bytes = blob();
        bytes.extend_from_slice(&[0x80, 0x01, 0xe6, 0x00, 0xaa]);
        let err = Chain::parse(&bytes).unwrap_err();
        assert_eq!(err, IntegrityError::BadSegmentChain("terminator carries data"));
    }

    #[test]
    fn test_stage2_blob_is_accepted() {
        check_stage2(&blob()).unwrap();
    }

    #[test]
    fn test_stage2_must_not_be_terminated() {
        let mut bytes = blob();
        push_terminator(&mut bytes, 0x0000);
        assert_eq!(
            check_stage2(&bytes).unwrap_err(),
            IntegrityError::BadSegmentChain("stage-2 blob already terminated")
        );
    }

    #[test]
    fn test_stage2_must_tile_exactly() {
        let mut bytes = blob();
        bytes.push(0x00);
        assert_eq!(
            check_stage2(&bytes).unwrap_err(),
            IntegrityError::BadSegmentChain("segment header out of bounds")
        );
    }

    #[test]
    fn test_segment_length_limit() {
        let data = vec![0u8; MAX_SEGMENT_DATA + 1];
        let mut builder = ConfigBuilder::new(opsis_header());
        assert_eq!(
            builder.segment(0, &data).unwrap_err(),
            ValueError::SegmentTooLong(MAX_SEGMENT_DATA + 1)
        );
    }
}
