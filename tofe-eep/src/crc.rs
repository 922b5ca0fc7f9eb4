// SPDX-FileCopyrightText: Copyright 2015-2022 TimVideos.us
//
// SPDX-License-Identifier: Apache-2.0

use crc::{Crc, CRC_8_SMBUS};

/// The checksum algorithm every record in the format uses.
///
/// Standard CRC-8: polynomial 0x07, initial value 0x00, no reflection, no
/// xor-out. The check word for `b"123456789"` is 0xF4.
const RECORD_CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// CRC-8 over a whole byte slice.
pub fn crc(bytes: &[u8]) -> u8 {
    RECORD_CRC8.checksum(bytes)
}

/// CRC-8 over a byte slice with the byte at `skip` left out.
///
/// Every record stores its own checksum inline, so the checksum is always
/// computed as if that one byte were removed from the record.
pub fn crc_excluding(bytes: &[u8], skip: usize) -> u8 {
    let mut digest = RECORD_CRC8.digest();
    digest.update(&bytes[..skip]);
    digest.update(&bytes[skip + 1..]);
    digest.finalize()
}
