// ecomp: Lossless compression of multiple sequence alignments.
//
// Copyright 2025 Tommi Mäklin [tommi@maklin.fi].
//
// Copyrights in this project are retained by contributors. No copyright assignment
// is required to contribute to this project.
//
// Except as otherwise noted (below and/or in individual files), this
// project is licensed under the Apache License, Version 2.0
// <LICENSE-APACHE> or <http://www.apache.org/licenses/LICENSE-2.0> or
// the MIT license, <LICENSE-MIT> or <http://opensource.org/licenses/MIT>,
// at your option.
//
use crate::error::Error;

/// Append `value` to `out` as a little-endian base-128 varint.
///
/// 7 data bits per byte, bit 7 set on all but the terminating byte. The
/// encoding is minimal: no trailing zero continuation bytes are emitted.
///
pub fn write_varint(
    mut value: u64,
    out: &mut Vec<u8>,
) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            out.push(byte | 0x80);
        } else {
            out.push(byte);
            break;
        }
    }
}

/// Read a varint from `bytes` starting at `*cursor`, advancing the cursor.
pub fn read_varint(
    bytes: &[u8],
    cursor: &mut usize,
) -> Result<u64, Error> {
    let mut shift: u32 = 0;
    let mut result: u64 = 0;
    loop {
        if *cursor >= bytes.len() {
            return Err(Error::MalformedArchive(format!(
                "varint truncated at byte offset {}", *cursor
            )));
        }
        let byte = bytes[*cursor];
        *cursor += 1;
        if shift == 63 && byte > 1 {
            return Err(Error::MalformedArchive(format!(
                "varint overflows 64 bits at byte offset {}", *cursor - 1
            )));
        }
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(Error::MalformedArchive(format!(
                "varint too long at byte offset {}", *cursor
            )));
        }
    }
}

/// Number of bytes `write_varint` would emit for `value`.
pub fn varint_len(
    value: u64,
) -> usize {
    let mut len = 1;
    let mut value = value >> 7;
    while value != 0 {
        len += 1;
        value >>= 7;
    }
    len
}
