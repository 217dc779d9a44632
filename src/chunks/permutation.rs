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
use crate::compression::coders::deflate_zlib;
use crate::compression::coders::inflate_zlib;
use crate::error::Error;
use crate::varint::read_varint;
use crate::varint::write_varint;

/// Magic bytes opening the permutation chunk.
pub const MAGIC: &[u8; 4] = b"ECPE";

pub const VERSION: u8 = 1;

const FLAG_ZLIB: u8 = 0b0000_0001;
const WIDTH_SHIFT: u8 = 1;
const WIDTH_MASK: u8 = 0b0000_0110;

fn index_width(
    max_index: u32,
) -> u8 {
    if max_index <= u8::MAX as u32 {
        0
    } else if max_index <= u16::MAX as u32 {
        1
    } else {
        2
    }
}

fn pack_indices(
    permutation: &[u32],
    width: u8,
) -> Vec<u8> {
    let mut packed: Vec<u8> = Vec::new();
    for index in permutation {
        match width {
            0 => packed.push(*index as u8),
            1 => packed.extend_from_slice(&(*index as u16).to_be_bytes()),
            _ => packed.extend_from_slice(&index.to_be_bytes()),
        }
    }
    packed
}

/// Encode a row permutation as an `ECPE` chunk.
///
/// Indices are packed contiguously at the narrowest width that fits the
/// largest value; the packed form is zlib-compressed when that is smaller.
///
pub fn encode_permutation(
    permutation: &[u32],
) -> Result<Vec<u8>, Error> {
    let max_index = permutation.iter().copied().max().unwrap_or(0);
    let width = index_width(max_index);
    let packed = pack_indices(permutation, width);

    let mut flags = width << WIDTH_SHIFT;
    let mut payload = packed.clone();
    let compressed = deflate_zlib(&packed)?;
    if compressed.len() < packed.len() {
        flags |= FLAG_ZLIB;
        payload = compressed;
    }

    let mut chunk: Vec<u8> = Vec::with_capacity(payload.len() + 10);
    chunk.extend_from_slice(MAGIC);
    chunk.push(VERSION);
    chunk.push(flags);
    write_varint(permutation.len() as u64, &mut chunk);
    write_varint(payload.len() as u64, &mut chunk);
    chunk.extend_from_slice(&payload);
    Ok(chunk)
}

/// Decode an `ECPE` chunk starting at `*cursor`, advancing past it.
pub fn decode_permutation(
    bytes: &[u8],
    cursor: &mut usize,
) -> Result<Vec<u32>, Error> {
    if *cursor + MAGIC.len() + 2 > bytes.len() || &bytes[*cursor..*cursor + MAGIC.len()] != MAGIC {
        return Err(Error::MalformedArchive(format!(
            "permutation chunk magic missing at byte offset {}", *cursor
        )));
    }
    *cursor += MAGIC.len();
    let version = bytes[*cursor];
    *cursor += 1;
    if version != VERSION {
        return Err(Error::MalformedArchive(format!(
            "unsupported permutation chunk version {}", version
        )));
    }

    let flags = bytes[*cursor];
    *cursor += 1;
    let width = (flags & WIDTH_MASK) >> WIDTH_SHIFT;
    if width > 2 {
        return Err(Error::MalformedArchive(format!(
            "unknown permutation index width code {}", width
        )));
    }

    let count = read_varint(bytes, cursor)? as usize;
    let payload_len = read_varint(bytes, cursor)? as usize;
    if *cursor + payload_len > bytes.len() {
        return Err(Error::MalformedArchive(
            "permutation chunk length exceeds the payload size".to_string(),
        ));
    }
    let payload = &bytes[*cursor..*cursor + payload_len];
    *cursor += payload_len;

    let packed = if flags & FLAG_ZLIB != 0 {
        inflate_zlib(payload)?
    } else {
        payload.to_vec()
    };

    let bytes_per_index = match width {
        0 => 1,
        1 => 2,
        _ => 4,
    };
    if packed.len() != count * bytes_per_index {
        return Err(Error::MalformedArchive(format!(
            "permutation chunk holds {} bytes for {} indices of width {}",
            packed.len(), count, bytes_per_index
        )));
    }

    let permutation: Vec<u32> = packed
        .chunks_exact(bytes_per_index)
        .map(|chunk| match bytes_per_index {
            1 => u32::from(chunk[0]),
            2 => u32::from(u16::from_be_bytes([chunk[0], chunk[1]])),
            _ => u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
        })
        .collect();

    Ok(permutation)
}
