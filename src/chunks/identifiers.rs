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
use crate::compression::coders::deflate_zstd;
use crate::compression::coders::inflate_zlib;
use crate::compression::coders::inflate_zstd;
use crate::error::Error;
use crate::varint::read_varint;
use crate::varint::write_varint;

/// Magic bytes opening the identifier chunk.
pub const MAGIC: &[u8; 4] = b"ECID";

/// Version emitted by the encoder. Version 1 (no inner mode byte) is
/// still accepted on read.
pub const VERSION: u8 = 2;

const MODE_RAW: u8 = 0;
const MODE_ZSTD: u8 = 1;
const MODE_ZLIB: u8 = 2;

fn plain_block(
    ids: &[String],
) -> Vec<u8> {
    let mut plain: Vec<u8> = Vec::new();
    write_varint(ids.len() as u64, &mut plain);
    for id in ids {
        write_varint(id.len() as u64, &mut plain);
        plain.extend_from_slice(id.as_bytes());
    }
    plain
}

fn parse_plain_block(
    bytes: &[u8],
    what: &str,
) -> Result<Vec<String>, Error> {
    let mut cursor = 0;
    let count = read_varint(bytes, &mut cursor)? as usize;
    let mut ids: Vec<String> = Vec::with_capacity(count);
    for _ in 0..count {
        let len = read_varint(bytes, &mut cursor)? as usize;
        if cursor + len > bytes.len() {
            return Err(Error::MalformedArchive(format!(
                "{}: identifier entry exceeds the declared block length", what
            )));
        }
        let id = std::str::from_utf8(&bytes[cursor..cursor + len]).map_err(|_| {
            Error::MalformedArchive(format!("{}: identifier is not valid UTF-8", what))
        })?;
        cursor += len;
        ids.push(id.to_string());
    }
    if cursor != bytes.len() {
        return Err(Error::MalformedArchive(format!(
            "{}: identifier block contains trailing data", what
        )));
    }
    Ok(ids)
}

/// Encode row identifiers as an `ECID` version 2 chunk.
///
/// The inner block is raced against zstd and zlib; the smallest form wins
/// and its mode byte is recorded ahead of the block.
///
pub fn encode_sequence_ids(
    ids: &[String],
) -> Result<Vec<u8>, Error> {
    let plain = plain_block(ids);

    let mut mode = MODE_RAW;
    let mut block = plain.clone();

    let compressed = deflate_zstd(&plain)?;
    if compressed.len() + 1 < block.len() {
        mode = MODE_ZSTD;
        block = compressed;
    }

    if mode == MODE_RAW {
        let compressed = deflate_zlib(&plain)?;
        if compressed.len() + 1 < block.len() {
            mode = MODE_ZLIB;
            block = compressed;
        }
    }

    let mut chunk: Vec<u8> = Vec::with_capacity(block.len() + 8);
    chunk.extend_from_slice(MAGIC);
    chunk.push(VERSION);
    write_varint(1 + block.len() as u64, &mut chunk);
    chunk.push(mode);
    chunk.extend_from_slice(&block);
    Ok(chunk)
}

/// Decode an `ECID` chunk starting at `*cursor`, advancing past it.
pub fn decode_sequence_ids(
    bytes: &[u8],
    cursor: &mut usize,
) -> Result<Vec<String>, Error> {
    if *cursor + MAGIC.len() + 1 > bytes.len() || &bytes[*cursor..*cursor + MAGIC.len()] != MAGIC {
        return Err(Error::MalformedArchive(format!(
            "identifier chunk magic missing at byte offset {}", *cursor
        )));
    }
    *cursor += MAGIC.len();
    let version = bytes[*cursor];
    *cursor += 1;

    let block_len = read_varint(bytes, cursor)? as usize;
    if *cursor + block_len > bytes.len() {
        return Err(Error::MalformedArchive(
            "identifier chunk length exceeds the payload size".to_string(),
        ));
    }
    let block = &bytes[*cursor..*cursor + block_len];
    *cursor += block_len;

    match version {
        1 => parse_plain_block(block, "identifier chunk v1"),
        2 => {
            if block.is_empty() {
                return Err(Error::MalformedArchive(
                    "identifier chunk missing mode byte".to_string(),
                ));
            }
            let plain = match block[0] {
                MODE_RAW => block[1..].to_vec(),
                MODE_ZSTD => inflate_zstd(&block[1..])?,
                MODE_ZLIB => inflate_zlib(&block[1..])?,
                mode => {
                    return Err(Error::MalformedArchive(format!(
                        "unknown identifier compression mode {}", mode
                    )));
                },
            };
            parse_plain_block(&plain, "identifier chunk v2")
        },
        version => Err(Error::MalformedArchive(format!(
            "unsupported identifier chunk version {}", version
        ))),
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn short_id_list_round_trips_raw() {
        use super::MODE_RAW;
        use super::decode_sequence_ids;
        use super::encode_sequence_ids;

        let expected: Vec<String> = vec!["s1".to_string(), "s2".to_string(), "s3".to_string()];

        let chunk = encode_sequence_ids(&expected).unwrap();

        // Magic, version, block length varint, then the raw mode byte.
        assert_eq!(&chunk[0..4], b"ECID");
        assert_eq!(chunk[4], 2);
        assert_eq!(chunk[6], MODE_RAW);

        let mut cursor = 0;
        let got = decode_sequence_ids(&chunk, &mut cursor).unwrap();

        assert_eq!(got, expected);
        assert_eq!(cursor, chunk.len());
    }

    #[test]
    fn long_repetitive_ids_compress() {
        use super::MODE_RAW;
        use super::decode_sequence_ids;
        use super::encode_sequence_ids;

        let expected: Vec<String> = (0..200).map(|idx| format!("sample_accession_{:06}", idx)).collect();

        let chunk = encode_sequence_ids(&expected).unwrap();

        // The plain block spans ~4.6 KiB of near-identical names; one of
        // the compressed modes must have won the race.
        let mut cursor = 5;
        let block_len = crate::varint::read_varint(&chunk, &mut cursor).unwrap() as usize;
        assert_ne!(chunk[cursor], MODE_RAW);
        assert!(block_len < 4000);

        let mut cursor = 0;
        let got = decode_sequence_ids(&chunk, &mut cursor).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn version_1_chunks_are_still_read() {
        use crate::varint::write_varint;
        use super::decode_sequence_ids;

        // A version 1 chunk has no mode byte: the block is the plain
        // varint-framed identifier list.
        let mut block: Vec<u8> = Vec::new();
        write_varint(2, &mut block);
        write_varint(4, &mut block);
        block.extend_from_slice(b"seqA");
        write_varint(4, &mut block);
        block.extend_from_slice(b"seqB");

        let mut chunk: Vec<u8> = b"ECID".to_vec();
        chunk.push(1);
        write_varint(block.len() as u64, &mut chunk);
        chunk.extend_from_slice(&block);

        let mut cursor = 0;
        let got = decode_sequence_ids(&chunk, &mut cursor).unwrap();

        let expected: Vec<String> = vec!["seqA".to_string(), "seqB".to_string()];
        assert_eq!(got, expected);
    }

    #[test]
    fn empty_id_list_round_trips() {
        use super::decode_sequence_ids;
        use super::encode_sequence_ids;

        let expected: Vec<String> = Vec::new();

        let chunk = encode_sequence_ids(&expected).unwrap();
        let mut cursor = 0;
        let got = decode_sequence_ids(&chunk, &mut cursor).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn missing_magic_is_rejected() {
        use super::decode_sequence_ids;

        let bytes: Vec<u8> = b"ECXX\x02\x01\x00".to_vec();
        let mut cursor = 0;

        assert!(decode_sequence_ids(&bytes, &mut cursor).is_err());
    }

    #[test]
    fn unsupported_version_is_rejected() {
        use super::decode_sequence_ids;

        let bytes: Vec<u8> = b"ECID\x03\x01\x00".to_vec();
        let mut cursor = 0;

        assert!(decode_sequence_ids(&bytes, &mut cursor).is_err());
    }

    #[test]
    fn truncated_block_is_rejected() {
        use super::decode_sequence_ids;

        // Declares a 100-byte block but provides 1.
        let bytes: Vec<u8> = b"ECID\x02\x64\x00".to_vec();
        let mut cursor = 0;

        assert!(decode_sequence_ids(&bytes, &mut cursor).is_err());
    }

    #[test]
    fn non_utf8_identifier_is_rejected() {
        use crate::varint::write_varint;
        use super::decode_sequence_ids;

        let mut block: Vec<u8> = Vec::new();
        write_varint(1, &mut block);
        write_varint(2, &mut block);
        block.extend_from_slice(&[0xFF, 0xFE]);

        let mut chunk: Vec<u8> = b"ECID".to_vec();
        chunk.push(1);
        write_varint(block.len() as u64, &mut chunk);
        chunk.extend_from_slice(&block);

        let mut cursor = 0;
        assert!(decode_sequence_ids(&chunk, &mut cursor).is_err());
    }
}
