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
use crate::varint::read_varint;
use crate::varint::write_varint;

/// Supported encodings for a block's deviation bitmask.
///
/// The mode byte on the wire maps as:
///
///   - 0: raw bytes with trailing zeros trimmed
///   - 1: delta-coded varints over set bit positions
///   - 2: byte-level run-length pairs
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BitmaskMode {
    Raw,
    DeltaVarint,
    ByteRle,
}

impl BitmaskMode {
    pub fn to_u8(
        &self,
    ) -> u8 {
        match self {
            BitmaskMode::Raw => 0,
            BitmaskMode::DeltaVarint => 1,
            BitmaskMode::ByteRle => 2,
        }
    }

    pub fn from_u8(
        value: u8,
    ) -> Result<Self, Error> {
        match value {
            0 => Ok(BitmaskMode::Raw),
            1 => Ok(BitmaskMode::DeltaVarint),
            2 => Ok(BitmaskMode::ByteRle),
            _ => Err(Error::MalformedArchive(format!(
                "unknown bitmask mode byte {}", value
            ))),
        }
    }
}

/// Number of set bits in `mask`.
pub fn popcount(
    mask: &[u8],
) -> usize {
    mask.iter().map(|byte| byte.count_ones() as usize).sum()
}

/// Indices of set bits in ascending order (LSB-first within each byte).
pub fn set_positions(
    mask: &[u8],
) -> Vec<usize> {
    let mut positions: Vec<usize> = Vec::new();
    for (byte_idx, byte) in mask.iter().enumerate() {
        for bit_idx in 0..8 {
            if byte & (1 << bit_idx) != 0 {
                positions.push(byte_idx * 8 + bit_idx);
            }
        }
    }
    positions
}

fn encode_raw(
    mask: &[u8],
) -> Vec<u8> {
    let mut end = mask.len();
    while end > 0 && mask[end - 1] == 0 {
        end -= 1;
    }
    mask[..end].to_vec()
}

fn encode_delta_varint(
    mask: &[u8],
) -> Vec<u8> {
    let positions = set_positions(mask);
    let mut out: Vec<u8> = Vec::new();
    write_varint(positions.len() as u64, &mut out);
    let mut prev = 0_usize;
    for (idx, position) in positions.iter().enumerate() {
        let delta = if idx == 0 { *position } else { *position - prev };
        write_varint(delta as u64, &mut out);
        prev = *position;
    }
    out
}

fn encode_byte_rle(
    mask: &[u8],
) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    let mut iter = mask.iter().peekable();
    while let Some(byte) = iter.next() {
        let mut repeat: u8 = 1;
        while repeat < u8::MAX && iter.peek() == Some(&byte) {
            iter.next();
            repeat += 1;
        }
        out.push(*byte);
        out.push(repeat);
    }
    out
}

/// Encode `mask` with all three candidate modes and keep the shortest.
///
/// Ties prefer the lower mode number (raw, then delta-varint, then
/// byte-RLE).
///
pub fn encode_bitmask(
    mask: &[u8],
) -> (BitmaskMode, Vec<u8>) {
    let candidates = [
        (BitmaskMode::Raw, encode_raw(mask)),
        (BitmaskMode::DeltaVarint, encode_delta_varint(mask)),
        (BitmaskMode::ByteRle, encode_byte_rle(mask)),
    ];

    candidates
        .into_iter()
        .min_by_key(|(_, payload)| payload.len())
        .unwrap_or((BitmaskMode::Raw, Vec::new()))
}

/// Expand an encoded mask payload back to `mask_bytes` raw bytes.
pub fn decode_bitmask(
    mode: BitmaskMode,
    payload: &[u8],
    mask_bytes: usize,
) -> Result<Vec<u8>, Error> {
    match mode {
        BitmaskMode::Raw => {
            if payload.len() > mask_bytes {
                return Err(Error::MalformedArchive(format!(
                    "raw bitmask payload of {} bytes exceeds the {}-byte mask",
                    payload.len(), mask_bytes
                )));
            }
            let mut mask = payload.to_vec();
            mask.resize(mask_bytes, 0);
            Ok(mask)
        },
        BitmaskMode::DeltaVarint => {
            let mut cursor = 0;
            let count = read_varint(payload, &mut cursor)?;
            let mut mask: Vec<u8> = vec![0; mask_bytes];
            let mut position: u64 = 0;
            for idx in 0..count {
                let delta = read_varint(payload, &mut cursor)?;
                if idx > 0 && delta == 0 {
                    return Err(Error::MalformedArchive(
                        "bitmask delta of zero repeats a position".to_string(),
                    ));
                }
                position = if idx == 0 { delta } else { position + delta };
                if position >= mask_bytes as u64 * 8 {
                    return Err(Error::MalformedArchive(format!(
                        "bitmask position {} exceeds the {}-byte mask",
                        position, mask_bytes
                    )));
                }
                mask[position as usize / 8] |= 1 << (position as usize % 8);
            }
            if cursor != payload.len() {
                return Err(Error::MalformedArchive(
                    "bitmask delta payload contains trailing bytes".to_string(),
                ));
            }
            Ok(mask)
        },
        BitmaskMode::ByteRle => {
            let mut mask: Vec<u8> = Vec::with_capacity(mask_bytes);
            let mut cursor = 0;
            while cursor < payload.len() {
                if cursor + 2 > payload.len() {
                    return Err(Error::MalformedArchive(
                        "bitmask run-length pair truncated".to_string(),
                    ));
                }
                let value = payload[cursor];
                let repeat = payload[cursor + 1];
                cursor += 2;
                if repeat == 0 {
                    return Err(Error::MalformedArchive(
                        "bitmask run length of zero".to_string(),
                    ));
                }
                if mask.len() + repeat as usize > mask_bytes {
                    return Err(Error::MalformedArchive(format!(
                        "bitmask runs exceed the {}-byte mask", mask_bytes
                    )));
                }
                for _ in 0..repeat {
                    mask.push(value);
                }
            }
            if mask.len() != mask_bytes {
                return Err(Error::MalformedArchive(format!(
                    "bitmask runs cover {} of {} bytes", mask.len(), mask_bytes
                )));
            }
            Ok(mask)
        },
    }
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn empty_mask_encodes_to_raw_with_no_bytes() {
        use super::BitmaskMode;
        use super::encode_bitmask;

        let mask: Vec<u8> = vec![0, 0, 0];
        let (mode, payload) = encode_bitmask(&mask);

        assert_eq!(mode, BitmaskMode::Raw);
        assert!(payload.is_empty());
    }

    #[test]
    fn sparse_mask_prefers_delta_varint() {
        use super::BitmaskMode;
        use super::encode_bitmask;

        // One set bit in a 64-byte mask: raw trims to 40 bytes, RLE needs
        // several pairs, the delta coding needs two varints.
        let mut mask: Vec<u8> = vec![0; 64];
        mask[39] = 0b0001_0000;

        let (mode, payload) = encode_bitmask(&mask);

        assert_eq!(mode, BitmaskMode::DeltaVarint);
        assert_eq!(payload, vec![1, 0xBC, 0x02]);
    }

    #[test]
    fn repeated_bytes_prefer_rle() {
        use super::BitmaskMode;
        use super::encode_bitmask;

        let mask: Vec<u8> = vec![0xFF; 64];
        let (mode, payload) = encode_bitmask(&mask);

        assert_eq!(mode, BitmaskMode::ByteRle);
        assert_eq!(payload, vec![0xFF, 64]);
    }

    #[test]
    fn selection_ties_break_to_lower_mode() {
        use super::BitmaskMode;
        use super::encode_bitmask;

        // 0b0000_0001 in one byte: raw is 1 byte, delta is 2, RLE is 2.
        let (mode, _) = encode_bitmask(&[0b0000_0001]);
        assert_eq!(mode, BitmaskMode::Raw);
    }

    #[test]
    fn all_modes_round_trip() {
        use super::BitmaskMode;
        use super::decode_bitmask;
        use super::encode_raw;
        use super::encode_delta_varint;
        use super::encode_byte_rle;

        let masks: Vec<Vec<u8>> = vec![
            vec![0b1010_0101, 0, 0b0000_0001],
            vec![0; 5],
            vec![0xFF, 0xFF, 0x0F],
            vec![0b0000_0010],
        ];

        for expected in masks {
            let raw = encode_raw(&expected);
            let got = decode_bitmask(BitmaskMode::Raw, &raw, expected.len()).unwrap();
            assert_eq!(got, expected);

            let delta = encode_delta_varint(&expected);
            let got = decode_bitmask(BitmaskMode::DeltaVarint, &delta, expected.len()).unwrap();
            assert_eq!(got, expected);

            let rle = encode_byte_rle(&expected);
            let got = decode_bitmask(BitmaskMode::ByteRle, &rle, expected.len()).unwrap();
            assert_eq!(got, expected);
        }
    }

    #[test]
    fn selected_mode_is_minimal() {
        use rand::Rng;
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use super::encode_bitmask;
        use super::encode_raw;
        use super::encode_delta_varint;
        use super::encode_byte_rle;

        let mut rng = StdRng::seed_from_u64(0x5EED);

        for _ in 0..200 {
            let len = rng.gen_range(1..40);
            let density = rng.gen_range(0.0..1.0_f64);
            let mask: Vec<u8> = (0..len).map(|_| {
                let mut byte = 0_u8;
                for bit in 0..8 {
                    if rng.gen_bool(density) {
                        byte |= 1 << bit;
                    }
                }
                byte
            }).collect();

            let (_, selected) = encode_bitmask(&mask);

            assert!(selected.len() <= encode_raw(&mask).len());
            assert!(selected.len() <= encode_delta_varint(&mask).len());
            assert!(selected.len() <= encode_byte_rle(&mask).len());
        }
    }

    #[test]
    fn decode_rejects_out_of_range_position() {
        use super::BitmaskMode;
        use super::decode_bitmask;

        // Position 8 does not fit a single mask byte.
        let payload: Vec<u8> = vec![1, 8];

        assert!(decode_bitmask(BitmaskMode::DeltaVarint, &payload, 1).is_err());
    }

    #[test]
    fn decode_rejects_zero_gap() {
        use super::BitmaskMode;
        use super::decode_bitmask;

        let payload: Vec<u8> = vec![2, 1, 0];

        assert!(decode_bitmask(BitmaskMode::DeltaVarint, &payload, 1).is_err());
    }

    #[test]
    fn decode_rejects_overlong_rle() {
        use super::BitmaskMode;
        use super::decode_bitmask;

        let payload: Vec<u8> = vec![0xFF, 3];

        assert!(decode_bitmask(BitmaskMode::ByteRle, &payload, 2).is_err());
    }

    #[test]
    fn decode_rejects_incomplete_rle_coverage() {
        use super::BitmaskMode;
        use super::decode_bitmask;

        let payload: Vec<u8> = vec![0x01, 1];

        assert!(decode_bitmask(BitmaskMode::ByteRle, &payload, 2).is_err());
    }

    #[test]
    fn unknown_mode_byte_is_rejected() {
        use super::BitmaskMode;

        assert!(BitmaskMode::from_u8(3).is_err());
        assert_eq!(BitmaskMode::from_u8(1).unwrap(), BitmaskMode::DeltaVarint);
    }
}
