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
use crate::bitmask;
use crate::bitmask::BitmaskMode;
use crate::dictionary;
use crate::error::Error;
use crate::model;
use crate::model::ConsensusModel;
use crate::rle::Block;
use crate::rle::bitmask_len;
use crate::varint::read_varint;
use crate::varint::varint_len;
use crate::varint::write_varint;

use std::collections::HashMap;

const MARKER_LITERAL: u8 = 0;
const MARKER_REFERENCE: u8 = 1;

/// One block pattern in wire form: encoded bitmask plus the residue
/// payload packed with the consensus's symbol model.
struct EncodedPattern {
    consensus: u8,
    mask_mode: BitmaskMode,
    deviation_count: usize,
    mask_payload: Vec<u8>,
    residue_payload: Vec<u8>,
}

impl EncodedPattern {
    fn body_len(
        &self,
    ) -> usize {
        2 + varint_len(self.deviation_count as u64)
            + varint_len(self.mask_payload.len() as u64)
            + self.mask_payload.len()
            + 2
            + self.residue_payload.len()
    }

    fn write_body(
        &self,
        out: &mut Vec<u8>,
    ) {
        out.push(self.consensus);
        out.push(self.mask_mode.to_u8());
        write_varint(self.deviation_count as u64, out);
        write_varint(self.mask_payload.len() as u64, out);
        out.extend_from_slice(&self.mask_payload);
        out.extend_from_slice(&(self.residue_payload.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.residue_payload);
    }
}

fn encode_pattern(
    block: &Block,
    models: &[ConsensusModel],
    model_index: &[Option<usize>; 256],
) -> Result<EncodedPattern, Error> {
    let (mask_mode, mask_payload) = bitmask::encode_bitmask(&block.bitmask);

    let residue_payload = if block.residues.is_empty() {
        Vec::new()
    } else {
        let index = model_index[block.consensus as usize].ok_or_else(|| Error::MalformedInput(format!(
            "block encoder: no symbol model for consensus {:#04x}", block.consensus
        )))?;
        models[index].encode_residues(&block.residues)?
    };

    if residue_payload.len() > u16::MAX as usize {
        return Err(Error::MalformedInput(format!(
            "block encoder: residue payload of {} bytes exceeds the 16-bit length field",
            residue_payload.len()
        )));
    }

    Ok(EncodedPattern {
        consensus: block.consensus,
        mask_mode,
        deviation_count: block.residues.len(),
        mask_payload,
        residue_payload,
    })
}

/// Serialise run-length blocks into the payload block stream.
///
/// Layout: consensus model table, dictionary section, 4-byte big-endian
/// block count, then marker-discriminated literal and reference records.
///
pub fn encode_blocks(
    blocks: &[Block],
    num_rows: usize,
) -> Result<Vec<u8>, Error> {
    encode_blocks_impl(blocks, num_rows, true)
}

fn encode_blocks_impl(
    blocks: &[Block],
    num_rows: usize,
    with_dictionary: bool,
) -> Result<Vec<u8>, Error> {
    if blocks.len() > u32::MAX as usize {
        return Err(Error::MalformedInput(format!(
            "block encoder: {} blocks exceed the 32-bit block count", blocks.len()
        )));
    }
    if let Some(block_idx) = blocks.iter().position(|block| block.bitmask.len() != bitmask_len(num_rows)) {
        return Err(Error::MalformedInput(format!(
            "block encoder: block {} carries a {}-byte bitmask for a {}-row alignment",
            block_idx, blocks[block_idx].bitmask.len(), num_rows
        )));
    }

    let models = model::build_models(blocks);
    let mut model_index: [Option<usize>; 256] = [None; 256];
    for (index, entry) in models.iter().enumerate() {
        model_index[entry.consensus as usize] = Some(index);
    }

    // Unique patterns in first-appearance order; run lengths are not part
    // of the pattern key.
    let mut pattern_ids: HashMap<(u8, Vec<u8>, Vec<u8>), usize> = HashMap::new();
    let mut patterns: Vec<EncodedPattern> = Vec::new();
    let mut occurrences: Vec<u64> = Vec::new();
    let mut block_patterns: Vec<usize> = Vec::with_capacity(blocks.len());

    for block in blocks {
        let key = (block.consensus, block.bitmask.clone(), block.residues.clone());
        let pattern_idx = match pattern_ids.get(&key) {
            Some(index) => *index,
            None => {
                let index = patterns.len();
                patterns.push(encode_pattern(block, &models, &model_index)?);
                occurrences.push(0);
                pattern_ids.insert(key, index);
                index
            },
        };
        occurrences[pattern_idx] += 1;
        block_patterns.push(pattern_idx);
    }

    let body_lens: Vec<usize> = patterns.iter().map(|pattern| pattern.body_len()).collect();
    let selected = if with_dictionary {
        dictionary::select(&body_lens, &occurrences)
    } else {
        Vec::new()
    };

    let mut dictionary_ids: Vec<Option<u8>> = vec![None; patterns.len()];
    for (id, pattern_idx) in selected.iter().enumerate() {
        dictionary_ids[*pattern_idx] = Some(id as u8);
    }

    let mut payload: Vec<u8> = Vec::new();
    model::write_model_table(&models, &mut payload)?;

    payload.push(selected.len() as u8);
    for pattern_idx in &selected {
        patterns[*pattern_idx].write_body(&mut payload);
    }

    payload.extend_from_slice(&(blocks.len() as u32).to_be_bytes());
    for (block, pattern_idx) in blocks.iter().zip(block_patterns.iter()) {
        match dictionary_ids[*pattern_idx] {
            Some(id) => {
                payload.push(MARKER_REFERENCE);
                payload.push(id);
                payload.push(block.run_length);
            },
            None => {
                payload.push(MARKER_LITERAL);
                payload.push(block.run_length);
                patterns[*pattern_idx].write_body(&mut payload);
            },
        }
    }

    Ok(payload)
}

fn take<'a>(
    bytes: &'a [u8],
    cursor: &mut usize,
    n: usize,
    what: &str,
) -> Result<&'a [u8], Error> {
    if *cursor + n > bytes.len() {
        return Err(Error::MalformedArchive(format!(
            "block stream truncated in {} at byte offset {}", what, *cursor
        )));
    }
    let slice = &bytes[*cursor..*cursor + n];
    *cursor += n;
    Ok(slice)
}

fn read_pattern(
    bytes: &[u8],
    cursor: &mut usize,
    num_rows: usize,
    models: &[ConsensusModel],
    model_index: &[Option<usize>; 256],
    what: &str,
) -> Result<(u8, Vec<u8>, Vec<u8>), Error> {
    let header = take(bytes, cursor, 2, what)?;
    let consensus = header[0];
    let mask_mode = BitmaskMode::from_u8(header[1])?;

    let deviation_count = read_varint(bytes, cursor)? as usize;
    let mask_len = read_varint(bytes, cursor)? as usize;
    let mask_payload = take(bytes, cursor, mask_len, what)?;
    let mask = bitmask::decode_bitmask(mask_mode, mask_payload, bitmask_len(num_rows))?;

    if bitmask::popcount(&mask) != deviation_count {
        return Err(Error::MalformedArchive(format!(
            "{}: bitmask popcount {} does not match deviation count {}",
            what, bitmask::popcount(&mask), deviation_count
        )));
    }
    if let Some(position) = bitmask::set_positions(&mask).last() {
        if *position >= num_rows {
            return Err(Error::MalformedArchive(format!(
                "{}: deviation row {} outside the {}-row alignment",
                what, position, num_rows
            )));
        }
    }

    let residue_len_bytes = take(bytes, cursor, 2, what)?;
    let residue_len = u16::from_be_bytes([residue_len_bytes[0], residue_len_bytes[1]]) as usize;
    let residue_payload = take(bytes, cursor, residue_len, what)?;

    let residues = if deviation_count == 0 {
        if residue_len != 0 {
            return Err(Error::MalformedArchive(format!(
                "{}: residue payload without deviations", what
            )));
        }
        Vec::new()
    } else {
        let index = model_index[consensus as usize].ok_or_else(|| Error::MalformedArchive(format!(
            "{}: no symbol model for consensus {:#04x}", what, consensus
        )))?;
        models[index].decode_residues(residue_payload, deviation_count)?
    };

    Ok((consensus, mask, residues))
}

/// Parse the payload block stream back into run-length blocks.
///
/// All structural validation happens here; callers only expand validated
/// blocks into columns afterwards.
///
pub fn decode_blocks(
    bytes: &[u8],
    cursor: &mut usize,
    num_rows: usize,
) -> Result<Vec<Block>, Error> {
    let models = model::read_model_table(bytes, cursor)?;
    let mut model_index: [Option<usize>; 256] = [None; 256];
    for (index, entry) in models.iter().enumerate() {
        model_index[entry.consensus as usize] = Some(index);
    }

    let dict_size = take(bytes, cursor, 1, "dictionary size")?[0] as usize;
    let mut patterns: Vec<(u8, Vec<u8>, Vec<u8>)> = Vec::with_capacity(dict_size);
    for _ in 0..dict_size {
        patterns.push(read_pattern(bytes, cursor, num_rows, &models, &model_index, "dictionary entry")?);
    }

    let count_bytes = take(bytes, cursor, 4, "block count")?;
    let block_count = u32::from_be_bytes([count_bytes[0], count_bytes[1], count_bytes[2], count_bytes[3]]) as usize;

    let mut blocks: Vec<Block> = Vec::with_capacity(block_count);
    for block_idx in 0..block_count {
        let marker = take(bytes, cursor, 1, "block marker")?[0];
        match marker {
            MARKER_REFERENCE => {
                let record = take(bytes, cursor, 2, "reference record")?;
                let id = record[0] as usize;
                let run_length = record[1];
                if id >= patterns.len() {
                    return Err(Error::MalformedArchive(format!(
                        "block {}: dictionary id {} out of range (dictionary holds {})",
                        block_idx, id, patterns.len()
                    )));
                }
                if run_length == 0 {
                    return Err(Error::MalformedArchive(format!(
                        "block {}: run length of zero", block_idx
                    )));
                }
                let (consensus, mask, residues) = patterns[id].clone();
                blocks.push(Block { run_length, consensus, bitmask: mask, residues });
            },
            MARKER_LITERAL => {
                let run_length = take(bytes, cursor, 1, "literal record")?[0];
                if run_length == 0 {
                    return Err(Error::MalformedArchive(format!(
                        "block {}: run length of zero", block_idx
                    )));
                }
                let (consensus, mask, residues) = read_pattern(bytes, cursor, num_rows, &models, &model_index, "literal record")?;
                blocks.push(Block { run_length, consensus, bitmask: mask, residues });
            },
            _ => {
                return Err(Error::MalformedArchive(format!(
                    "block {}: unknown marker byte {}", block_idx, marker
                )));
            },
        }
    }

    Ok(blocks)
}

// Tests
#[cfg(test)]
mod tests {

    fn deviation_block(
        run_length: u8,
        consensus: u8,
        row: usize,
        residue: u8,
        num_rows: usize,
    ) -> crate::rle::Block {
        let mut bitmask: Vec<u8> = vec![0; crate::rle::bitmask_len(num_rows)];
        bitmask[row / 8] |= 1 << (row % 8);
        crate::rle::Block {
            run_length,
            consensus,
            bitmask,
            residues: vec![residue],
        }
    }

    #[test]
    fn constant_alignment_payload_bytes() {
        use super::encode_blocks;

        let blocks = vec![crate::rle::Block {
            run_length: 4,
            consensus: b'A',
            bitmask: vec![0],
            residues: Vec::new(),
        }];

        let got = encode_blocks(&blocks, 3).unwrap();

        // No models, no dictionary, one literal record with an empty
        // trimmed mask and no residues.
        let expected: Vec<u8> = vec![
            0,              // model table: 0 entries
            0,              // dictionary: 0 entries
            0, 0, 0, 1,     // block count
            0,              // literal marker
            4,              // run length
            b'A',           // consensus
            0,              // bitmask mode: raw
            0,              // deviation count
            0,              // mask payload length
            0, 0,           // residue payload length
        ];

        assert_eq!(got, expected);
    }

    #[test]
    fn blocks_round_trip_without_dictionary() {
        use super::decode_blocks;
        use super::encode_blocks;

        let blocks = vec![
            crate::rle::Block {
                run_length: 200,
                consensus: b'A',
                bitmask: vec![0, 0],
                residues: Vec::new(),
            },
            deviation_block(1, b'T', 2, b'A', 10),
            deviation_block(7, b'G', 9, b'C', 10),
        ];

        let payload = encode_blocks(&blocks, 10).unwrap();

        let mut cursor = 0;
        let got = decode_blocks(&payload, &mut cursor, 10).unwrap();

        assert_eq!(got, blocks);
        assert_eq!(cursor, payload.len());
    }

    #[test]
    fn repeated_patterns_round_trip_through_dictionary() {
        use super::MARKER_REFERENCE;
        use super::decode_blocks;
        use super::encode_blocks;

        // The same deviation pattern appears in 40 separate runs, split by
        // a constant block so the runs cannot merge.
        let mut blocks: Vec<crate::rle::Block> = Vec::new();
        for _ in 0..40 {
            blocks.push(deviation_block(3, b'A', 5, b'T', 12));
            blocks.push(crate::rle::Block {
                run_length: 1,
                consensus: b'C',
                bitmask: vec![0, 0],
                residues: Vec::new(),
            });
        }

        let payload = encode_blocks(&blocks, 12).unwrap();

        let mut cursor = 0;
        let got = decode_blocks(&payload, &mut cursor, 12).unwrap();

        assert_eq!(got, blocks);

        // Both repeated patterns enter the dictionary: the model table for
        // consensus 'A' spans 6 bytes, so the dictionary size byte sits at
        // offset 6.
        assert_eq!(payload[6], 2);
        // With both patterns in the dictionary every record is a 3-byte
        // reference ending in its run length.
        assert_eq!(*payload.last().unwrap(), 1);
        assert_eq!(payload[payload.len() - 3], MARKER_REFERENCE);
    }

    #[test]
    fn dictionary_never_inflates_the_payload() {
        use super::encode_blocks_impl;

        let mut blocks: Vec<crate::rle::Block> = Vec::new();
        for idx in 0..30 {
            blocks.push(deviation_block(2, b'A', idx % 8, b'T', 8));
        }

        let with_dict = encode_blocks_impl(&blocks, 8, true).unwrap();
        let without_dict = encode_blocks_impl(&blocks, 8, false).unwrap();

        assert!(with_dict.len() <= without_dict.len());
    }

    #[test]
    fn decode_rejects_unknown_marker() {
        use super::decode_blocks;

        let bytes: Vec<u8> = vec![
            0,              // no models
            0,              // no dictionary
            0, 0, 0, 1,     // one block
            9,              // bogus marker
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 4);

        assert!(got.is_err());
    }

    #[test]
    fn decode_rejects_out_of_range_dictionary_id() {
        use super::decode_blocks;

        let bytes: Vec<u8> = vec![
            0,              // no models
            0,              // no dictionary
            0, 0, 0, 1,     // one block
            1, 0, 5,        // reference to id 0 in an empty dictionary
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 4);

        assert!(got.is_err());
        let message = format!("{}", got.unwrap_err());
        assert!(message.contains("dictionary id"));
    }

    #[test]
    fn decode_rejects_popcount_mismatch() {
        use super::decode_blocks;

        let bytes: Vec<u8> = vec![
            1, b'A', 0, 1, b'T', 1,     // model: consensus A, fixed 1 bit
            0,                          // no dictionary
            0, 0, 0, 1,                 // one block
            0,                          // literal marker
            1,                          // run length
            b'A',                       // consensus
            0,                          // raw bitmask
            2,                          // claims two deviations
            1, 0b0000_0001,             // mask has one set bit
            0, 1, 0,                    // one residue byte
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 4);

        assert!(got.is_err());
        let message = format!("{}", got.unwrap_err());
        assert!(message.contains("popcount"));
    }

    #[test]
    fn decode_rejects_deviation_row_beyond_alignment() {
        use super::decode_blocks;

        // Mask bit 5 set in a 3-row alignment.
        let bytes: Vec<u8> = vec![
            1, b'A', 0, 1, b'T', 1,     // model
            0,                          // no dictionary
            0, 0, 0, 1,                 // one block
            0,                          // literal marker
            1,                          // run length
            b'A',                       // consensus
            0,                          // raw bitmask
            1,                          // one deviation
            1, 0b0010_0000,             // set bit 5
            0, 1, 0,                    // residue payload
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 3);

        assert!(got.is_err());
    }

    #[test]
    fn decode_rejects_missing_model() {
        use super::decode_blocks;

        let bytes: Vec<u8> = vec![
            0,                          // no models
            0,                          // no dictionary
            0, 0, 0, 1,                 // one block
            0,                          // literal marker
            1,                          // run length
            b'A',                       // consensus
            0,                          // raw bitmask
            1,                          // one deviation
            1, 0b0000_0001,             // set bit 0
            0, 1, 0,                    // residue payload
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 4);

        assert!(got.is_err());
        let message = format!("{}", got.unwrap_err());
        assert!(message.contains("model"));
    }

    #[test]
    fn decode_rejects_truncated_stream() {
        use super::decode_blocks;

        let bytes: Vec<u8> = vec![
            0,              // no models
            0,              // no dictionary
            0, 0, 0, 2,     // two blocks promised
            0, 4, b'A', 0, 0, 0, 0, 0,  // one literal delivered
        ];

        let mut cursor = 0;
        let got = decode_blocks(&bytes, &mut cursor, 3);

        assert!(got.is_err());
    }
}
