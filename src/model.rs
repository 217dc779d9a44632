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
use crate::bits::BitReader;
use crate::bits::BitWriter;
use crate::error::Error;
use crate::huffman;
use crate::huffman::CanonicalDecoder;
use crate::rle::Block;

use std::collections::BTreeMap;

/// Wire value for fixed-width symbol coding.
pub const MODE_FIXED_WIDTH: u8 = 0;
/// Wire value for canonical Huffman symbol coding.
pub const MODE_HUFFMAN: u8 = 1;

/// How one consensus symbol's deviation residues are coded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolCoding {
    /// Residues as local-alphabet indices of `bits` bits each.
    FixedWidth { bits: u8 },
    /// Canonical Huffman with one code length per local-alphabet symbol.
    Huffman { lengths: Vec<u8> },
}

/// Symbol model for the deviation stream of one consensus byte.
///
/// `alphabet` is the sorted set of residues ever paired with this
/// consensus anywhere in the alignment.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusModel {
    pub consensus: u8,
    pub alphabet: Vec<u8>,
    pub coding: SymbolCoding,
}

fn fixed_width_bits(
    alphabet_len: usize,
) -> u8 {
    let bits = if alphabet_len <= 1 {
        1
    } else {
        usize::BITS - (alphabet_len - 1).leading_zeros()
    };
    (bits as u8).clamp(1, 8)
}

impl ConsensusModel {
    fn index_of(
        &self,
        residue: u8,
    ) -> Option<usize> {
        self.alphabet.binary_search(&residue).ok()
    }

    /// Pack `residues` into the model's bitstream representation.
    pub fn encode_residues(
        &self,
        residues: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut writer = BitWriter::new();
        match &self.coding {
            SymbolCoding::FixedWidth { bits } => {
                for residue in residues {
                    let index = self.index_of(*residue).ok_or_else(|| Error::MalformedInput(format!(
                        "residue {:#04x} outside the local alphabet of consensus {:#04x}",
                        residue, self.consensus
                    )))?;
                    writer.write_bits(index as u32, *bits);
                }
            },
            SymbolCoding::Huffman { lengths } => {
                let codes = huffman::canonical_codes(lengths);
                for residue in residues {
                    let index = self.index_of(*residue).ok_or_else(|| Error::MalformedInput(format!(
                        "residue {:#04x} outside the local alphabet of consensus {:#04x}",
                        residue, self.consensus
                    )))?;
                    let (code, len) = codes[index];
                    writer.write_bits(u32::from(code), len);
                }
            },
        }
        Ok(writer.finish())
    }

    /// Unpack `count` residues from `bytes`.
    pub fn decode_residues(
        &self,
        bytes: &[u8],
        count: usize,
    ) -> Result<Vec<u8>, Error> {
        let mut reader = BitReader::new(bytes);
        let mut residues: Vec<u8> = Vec::with_capacity(count);
        match &self.coding {
            SymbolCoding::FixedWidth { bits } => {
                for _ in 0..count {
                    let index = reader.read_bits(*bits)? as usize;
                    if index >= self.alphabet.len() {
                        return Err(Error::MalformedArchive(format!(
                            "residue index {} outside the local alphabet of consensus {:#04x}",
                            index, self.consensus
                        )));
                    }
                    residues.push(self.alphabet[index]);
                }
            },
            SymbolCoding::Huffman { lengths } => {
                let decoder = CanonicalDecoder::new(lengths)?;
                for _ in 0..count {
                    let index = decoder.decode(&mut reader)?;
                    residues.push(self.alphabet[index]);
                }
            },
        }
        Ok(residues)
    }
}

/// Build one model per consensus byte that carries deviations.
///
/// Frequencies are tallied over the block residue streams, one count per
/// block occurrence. Fixed-width costs `count x bits` bits; Huffman costs
/// the coded stream plus 8 bits per transmitted code length. The smaller
/// estimate wins, ties going to fixed-width.
///
pub fn build_models(
    blocks: &[Block],
) -> Vec<ConsensusModel> {
    let mut counts: BTreeMap<u8, BTreeMap<u8, u64>> = BTreeMap::new();
    for block in blocks {
        if block.residues.is_empty() {
            continue;
        }
        let entry = counts.entry(block.consensus).or_default();
        for residue in &block.residues {
            *entry.entry(*residue).or_insert(0) += 1;
        }
    }

    counts.iter().map(|(consensus, residue_counts)| {
        let alphabet: Vec<u8> = residue_counts.keys().copied().collect();
        let frequencies: Vec<u64> = residue_counts.values().copied().collect();
        let total: u64 = frequencies.iter().sum();

        let bits = fixed_width_bits(alphabet.len());
        let fixed_cost = total * u64::from(bits);

        let coding = match huffman::code_lengths(&frequencies) {
            Some(lengths) => {
                let huffman_cost: u64 = frequencies
                    .iter()
                    .zip(lengths.iter())
                    .map(|(freq, len)| freq * u64::from(*len))
                    .sum::<u64>()
                    + 8 * alphabet.len() as u64;
                if huffman_cost < fixed_cost {
                    SymbolCoding::Huffman { lengths }
                } else {
                    SymbolCoding::FixedWidth { bits }
                }
            },
            None => SymbolCoding::FixedWidth { bits },
        };

        ConsensusModel { consensus: *consensus, alphabet, coding }
    }).collect()
}

/// Serialise the consensus model table (payload section 1).
pub fn write_model_table(
    models: &[ConsensusModel],
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    if models.len() > u8::MAX as usize {
        return Err(Error::MalformedInput(format!(
            "consensus model table holds {} entries, limit is {}",
            models.len(), u8::MAX
        )));
    }
    out.push(models.len() as u8);
    for model in models {
        out.push(model.consensus);
        match &model.coding {
            SymbolCoding::FixedWidth { bits } => {
                out.push(MODE_FIXED_WIDTH);
                out.push(model.alphabet.len() as u8);
                out.extend_from_slice(&model.alphabet);
                out.push(*bits);
            },
            SymbolCoding::Huffman { lengths } => {
                out.push(MODE_HUFFMAN);
                out.push(model.alphabet.len() as u8);
                out.extend_from_slice(&model.alphabet);
                out.extend_from_slice(lengths);
            },
        }
    }
    Ok(())
}

/// Parse the consensus model table, advancing `cursor`.
pub fn read_model_table(
    bytes: &[u8],
    cursor: &mut usize,
) -> Result<Vec<ConsensusModel>, Error> {
    let take = |cursor: &mut usize, n: usize, what: &str| -> Result<usize, Error> {
        if *cursor + n > bytes.len() {
            return Err(Error::MalformedArchive(format!(
                "model table truncated in {} at byte offset {}", what, *cursor
            )));
        }
        let start = *cursor;
        *cursor += n;
        Ok(start)
    };

    let at = take(cursor, 1, "entry count")?;
    let num_models = bytes[at] as usize;

    let mut models: Vec<ConsensusModel> = Vec::with_capacity(num_models);
    let mut seen = [false; 256];
    for _ in 0..num_models {
        let at = take(cursor, 3, "entry header")?;
        let consensus = bytes[at];
        let mode = bytes[at + 1];
        let alphabet_len = bytes[at + 2] as usize;

        if seen[consensus as usize] {
            return Err(Error::MalformedArchive(format!(
                "duplicate model for consensus {:#04x}", consensus
            )));
        }
        seen[consensus as usize] = true;

        if alphabet_len == 0 {
            return Err(Error::MalformedArchive(format!(
                "empty local alphabet for consensus {:#04x}", consensus
            )));
        }

        let at = take(cursor, alphabet_len, "local alphabet")?;
        let alphabet = bytes[at..at + alphabet_len].to_vec();

        let coding = match mode {
            MODE_FIXED_WIDTH => {
                let at = take(cursor, 1, "fixed width")?;
                let bits = bytes[at];
                if !(1..=8).contains(&bits) {
                    return Err(Error::MalformedArchive(format!(
                        "bits_per_symbol {} for consensus {:#04x} outside 1..=8",
                        bits, consensus
                    )));
                }
                SymbolCoding::FixedWidth { bits }
            },
            MODE_HUFFMAN => {
                let at = take(cursor, alphabet_len, "code lengths")?;
                let lengths = bytes[at..at + alphabet_len].to_vec();
                for len in &lengths {
                    if *len == 0 || *len > huffman::MAX_CODE_LENGTH {
                        return Err(Error::MalformedArchive(format!(
                            "Huffman length {} for consensus {:#04x} outside 1..={}",
                            len, consensus, huffman::MAX_CODE_LENGTH
                        )));
                    }
                }
                SymbolCoding::Huffman { lengths }
            },
            _ => {
                return Err(Error::MalformedArchive(format!(
                    "unknown consensus model mode byte {}", mode
                )));
            },
        };

        models.push(ConsensusModel { consensus, alphabet, coding });
    }

    Ok(models)
}
