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
use crate::error::Error;

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Longest code length the canonical tables accept.
pub const MAX_CODE_LENGTH: u8 = 15;

/// Derive prefix-free code lengths from symbol frequencies.
///
/// Frequencies are indexed by local-alphabet position and must all be
/// nonzero. Returns `None` when the alphabet is empty or the optimal tree
/// needs codes longer than [MAX_CODE_LENGTH]; callers fall back to
/// fixed-width coding in that case.
///
pub fn code_lengths(
    counts: &[u64],
) -> Option<Vec<u8>> {
    if counts.is_empty() {
        return None;
    }
    if counts.len() == 1 {
        return Some(vec![1]);
    }

    // Nodes: leaves first in alphabet order, then internal nodes. The
    // (weight, id) ordering keeps tree construction deterministic.
    let mut parents: Vec<usize> = vec![usize::MAX; counts.len()];
    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = counts
        .iter()
        .enumerate()
        .map(|(idx, count)| Reverse((*count, idx)))
        .collect();

    while heap.len() > 1 {
        let Reverse((weight_a, node_a)) = heap.pop()?;
        let Reverse((weight_b, node_b)) = heap.pop()?;
        let merged = parents.len();
        parents.push(usize::MAX);
        parents[node_a] = merged;
        parents[node_b] = merged;
        heap.push(Reverse((weight_a + weight_b, merged)));
    }

    let mut lengths: Vec<u8> = Vec::with_capacity(counts.len());
    for leaf in 0..counts.len() {
        let mut depth = 0_u8;
        let mut node = leaf;
        while parents[node] != usize::MAX {
            node = parents[node];
            depth += 1;
        }
        if depth > MAX_CODE_LENGTH {
            return None;
        }
        lengths.push(depth);
    }
    Some(lengths)
}

/// Canonical codewords for `lengths`, in local-alphabet order.
///
/// Symbols sort by (length ascending, alphabet index ascending) and equal
/// lengths take consecutive codewords, so the table is fully determined
/// by the lengths alone.
///
pub fn canonical_codes(
    lengths: &[u8],
) -> Vec<(u16, u8)> {
    let mut bl_count = [0_u32; MAX_CODE_LENGTH as usize + 1];
    for len in lengths {
        bl_count[*len as usize] += 1;
    }

    let mut next_code = [0_u32; MAX_CODE_LENGTH as usize + 1];
    let mut code = 0_u32;
    for bits in 1..=MAX_CODE_LENGTH as usize {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    lengths.iter().map(|len| {
        let code = next_code[*len as usize];
        next_code[*len as usize] += 1;
        (code as u16, *len)
    }).collect()
}

/// Canonical prefix-code decoder built from code lengths.
pub struct CanonicalDecoder {
    first_code: [u32; MAX_CODE_LENGTH as usize + 1],
    count: [u32; MAX_CODE_LENGTH as usize + 1],
    offset: [usize; MAX_CODE_LENGTH as usize + 1],
    // Local-alphabet indices sorted by (length, index).
    symbols: Vec<usize>,
}

impl CanonicalDecoder {
    pub fn new(
        lengths: &[u8],
    ) -> Result<Self, Error> {
        let mut count = [0_u32; MAX_CODE_LENGTH as usize + 1];
        for (idx, len) in lengths.iter().enumerate() {
            if *len == 0 || *len > MAX_CODE_LENGTH {
                return Err(Error::MalformedArchive(format!(
                    "Huffman code length {} for local symbol {} outside 1..={}",
                    len, idx, MAX_CODE_LENGTH
                )));
            }
            count[*len as usize] += 1;
        }

        // Reject over-subscribed length tables; they cannot form a prefix code.
        let mut kraft: u64 = 0;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            kraft += u64::from(count[bits]) << (MAX_CODE_LENGTH as usize - bits);
        }
        if kraft > 1 << MAX_CODE_LENGTH {
            return Err(Error::MalformedArchive(
                "Huffman code lengths oversubscribe the prefix code".to_string(),
            ));
        }

        let mut first_code = [0_u32; MAX_CODE_LENGTH as usize + 1];
        let mut code = 0_u32;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            code = (code + count[bits - 1]) << 1;
            first_code[bits] = code;
        }

        let mut symbols: Vec<usize> = (0..lengths.len()).collect();
        symbols.sort_by_key(|idx| (lengths[*idx], *idx));

        let mut offset = [0_usize; MAX_CODE_LENGTH as usize + 1];
        let mut running = 0_usize;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            offset[bits] = running;
            running += count[bits] as usize;
        }

        Ok(CanonicalDecoder { first_code, count, offset, symbols })
    }

    /// Decode one symbol, returning its local-alphabet index.
    pub fn decode(
        &self,
        reader: &mut BitReader,
    ) -> Result<usize, Error> {
        let mut code = 0_u32;
        for bits in 1..=MAX_CODE_LENGTH as usize {
            code = (code << 1) | u32::from(reader.read_bit()?);
            if self.count[bits] > 0 && code < self.first_code[bits] + self.count[bits] && code >= self.first_code[bits] {
                let index = self.offset[bits] + (code - self.first_code[bits]) as usize;
                return Ok(self.symbols[index]);
            }
        }
        Err(Error::MalformedArchive(
            "Huffman bitstream contains an invalid code".to_string(),
        ))
    }
}
