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
use crate::consensus::ColumnProfile;

/// Longest run a single block can describe.
pub const MAX_RUN_LENGTH: u8 = u8::MAX;

/// A run of adjacent columns sharing one (consensus, deviation) pattern.
///
/// The bitmask holds one bit per row, LSB-first within each byte; bit i is
/// set iff row i deviates. `residues` are the deviating symbols in
/// row-ascending order, so `residues.len() == popcount(bitmask)` and bits
/// at or beyond the row count are always zero.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub run_length: u8,
    pub consensus: u8,
    pub bitmask: Vec<u8>,
    pub residues: Vec<u8>,
}

/// Bytes needed for one bit per row.
pub fn bitmask_len(
    num_rows: usize,
) -> usize {
    num_rows.div_ceil(8)
}

fn deviation_bitmask(
    deviations: &[(u32, u8)],
    num_rows: usize,
) -> Vec<u8> {
    let mut mask: Vec<u8> = vec![0; bitmask_len(num_rows)];
    for (row_idx, _) in deviations {
        mask[*row_idx as usize / 8] |= 1 << (*row_idx as usize % 8);
    }
    mask
}

/// Merge adjacent equivalent columns into run-length blocks.
///
/// Two columns are equivalent iff their consensus bytes match and their
/// deviation lists are equal pairwise. Runs longer than 255 columns split
/// into full blocks plus a remainder.
///
pub fn collect_blocks<I: Iterator>(
    profiles: I,
    num_rows: usize,
) -> Vec<Block> where I: Iterator<Item=ColumnProfile> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<(ColumnProfile, u8)> = None;

    for profile in profiles {
        current = match current {
            Some((prev, run)) if prev == profile && run < MAX_RUN_LENGTH => {
                Some((prev, run + 1))
            },
            Some((prev, run)) => {
                blocks.push(block_from_profile(&prev, run, num_rows));
                Some((profile, 1))
            },
            None => Some((profile, 1)),
        };
    }

    if let Some((prev, run)) = current {
        blocks.push(block_from_profile(&prev, run, num_rows));
    }

    blocks
}

fn block_from_profile(
    profile: &ColumnProfile,
    run_length: u8,
    num_rows: usize,
) -> Block {
    Block {
        run_length,
        consensus: profile.consensus,
        bitmask: deviation_bitmask(&profile.deviations, num_rows),
        residues: profile.deviations.iter().map(|(_, residue)| *residue).collect(),
    }
}
