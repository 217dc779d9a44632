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
use crate::AlignmentFrame;

/// Consensus symbol and deviations for a single alignment column.
///
/// Deviations are sorted by ascending row index and never contain the
/// consensus symbol.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnProfile {
    pub consensus: u8,
    pub deviations: Vec<(u32, u8)>,
}

/// Lazily yields one [ColumnProfile] per alignment column.
///
/// The majority symbol wins; ties break to the lowest byte value so the
/// profile is reproducible. Gap and ambiguity symbols tally like any
/// other byte.
///
pub struct ColumnProfiles<'a> {
    rows: &'a [Vec<u8>],
    column: usize,
    length: usize,
}

impl<'a> ColumnProfiles<'a> {
    pub fn new(
        frame: &'a AlignmentFrame,
    ) -> Self {
        ColumnProfiles {
            rows: &frame.rows,
            column: 0,
            length: frame.alignment_length(),
        }
    }
}

impl Iterator for ColumnProfiles<'_> {
    type Item = ColumnProfile;

    fn next(
        &mut self,
    ) -> Option<Self::Item> {
        if self.column >= self.length {
            return None;
        }

        let mut counts = [0_u32; 256];
        for row in self.rows {
            counts[row[self.column] as usize] += 1;
        }

        // Ascending byte order makes the lowest byte win count ties.
        let mut consensus = 0_u8;
        let mut best = 0_u32;
        for (symbol, count) in counts.iter().enumerate() {
            if *count > best {
                best = *count;
                consensus = symbol as u8;
            }
        }

        let deviations: Vec<(u32, u8)> = self.rows.iter().enumerate().filter_map(|(row_idx, row)| {
            let symbol = row[self.column];
            if symbol != consensus {
                Some((row_idx as u32, symbol))
            } else {
                None
            }
        }).collect();

        self.column += 1;
        Some(ColumnProfile { consensus, deviations })
    }

    fn size_hint(
        &self,
    ) -> (usize, Option<usize>) {
        let remaining = self.length - self.column;
        (remaining, Some(remaining))
    }
}

/// Profile every column of `frame` into an owned vector.
pub fn collect_column_profiles(
    frame: &AlignmentFrame,
) -> Vec<ColumnProfile> {
    ColumnProfiles::new(frame).collect()
}
