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
/// Most entries one dictionary section can hold.
pub const MAX_DICTIONARY_ENTRIES: usize = 255;

/// Bytes of a dictionary reference record: marker, id, run length.
pub const REFERENCE_RECORD_LEN: usize = 3;

/// Net bytes saved by putting a pattern in the dictionary.
///
/// A literal record spends marker + run length + pattern body; a reference
/// spends [REFERENCE_RECORD_LEN]. The dictionary entry itself costs one
/// pattern body.
///
fn net_benefit(
    body_len: usize,
    occurrences: u64,
) -> i64 {
    let literal = body_len as i64 + 2;
    let saved_per_use = literal - REFERENCE_RECORD_LEN as i64;
    occurrences as i64 * saved_per_use - body_len as i64
}

/// Pick dictionary entries from the observed block patterns.
///
/// `body_lens[i]` and `occurrences[i]` describe the i-th unique pattern in
/// first-appearance order. Returns the selected pattern indices in
/// descending benefit order, so the serialised entry order doubles as the
/// id assignment shared with the decoder. Patterns with no positive net
/// benefit never enter the dictionary.
///
pub fn select(
    body_lens: &[usize],
    occurrences: &[u64],
) -> Vec<usize> {
    let mut candidates: Vec<(usize, i64)> = body_lens
        .iter()
        .zip(occurrences.iter())
        .enumerate()
        .filter_map(|(idx, (body_len, count))| {
            let benefit = net_benefit(*body_len, *count);
            if benefit > 0 {
                Some((idx, benefit))
            } else {
                None
            }
        })
        .collect();

    // First-appearance order breaks benefit ties deterministically.
    candidates.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    candidates.truncate(MAX_DICTIONARY_ENTRIES);
    candidates.into_iter().map(|(idx, _)| idx).collect()
}
