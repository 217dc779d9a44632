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
use crate::alignment_from_rows;
use crate::error::Error;

/// Serialise `frame` as FASTA bytes, one line per sequence.
///
/// This is the byte form the gzip fallback compresses, so the layout is
/// fixed: `>id\n` followed by the unwrapped sequence and a newline.
///
pub fn frame_to_fasta(
    frame: &AlignmentFrame,
) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    for (id, row) in frame.ids.iter().zip(frame.rows.iter()) {
        out.push(b'>');
        out.extend_from_slice(id.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(row);
        out.push(b'\n');
    }
    out
}

/// Parse FASTA bytes into an alignment frame.
pub fn frame_from_fasta(
    bytes: &[u8],
) -> Result<AlignmentFrame, Error> {
    let mut reader = needletail::parse_fastx_reader(bytes).map_err(|err| {
        Error::MalformedInput(format!("FASTA parsing failed: {}", err))
    })?;

    let mut ids: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<u8>> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.map_err(|err| {
            Error::MalformedInput(format!("FASTA parsing failed: {}", err))
        })?;
        let id = std::str::from_utf8(record.id()).map_err(|_| {
            Error::MalformedInput("FASTA identifier is not valid UTF-8".to_string())
        })?;
        ids.push(id.to_string());
        rows.push(record.seq().to_vec());
    }

    alignment_from_rows(ids, rows)
}
