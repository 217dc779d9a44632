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

//! ecomp is a library and a command-line client for losslessly compressing
//! multiple sequence alignments into a compact self-describing archive.
//!
//! ecomp supports the following three operations:
//!   - `ecomp encode` compress an alignment into a `.ecomp` archive, or
//!     an alignment plus its Newick tree into a `.ecbt` bundle.
//!   - `ecomp decode` reconstruct the original alignment (and tree)
//!     byte-for-byte.
//!   - `ecomp inspect` print the metadata document of an archive.
//!
//! The codec models each alignment column as a consensus symbol plus
//! sparse deviations, merges runs of equivalent adjacent columns,
//! dictionary-codes frequent block patterns, and races generic outer
//! coders over the structural payload. When a plain gzip of the input
//! beats the structural codec, the gzip stream ships instead and the
//! metadata records the substitution. Alignments with an associated
//! phylogeny can instead be co-compressed through [phylo], which stores
//! parsimony-assigned ancestral sequences as parent diffs along the
//! tree.
//!
//! Archives are accompanied by a structured JSON metadata document; both
//! byte streams are produced and consumed through [compress_alignment]
//! and [decompress_alignment], or through the `Read`/`Write` helpers
//! [encode_to_std_write] and [decode_from_std_read].

use std::collections::HashSet;
use std::io::Read;
use std::io::Write;

pub mod bitmask;
pub mod bits;
pub mod chunks;
pub mod compression;
pub mod consensus;
pub mod dictionary;
pub mod encoding;
pub mod error;
pub mod fasta;
pub mod headers;
pub mod huffman;
pub mod metadata;
pub mod model;
pub mod pack;
pub mod phylo;
pub mod rle;
pub mod storage;
pub mod unpack;
pub mod varint;

pub use error::Error;
pub use metadata::Metadata;
pub use pack::CompressedAlignment;
pub use pack::EncodeOptions;
pub use pack::compress_alignment;
pub use unpack::decompress_alignment;

/// Version written into archive headers and metadata documents.
pub const FORMAT_VERSION: &str = "1.0.0";

/// [FORMAT_VERSION] split into header bytes. Decoders require a matching
/// major version; minor and patch are informational.
pub const FORMAT_VERSION_TUPLE: (u8, u8, u8) = (1, 0, 0);

/// An alignment held in memory: ordered rows of ASCII residue symbols
/// with per-row identifiers.
///
/// All rows have the same length and identifiers are unique; [validate]
/// checks both before any encoding work starts.
///
/// [validate]: AlignmentFrame::validate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentFrame {
    /// Row identifiers, order-significant.
    pub ids: Vec<String>,
    /// Residue rows over a single-byte ASCII alphabet.
    pub rows: Vec<Vec<u8>>,
    /// Sorted unique symbols occurring in the rows.
    pub alphabet: Vec<u8>,
    /// Tag describing where the alignment came from.
    pub source_format: String,
}

impl AlignmentFrame {
    pub fn num_sequences(
        &self,
    ) -> usize {
        self.rows.len()
    }

    pub fn alignment_length(
        &self,
    ) -> usize {
        self.rows.first().map_or(0, |row| row.len())
    }

    /// Check the codec input contract.
    pub fn validate(
        &self,
    ) -> Result<(), Error> {
        if self.ids.len() != self.rows.len() {
            return Err(Error::MalformedInput(format!(
                "{} identifiers for {} rows", self.ids.len(), self.rows.len()
            )));
        }

        let expected_len = self.alignment_length();
        for (row_idx, row) in self.rows.iter().enumerate() {
            if row.len() != expected_len {
                return Err(Error::MalformedInput(format!(
                    "row {} has {} columns, expected {}", row_idx, row.len(), expected_len
                )));
            }
            if let Some(column) = row.iter().position(|symbol| !symbol.is_ascii()) {
                return Err(Error::MalformedInput(format!(
                    "row {} column {} holds a non-ASCII symbol", row_idx, column
                )));
            }
        }

        let mut seen: HashSet<&str> = HashSet::with_capacity(self.ids.len());
        for id in &self.ids {
            if !seen.insert(id) {
                return Err(Error::MalformedInput(format!(
                    "duplicate row identifier '{}'", id
                )));
            }
        }

        Ok(())
    }
}

/// Build a validated frame from identifiers and rows, deriving the
/// alphabet from the symbols present.
pub fn alignment_from_rows(
    ids: Vec<String>,
    rows: Vec<Vec<u8>>,
) -> Result<AlignmentFrame, Error> {
    let mut symbols: Vec<u8> = rows
        .iter()
        .flat_map(|row| row.iter().copied())
        .collect::<HashSet<u8>>()
        .into_iter()
        .collect();
    symbols.sort_unstable();

    let frame = AlignmentFrame {
        ids,
        rows,
        alphabet: symbols,
        source_format: "unknown".to_string(),
    };
    frame.validate()?;
    Ok(frame)
}

/// Encode an alignment and write the framed archive to something that
/// implements [Write](std::io::Write). Returns the metadata document
/// contents for the caller to place alongside the archive.
pub fn encode_to_std_write<W: Write>(
    frame: &AlignmentFrame,
    options: &EncodeOptions,
    conn: &mut W,
) -> Result<Metadata, Error> {
    let compressed = compress_alignment(frame, options)?;
    let header = headers::file::ArchiveHeader::new(compressed.payload.len() as u64);
    conn.write_all(&header.to_bytes())?;
    conn.write_all(&compressed.payload)?;
    conn.flush()?;
    Ok(compressed.metadata)
}

/// Read a framed archive from something that implements
/// [Read](std::io::Read) and reconstruct the alignment.
pub fn decode_from_std_read<R: Read>(
    metadata: &Metadata,
    conn: &mut R,
) -> Result<AlignmentFrame, Error> {
    let header = headers::file::read_archive_header(conn)?;
    let mut payload: Vec<u8> = vec![0; header.payload_len as usize];
    conn.read_exact(&mut payload).map_err(|err| {
        Error::MalformedArchive(format!("archive payload truncated: {}", err))
    })?;
    decompress_alignment(&payload, metadata)
}
