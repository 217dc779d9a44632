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
use thiserror::Error;

/// Error type for encode and decode operations.
///
/// Every failure aborts the current operation; no partial frames or
/// archives are ever produced. Messages name the stage that failed and,
/// where bounded, the offending column, block index, or byte offset.
///
#[derive(Debug, Error)]
pub enum Error {
    /// Input frame violates the codec contract: unequal row lengths,
    /// non-ASCII symbols, or duplicate row identifiers.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Archive bytes violate the container or payload format.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// SHA-256 checksum mismatch after reconstruction.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// Metadata names a payload coder this build cannot decode.
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Metadata declares a gzip fallback but the payload is not gzip.
    #[error("fallback inconsistency: {0}")]
    FallbackInconsistency(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
