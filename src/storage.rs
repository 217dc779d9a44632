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
use crate::headers::file::ArchiveHeader;
use crate::headers::file::HEADER_SIZE;
use crate::metadata::Metadata;

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

/// File extension of the metadata sidecar derived from an archive path.
pub const METADATA_EXTENSION: &str = "meta.json";

/// Write `payload` to `path` behind a fresh archive header.
pub fn write_archive(
    path: &Path,
    payload: &[u8],
) -> Result<(), Error> {
    let header = ArchiveHeader::new(payload.len() as u64);
    let mut conn = File::create(path)?;
    conn.write_all(&header.to_bytes())?;
    conn.write_all(payload)?;
    Ok(())
}

/// Load payload bytes from `path`, validating the archive header.
pub fn read_archive(
    path: &Path,
) -> Result<Vec<u8>, Error> {
    let data = std::fs::read(path)?;
    if data.len() < HEADER_SIZE {
        return Err(Error::MalformedArchive(format!(
            "file of {} bytes is too short for an archive header", data.len()
        )));
    }
    let header_bytes: [u8; HEADER_SIZE] = data[0..HEADER_SIZE].try_into().expect("sized slice");
    let header = ArchiveHeader::from_bytes(&header_bytes)?;
    let payload = &data[HEADER_SIZE..];
    if payload.len() as u64 != header.payload_len {
        return Err(Error::MalformedArchive(format!(
            "payload of {} bytes does not match the declared length {}",
            payload.len(), header.payload_len
        )));
    }
    Ok(payload.to_vec())
}

/// Persist the metadata document next to an archive.
pub fn write_metadata(
    path: &Path,
    metadata: &Metadata,
) -> Result<(), Error> {
    let document = metadata.to_document()?;
    let mut conn = File::create(path)?;
    conn.write_all(&document)?;
    Ok(())
}

/// Load a metadata document from disk.
pub fn read_metadata(
    path: &Path,
) -> Result<Metadata, Error> {
    let bytes = std::fs::read(path)?;
    Metadata::from_document(&bytes)
}

/// Default metadata path for an archive: `x.ecomp` maps to `x.meta.json`.
pub fn derive_metadata_path(
    archive_path: &Path,
) -> PathBuf {
    archive_path.with_extension(METADATA_EXTENSION)
}

// Tests
#[cfg(test)]
mod tests {

    #[test]
    fn archive_round_trips_on_disk() {
        use super::read_archive;
        use super::write_archive;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aln.ecomp");

        let expected: Vec<u8> = vec![1, 2, 3, 4, 5];
        write_archive(&path, &expected).unwrap();

        // 20-byte header plus the payload.
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 25);

        let got = read_archive(&path).unwrap();
        assert_eq!(got, expected);
    }

    #[test]
    fn truncated_archive_is_rejected() {
        use super::read_archive;
        use super::write_archive;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aln.ecomp");

        write_archive(&path, &[9; 100]).unwrap();
        let mut bytes = std::fs::read(&path).unwrap();
        bytes.truncate(60);
        std::fs::write(&path, &bytes).unwrap();

        assert!(read_archive(&path).is_err());
    }

    #[test]
    fn empty_file_is_rejected() {
        use super::read_archive;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aln.ecomp");
        std::fs::write(&path, b"").unwrap();

        assert!(read_archive(&path).is_err());
    }

    #[test]
    fn metadata_round_trips_on_disk() {
        use super::read_metadata;
        use super::write_metadata;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aln.meta.json");

        let expected = crate::metadata::Metadata {
            format_version: crate::FORMAT_VERSION.to_string(),
            codec: "ecomp".to_string(),
            num_sequences: 2,
            alignment_length: 8,
            alphabet: "ACGT".to_string(),
            payload_encoding: "raw".to_string(),
            bits_per_symbol: 2,
            bitmask_bytes: 1,
            sequence_id_codec: "inline".to_string(),
            ordering_strategy: "baseline".to_string(),
            source_format: None,
            checksum_sha256: None,
            sequence_permutation: None,
            sequence_ids: None,
            fallback: None,
            run_length_blocks: None,
            max_run_length: None,
            columns_with_deviations: None,
            payload_encoded_bytes: None,
            payload_raw_bytes: None,
            extra: serde_json::Map::new(),
        };

        write_metadata(&path, &expected).unwrap();
        let got = read_metadata(&path).unwrap();

        assert_eq!(got, expected);
    }

    #[test]
    fn metadata_path_derivation() {
        use super::derive_metadata_path;

        use std::path::Path;

        let got = derive_metadata_path(Path::new("/data/msa.ecomp"));

        assert_eq!(got, Path::new("/data/msa.meta.json"));
    }
}
