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
use crate::bitmask::set_positions;
use crate::chunks::identifiers::decode_sequence_ids;
use crate::chunks::permutation::decode_permutation;
use crate::compression::PayloadEncoding;
use crate::compression::coders::inflate_gzip;
use crate::compression::decode_payload;
use crate::encoding::decode_blocks;
use crate::error::Error;
use crate::fasta::frame_from_fasta;
use crate::metadata::FallbackInfo;
use crate::metadata::Metadata;
use crate::metadata::PermutationSpec;
use crate::pack::sequence_checksum;
use crate::rle::Block;

/// Reconstruct an alignment frame from payload bytes and metadata.
///
/// Runs the decoder state machine: fallback check, outer decoding, the
/// optional permutation chunk, the identifier chunk, then the block
/// stream. Output rows are only allocated after the whole stream
/// validates.
///
pub fn decompress_alignment(
    payload: &[u8],
    metadata: &Metadata,
) -> Result<AlignmentFrame, Error> {
    if metadata.codec == "phylo-bundle" {
        return Err(Error::UnsupportedEncoding(
            "archive uses the phylo-bundle codec; decode it with phylo::decompress_alignment_with_tree".to_string(),
        ));
    }
    if let Some(fallback) = &metadata.fallback {
        return decompress_fallback(payload, fallback, metadata);
    }

    let payload_encoding = PayloadEncoding::from_name(&metadata.payload_encoding)?;
    let decoded = decode_payload(payload_encoding, payload)?;
    let mut cursor = 0;

    let permutation: Option<Vec<u32>> = match metadata.permutation_spec()? {
        PermutationSpec::Identity => None,
        PermutationSpec::Inline(permutation) => Some(permutation),
        PermutationSpec::Payload => Some(decode_permutation(&decoded, &mut cursor)?),
    };

    let ids = decode_sequence_ids(&decoded, &mut cursor)?;
    if ids.len() != metadata.num_sequences {
        return Err(Error::MalformedArchive(format!(
            "identifier chunk lists {} sequences but metadata expects {}",
            ids.len(), metadata.num_sequences
        )));
    }
    if let Some(expected_ids) = &metadata.sequence_ids {
        if *expected_ids != ids {
            return Err(Error::MalformedArchive(
                "sequence IDs mismatch between metadata and payload".to_string(),
            ));
        }
    }

    let blocks = decode_blocks(&decoded, &mut cursor, metadata.num_sequences)?;
    if cursor != decoded.len() {
        return Err(Error::MalformedArchive(format!(
            "{} trailing bytes after the block stream", decoded.len() - cursor
        )));
    }

    let total_columns: usize = blocks.iter().map(|block| block.run_length as usize).sum();
    if total_columns != metadata.alignment_length {
        return Err(Error::MalformedArchive(format!(
            "decoded columns ({}) do not match expected length {}",
            total_columns, metadata.alignment_length
        )));
    }

    let mut rows = expand_blocks(&blocks, metadata.num_sequences, metadata.alignment_length);
    let mut ids = ids;

    if let Some(permutation) = permutation {
        (ids, rows) = restore_row_order(ids, rows, &permutation, metadata.num_sequences)?;
    }

    if let Some(expected) = &metadata.checksum_sha256 {
        let got = sequence_checksum(&rows);
        if got != *expected {
            return Err(Error::IntegrityFailure(format!(
                "checksum {} does not match expected {}", got, expected
            )));
        }
    }

    Ok(AlignmentFrame {
        ids,
        rows,
        alphabet: metadata.alphabet.bytes().collect(),
        source_format: metadata.source_format.clone().unwrap_or_else(|| "unknown".to_string()),
    })
}

fn expand_blocks(
    blocks: &[Block],
    num_rows: usize,
    num_columns: usize,
) -> Vec<Vec<u8>> {
    let mut rows: Vec<Vec<u8>> = vec![vec![0; num_columns]; num_rows];
    let mut column = 0;
    for block in blocks {
        let positions = set_positions(&block.bitmask);
        for _ in 0..block.run_length {
            for row in rows.iter_mut() {
                row[column] = block.consensus;
            }
            for (position, residue) in positions.iter().zip(block.residues.iter()) {
                rows[*position][column] = *residue;
            }
            column += 1;
        }
    }
    rows
}

/// Invert the encode-time permutation: row at encoded position p belongs
/// at original index permutation[p].
fn restore_row_order(
    ids: Vec<String>,
    rows: Vec<Vec<u8>>,
    permutation: &[u32],
    num_rows: usize,
) -> Result<(Vec<String>, Vec<Vec<u8>>), Error> {
    if permutation.len() != num_rows {
        return Err(Error::MalformedArchive(format!(
            "permutation lists {} rows but the alignment has {}",
            permutation.len(), num_rows
        )));
    }

    let mut restored_ids: Vec<Option<String>> = vec![None; num_rows];
    let mut restored_rows: Vec<Option<Vec<u8>>> = vec![None; num_rows];
    for (encoded_pos, original) in permutation.iter().enumerate() {
        let original = *original as usize;
        if original >= num_rows || restored_ids[original].is_some() {
            return Err(Error::MalformedArchive(format!(
                "permutation entry {} is out of range or repeated", original
            )));
        }
        restored_ids[original] = Some(ids[encoded_pos].clone());
        restored_rows[original] = Some(rows[encoded_pos].clone());
    }

    let ids = restored_ids.into_iter().map(|id| id.expect("full permutation")).collect();
    let rows = restored_rows.into_iter().map(|row| row.expect("full permutation")).collect();
    Ok((ids, rows))
}

fn decompress_fallback(
    payload: &[u8],
    fallback: &FallbackInfo,
    metadata: &Metadata,
) -> Result<AlignmentFrame, Error> {
    if fallback.kind != "gzip" {
        return Err(Error::UnsupportedEncoding(format!(
            "unsupported fallback type '{}'", fallback.kind
        )));
    }

    let fasta_bytes = inflate_gzip(payload).map_err(|_| Error::FallbackInconsistency(
        "metadata declares a gzip fallback but the payload is not a gzip stream".to_string(),
    ))?;

    let mut frame = frame_from_fasta(&fasta_bytes)?;
    frame.source_format = fallback.format.clone();

    if let Some(expected) = &metadata.checksum_sha256 {
        let got = sequence_checksum(&frame.rows);
        if got != *expected {
            return Err(Error::IntegrityFailure(format!(
                "checksum {} does not match expected {}", got, expected
            )));
        }
    }

    Ok(frame)
}

// Tests
#[cfg(test)]
mod tests {

    fn round_trip(
        frame: &crate::AlignmentFrame,
        options: &crate::pack::EncodeOptions,
    ) -> crate::AlignmentFrame {
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let compressed = compress_alignment(frame, options).unwrap();
        decompress_alignment(&compressed.payload, &compressed.metadata).unwrap()
    }

    #[test]
    fn constant_alignment_round_trips() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            vec![b"AAAA".to_vec(), b"AAAA".to_vec(), b"AAAA".to_vec()],
        ).unwrap();

        let got = round_trip(&frame, &EncodeOptions::default());

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn single_column_deviation_round_trips() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            vec![b"ACGT".to_vec(), b"ACGT".to_vec(), b"ACGA".to_vec()],
        ).unwrap();

        let got = round_trip(&frame, &EncodeOptions::default());

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn mixed_alignment_round_trips() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;

        let frame = alignment_from_rows(
            vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
            vec![
                b"ACGTACGTAC--GTNNACGT".to_vec(),
                b"ACGTACCTAC--GTNNACGT".to_vec(),
                b"ACGTACGTAAAAGTNNACGT".to_vec(),
                b"ACTTACGTAC--GTNNACGA".to_vec(),
            ],
        ).unwrap();

        let got = round_trip(&frame, &EncodeOptions::default());

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn reversing_permutation_restores_original_order() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            vec![b"AAAA".to_vec(), b"CCCC".to_vec(), b"GGGG".to_vec()],
        ).unwrap();

        let options = EncodeOptions {
            permutation: Some(vec![2, 1, 0]),
            ordering_strategy: Some("reverse".to_string()),
        };
        let got = round_trip(&frame, &options);

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn inline_permutation_lists_are_accepted() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
            vec![b"AATA".to_vec(), b"CCGC".to_vec(), b"GGAG".to_vec()],
        ).unwrap();

        // Encode the reordered frame directly, then present the applied
        // permutation as an inline metadata list (an older archive form).
        let reordered = alignment_from_rows(
            vec!["s3".to_string(), "s1".to_string(), "s2".to_string()],
            vec![b"GGAG".to_vec(), b"AATA".to_vec(), b"CCGC".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&reordered, &EncodeOptions::default()).unwrap();
        let mut metadata = compressed.metadata.clone();
        metadata.sequence_permutation = Some(serde_json::json!([2, 0, 1]));
        metadata.checksum_sha256 = None;

        let got = decompress_alignment(&compressed.payload, &metadata).unwrap();

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn fallback_archive_round_trips() {
        use rand::Rng;
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let mut rng = StdRng::seed_from_u64(0xFA11);
        let alphabet: Vec<u8> = (0..64).map(|idx| 48 + idx as u8).collect();

        let rows: Vec<Vec<u8>> = (0..150).map(|_| {
            (0..200).map(|_| alphabet[rng.gen_range(0..alphabet.len())]).collect()
        }).collect();
        let ids: Vec<String> = (0..150).map(|idx| format!("r{}", idx)).collect();

        let frame = alignment_from_rows(ids, rows).unwrap();
        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();

        assert!(compressed.metadata.fallback.is_some());

        let got = decompress_alignment(&compressed.payload, &compressed.metadata).unwrap();

        assert_eq!(got.ids, frame.ids);
        assert_eq!(got.rows, frame.rows);
    }

    #[test]
    fn corrupt_fallback_payload_is_inconsistent() {
        use crate::error::Error;
        use crate::metadata::FallbackInfo;
        use super::decompress_alignment;

        let metadata = crate::metadata::Metadata {
            format_version: crate::FORMAT_VERSION.to_string(),
            codec: "ecomp".to_string(),
            num_sequences: 1,
            alignment_length: 4,
            alphabet: "ACGT".to_string(),
            payload_encoding: "gzip".to_string(),
            bits_per_symbol: 2,
            bitmask_bytes: 1,
            sequence_id_codec: "inline".to_string(),
            ordering_strategy: "baseline".to_string(),
            source_format: None,
            checksum_sha256: None,
            sequence_permutation: None,
            sequence_ids: None,
            fallback: Some(FallbackInfo { kind: "gzip".to_string(), format: "fasta".to_string() }),
            run_length_blocks: None,
            max_run_length: None,
            columns_with_deviations: None,
            payload_encoded_bytes: None,
            payload_raw_bytes: None,
            extra: serde_json::Map::new(),
        };

        let got = decompress_alignment(b"this is not gzip", &metadata);

        assert!(matches!(got, Err(Error::FallbackInconsistency(_))));
    }

    #[test]
    fn checksum_mismatch_is_an_integrity_failure() {
        use crate::alignment_from_rows;
        use crate::error::Error;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string()],
            vec![b"ACGT".to_vec(), b"ACGA".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();
        let mut metadata = compressed.metadata.clone();
        metadata.checksum_sha256 = Some("0".repeat(64));

        let got = decompress_alignment(&compressed.payload, &metadata);

        assert!(matches!(got, Err(Error::IntegrityFailure(_))));
    }

    #[test]
    fn unknown_payload_encoding_is_unsupported() {
        use crate::alignment_from_rows;
        use crate::error::Error;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string()],
            vec![b"ACGT".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();
        let mut metadata = compressed.metadata.clone();
        metadata.payload_encoding = "brotli".to_string();

        let got = decompress_alignment(&compressed.payload, &metadata);

        assert!(matches!(got, Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn wrong_sequence_count_is_rejected() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string()],
            vec![b"ACGT".to_vec(), b"ACGT".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();
        let mut metadata = compressed.metadata.clone();
        metadata.num_sequences = 3;

        assert!(decompress_alignment(&compressed.payload, &metadata).is_err());
    }

    #[test]
    fn metadata_id_mismatch_is_rejected() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string()],
            vec![b"ACGT".to_vec(), b"ACGT".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();
        let mut metadata = compressed.metadata.clone();
        metadata.sequence_ids = Some(vec!["other".to_string(), "names".to_string()]);

        assert!(decompress_alignment(&compressed.payload, &metadata).is_err());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;
        use crate::pack::compress_alignment;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string()],
            vec![b"ACGTACGTACGT".to_vec(), b"ACCTACGTACCT".to_vec()],
        ).unwrap();

        let compressed = compress_alignment(&frame, &EncodeOptions::default()).unwrap();
        let truncated = &compressed.payload[..compressed.payload.len() - 1];

        assert!(decompress_alignment(truncated, &compressed.metadata).is_err());
    }

    #[test]
    fn phylo_bundle_archives_are_refused() {
        use crate::alignment_from_rows;
        use crate::error::Error;
        use crate::phylo::compress_alignment_with_tree;
        use super::decompress_alignment;

        let frame = alignment_from_rows(
            vec!["a".to_string(), "b".to_string()],
            vec![b"ACGT".to_vec(), b"ACGA".to_vec()],
        ).unwrap();

        let (payload, metadata) = compress_alignment_with_tree(&frame, "(a:0.1,b:0.2);").unwrap();

        let got = decompress_alignment(&payload, &metadata);

        assert!(matches!(got, Err(Error::UnsupportedEncoding(_))));
    }

    #[test]
    fn long_runs_split_and_rejoin() {
        use crate::alignment_from_rows;
        use crate::pack::EncodeOptions;

        // 600 identical columns exercise the 255-column run cap.
        let frame = alignment_from_rows(
            vec!["s1".to_string(), "s2".to_string()],
            vec![vec![b'A'; 600], vec![b'A'; 600]],
        ).unwrap();

        let got = round_trip(&frame, &EncodeOptions::default());

        assert_eq!(got.rows, frame.rows);
    }
}
