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
use crate::chunks::identifiers::encode_sequence_ids;
use crate::chunks::permutation::encode_permutation;
use crate::compression::coders::deflate_gzip;
use crate::compression::encode_payload;
use crate::consensus::ColumnProfiles;
use crate::encoding::encode_blocks;
use crate::error::Error;
use crate::fasta::frame_to_fasta;
use crate::metadata::FallbackInfo;
use crate::metadata::Metadata;
use crate::rle::bitmask_len;
use crate::rle::collect_blocks;

use std::borrow::Cow;

use sha2::Digest;
use sha2::Sha256;

/// Caller-supplied knobs for one encode invocation.
///
/// The permutation lists original row indices in the order the rows
/// should be encoded; ordering heuristics that produce it live outside
/// the codec.
///
#[derive(Clone, Debug, Default)]
pub struct EncodeOptions {
    pub permutation: Option<Vec<u32>>,
    pub ordering_strategy: Option<String>,
}

/// Payload plus metadata produced by one encode invocation.
#[derive(Clone, Debug)]
pub struct CompressedAlignment {
    pub payload: Vec<u8>,
    pub metadata: Metadata,
}

/// Hex-encoded SHA-256 over the concatenated rows.
pub fn sequence_checksum(
    rows: &[Vec<u8>],
) -> String {
    let mut hasher = Sha256::new();
    for row in rows {
        hasher.update(row);
    }
    hasher.finalize().iter().map(|byte| format!("{:02x}", byte)).collect()
}

pub(crate) fn global_bits_per_symbol(
    alphabet_len: usize,
) -> u8 {
    if alphabet_len <= 2 {
        1
    } else {
        (usize::BITS - (alphabet_len - 1).leading_zeros()) as u8
    }
}

fn validate_permutation(
    permutation: &[u32],
    num_rows: usize,
) -> Result<(), Error> {
    if permutation.len() != num_rows {
        return Err(Error::MalformedInput(format!(
            "permutation lists {} rows but the alignment has {}",
            permutation.len(), num_rows
        )));
    }
    let mut seen = vec![false; num_rows];
    for index in permutation {
        let index = *index as usize;
        if index >= num_rows || seen[index] {
            return Err(Error::MalformedInput(format!(
                "permutation entry {} is out of range or repeated", index
            )));
        }
        seen[index] = true;
    }
    Ok(())
}

fn is_identity(
    permutation: &[u32],
) -> bool {
    permutation.iter().enumerate().all(|(position, index)| position as u32 == *index)
}

/// Compress an alignment into a binary payload and structured metadata.
///
/// The permutation hint, when present and not the identity, reorders the
/// rows before profiling; the applied order is recorded in an `ECPE`
/// chunk so the decoder can restore the original row order.
///
pub fn compress_alignment(
    frame: &AlignmentFrame,
    options: &EncodeOptions,
) -> Result<CompressedAlignment, Error> {
    frame.validate()?;

    let num_rows = frame.num_sequences();
    let checksum = sequence_checksum(&frame.rows);

    let permutation = match &options.permutation {
        Some(permutation) => {
            validate_permutation(permutation, num_rows)?;
            if is_identity(permutation) { None } else { Some(permutation.clone()) }
        },
        None => None,
    };

    let work: Cow<AlignmentFrame> = match &permutation {
        Some(permutation) => {
            let ids = permutation.iter().map(|index| frame.ids[*index as usize].clone()).collect();
            let rows = permutation.iter().map(|index| frame.rows[*index as usize].clone()).collect();
            Cow::Owned(AlignmentFrame {
                ids,
                rows,
                alphabet: frame.alphabet.clone(),
                source_format: frame.source_format.clone(),
            })
        },
        None => Cow::Borrowed(frame),
    };

    let blocks = collect_blocks(ColumnProfiles::new(&work), num_rows);
    let max_run_length = blocks.iter().map(|block| block.run_length as usize).max().unwrap_or(0);
    let deviation_columns: usize = blocks
        .iter()
        .filter(|block| !block.residues.is_empty())
        .map(|block| block.run_length as usize)
        .sum();

    let mut raw_payload: Vec<u8> = Vec::new();
    if let Some(permutation) = &permutation {
        raw_payload.append(&mut encode_permutation(permutation)?);
    }
    raw_payload.append(&mut encode_sequence_ids(&work.ids)?);
    raw_payload.append(&mut encode_blocks(&blocks, num_rows)?);

    let (payload_encoding, payload) = encode_payload(&raw_payload)?;

    let mut metadata = Metadata {
        format_version: crate::FORMAT_VERSION.to_string(),
        codec: "ecomp".to_string(),
        num_sequences: num_rows,
        alignment_length: frame.alignment_length(),
        alphabet: String::from_utf8(frame.alphabet.clone()).expect("validated ASCII alphabet"),
        payload_encoding: payload_encoding.name().to_string(),
        bits_per_symbol: global_bits_per_symbol(frame.alphabet.len().max(1)),
        bitmask_bytes: bitmask_len(num_rows),
        sequence_id_codec: "inline".to_string(),
        ordering_strategy: options.ordering_strategy.clone().unwrap_or_else(|| "baseline".to_string()),
        source_format: Some(frame.source_format.clone()),
        checksum_sha256: Some(checksum),
        sequence_permutation: permutation.as_ref().map(|_| serde_json::json!({"encoding": "payload"})),
        sequence_ids: None,
        fallback: None,
        run_length_blocks: Some(blocks.len()),
        max_run_length: Some(max_run_length),
        columns_with_deviations: Some(deviation_columns),
        payload_encoded_bytes: Some(payload.len()),
        payload_raw_bytes: Some(raw_payload.len()),
        extra: serde_json::Map::new(),
    };

    // Fallback: a generic compressor over the plain FASTA bytes of the
    // original frame competes with the structural payload.
    let fasta_bytes = frame_to_fasta(frame);
    let gzip_payload = deflate_gzip(&fasta_bytes)?;
    if gzip_payload.len() + 1 < payload.len() && gzip_payload.len() < fasta_bytes.len() {
        log::info!(
            "substituting gzip fallback: {} bytes beat the structural payload of {}",
            gzip_payload.len(), payload.len()
        );
        metadata.fallback = Some(FallbackInfo {
            kind: "gzip".to_string(),
            format: frame.source_format.clone(),
        });
        metadata.payload_encoding = "gzip".to_string();
        metadata.sequence_permutation = None;
        metadata.run_length_blocks = None;
        metadata.max_run_length = None;
        metadata.columns_with_deviations = None;
        metadata.payload_encoded_bytes = Some(gzip_payload.len());
        metadata.payload_raw_bytes = Some(fasta_bytes.len());
        return Ok(CompressedAlignment { payload: gzip_payload, metadata });
    }

    Ok(CompressedAlignment { payload, metadata })
}
