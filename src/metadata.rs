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
use crate::compression::coders::deflate_zlib;
use crate::compression::coders::inflate_zlib;
use crate::error::Error;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Tag opening a zlib-compressed metadata document.
pub const ECMZ_MAGIC: &[u8; 4] = b"ECMZ";

pub const ECMZ_VERSION: u8 = 1;

/// Fallback descriptor stored under the metadata `fallback` key.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct FallbackInfo {
    #[serde(rename = "type")]
    pub kind: String,
    pub format: String,
}

/// How the row permutation travels with the archive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PermutationSpec {
    /// Rows were encoded in their original order.
    Identity,
    /// Index list carried inline in the metadata document.
    Inline(Vec<u32>),
    /// Indices live in the `ECPE` chunk at the payload head.
    Payload,
}

/// Structured metadata accompanying an archive payload.
///
/// Serialises as a JSON document with sorted keys; keys this version does
/// not know are preserved in `extra` and written back verbatim.
///
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Metadata {
    pub format_version: String,
    pub codec: String,
    pub num_sequences: usize,
    pub alignment_length: usize,
    pub alphabet: String,
    pub payload_encoding: String,
    pub bits_per_symbol: u8,
    pub bitmask_bytes: usize,
    pub sequence_id_codec: String,
    pub ordering_strategy: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_permutation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_length_blocks: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_run_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns_with_deviations: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_encoded_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_raw_bytes: Option<usize>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Metadata {
    /// Interpret the `sequence_permutation` key.
    pub fn permutation_spec(
        &self,
    ) -> Result<PermutationSpec, Error> {
        match &self.sequence_permutation {
            None => Ok(PermutationSpec::Identity),
            Some(Value::Array(indices)) => {
                let mut permutation: Vec<u32> = Vec::with_capacity(indices.len());
                for value in indices {
                    let index = value.as_u64().ok_or_else(|| Error::MalformedArchive(
                        "sequence_permutation holds a non-integer index".to_string(),
                    ))?;
                    if index > u32::MAX as u64 {
                        return Err(Error::MalformedArchive(format!(
                            "sequence_permutation index {} exceeds 32 bits", index
                        )));
                    }
                    permutation.push(index as u32);
                }
                Ok(PermutationSpec::Inline(permutation))
            },
            Some(Value::Object(spec)) => {
                match spec.get("encoding").and_then(Value::as_str) {
                    Some("payload") => Ok(PermutationSpec::Payload),
                    Some(other) => Err(Error::MalformedArchive(format!(
                        "unknown sequence_permutation encoding '{}'", other
                    ))),
                    None => Err(Error::MalformedArchive(
                        "sequence_permutation object lacks an encoding".to_string(),
                    )),
                }
            },
            Some(_) => Err(Error::MalformedArchive(
                "sequence_permutation is neither a list nor an object".to_string(),
            )),
        }
    }

    /// Serialise as a sorted-key JSON document, zlib-wrapping it behind
    /// the `ECMZ` tag when the compressed form is smaller.
    pub fn to_document(
        &self,
    ) -> Result<Vec<u8>, Error> {
        // Passing through Value sorts the keys.
        let value = serde_json::to_value(self).map_err(|err| {
            Error::MalformedInput(format!("metadata serialisation failed: {}", err))
        })?;
        let mut plain = serde_json::to_vec_pretty(&value).map_err(|err| {
            Error::MalformedInput(format!("metadata serialisation failed: {}", err))
        })?;
        plain.push(b'\n');

        let deflated = deflate_zlib(&plain)?;
        if deflated.len() + ECMZ_MAGIC.len() + 1 < plain.len() {
            let mut wrapped: Vec<u8> = Vec::with_capacity(deflated.len() + 5);
            wrapped.extend_from_slice(ECMZ_MAGIC);
            wrapped.push(ECMZ_VERSION);
            wrapped.extend_from_slice(&deflated);
            Ok(wrapped)
        } else {
            Ok(plain)
        }
    }

    /// Parse a metadata document, plain or `ECMZ`-wrapped.
    pub fn from_document(
        bytes: &[u8],
    ) -> Result<Self, Error> {
        let plain = if bytes.starts_with(ECMZ_MAGIC) {
            if bytes.len() < ECMZ_MAGIC.len() + 1 {
                return Err(Error::MalformedArchive(
                    "metadata document truncated after ECMZ tag".to_string(),
                ));
            }
            let version = bytes[ECMZ_MAGIC.len()];
            if version != ECMZ_VERSION {
                return Err(Error::MalformedArchive(format!(
                    "unsupported ECMZ version {}", version
                )));
            }
            inflate_zlib(&bytes[ECMZ_MAGIC.len() + 1..])?
        } else {
            bytes.to_vec()
        };

        serde_json::from_slice(&plain).map_err(|err| {
            Error::MalformedArchive(format!("metadata document malformed: {}", err))
        })
    }
}
