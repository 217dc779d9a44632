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

pub mod coders;

use crate::error::Error;

use self::coders::deflate_xz;
use self::coders::deflate_zlib;
use self::coders::deflate_zstd;
use self::coders::inflate_gzip;
use self::coders::inflate_xz;
use self::coders::inflate_zlib;
use self::coders::inflate_zstd;

/// Supported outer codings for the archive payload
///
/// Stored by name in the metadata `payload_encoding` key with the
/// following mapping:
///
///   - raw: identity
///   - zlib: DEFLATE with a zlib wrapper
///   - zstd: Zstandard
///   - xz: LZMA2 in an xz container
///   - gzip: DEFLATE with a gzip wrapper (fallback payloads only)
///
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadEncoding {
    #[default]
    Raw,
    Zlib,
    Zstd,
    Xz,
    Gzip,
}

impl PayloadEncoding {
    pub fn name(
        &self,
    ) -> &'static str {
        match self {
            PayloadEncoding::Raw => "raw",
            PayloadEncoding::Zlib => "zlib",
            PayloadEncoding::Zstd => "zstd",
            PayloadEncoding::Xz => "xz",
            PayloadEncoding::Gzip => "gzip",
        }
    }

    pub fn from_name(
        name: &str,
    ) -> Result<Self, Error> {
        match name {
            "raw" => Ok(PayloadEncoding::Raw),
            "zlib" => Ok(PayloadEncoding::Zlib),
            "zstd" => Ok(PayloadEncoding::Zstd),
            "xz" => Ok(PayloadEncoding::Xz),
            "gzip" => Ok(PayloadEncoding::Gzip),
            _ => Err(Error::UnsupportedEncoding(format!(
                "'{}' is not a known payload encoding", name
            ))),
        }
    }
}

impl std::fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Race the outer coders over `raw` and keep the smallest result.
///
/// The identity encoding always competes, so the outer layer can only
/// shrink the payload. Earlier candidates win ties.
///
pub fn encode_payload(
    raw: &[u8],
) -> Result<(PayloadEncoding, Vec<u8>), Error> {
    let candidates: Vec<(PayloadEncoding, Vec<u8>)> = vec![
        (PayloadEncoding::Raw, raw.to_vec()),
        (PayloadEncoding::Zstd, deflate_zstd(raw)?),
        (PayloadEncoding::Zlib, deflate_zlib(raw)?),
        (PayloadEncoding::Xz, deflate_xz(raw)?),
    ];

    let (encoding, bytes) = candidates
        .into_iter()
        .min_by_key(|(_, bytes)| bytes.len())
        .expect("candidate list is never empty");

    log::debug!("outer coder race won by {} ({} bytes from {})", encoding, bytes.len(), raw.len());
    Ok((encoding, bytes))
}

/// Undo the outer coding named in the metadata.
pub fn decode_payload(
    encoding: PayloadEncoding,
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    match encoding {
        PayloadEncoding::Raw => Ok(bytes.to_vec()),
        PayloadEncoding::Zlib => inflate_zlib(bytes),
        PayloadEncoding::Zstd => inflate_zstd(bytes),
        PayloadEncoding::Xz => inflate_xz(bytes),
        PayloadEncoding::Gzip => inflate_gzip(bytes),
    }
}
