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

use std::io::Read;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzDecoder;
use flate2::write::GzEncoder;
use flate2::write::ZlibDecoder;
use flate2::write::ZlibEncoder;
use xz::read::XzDecoder;
use xz::read::XzEncoder;

const ZSTD_LEVEL: i32 = 5;
const XZ_PRESET: u32 = 6;

pub fn deflate_gzip(
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn inflate_gzip(
    deflated: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut inflated: Vec<u8> = Vec::new();
    let mut decoder = GzDecoder::new(&mut inflated);
    decoder.write_all(deflated).map_err(|err| {
        Error::MalformedArchive(format!("gzip stream corrupt: {}", err))
    })?;
    decoder.finish().map_err(|err| {
        Error::MalformedArchive(format!("gzip stream corrupt: {}", err))
    })?;
    Ok(inflated)
}

pub fn deflate_zlib(
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

pub fn inflate_zlib(
    deflated: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut inflated: Vec<u8> = Vec::new();
    let mut decoder = ZlibDecoder::new(&mut inflated);
    decoder.write_all(deflated).map_err(|err| {
        Error::MalformedArchive(format!("zlib stream corrupt: {}", err))
    })?;
    decoder.finish().map_err(|err| {
        Error::MalformedArchive(format!("zlib stream corrupt: {}", err))
    })?;
    Ok(inflated)
}

pub fn deflate_zstd(
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    Ok(zstd::stream::encode_all(bytes, ZSTD_LEVEL)?)
}

pub fn inflate_zstd(
    deflated: &[u8],
) -> Result<Vec<u8>, Error> {
    zstd::stream::decode_all(deflated).map_err(|err| {
        Error::MalformedArchive(format!("zstd stream corrupt: {}", err))
    })
}

pub fn deflate_xz(
    bytes: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut deflated: Vec<u8> = Vec::new();
    XzEncoder::new(bytes, XZ_PRESET).read_to_end(&mut deflated)?;
    Ok(deflated)
}

pub fn inflate_xz(
    deflated: &[u8],
) -> Result<Vec<u8>, Error> {
    let mut inflated: Vec<u8> = Vec::new();
    XzDecoder::new(deflated).read_to_end(&mut inflated).map_err(|err| {
        Error::MalformedArchive(format!("xz stream corrupt: {}", err))
    })?;
    Ok(inflated)
}
