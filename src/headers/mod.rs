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

//! Archive framing for the encoded format.
//!
//! A valid `.ecomp` archive starts with the fixed 20-byte
//! [ArchiveHeader](file::ArchiveHeader): the `ECOMP001` magic, three
//! version bytes, and the big-endian payload length. Exactly
//! `payload_length` payload bytes follow.
//!
//! The payload itself may open with the optional chunks described in
//! [chunks](crate::chunks); their framing lives there, not here.

pub mod file;
