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

//! Optional chunks at the head of the decompressed payload.
//!
//! When present they appear in a fixed order: the `ECPE` permutation chunk
//! first, then the mandatory `ECID` identifier chunk, then the run-length
//! block stream.

pub mod identifiers;
pub mod permutation;
