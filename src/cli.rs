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
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Compression strategy for `ecomp encode`
///
///   - auto: phylo bundle when a tree is supplied, alignment otherwise
///   - alignment: alignment-only archive, any tree argument is ignored
///   - phylo: co-compress the alignment with its Newick tree
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum CodecChoice {
    #[default]
    Auto,
    Alignment,
    Phylo,
}

#[derive(Subcommand)]
pub enum Commands {
    // Encode an alignment in .ecomp format, or with a tree in .ecbt format
    Encode {
        // Input fasta alignment file
        #[arg(group = "input", required = true, help = "Input alignment file")]
        input_file: PathBuf,

        // Optional Newick tree; enables phylogenetic bundle compression
        #[arg(help = "Optional Newick tree file")]
        tree: Option<PathBuf>,

        // Output path, defaults to input with a .ecomp or .ecbt extension
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        // Compression strategy
        #[arg(long = "codec", value_enum, default_value = "auto")]
        codec: CodecChoice,

        // Row order to encode in, as comma-separated original indices
        #[arg(long = "permutation")]
        permutation: Option<String>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Decode .ecomp or .ecbt format
    Decode {
        // Input file
        #[arg(group = "input", required = true, help = "Input archive")]
        input_file: PathBuf,

        // Output fasta path, defaults to stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,

        // Tree output path when decoding a phylo bundle
        #[arg(short = 't', long = "tree-output")]
        tree_output: Option<PathBuf>,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },

    // Print the metadata document of an archive
    Inspect {
        // Input file
        #[arg(group = "input", required = true, help = "Input archive")]
        input_file: PathBuf,

        // Verbosity
        #[arg(long = "verbose", default_value_t = false)]
        verbose: bool,
    },
}
