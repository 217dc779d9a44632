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
use ecomp::AlignmentFrame;
use ecomp::EncodeOptions;
use ecomp::alignment_from_rows;
use ecomp::fasta::frame_to_fasta;
use ecomp::storage;

use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

mod cli;

/// Initializes the logger with verbosity given in `log_max_level`.
fn init_log(log_max_level: usize) {
    stderrlog::new()
    .module(module_path!())
    .module("ecomp")
    .quiet(false)
    .verbosity(log_max_level)
    .timestamp(stderrlog::Timestamp::Off)
    .init()
    .unwrap();
}

fn read_fasta_frame(path: &Path) -> anyhow::Result<AlignmentFrame> {
    let mut reader = needletail::parse_fastx_file(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut ids: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<u8>> = Vec::new();
    while let Some(record) = reader.next() {
        let record = record.with_context(|| format!("parsing {}", path.display()))?;
        ids.push(String::from_utf8(record.id().to_vec())?);
        rows.push(record.seq().to_vec());
    }

    let mut frame = alignment_from_rows(ids, rows)?;
    frame.source_format = "fasta".to_string();
    Ok(frame)
}

fn parse_permutation(text: &str) -> anyhow::Result<Vec<u32>> {
    text.split(',')
        .map(|field| field.trim().parse::<u32>().context("parsing permutation index"))
        .collect()
}

fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // Subcommands:
    match &cli.command {
        // Encode
        Some(cli::Commands::Encode {
            input_file,
            tree,
            output,
            codec,
            permutation,
            verbose,
        }) => {
            init_log(if *verbose { 3 } else { 2 });

            let codec = match codec {
                cli::CodecChoice::Auto => {
                    if tree.is_some() { cli::CodecChoice::Phylo } else { cli::CodecChoice::Alignment }
                },
                other => *other,
            };

            let frame = read_fasta_frame(input_file)?;
            log::info!(
                "read {} sequences of {} columns",
                frame.num_sequences(),
                frame.alignment_length()
            );

            let (payload, metadata, extension) = match codec {
                cli::CodecChoice::Phylo => {
                    let tree_path = tree.as_ref()
                        .context("phylo codec requested but no tree file provided")?;
                    let newick = std::fs::read_to_string(tree_path)
                        .with_context(|| format!("reading {}", tree_path.display()))?;
                    if permutation.is_some() {
                        log::warn!("permutation is ignored by the phylo bundle codec");
                    }
                    let (payload, metadata) =
                        ecomp::phylo::compress_alignment_with_tree(&frame, &newick)?;
                    (payload, metadata, "ecbt")
                },
                _ => {
                    if tree.is_some() {
                        log::warn!("tree provided but alignment codec was requested; tree will be ignored");
                    }
                    let options = EncodeOptions {
                        permutation: permutation.as_deref().map(parse_permutation).transpose()?,
                        ordering_strategy: None,
                    };
                    let compressed = ecomp::compress_alignment(&frame, &options)?;
                    (compressed.payload, compressed.metadata, "ecomp")
                },
            };

            let out_path = output.clone().unwrap_or_else(|| {
                PathBuf::from(format!("{}.{}", input_file.to_string_lossy(), extension))
            });
            storage::write_archive(&out_path, &payload)?;
            let metadata_path = storage::derive_metadata_path(&out_path);
            storage::write_metadata(&metadata_path, &metadata)?;

            log::info!(
                "wrote {} payload bytes to {} (metadata in {})",
                payload.len(),
                out_path.display(),
                metadata_path.display()
            );
        },

        // Decode
        Some(cli::Commands::Decode {
            input_file,
            output,
            tree_output,
            verbose,
        }) => {
            init_log(if *verbose { 3 } else { 2 });

            let payload = storage::read_archive(input_file)?;
            let metadata = storage::read_metadata(&storage::derive_metadata_path(input_file))?;

            let frame = if metadata.codec == "phylo-bundle" {
                let (frame, newick) =
                    ecomp::phylo::decompress_alignment_with_tree(&payload, &metadata)?;
                let tree_path = tree_output.clone().unwrap_or_else(|| {
                    input_file.with_extension("tree")
                });
                std::fs::write(&tree_path, &newick)?;
                log::info!("wrote tree to {}", tree_path.display());
                frame
            } else {
                ecomp::decompress_alignment(&payload, &metadata)?
            };

            let fasta_bytes = frame_to_fasta(&frame);
            match output {
                Some(path) => std::fs::write(path, &fasta_bytes)?,
                None => std::io::stdout().write_all(&fasta_bytes)?,
            };
        },

        // Inspect
        Some(cli::Commands::Inspect {
            input_file,
            verbose,
        }) => {
            init_log(if *verbose { 3 } else { 2 });

            let metadata = storage::read_metadata(&storage::derive_metadata_path(input_file))?;
            let value = serde_json::to_value(&metadata)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        },

        None => {},
    }

    Ok(())
}
