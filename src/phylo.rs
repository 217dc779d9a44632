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

//! Co-compress an alignment and its associated phylogenetic tree.
//!
//! The bundle codec parses a Newick tree whose leaves are the alignment
//! rows, assigns ancestral sequences to the internal nodes by Fitch
//! parsimony, and stores every non-root node as a sparse diff against
//! its parent. Archives produced this way carry the `PB01` payload magic
//! and `codec = "phylo-bundle"` in their metadata.

use crate::AlignmentFrame;
use crate::error::Error;
use crate::metadata::Metadata;
use crate::pack::global_bits_per_symbol;
use crate::pack::sequence_checksum;
use crate::rle::bitmask_len;
use crate::varint::read_varint;
use crate::varint::write_varint;

use std::collections::HashMap;

/// Magic bytes opening a phylo bundle payload.
pub const BUNDLE_MAGIC: &[u8; 4] = b"PB01";

/// Branch lengths are stored as integers in units of 1/BRANCH_SCALE.
pub const BRANCH_SCALE: u32 = 10000;

// ---------------------------------------------------------------------------
// Newick parsing
// ---------------------------------------------------------------------------

struct ParserNode {
    label: Option<String>,
    length: f64,
    children: Vec<ParserNode>,
}

fn parse_label_length(
    text: &[u8],
    cursor: &mut usize,
) -> Result<(Option<String>, f64), Error> {
    let start = *cursor;
    while *cursor < text.len() && !matches!(text[*cursor], b':' | b',' | b')' | b';') {
        *cursor += 1;
    }
    let label = if *cursor == start {
        None
    } else {
        let label = std::str::from_utf8(&text[start..*cursor]).map_err(|_| {
            Error::MalformedInput("Newick label is not valid UTF-8".to_string())
        })?;
        Some(label.to_string())
    };

    let mut length = 0.0;
    if text.get(*cursor) == Some(&b':') {
        *cursor += 1;
        let start = *cursor;
        while *cursor < text.len() && !matches!(text[*cursor], b',' | b')' | b';') {
            *cursor += 1;
        }
        let field = std::str::from_utf8(&text[start..*cursor]).map_err(|_| {
            Error::MalformedInput("invalid branch length in Newick".to_string())
        })?;
        length = field.trim().parse::<f64>().map_err(|_| {
            Error::MalformedInput(format!("invalid branch length '{}' in Newick", field.trim()))
        })?;
        if !length.is_finite() || length < 0.0 {
            return Err(Error::MalformedInput(format!(
                "branch length {} is not a finite non-negative number", length
            )));
        }
    }
    Ok((label, length))
}

fn parse_subtree(
    text: &[u8],
    cursor: &mut usize,
) -> Result<ParserNode, Error> {
    if text.get(*cursor) == Some(&b'(') {
        *cursor += 1;
        let mut children: Vec<ParserNode> = vec![parse_subtree(text, cursor)?];
        loop {
            match text.get(*cursor) {
                Some(b',') => {
                    *cursor += 1;
                    children.push(parse_subtree(text, cursor)?);
                },
                Some(b')') => {
                    *cursor += 1;
                    break;
                },
                _ => {
                    return Err(Error::MalformedInput(
                        "malformed Newick: expected ',' or ')'".to_string(),
                    ));
                },
            }
        }
        let (label, length) = parse_label_length(text, cursor)?;
        Ok(ParserNode { label, length, children })
    } else {
        let (label, length) = parse_label_length(text, cursor)?;
        Ok(ParserNode { label, length, children: Vec::new() })
    }
}

fn parse_newick(
    newick: &str,
) -> Result<ParserNode, Error> {
    let text = newick.trim().as_bytes();
    if text.last() != Some(&b';') {
        return Err(Error::MalformedInput(
            "Newick string must end with ';'".to_string(),
        ));
    }
    let mut cursor = 0;
    let root = parse_subtree(text, &mut cursor)?;
    if text.get(cursor) != Some(&b';') || cursor != text.len() - 1 {
        return Err(Error::MalformedInput(
            "unexpected content after Newick tree".to_string(),
        ));
    }
    Ok(root)
}

// ---------------------------------------------------------------------------
// Tree structure helpers
// ---------------------------------------------------------------------------

struct TreeNode {
    label: Option<String>,
    parent: Option<usize>,
    children: Vec<usize>,
    length: f64,
}

// Preorder flattening: every parent index is smaller than its children.
fn collect_nodes(
    root: &ParserNode,
) -> (Vec<TreeNode>, Vec<usize>) {
    fn visit(
        parser_node: &ParserNode,
        parent: Option<usize>,
        nodes: &mut Vec<TreeNode>,
        leaves: &mut Vec<usize>,
    ) -> usize {
        let index = nodes.len();
        nodes.push(TreeNode {
            label: parser_node.label.clone(),
            parent,
            children: Vec::new(),
            length: parser_node.length,
        });
        for child in &parser_node.children {
            let child_index = visit(child, Some(index), nodes, leaves);
            nodes[index].children.push(child_index);
        }
        if parser_node.children.is_empty() {
            leaves.push(index);
        }
        index
    }

    let mut nodes: Vec<TreeNode> = Vec::new();
    let mut leaves: Vec<usize> = Vec::new();
    visit(root, None, &mut nodes, &mut leaves);
    (nodes, leaves)
}

// ---------------------------------------------------------------------------
// Fitch parsimony to assign internal sequences
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
struct SymbolSet([u64; 4]);

impl SymbolSet {
    fn empty() -> Self {
        SymbolSet([0; 4])
    }

    fn singleton(symbol: u8) -> Self {
        let mut set = SymbolSet::empty();
        set.0[symbol as usize / 64] |= 1 << (symbol as usize % 64);
        set
    }

    fn contains(&self, symbol: u8) -> bool {
        self.0[symbol as usize / 64] & (1 << (symbol as usize % 64)) != 0
    }

    fn intersect(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet([
            self.0[0] & other.0[0],
            self.0[1] & other.0[1],
            self.0[2] & other.0[2],
            self.0[3] & other.0[3],
        ])
    }

    fn union(&self, other: &SymbolSet) -> SymbolSet {
        SymbolSet([
            self.0[0] | other.0[0],
            self.0[1] | other.0[1],
            self.0[2] | other.0[2],
            self.0[3] | other.0[3],
        ])
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    fn smallest(&self) -> Option<u8> {
        for (word_idx, word) in self.0.iter().enumerate() {
            if *word != 0 {
                return Some((word_idx * 64 + word.trailing_zeros() as usize) as u8);
            }
        }
        None
    }
}

/// Assign a sequence to every tree node by Fitch parsimony.
///
/// Per column, a postorder pass intersects (or, when disjoint, unions)
/// the child symbol sets, and a preorder pass keeps the parent symbol
/// whenever the node's set allows it. Remaining choices take the lowest
/// byte so the assignment is reproducible. Preorder node indexing makes
/// both passes plain index sweeps.
///
fn assign_sequences(
    nodes: &[TreeNode],
    leaf_sequences: &HashMap<usize, &[u8]>,
    length: usize,
) -> Vec<Vec<u8>> {
    let mut sequences: Vec<Vec<u8>> = vec![vec![0; length]; nodes.len()];
    let mut sets: Vec<SymbolSet> = vec![SymbolSet::empty(); nodes.len()];

    for pos in 0..length {
        for idx in (0..nodes.len()).rev() {
            if nodes[idx].children.is_empty() {
                sets[idx] = SymbolSet::singleton(leaf_sequences[&idx][pos]);
            } else {
                let mut intersection = SymbolSet([u64::MAX; 4]);
                let mut union = SymbolSet::empty();
                for child in &nodes[idx].children {
                    intersection = intersection.intersect(&sets[*child]);
                    union = union.union(&sets[*child]);
                }
                sets[idx] = if intersection.is_empty() { union } else { intersection };
            }
        }

        for idx in 0..nodes.len() {
            let chosen = match nodes[idx].parent {
                Some(parent) => {
                    let parent_symbol = sequences[parent][pos];
                    if sets[idx].contains(parent_symbol) {
                        parent_symbol
                    } else {
                        sets[idx].smallest().expect("node set is never empty")
                    }
                },
                None => sets[idx].smallest().expect("node set is never empty"),
            };
            sequences[idx][pos] = chosen;
        }
    }

    sequences
}

// ---------------------------------------------------------------------------
// Main compression / decompression
// ---------------------------------------------------------------------------

/// Compress an alignment together with its Newick tree.
///
/// Leaf labels must match the frame's row identifiers exactly. The
/// payload stores the tree topology, quantised branch lengths, the root
/// sequence, and one parent-diff list per remaining node.
///
pub fn compress_alignment_with_tree(
    frame: &AlignmentFrame,
    newick: &str,
) -> Result<(Vec<u8>, Metadata), Error> {
    frame.validate()?;

    let root = parse_newick(newick)?;
    let (nodes, leaf_indices) = collect_nodes(&root);

    let mut leaf_by_label: HashMap<&str, usize> = HashMap::with_capacity(leaf_indices.len());
    for idx in &leaf_indices {
        let label = nodes[*idx].label.as_deref().ok_or_else(|| Error::MalformedInput(
            "all leaves must be labelled in the Newick tree".to_string(),
        ))?;
        if leaf_by_label.insert(label, *idx).is_some() {
            return Err(Error::MalformedInput(format!(
                "duplicate leaf label '{}' in the Newick tree", label
            )));
        }
    }

    if frame.ids.len() != leaf_indices.len() {
        return Err(Error::MalformedInput(format!(
            "alignment has {} rows but the tree has {} leaves",
            frame.ids.len(), leaf_indices.len()
        )));
    }
    let mut leaf_sequences: HashMap<usize, &[u8]> = HashMap::with_capacity(frame.ids.len());
    for (id, row) in frame.ids.iter().zip(frame.rows.iter()) {
        let idx = leaf_by_label.get(id.as_str()).ok_or_else(|| Error::MalformedInput(format!(
            "alignment sequence IDs must match Newick leaf labels ('{}' has no leaf)", id
        )))?;
        leaf_sequences.insert(*idx, row.as_slice());
    }

    let node_sequences = assign_sequences(&nodes, &leaf_sequences, frame.alignment_length());

    let mut payload: Vec<u8> = BUNDLE_MAGIC.to_vec();
    write_varint(nodes.len() as u64, &mut payload);
    for node in &nodes {
        write_varint(node.parent.map_or(0, |parent| parent as u64 + 1), &mut payload);
        write_varint((node.length * f64::from(BRANCH_SCALE)).round() as u64, &mut payload);
    }

    write_varint(leaf_indices.len() as u64, &mut payload);
    for idx in &leaf_indices {
        let label = nodes[*idx].label.as_deref().unwrap_or("");
        write_varint(*idx as u64, &mut payload);
        write_varint(label.len() as u64, &mut payload);
        payload.extend_from_slice(label.as_bytes());
    }

    let root_sequence = &node_sequences[0];
    write_varint(root_sequence.len() as u64, &mut payload);
    payload.extend_from_slice(root_sequence);

    for node_index in 1..nodes.len() {
        let parent_index = nodes[node_index].parent.expect("preorder non-root node has a parent");
        let parent_seq = &node_sequences[parent_index];
        let node_seq = &node_sequences[node_index];
        let diffs: Vec<(usize, u8)> = parent_seq
            .iter()
            .zip(node_seq.iter())
            .enumerate()
            .filter_map(|(pos, (parent_symbol, node_symbol))| {
                if parent_symbol != node_symbol {
                    Some((pos, *node_symbol))
                } else {
                    None
                }
            })
            .collect();
        write_varint(diffs.len() as u64, &mut payload);
        let mut prev = 0;
        for (pos, symbol) in diffs {
            write_varint((pos - prev) as u64, &mut payload);
            payload.push(symbol);
            prev = pos;
        }
    }

    let mut extra = serde_json::Map::new();
    extra.insert("branch_scale".to_string(), serde_json::json!(BRANCH_SCALE));

    let metadata = Metadata {
        format_version: crate::FORMAT_VERSION.to_string(),
        codec: "phylo-bundle".to_string(),
        num_sequences: frame.num_sequences(),
        alignment_length: frame.alignment_length(),
        alphabet: String::from_utf8(frame.alphabet.clone()).expect("validated ASCII alphabet"),
        payload_encoding: "raw".to_string(),
        bits_per_symbol: global_bits_per_symbol(frame.alphabet.len().max(1)),
        bitmask_bytes: bitmask_len(frame.num_sequences()),
        sequence_id_codec: "metadata".to_string(),
        ordering_strategy: "baseline".to_string(),
        source_format: Some(frame.source_format.clone()),
        checksum_sha256: Some(sequence_checksum(&frame.rows)),
        sequence_permutation: None,
        sequence_ids: Some(frame.ids.clone()),
        fallback: None,
        run_length_blocks: None,
        max_run_length: None,
        columns_with_deviations: None,
        payload_encoded_bytes: Some(payload.len()),
        payload_raw_bytes: Some(payload.len()),
        extra,
    };

    Ok((payload, metadata))
}

/// Reconstruct the alignment and the Newick tree from a bundle payload.
pub fn decompress_alignment_with_tree(
    payload: &[u8],
    metadata: &Metadata,
) -> Result<(AlignmentFrame, String), Error> {
    if payload.len() < BUNDLE_MAGIC.len() || &payload[0..BUNDLE_MAGIC.len()] != BUNDLE_MAGIC {
        return Err(Error::MalformedArchive(
            "invalid phylo bundle header".to_string(),
        ));
    }
    let mut cursor = BUNDLE_MAGIC.len();

    let node_count = read_varint(payload, &mut cursor)? as usize;
    if node_count == 0 || node_count > payload.len() {
        return Err(Error::MalformedArchive(format!(
            "implausible node count {} in phylo bundle", node_count
        )));
    }

    let mut parents: Vec<Option<usize>> = Vec::with_capacity(node_count);
    let mut lengths: Vec<f64> = Vec::with_capacity(node_count);
    for idx in 0..node_count {
        let parent_encoded = read_varint(payload, &mut cursor)? as usize;
        let parent = if parent_encoded == 0 { None } else { Some(parent_encoded - 1) };
        match parent {
            None if idx > 0 => {
                return Err(Error::MalformedArchive(format!(
                    "node {} has no parent but is not the root", idx
                )));
            },
            Some(_) if idx == 0 => {
                return Err(Error::MalformedArchive(
                    "root node must have no parent".to_string(),
                ));
            },
            Some(parent) if parent >= idx => {
                return Err(Error::MalformedArchive(format!(
                    "node {} names parent {} out of preorder", idx, parent
                )));
            },
            _ => {},
        }
        parents.push(parent);
        let length_q = read_varint(payload, &mut cursor)?;
        lengths.push(length_q as f64 / f64::from(BRANCH_SCALE));
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); node_count];
    for (idx, parent) in parents.iter().enumerate() {
        if let Some(parent) = parent {
            children[*parent].push(idx);
        }
    }

    let leaf_count = read_varint(payload, &mut cursor)? as usize;
    if leaf_count > node_count {
        return Err(Error::MalformedArchive(format!(
            "phylo bundle lists {} leaves for {} nodes", leaf_count, node_count
        )));
    }
    let mut leaf_labels: HashMap<usize, String> = HashMap::with_capacity(leaf_count);
    for _ in 0..leaf_count {
        let leaf_idx = read_varint(payload, &mut cursor)? as usize;
        if leaf_idx >= node_count {
            return Err(Error::MalformedArchive(format!(
                "leaf index {} outside the {}-node tree", leaf_idx, node_count
            )));
        }
        let label_len = read_varint(payload, &mut cursor)? as usize;
        if cursor + label_len > payload.len() {
            return Err(Error::MalformedArchive(
                "phylo bundle leaf label truncated".to_string(),
            ));
        }
        let label = std::str::from_utf8(&payload[cursor..cursor + label_len]).map_err(|_| {
            Error::MalformedArchive("phylo bundle leaf label is not valid UTF-8".to_string())
        })?;
        cursor += label_len;
        if leaf_labels.insert(leaf_idx, label.to_string()).is_some() {
            return Err(Error::MalformedArchive(format!(
                "duplicate leaf index {} in phylo bundle", leaf_idx
            )));
        }
    }

    let alignment_length = read_varint(payload, &mut cursor)? as usize;
    if alignment_length != metadata.alignment_length {
        return Err(Error::MalformedArchive(format!(
            "bundle alignment length {} does not match metadata {}",
            alignment_length, metadata.alignment_length
        )));
    }
    if cursor + alignment_length > payload.len() {
        return Err(Error::MalformedArchive(
            "phylo bundle root sequence truncated".to_string(),
        ));
    }
    let root_sequence = payload[cursor..cursor + alignment_length].to_vec();
    cursor += alignment_length;

    let mut node_sequences: Vec<Vec<u8>> = Vec::with_capacity(node_count);
    node_sequences.push(root_sequence);
    for node_index in 1..node_count {
        let diff_count = read_varint(payload, &mut cursor)? as usize;
        let parent_index = parents[node_index].expect("validated non-root parent");
        let mut sequence = node_sequences[parent_index].clone();
        let mut pos = 0_usize;
        for diff_idx in 0..diff_count {
            let delta = read_varint(payload, &mut cursor)? as usize;
            pos += delta;
            if pos >= alignment_length {
                return Err(Error::MalformedArchive(format!(
                    "node {}: diff position {} outside the {}-column alignment",
                    node_index, pos, alignment_length
                )));
            }
            if diff_idx > 0 && delta == 0 {
                return Err(Error::MalformedArchive(format!(
                    "node {}: diff delta of zero repeats a position", node_index
                )));
            }
            if cursor >= payload.len() {
                return Err(Error::MalformedArchive(
                    "phylo bundle diff residue truncated".to_string(),
                ));
            }
            sequence[pos] = payload[cursor];
            cursor += 1;
        }
        node_sequences.push(sequence);
    }

    if cursor != payload.len() {
        return Err(Error::MalformedArchive(format!(
            "{} trailing bytes after the phylo bundle", payload.len() - cursor
        )));
    }

    let ids = metadata.sequence_ids.as_ref().ok_or_else(|| Error::MalformedArchive(
        "phylo bundle metadata is missing sequence identifiers".to_string(),
    ))?;
    if ids.len() != metadata.num_sequences {
        return Err(Error::MalformedArchive(format!(
            "metadata lists {} sequence IDs for {} sequences",
            ids.len(), metadata.num_sequences
        )));
    }

    let mut label_to_node: HashMap<&str, usize> = HashMap::with_capacity(leaf_labels.len());
    for (idx, label) in &leaf_labels {
        if label_to_node.insert(label.as_str(), *idx).is_some() {
            return Err(Error::MalformedArchive(format!(
                "duplicate leaf label '{}' in phylo bundle", label
            )));
        }
    }

    let mut rows: Vec<Vec<u8>> = Vec::with_capacity(ids.len());
    for id in ids {
        let idx = label_to_node.get(id.as_str()).ok_or_else(|| Error::MalformedArchive(format!(
            "sequence ID '{}' has no leaf in the phylo bundle", id
        )))?;
        rows.push(node_sequences[*idx].clone());
    }

    if let Some(expected) = &metadata.checksum_sha256 {
        let got = sequence_checksum(&rows);
        if got != *expected {
            return Err(Error::IntegrityFailure(format!(
                "checksum {} does not match expected {}", got, expected
            )));
        }
    }

    let frame = AlignmentFrame {
        ids: ids.clone(),
        rows,
        alphabet: metadata.alphabet.bytes().collect(),
        source_format: metadata.source_format.clone().unwrap_or_else(|| "unknown".to_string()),
    };

    let newick = build_newick(&children, &leaf_labels, &lengths);
    Ok((frame, newick))
}

// ---------------------------------------------------------------------------
// Newick reconstruction
// ---------------------------------------------------------------------------

fn build_newick(
    children: &[Vec<usize>],
    leaf_labels: &HashMap<usize, String>,
    lengths: &[f64],
) -> String {
    fn recurse(
        node: usize,
        children: &[Vec<usize>],
        leaf_labels: &HashMap<usize, String>,
        lengths: &[f64],
    ) -> String {
        let label = leaf_labels.get(&node).map(String::as_str).unwrap_or("");
        if children[node].is_empty() {
            format!("{}:{:.6}", label, lengths[node])
        } else {
            let inner: Vec<String> = children[node]
                .iter()
                .map(|child| recurse(*child, children, leaf_labels, lengths))
                .collect();
            format!("({}){}:{:.6}", inner.join(","), label, lengths[node])
        }
    }

    let mut newick = recurse(0, children, leaf_labels, lengths);
    newick.push(';');
    newick
}
