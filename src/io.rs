//! Reading input trees and writing result matrices.
//!
//! Two input layouts are understood, optionally gzip-compressed (`.gz`):
//! - plain Newick, one or more trees each terminated by `;`,
//! - NEXUS as written by BEAST: a `TREES` block of `tree NAME = ...;` lines
//!   with an optional `TRANSLATE` table mapping leaf ids to taxon labels.

use crate::errors::{HybridError, Result};
use crate::preprocess::parse_newick;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use log::{debug, warn};
use phylotree::tree::Tree;
use rustc_hash::FxHashMap;
use std::fmt::Display;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A tree together with the label it gets in the output matrix.
pub type NamedTree = (String, Tree);

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Reads a whole file, gunzipping it when the name ends in `.gz`.
fn read_text(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut text = String::new();
    if is_gzip(path) {
        GzDecoder::new(file).read_to_string(&mut text)?;
    } else {
        BufReader::new(file).read_to_string(&mut text)?;
    }
    Ok(text)
}

/// File name without the tree-file and compression extensions.
fn base_name(path: &Path) -> String {
    let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("trees");
    let name = name.strip_suffix(".gz").unwrap_or(name);
    [".trees", ".tree", ".nex", ".nexus", ".nwk", ".newick", ".tre"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .unwrap_or(name)
        .to_string()
}

/// Removes `[&...]` annotations (BEAST rates, `[&R]` rooting marks) and keeps
/// everything else, branch lengths included.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }
    result
}

/// Reads every tree of a Newick or NEXUS file.
///
/// The first `burnin_trees` trees are dropped. Trees are named after the
/// file (`<base>_tree<N>` for Newick, `<base>_tree_STATE<N>` for BEAST
/// output). With `use_real_taxa`, NEXUS leaves are renamed through the
/// `TRANSLATE` table.
pub fn read_trees<P: AsRef<Path>>(path: P, burnin_trees: usize, use_real_taxa: bool) -> Result<Vec<NamedTree>> {
    let path = path.as_ref();
    let content = read_text(path)?;
    let base = base_name(path);

    let trees = if content.trim_start().to_ascii_uppercase().starts_with("#NEXUS") {
        read_nexus(&content, &base, burnin_trees, use_real_taxa)?
    } else {
        read_newick(&content, &base, burnin_trees)?
    };
    debug!("read {} trees from {}", trees.len(), path.display());
    Ok(trees)
}

fn read_newick(content: &str, base: &str, burnin_trees: usize) -> Result<Vec<NamedTree>> {
    strip_beast_annotations(content)
        .split(';')
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .enumerate()
        .skip(burnin_trees)
        .map(|(idx, chunk)| Ok((format!("{base}_tree{idx}"), parse_newick(&format!("{chunk};"))?)))
        .collect()
}

fn read_nexus(content: &str, base: &str, burnin_trees: usize, use_real_taxa: bool) -> Result<Vec<NamedTree>> {
    let taxons = parse_taxon_block(content);
    if use_real_taxa && taxons.is_empty() {
        warn!("no TRANSLATE block in {base}; keeping leaf labels as they are");
    }

    collect_tree_blocks(content)
        .into_iter()
        .enumerate()
        .skip(burnin_trees)
        .map(|(idx, block)| {
            let state = extract_state(block.header);
            let newick = strip_beast_annotations(&block.body);
            let mut tree = parse_newick(newick.trim()).map_err(|e| match e {
                HybridError::Newick(msg) => HybridError::Newick(format!("tree {idx} of {base}: {msg}")),
                other => other,
            })?;
            if use_real_taxa {
                rename_leaf_nodes(&mut tree, &taxons);
            }
            let name = match state {
                Some(state) => format!("{base}_tree_STATE{state}"),
                None => format!("{base}_tree{idx}"),
            };
            Ok((name, tree))
        })
        .collect()
}

/// The number after `STATE_` in a BEAST tree header.
fn extract_state(header: &str) -> Option<usize> {
    let start = header.to_ascii_uppercase().find("STATE_")? + "STATE_".len();
    let digits: String = header[start..].chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

struct TreeBlock<'a> {
    header: &'a str,
    body: String,
}

/// `tree NAME = NEWICK` lines of the first TREES block.
fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let (header, body) = line.split_once('=')?;
            Some(TreeBlock { header: header.trim(), body: body.trim().to_string() })
        })
        .collect()
}

/// Leaf id to label, from a block such as
/// ```text
/// Translate
///     1 '1959.M.CD.59.ZR59',
///     2 '1960.DRC60A'
/// ;
/// ```
fn parse_taxon_block(content: &str) -> FxHashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().starts_with(';'))
        .filter_map(|line| {
            let line = line.trim().trim_end_matches([',', ';']);
            let (id, label) = line.split_once(char::is_whitespace)?;
            Some((id.to_string(), label.trim().trim_matches('\'').to_string()))
        })
        .collect()
}

/// Renames leaves through `translate`; leaves without an entry keep their name.
pub fn rename_leaf_nodes(tree: &mut Tree, translate: &FxHashMap<String, String>) {
    for leaf_id in tree.get_leaves() {
        if let Ok(node) = tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Writes a labelled square matrix as TSV.
///
/// `-` writes to stdout; a path ending in `.gz` is gzip-compressed.
pub fn write_matrix_tsv<P: AsRef<Path>, T: Display>(path: P, names: &[String], mat: &[Vec<T>]) -> Result<()> {
    let path = path.as_ref();
    let mut out: Box<dyn Write> = if path.as_os_str() == "-" {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else if is_gzip(path) {
        Box::new(BufWriter::new(GzEncoder::new(File::create(path)?, Compression::default())))
    } else {
        Box::new(BufWriter::new(File::create(path)?))
    };

    writeln!(out, "\t{}", names.join("\t"))?;
    for (name, row) in names.iter().zip(mat) {
        write!(out, "{name}")?;
        for value in row {
            write!(out, "\t{value}")?;
        }
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}
