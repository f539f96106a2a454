use anyhow::{Context, Result};
use ignore::WalkBuilder;
use ignore::overrides::{Override, OverrideBuilder};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use crate::archive::is_archive_name;

/// Filename globs narrowing which archives are scanned. Globs follow
/// gitignore syntax relative to each input directory.
#[derive(Debug, Clone, Default)]
pub struct ArchiveFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ArchiveFilter {
    fn overrides(&self, root: &Path) -> Result<Override> {
        let mut builder = OverrideBuilder::new(root);
        for glob in &self.include {
            builder
                .add(glob)
                .with_context(|| format!("invalid include pattern: {glob}"))?;
        }
        for glob in &self.exclude {
            builder
                .add(&format!("!{glob}"))
                .with_context(|| format!("invalid exclude pattern: {glob}"))?;
        }
        builder.build().context("failed to build archive filter")
    }
}

/// Lists archives under each input, sorted and without duplicates. Inputs
/// that are files are taken as given.
pub fn find_archives(inputs: &[PathBuf], filter: &ArchiveFilter) -> Result<Vec<PathBuf>> {
    let mut archives = Vec::new();
    for input in inputs {
        if input.is_file() {
            archives.push(input.clone());
        } else {
            archives.extend(scan_archives(input, filter)?);
        }
    }
    archives.sort();
    archives.dedup();
    Ok(archives)
}

pub fn scan_archives(base_path: &Path, filter: &ArchiveFilter) -> Result<Vec<PathBuf>> {
    if !base_path.exists() {
        anyhow::bail!("input does not exist: {}", base_path.display());
    }
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .overrides(filter.overrides(base_path)?)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            if let Ok(entry) = entry {
                let path = entry.path();
                let is_file = entry.file_type().is_some_and(|t| t.is_file());
                if is_file && path.to_str().is_some_and(is_archive_name) {
                    let _ = tx.send(path.to_path_buf());
                }
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    let mut archives: Vec<PathBuf> = rx.iter().collect();
    archives.sort();
    Ok(archives)
}
