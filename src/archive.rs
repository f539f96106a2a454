use anyhow::{Context, Result};
use memmap2::Mmap;
use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::graph::ClassRecord;
use crate::references::{ClassReferences, scan_class};
use crate::timestamp::{system_time_millis, zip_datetime_millis};
use crate::usage::Usage;

/// Stored for sizes and counts that a report version did not record.
pub const UNKNOWN: i64 = -1;

/// Extensions of archives that are scanned, on disk and when nested.
pub const ARCHIVE_EXTENSIONS: [&str; 4] = ["jar", "war", "ear", "rar"];

const MAX_NESTING: usize = 16;

/// Upper bound on buffer space reserved from an entry's declared size.
const MAX_PREALLOC: usize = 1 << 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveRecord {
    pub path: PathBuf,
    /// Lowercase hex SHA-1 of the archive file.
    pub sha1: String,
    /// Filesystem modification time, epoch millis.
    pub last_modified: i64,
    /// Newest entry time inside the archive, epoch millis; 0 if it has no entries.
    pub internal_timestamp: i64,
    pub size: i64,
    pub class_count: i64,
    pub bytecode_versions: BTreeSet<u16>,
}

pub fn is_archive_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Scans every class in the archive, nested archives included, and tallies
/// the namespaces they reference.
pub fn scan_archive(path: &Path) -> Result<(ArchiveRecord, Usage)> {
    let mut usage = Usage::new();
    let record = walk_archive(path, &mut |class: ClassReferences| {
        for reference in &class.references {
            usage.record(reference);
        }
    })?;
    debug!(
        archive = %path.display(),
        classes = record.class_count,
        javax = usage.javax(),
        jakarta = usage.jakarta(),
        "scanned archive"
    );
    Ok((record, usage))
}

/// Lists the reference set of every class in the archive.
pub fn archive_classes(path: &Path) -> Result<(ArchiveRecord, Vec<ClassRecord>)> {
    let mut classes = Vec::new();
    let record = walk_archive(path, &mut |class: ClassReferences| {
        classes.push(ClassRecord {
            name: class.class_name,
            references: class.references,
        });
    })?;
    Ok((record, classes))
}

#[derive(Default)]
struct Tally {
    newest: i64,
    classes: i64,
    versions: BTreeSet<u16>,
}

impl Tally {
    fn absorb(&mut self, other: Tally) {
        self.newest = self.newest.max(other.newest);
        self.classes += other.classes;
        self.versions.extend(other.versions);
    }
}

fn walk_archive(path: &Path, on_class: &mut dyn FnMut(ClassReferences)) -> Result<ArchiveRecord> {
    let file =
        File::open(path).with_context(|| format!("failed to open archive: {}", path.display()))?;
    let last_modified = file
        .metadata()
        .and_then(|m| m.modified())
        .map(system_time_millis)
        .unwrap_or(0);
    // SAFETY: The file is opened read-only and outlives the mapping.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("failed to mmap archive: {}", path.display()))?;
    let sha1 = hex::encode(Sha1::digest(&mmap[..]));

    let zip = ZipArchive::new(Cursor::new(&mmap[..]))
        .with_context(|| format!("failed to read zip structure: {}", path.display()))?;
    let mut tally = Tally::default();
    walk_zip(zip, &path.display().to_string(), 0, &mut tally, on_class)?;

    Ok(ArchiveRecord {
        path: path.to_path_buf(),
        sha1,
        last_modified,
        internal_timestamp: tally.newest,
        size: i64::try_from(mmap.len()).unwrap_or(i64::MAX),
        class_count: tally.classes,
        bytecode_versions: tally.versions,
    })
}

fn walk_zip<R: Read + Seek>(
    mut zip: ZipArchive<R>,
    label: &str,
    depth: usize,
    tally: &mut Tally,
    on_class: &mut dyn FnMut(ClassReferences),
) -> Result<()> {
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .with_context(|| format!("failed to read entry {i} of {label}"))?;
        if let Some(millis) = zip_datetime_millis(entry.last_modified()) {
            tally.newest = tally.newest.max(millis);
        }
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();

        if name.ends_with(".class") {
            let declared = usize::try_from(entry.size()).unwrap_or(0);
            let mut bytes = Vec::with_capacity(declared.min(MAX_PREALLOC));
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("failed to inflate {name} in {label}"))?;
            match scan_class(&bytes) {
                Ok(class) => {
                    tally.classes += 1;
                    tally.versions.insert(class.major_version);
                    on_class(class);
                }
                Err(err) => warn!(archive = label, entry = %name, error = %err, "skipping unparseable class"),
            }
        } else if is_archive_name(&name) {
            let nested_label = format!("{label}!/{name}");
            if depth >= MAX_NESTING {
                warn!(archive = %nested_label, "skipping nested archive: nesting too deep");
                continue;
            }
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .with_context(|| format!("failed to inflate {name} in {label}"))?;
            // A nested archive counts only if every entry in it could be read.
            let mut scratch = Tally::default();
            let mut buffered = Vec::new();
            let nested = match ZipArchive::new(Cursor::new(bytes)) {
                Ok(zip) => walk_zip(
                    zip,
                    &nested_label,
                    depth + 1,
                    &mut scratch,
                    &mut |class: ClassReferences| buffered.push(class),
                ),
                Err(err) => Err(err.into()),
            };
            match nested {
                Ok(()) => {
                    tally.absorb(scratch);
                    for class in buffered {
                        on_class(class);
                    }
                }
                Err(err) => {
                    let cause = format!("{err:#}");
                    warn!(archive = %nested_label, error = %cause, "skipping unreadable nested archive");
                }
            }
        }
    }
    Ok(())
}
