//! Versioned, tab-separated scan reports.
//!
//! The first line of a report is a heading naming its columns; the SHA-1 of
//! that line selects the column layout. Each following line is one archive,
//! and a completed report ends with a summary line whose hash column is all
//! zeros. Only the newest layout is written; every layout in [`SCHEMAS`] can
//! be read.

use serde::Serialize;
use sha1::{Digest, Sha1};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::archive::{ArchiveRecord, UNKNOWN};
use crate::namespace::Namespace;
use crate::usage::Usage;

pub const CURRENT_VERSION: u32 = 7;

/// Hash column value of the summary line.
pub const SUMMARY_HASH: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("report has no heading line")]
    MissingHeading,
    #[error("unsupported report version (heading hash {hash})")]
    UnsupportedVersion { hash: String },
    #[error("archive path cannot be written to a report: {0:?}")]
    UnwritablePath(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Sha1,
    LastModified,
    InternalTimestamp,
    Size,
    ClassCount,
    BytecodeVersions,
    Path,
}

impl Column {
    fn name(self) -> &'static str {
        match self {
            Column::Sha1 => "sha1",
            Column::LastModified => "last_modified",
            Column::InternalTimestamp => "internal_timestamp",
            Column::Size => "size",
            Column::ClassCount => "class_count",
            Column::BytecodeVersions => "bytecode_versions",
            Column::Path => "path",
        }
    }
}

/// Column layout of one report version.
#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub version: u32,
    columns: &'static [Column],
}

pub static SCHEMAS: [Schema; 3] = [
    Schema {
        version: 5,
        columns: &[
            Column::Sha1,
            Column::LastModified,
            Column::InternalTimestamp,
            Column::Path,
        ],
    },
    Schema {
        version: 6,
        columns: &[
            Column::Sha1,
            Column::LastModified,
            Column::InternalTimestamp,
            Column::Size,
            Column::ClassCount,
            Column::Path,
        ],
    },
    Schema {
        version: 7,
        columns: &[
            Column::Sha1,
            Column::LastModified,
            Column::InternalTimestamp,
            Column::Size,
            Column::ClassCount,
            Column::BytecodeVersions,
            Column::Path,
        ],
    },
];

impl Schema {
    pub fn current() -> &'static Schema {
        &SCHEMAS[SCHEMAS.len() - 1]
    }

    pub fn for_version(version: u32) -> Option<&'static Schema> {
        SCHEMAS.iter().find(|s| s.version == version)
    }

    /// Finds the layout whose heading hashes like `line`.
    pub fn detect(line: &str) -> Result<&'static Schema, ReportError> {
        let hash = heading_hash(line);
        SCHEMAS
            .iter()
            .find(|s| s.heading_hash() == hash)
            .ok_or(ReportError::UnsupportedVersion { hash })
    }

    pub fn heading(&self) -> String {
        let metadata = self.columns.iter().map(|c| c.name());
        let totals = ["javax", "jakarta"].into_iter();
        let buckets = Namespace::ALL.iter().map(|ns| ns.name());
        metadata
            .chain(totals)
            .chain(buckets)
            .collect::<Vec<_>>()
            .join("\t")
    }

    pub fn heading_hash(&self) -> String {
        heading_hash(&self.heading())
    }

    fn field_count(&self) -> usize {
        self.columns.len() + 2 + Namespace::ALL.len()
    }

    fn format_line(&self, record: &ArchiveRecord, path: &str, usage: &Usage) -> String {
        let mut fields: Vec<String> = Vec::with_capacity(self.field_count());
        for column in self.columns {
            fields.push(match column {
                Column::Sha1 => record.sha1.clone(),
                Column::LastModified => record.last_modified.to_string(),
                Column::InternalTimestamp => record.internal_timestamp.to_string(),
                Column::Size => record.size.to_string(),
                Column::ClassCount => record.class_count.to_string(),
                Column::BytecodeVersions => record
                    .bytecode_versions
                    .iter()
                    .map(u16::to_string)
                    .collect::<Vec<_>>()
                    .join(","),
                Column::Path => path.to_string(),
            });
        }
        fields.push(usage.javax().to_string());
        fields.push(usage.jakarta().to_string());
        fields.extend(usage.iter().map(|(_, count)| count.to_string()));
        let mut line = fields.join("\t");
        line.push('\n');
        line
    }

    /// Parses one line. Summary lines parse to `None`.
    fn parse_line(&self, line: &str) -> Result<Option<ReportRow>, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != self.field_count() {
            return Err(format!(
                "expected {} columns, found {}",
                self.field_count(),
                fields.len()
            ));
        }

        let mut record = ArchiveRecord {
            path: PathBuf::new(),
            sha1: String::new(),
            last_modified: 0,
            internal_timestamp: 0,
            size: UNKNOWN,
            class_count: UNKNOWN,
            bytecode_versions: BTreeSet::new(),
        };
        for (column, field) in self.columns.iter().zip(&fields) {
            match column {
                Column::Sha1 => {
                    if *field == SUMMARY_HASH {
                        return Ok(None);
                    }
                    if field.len() != 40 || !field.bytes().all(|b| b.is_ascii_hexdigit()) {
                        return Err(format!("invalid sha1 `{field}`"));
                    }
                    record.sha1 = field.to_ascii_lowercase();
                }
                Column::LastModified => record.last_modified = parse_number(*column, field)?,
                Column::InternalTimestamp => {
                    record.internal_timestamp = parse_number(*column, field)?
                }
                Column::Size => record.size = parse_number(*column, field)?,
                Column::ClassCount => record.class_count = parse_number(*column, field)?,
                Column::BytecodeVersions => {
                    for version in field.split(',').filter(|v| !v.is_empty()) {
                        record.bytecode_versions.insert(parse_number(*column, version)?);
                    }
                }
                Column::Path => record.path = PathBuf::from(field),
            }
        }

        let counts = &fields[self.columns.len()..];
        let javax: u64 = counts[0]
            .parse()
            .map_err(|_| format!("invalid javax total `{}`", counts[0]))?;
        let jakarta: u64 = counts[1]
            .parse()
            .map_err(|_| format!("invalid jakarta total `{}`", counts[1]))?;
        let mut usage = Usage::new();
        for (ns, field) in Namespace::ALL.iter().zip(&counts[2..]) {
            let count: u64 = field
                .parse()
                .map_err(|_| format!("invalid count `{field}` for {ns}"))?;
            usage.add(*ns, count);
        }
        if usage.javax() != javax || usage.jakarta() != jakarta {
            return Err("family totals do not match namespace counts".to_string());
        }
        Ok(Some(ReportRow { record, usage }))
    }
}

fn heading_hash(line: &str) -> String {
    hex::encode(Sha1::digest(line.as_bytes()))
}

fn parse_number<T: std::str::FromStr>(column: Column, field: &str) -> Result<T, String> {
    field
        .parse()
        .map_err(|_| format!("invalid {} `{field}`", column.name()))
}

/// One archive's metadata and the namespaces its classes reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub record: ArchiveRecord,
    pub usage: Usage,
}

/// Running totals over the rows of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub archives: u64,
    /// Archives with at least one legacy namespace reference.
    pub legacy_archives: u64,
    pub classes: u64,
    pub bytes: u64,
    pub usage: Usage,
}

impl Summary {
    pub fn add(&mut self, row: &ReportRow) {
        self.archives += 1;
        if row.usage.javax() > 0 {
            self.legacy_archives += 1;
        }
        self.classes += u64::try_from(row.record.class_count).unwrap_or(0);
        self.bytes += u64::try_from(row.record.size).unwrap_or(0);
        self.usage = self.usage.merge(&row.usage);
    }

    pub fn legacy_percent(&self) -> u64 {
        if self.archives == 0 {
            0
        } else {
            self.legacy_archives * 100 / self.archives
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{}% ({} of {} archives use a legacy namespace)",
            self.legacy_percent(),
            self.legacy_archives,
            self.archives
        )
    }

    fn line(&self, schema: &Schema) -> String {
        let record = ArchiveRecord {
            path: PathBuf::new(),
            sha1: SUMMARY_HASH.to_string(),
            last_modified: 0,
            internal_timestamp: 0,
            size: i64::try_from(self.bytes).unwrap_or(i64::MAX),
            class_count: i64::try_from(self.classes).unwrap_or(i64::MAX),
            bytecode_versions: BTreeSet::new(),
        };
        schema.format_line(&record, &self.describe(), &self.usage)
    }
}

/// Streams rows to a sink in the current layout, one flushed line at a time.
pub struct ReportWriter<W: Write> {
    sink: W,
    root: Option<PathBuf>,
    summary: Summary,
}

impl<W: Write> ReportWriter<W> {
    /// Writes the heading. Archive paths under `root` are written relative
    /// to it.
    pub fn new(mut sink: W, root: Option<PathBuf>) -> Result<Self, ReportError> {
        let mut heading = Schema::current().heading();
        heading.push('\n');
        sink.write_all(heading.as_bytes())?;
        sink.flush()?;
        Ok(Self {
            sink,
            root,
            summary: Summary::default(),
        })
    }

    pub fn write(&mut self, row: &ReportRow) -> Result<(), ReportError> {
        let path = self.report_path(&row.record.path)?;
        let line = Schema::current().format_line(&row.record, &path, &row.usage);
        self.sink.write_all(line.as_bytes())?;
        self.sink.flush()?;
        self.summary.add(row);
        Ok(())
    }

    pub fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Appends the summary line and returns the totals.
    pub fn finish(mut self) -> Result<Summary, ReportError> {
        let line = self.summary.line(Schema::current());
        self.sink.write_all(line.as_bytes())?;
        self.sink.flush()?;
        Ok(self.summary)
    }

    fn report_path(&self, path: &Path) -> Result<String, ReportError> {
        let relative = match &self.root {
            Some(root) => path.strip_prefix(root).unwrap_or(path),
            None => path,
        };
        let text = relative.to_string_lossy().into_owned();
        if text.contains(['\t', '\n', '\r']) {
            return Err(ReportError::UnwritablePath(text));
        }
        Ok(text)
    }
}

/// A report line that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based, counting the heading.
    pub line_number: usize,
    pub text: String,
    pub reason: String,
}

/// Lazily reads the archive rows of a report, skipping the summary line and
/// handing malformed lines to a callback.
pub struct ReportReader<R, F> {
    source: R,
    buf: Vec<u8>,
    schema: &'static Schema,
    line_number: usize,
    on_malformed: F,
}

impl<R: BufRead, F: FnMut(MalformedLine)> ReportReader<R, F> {
    pub fn open(mut source: R, on_malformed: F) -> Result<Self, ReportError> {
        let mut heading = Vec::new();
        if source.read_until(b'\n', &mut heading)? == 0 {
            return Err(ReportError::MissingHeading);
        }
        let heading = String::from_utf8_lossy(&heading);
        let schema = Schema::detect(heading.trim_end_matches(['\n', '\r']))?;
        Ok(Self {
            source,
            buf: Vec::new(),
            schema,
            line_number: 1,
            on_malformed,
        })
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }
}

impl<R: BufRead, F: FnMut(MalformedLine)> Iterator for ReportReader<R, F> {
    type Item = Result<ReportRow, ReportError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.source.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(err.into())),
            }
            self.line_number += 1;
            let line = match std::str::from_utf8(&self.buf) {
                Ok(line) => line.trim_end_matches(['\n', '\r']),
                Err(err) => {
                    (self.on_malformed)(MalformedLine {
                        line_number: self.line_number,
                        text: String::from_utf8_lossy(&self.buf)
                            .trim_end_matches(['\n', '\r'])
                            .to_string(),
                        reason: format!("not valid UTF-8: {err}"),
                    });
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match self.schema.parse_line(line) {
                Ok(Some(row)) => return Some(Ok(row)),
                Ok(None) => continue,
                Err(reason) => (self.on_malformed)(MalformedLine {
                    line_number: self.line_number,
                    text: line.to_string(),
                    reason,
                }),
            }
        }
    }
}
