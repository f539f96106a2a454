//! Parallel corpus scans.
//!
//! Archives are scanned on a rayon pool. Report rows travel over a bounded
//! channel to a single writer thread, so memory stays flat however many
//! archives are scanned and the report only ever holds complete lines.

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;
use serde::Serialize;
use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, sync_channel};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::archive::{archive_classes, scan_archive};
use crate::graph::Jar;
use crate::report::{ReportError, ReportRow, ReportWriter, Summary};

pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Cooperative stop signal, checked before each archive.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// A flag that also trips once `limit` has elapsed.
    pub fn with_time_limit(limit: Duration) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: Instant::now().checked_add(limit),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Trips `cancel` on the first Ctrl-C. Archives already started still finish
/// and the report gets its summary line.
pub fn cancel_on_interrupt(cancel: CancelFlag) -> JoinHandle<()> {
    cancel_when(cancel, tokio::signal::ctrl_c())
}

/// Trips `cancel` once `signal` resolves, waiting on a background thread.
pub fn cancel_when<S>(cancel: CancelFlag, signal: S) -> JoinHandle<()>
where
    S: Future<Output = std::io::Result<()>> + Send + 'static,
{
    std::thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                warn!(error = %err, "cannot listen for interrupts");
                return;
            }
        };
        match runtime.block_on(signal) {
            Ok(()) => {
                warn!("interrupted, finishing archives already started");
                cancel.cancel();
            }
            Err(err) => warn!(error = %err, "cannot listen for interrupts"),
        }
    })
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Worker threads; `None` uses one per CPU.
    pub threads: Option<usize>,
    pub queue_depth: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            threads: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub scanned: usize,
    pub failed: usize,
    /// Archives never started because the scan was cancelled.
    pub skipped: usize,
    /// Scanned archives left out of the report because their path cannot be
    /// written on one line.
    pub unwritable: usize,
    pub summary: Summary,
}

#[derive(Default)]
struct Counters {
    scanned: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

fn build_pool(threads: Option<usize>) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads.unwrap_or(0))
        .build()
        .context("failed to start scan workers")
}

/// Scans every archive and streams one report row per readable archive to
/// `writer`, then appends the summary line.
pub fn run_scan<W: Write + Send + 'static>(
    archives: &[PathBuf],
    writer: ReportWriter<W>,
    config: &PipelineConfig,
    cancel: &CancelFlag,
) -> Result<ScanOutcome> {
    let pool = build_pool(config.threads)?;
    let (tx, rx) = sync_channel::<ReportRow>(config.queue_depth.max(1));
    let handle = spawn_writer(rx, writer);
    let counters = Counters::default();

    info!(archives = archives.len(), "scanning archives");
    pool.install(|| {
        archives.par_iter().for_each_with(tx, |tx, path| {
            if cancel.is_cancelled() {
                counters.skipped.fetch_add(1, Ordering::Relaxed);
                return;
            }
            match std::panic::catch_unwind(|| scan_archive(path)) {
                Ok(Ok((record, usage))) => {
                    counters.scanned.fetch_add(1, Ordering::Relaxed);
                    if tx.send(ReportRow { record, usage }).is_err() {
                        cancel.cancel();
                    }
                }
                Ok(Err(err)) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    let cause = format!("{err:#}");
                    warn!(archive = %path.display(), error = %cause, "skipping unreadable archive");
                }
                Err(_) => {
                    counters.failed.fetch_add(1, Ordering::Relaxed);
                    warn!(archive = %path.display(), "skipping archive: scanner panicked");
                }
            }
        });
    });

    let (writer, unwritable) = handle
        .join()
        .map_err(|_| anyhow!("report writer thread panicked"))??;
    let summary = writer.finish()?;
    let outcome = ScanOutcome {
        scanned: counters.scanned.into_inner(),
        failed: counters.failed.into_inner(),
        skipped: counters.skipped.into_inner(),
        unwritable,
        summary,
    };
    info!(
        scanned = outcome.scanned,
        failed = outcome.failed,
        skipped = outcome.skipped,
        unwritable = outcome.unwritable,
        "scan finished"
    );
    Ok(outcome)
}

/// Drains rows into the report until every sender is gone. Rows whose path
/// cannot be represented are dropped and counted; I/O failures end the
/// thread, which makes later sends fail and stops the workers.
fn spawn_writer<W: Write + Send + 'static>(
    rx: Receiver<ReportRow>,
    mut writer: ReportWriter<W>,
) -> JoinHandle<Result<(ReportWriter<W>, usize), ReportError>> {
    std::thread::spawn(move || {
        let mut dropped = 0;
        for row in rx {
            match writer.write(&row) {
                Ok(()) => {}
                Err(ReportError::UnwritablePath(path)) => {
                    dropped += 1;
                    warn!(archive = %path, "skipping archive with unwritable path")
                }
                Err(err) => return Err(err),
            }
        }
        Ok((writer, dropped))
    })
}

/// Collects the class reference lists of every archive, one [`Jar`] per
/// archive in input order. Unreadable archives are logged and left out.
pub fn collect_graph(
    archives: &[PathBuf],
    threads: Option<usize>,
    cancel: &CancelFlag,
) -> Result<Vec<Jar>> {
    let pool = build_pool(threads)?;
    let jars = pool.install(|| {
        archives
            .par_iter()
            .filter_map(|path| {
                if cancel.is_cancelled() {
                    return None;
                }
                match archive_classes(path) {
                    Ok((_, classes)) => Some(Jar {
                        name: jar_name(path),
                        classes,
                    }),
                    Err(err) => {
                        let cause = format!("{err:#}");
                        warn!(archive = %path.display(), error = %cause, "skipping unreadable archive");
                        None
                    }
                }
            })
            .collect()
    });
    Ok(jars)
}

fn jar_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
