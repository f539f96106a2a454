use anyhow::{Context, Result};
use clap::Parser;
use jakarta_census::cli::{Cli, Commands, OutputFormat};
use jakarta_census::closure::{Ranking, analyze, rank};
use jakarta_census::config::{self, ConfigError, ReportTarget};
use jakarta_census::graph::{load_jars, merge_classes, save_jars, split_by_namespace};
use jakarta_census::namespace::Namespace;
use jakarta_census::pipeline::{
    CancelFlag, PipelineConfig, ScanOutcome, cancel_on_interrupt, collect_graph, run_scan,
};
use jakarta_census::report::{ReportError, ReportReader, ReportWriter, Summary};
use jakarta_census::scan::{ArchiveFilter, find_archives};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(config_err) = err.downcast_ref::<ConfigError>() {
        return config_err.exit_code();
    }
    if let Some(ReportError::UnsupportedVersion { .. }) = err.downcast_ref::<ReportError>() {
        return 5;
    }
    1
}

fn run(cli: Cli) -> Result<()> {
    let threads = config::resolve_threads(cli.threads)?;

    match cli.command {
        Commands::Scan {
            inputs,
            root,
            output,
            include,
            exclude,
            queue,
            time_limit,
            format,
        } => {
            let root = config::resolve_root(root)?;
            let archives = find_archives(&inputs, &ArchiveFilter { include, exclude })?;
            if archives.is_empty() {
                return Err(ConfigError::NoArchives.into());
            }
            let cancel = match time_limit {
                Some(secs) => CancelFlag::with_time_limit(Duration::from_secs(secs)),
                None => CancelFlag::new(),
            };
            cancel_on_interrupt(cancel.clone());
            let pipeline = PipelineConfig {
                threads,
                queue_depth: queue,
            };
            let target = config::resolve_output(output);
            let outcome = match &target {
                ReportTarget::Stdout => {
                    let writer = ReportWriter::new(std::io::stdout(), Some(root))?;
                    run_scan(&archives, writer, &pipeline, &cancel)?
                }
                ReportTarget::File(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("failed to create report: {}", path.display()))?;
                    let writer = ReportWriter::new(BufWriter::new(file), Some(root))?;
                    run_scan(&archives, writer, &pipeline, &cancel)?
                }
            };
            match target {
                // stdout already carries the report itself
                ReportTarget::Stdout => eprintln!("{}", outcome.summary.describe()),
                ReportTarget::File(path) => write_scan_output(&path, &outcome, format)?,
            }
        }
        Commands::Read { report, format } => {
            let output = read_report(&report)?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&output)?),
                OutputFormat::Text => {
                    println!("report: {} (v{})", output.report, output.version);
                    print_summary_text(&output.summary);
                    if output.malformed_lines > 0 {
                        println!("malformed lines: {}", output.malformed_lines);
                    }
                }
            }
        }
        Commands::Graph {
            inputs,
            output,
            include,
            exclude,
        } => {
            let archives = find_archives(&inputs, &ArchiveFilter { include, exclude })?;
            if archives.is_empty() {
                return Err(ConfigError::NoArchives.into());
            }
            let jars = collect_graph(&archives, threads, &CancelFlag::new())?;
            match output {
                Some(path) => {
                    save_jars(&path, &jars)?;
                    let output = GraphOutput {
                        graph: path.display().to_string(),
                        jars: jars.len(),
                        classes: jars.iter().map(|j| j.classes.len()).sum(),
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                None => println!("{}", serde_json::to_string_pretty(&jars)?),
            }
        }
        Commands::Closure { graphs, format } => {
            let mut jars = Vec::new();
            for graph in &graphs {
                jars.extend(load_jars(graph)?);
            }
            let namespaces = split_by_namespace(&merge_classes(&jars));
            let ranking = rank(analyze(&namespaces));
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ranking)?),
                OutputFormat::Text => print_ranking_text(&ranking),
            }
        }
        Commands::Namespaces { format } => match format {
            OutputFormat::Json => {
                let table: Vec<NamespaceOutput> = Namespace::ALL
                    .iter()
                    .map(|ns| NamespaceOutput {
                        name: ns.name(),
                        excluded_prefixes: ns.excluded_prefixes(),
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&table)?);
            }
            OutputFormat::Text => {
                for ns in Namespace::ALL.iter() {
                    if ns.excluded_prefixes().is_empty() {
                        println!("{ns}");
                    } else {
                        println!("{ns}\t(except {})", ns.excluded_prefixes().join(", "));
                    }
                }
            }
        },
    }

    Ok(())
}

#[derive(Debug, Serialize)]
struct ScanOutput<'a> {
    report: String,
    scanned: usize,
    failed: usize,
    skipped: usize,
    unwritable: usize,
    description: String,
    summary: &'a Summary,
}

#[derive(Debug, Serialize)]
struct ReadOutput {
    report: String,
    version: u32,
    malformed_lines: usize,
    description: String,
    summary: Summary,
}

#[derive(Debug, Serialize)]
struct GraphOutput {
    graph: String,
    jars: usize,
    classes: usize,
}

#[derive(Debug, Serialize)]
struct NamespaceOutput {
    name: &'static str,
    excluded_prefixes: &'static [&'static str],
}

fn write_scan_output(report: &Path, outcome: &ScanOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let output = ScanOutput {
                report: report.display().to_string(),
                scanned: outcome.scanned,
                failed: outcome.failed,
                skipped: outcome.skipped,
                unwritable: outcome.unwritable,
                description: outcome.summary.describe(),
                summary: &outcome.summary,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Text => {
            println!("report: {}", report.display());
            println!(
                "scanned: {}, failed: {}, skipped: {}, unwritable: {}",
                outcome.scanned, outcome.failed, outcome.skipped, outcome.unwritable
            );
            print_summary_text(&outcome.summary);
        }
    }
    Ok(())
}

fn read_report(path: &Path) -> Result<ReadOutput> {
    let file =
        File::open(path).with_context(|| format!("failed to open report: {}", path.display()))?;
    let mut malformed_lines = 0usize;
    let mut summary = Summary::default();
    let version = {
        let reader = ReportReader::open(BufReader::new(file), |line| {
            malformed_lines += 1;
            warn!(
                line = line.line_number,
                reason = %line.reason,
                "skipping malformed report line"
            );
        })?;
        let version = reader.schema().version;
        for row in reader {
            summary.add(&row?);
        }
        version
    };
    Ok(ReadOutput {
        report: path.display().to_string(),
        version,
        malformed_lines,
        description: summary.describe(),
        summary,
    })
}

fn print_summary_text(summary: &Summary) {
    println!("{}", summary.describe());
    println!("javax: {}", summary.usage.javax());
    println!("jakarta: {}", summary.usage.jakarta());
    for (ns, count) in summary.usage.iter().filter(|(_, count)| *count > 0) {
        println!("  {ns}: {count}");
    }
}

fn print_ranking_text(ranking: &Ranking) {
    println!("simple ({}):", ranking.simple.len());
    for name in &ranking.simple {
        println!("  {name}");
    }
    println!("complex ({}):", ranking.complex.len());
    for closure in &ranking.complex {
        println!("  {} -> {}", closure.jar, closure.affected[1..].join(", "));
        for reason in &closure.reasons {
            println!("      {} references {}", reason.from, reason.to);
        }
    }
}
