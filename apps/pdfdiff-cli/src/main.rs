//! pdfdiff binary
//!
//! Compares a master PDF with its edited revision and writes the edited
//! document with the changes highlighted.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pdfdiff_core::{
    compare_documents_with_cancellation, CancellationFlag, ChangeKind, ComparisonReport,
    DiffConfig, DiffError, Granularity, Rgb,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "pdfdiff")]
#[command(version, about = "Highlight the differences between two revisions of a PDF")]
struct Args {
    /// Original document
    master: PathBuf,

    /// Revised document; its annotated copy is written to OUTPUT
    edited: PathBuf,

    /// Where to write the annotated document
    output: PathBuf,

    /// Comparison unit: char or paragraph
    #[arg(short, long)]
    granularity: Option<Granularity>,

    /// Pages compared concurrently (default: twice the CPU count)
    #[arg(short, long)]
    workers: Option<usize>,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Colour for inserted text, #RRGGBB
    #[arg(long)]
    insert_color: Option<String>,

    /// Colour for deleted text, #RRGGBB
    #[arg(long)]
    delete_color: Option<String>,

    /// Colour for modified paragraphs, #RRGGBB
    #[arg(long)]
    modify_color: Option<String>,

    /// Highlight opacity between 0 and 1
    #[arg(long)]
    opacity: Option<f32>,

    /// Write a JSON report of the run
    #[arg(long)]
    report: Option<PathBuf>,
}

impl Args {
    /// File configuration (or defaults) with command-line overrides applied
    fn to_config(&self) -> Result<DiffConfig> {
        let mut config = match &self.config {
            Some(path) => DiffConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => DiffConfig::default(),
        };

        if let Some(granularity) = self.granularity {
            config.granularity = granularity;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(color) = &self.insert_color {
            config.highlight.insertion = Rgb::from_hex(color)?;
        }
        if let Some(color) = &self.delete_color {
            config.highlight.deletion = Rgb::from_hex(color)?;
        }
        if let Some(color) = &self.modify_color {
            config.highlight.modified = Rgb::from_hex(color)?;
        }
        if let Some(opacity) = self.opacity {
            config.highlight.opacity = opacity;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr, the summary to stdout
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = args.to_config()?;
    tracing::info!("pdfdiff v{}", env!("CARGO_PKG_VERSION"));

    let cancel = CancellationFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            on_interrupt.cancel();
        }
    });

    let result = compare_documents_with_cancellation(
        &args.master,
        &args.edited,
        &args.output,
        &config,
        cancel,
    )
    .await;

    let report = match result {
        Ok(report) => report,
        Err(DiffError::Cancelled) => {
            eprintln!("Cancelled, {} was not written", args.output.display());
            std::process::exit(130);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(path) = &args.report {
        let json = report.to_json().context("serializing report")?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    }

    println!("{}", summary(&report, &args.output));
    Ok(())
}

fn summary(report: &ComparisonReport, output: &std::path::Path) -> String {
    let mut lines = vec![format!(
        "Compared {} page(s): {} insertion(s), {} deletion(s), {} modified paragraph(s)",
        report.pages_compared,
        report.count(ChangeKind::Insertion),
        report.count(ChangeKind::Deletion),
        report.count(ChangeKind::Modified),
    )];
    if !report.failures.is_empty() {
        lines.push(format!(
            "{} page(s) failed: {:?}",
            report.failures.len(),
            report.failed_pages()
        ));
    }
    if !report.span_misses.is_empty() {
        lines.push(format!(
            "{} change(s) could not be located",
            report.span_misses.len()
        ));
    }
    if !report.unmatched_master_pages.is_empty() {
        lines.push(format!(
            "Master page(s) with no counterpart: {:?}",
            report.unmatched_master_pages
        ));
    }
    lines.push(format!("Annotated document written to {}", output.display()));
    lines.join("\n")
}
