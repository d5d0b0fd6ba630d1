use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use recon_core::{
    ReportRecon, SpecDelayPivot, SpecReconConfig, build_reconciliation, reconcile_files,
    run_reconciliation,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Transaction feed reconciliation and timing report.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile everything in the inbox, write the report, archive inputs.
    Run {
        #[arg(short, long, default_value = "recon.toml")]
        config: PathBuf,
        #[arg(long)]
        inbox: Option<PathBuf>,
        #[arg(long)]
        processed: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Leave input files in the inbox.
        #[arg(long)]
        no_archive: bool,
        /// Log the archive moves without performing them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Reconcile explicit files into one workbook.
    Reconcile {
        #[arg(long, required = true, num_args = 1..)]
        ledger: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        events: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the delay pivot and maxima without writing a workbook.
    Pivot {
        #[arg(long, required = true, num_args = 1..)]
        ledger: Vec<PathBuf>,
        #[arg(long, num_args = 1..)]
        events: Vec<PathBuf>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn init_tracing(if_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if if_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(path: Option<&Path>) -> Result<SpecReconConfig> {
    match path {
        Some(path) => SpecReconConfig::from_toml_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(SpecReconConfig::default()),
    }
}

fn render_summary(report: &ReportRecon) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Metric", "Value"]);
    for (c_metric, c_value) in report.to_summary_rows() {
        table.add_row(vec![c_metric, c_value]);
    }
    table
}

fn render_pivot(pivot: &SpecDelayPivot) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let mut l_header = vec!["Transaction Code".to_string()];
    l_header.extend(pivot.col_labels.iter().map(ToString::to_string));
    l_header.push("Grand Total".to_string());
    table.set_header(l_header);

    for (n_row, c_code) in pivot.row_labels.iter().enumerate() {
        let mut l_cells = vec![c_code.clone()];
        l_cells.extend(pivot.counts[n_row].iter().map(ToString::to_string));
        l_cells.push(pivot.row_totals[n_row].to_string());
        table.add_row(l_cells);
    }
    let mut l_totals = vec!["Grand Total".to_string()];
    l_totals.extend(pivot.col_totals.iter().map(ToString::to_string));
    l_totals.push(pivot.grand_total.to_string());
    table.add_row(l_totals);
    table
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Run {
            config,
            inbox,
            processed,
            output,
            no_archive,
            dry_run,
        } => {
            let mut config = load_config(Some(&config))?;
            if let Some(dir) = inbox {
                config.paths.dir_inbox = dir;
            }
            if let Some(dir) = processed {
                config.paths.dir_processed = dir;
            }
            if let Some(dir) = output {
                config.paths.dir_output = dir;
            }
            if no_archive {
                config.archive.if_enabled = false;
            }
            if dry_run {
                config.archive.if_dry_run = true;
            }

            let outcome = run_reconciliation(&config).context("reconciliation run failed")?;
            println!("{}", render_summary(&outcome.report));
            if let Some(report_archive) = &outcome.report_archive {
                println!("{report_archive}");
            }
            println!("report: {}", outcome.path_report.display());
        }
        Commands::Reconcile {
            ledger,
            events,
            out,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let outcome = reconcile_files(&ledger, &events, &out, &config)
                .with_context(|| format!("failed to reconcile into {}", out.display()))?;
            println!("{}", render_summary(&outcome.report));
            println!("report: {}", outcome.path_report.display());
        }
        Commands::Pivot {
            ledger,
            events,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let recon = build_reconciliation(&ledger, &events, &config)
                .context("failed to build pivot")?;
            println!("{}", render_pivot(&recon.pivot));
            println!("{}", render_summary(&recon.report));
        }
    }

    info!("done");
    Ok(())
}
