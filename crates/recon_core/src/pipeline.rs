//! End-to-end batch job: discover, ingest, reconcile, report, archive.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::Local;
use polars::prelude::DataFrame;
use recon_io_fs::{
    ReportArchive, SpecArchiveOptions, SpecDiscoverOptions, archive_files, derive_free_path,
    discover_files,
};
use tracing::{debug, info, warn};

use crate::conf::C_REPORT_STAMP_FORMAT;
use crate::ingest::{
    build_event_frame, build_ledger_frame, collapse_events, filter_events_by_status,
    read_event_feed, read_ledger_feed,
};
use crate::pivot::{SpecDelayPivot, build_delay_pivot};
use crate::reconcile::{count_matched, reconcile_frames};
use crate::report::{ReportRecon, ReportReconBuilder, write_recon_workbook};
use crate::spec::{ReconError, SpecReconConfig};
use crate::timing::derive_duration_maxima;

/// In-memory result of one reconciliation, before anything is written.
#[derive(Debug, Clone)]
pub struct SpecReconciliation {
    pub df_merged: DataFrame,
    pub pivot: SpecDelayPivot,
    pub report: ReportRecon,
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct SpecReconOutcome {
    pub path_report: PathBuf,
    pub report: ReportRecon,
    pub pivot: SpecDelayPivot,
    /// `None` when archiving is disabled.
    pub report_archive: Option<ReportArchive>,
}

/// Ingest `ledger_paths` and `event_paths`, then join, time and pivot them.
pub fn build_reconciliation(
    ledger_paths: &[PathBuf],
    event_paths: &[PathBuf],
    config: &SpecReconConfig,
) -> Result<SpecReconciliation, ReconError> {
    let mut builder_report = ReportReconBuilder::default();

    let mut l_ledger = Vec::new();
    for path in ledger_paths {
        let (l_records, report_ingest) = read_ledger_feed(path, &config.ledger)?;
        l_ledger.extend(l_records);
        builder_report.add_ledger_ingest(report_ingest);
    }

    let mut l_events = Vec::new();
    for path in event_paths {
        let (l_records, report_ingest) = read_event_feed(path, &config.events)?;
        l_events.extend(l_records);
        builder_report.add_event_ingest(report_ingest);
    }
    if event_paths.is_empty() {
        let msg = "no event files; every posted row will be unmatched".to_string();
        warn!("{msg}");
        builder_report.add_warning(msg);
    }
    if config.events.if_collapse {
        let n_before = l_events.len();
        l_events = collapse_events(l_events);
        debug!(before = n_before, after = l_events.len(), "events collapsed");
    }
    let (l_events, n_filtered) = filter_events_by_status(l_events, &config.events.status_keep);
    if n_filtered > 0 {
        debug!(dropped = n_filtered, "events filtered by status");
    }
    builder_report.add_events_filtered(n_filtered);
    builder_report.set_events_kept(l_events.len() as u64);

    let df_ledger = build_ledger_frame(&l_ledger)?;
    let df_events = build_event_frame(&l_events)?;
    let df_merged = reconcile_frames(&df_ledger, &df_events)?;
    builder_report.set_join_counts(df_merged.height() as u64, count_matched(&df_merged)?);

    let pivot = build_delay_pivot(&df_merged)?;
    builder_report.set_maxima(derive_duration_maxima(&df_merged)?);

    let report = builder_report.build();
    info!("{report}");
    Ok(SpecReconciliation {
        df_merged,
        pivot,
        report,
    })
}

/// Reconcile explicit files into the workbook at `path_out`.
///
/// No discovery, no archiving.
pub fn reconcile_files<P: AsRef<Path>>(
    ledger_paths: &[PathBuf],
    event_paths: &[PathBuf],
    path_out: P,
    config: &SpecReconConfig,
) -> Result<SpecReconOutcome, ReconError> {
    if ledger_paths.is_empty() {
        return Err(ReconError::NoInput("no ledger files given".to_string()));
    }
    let path_out = path_out.as_ref();
    let recon = build_reconciliation(ledger_paths, event_paths, config)?;
    write_recon_workbook(
        path_out,
        &recon.df_merged,
        &recon.pivot,
        &recon.report,
        &config.report,
    )?;
    info!(path = %path_out.display(), "report written");
    Ok(SpecReconOutcome {
        path_report: path_out.to_path_buf(),
        report: recon.report,
        pivot: recon.pivot,
        report_archive: None,
    })
}

/// `dir_output/{prefix}_{YYYYMMDD_HHMMSS}.xlsx`, stamped with local time.
///
/// A name already taken in `dir_output` gets a `_2`, `_3`, ... suffix.
pub fn derive_report_path(config: &SpecReconConfig) -> PathBuf {
    let c_stamp = Local::now().format(C_REPORT_STAMP_FORMAT);
    let path_report = config
        .paths
        .dir_output
        .join(format!("{}_{c_stamp}.xlsx", config.report.report_prefix.trim()));
    derive_free_path(&path_report)
}

/// Ledger and event files in the inbox. A file matching both pattern sets is
/// read as ledger only.
pub fn discover_inputs(
    config: &SpecReconConfig,
) -> Result<(Vec<PathBuf>, Vec<PathBuf>), ReconError> {
    let dir_inbox = &config.paths.dir_inbox;
    let l_ledger = discover_files(
        dir_inbox,
        &SpecDiscoverOptions {
            patterns_include: Some(config.ledger.patterns_include.clone()),
            ..SpecDiscoverOptions::default()
        },
    )?;
    let set_ledger: BTreeSet<&PathBuf> = l_ledger.iter().collect();
    let l_events: Vec<PathBuf> = discover_files(
        dir_inbox,
        &SpecDiscoverOptions {
            patterns_include: Some(config.events.patterns_include.clone()),
            ..SpecDiscoverOptions::default()
        },
    )?
    .into_iter()
    .filter(|p| !set_ledger.contains(p))
    .collect();
    Ok((l_ledger, l_events))
}

/// Full batch run over `config.paths.dir_inbox`.
pub fn run_reconciliation(config: &SpecReconConfig) -> Result<SpecReconOutcome, ReconError> {
    config.validate()?;
    let (l_ledger, l_events) = discover_inputs(config)?;
    info!(
        inbox = %config.paths.dir_inbox.display(),
        ledger_files = l_ledger.len(),
        event_files = l_events.len(),
        "inputs discovered"
    );
    if l_ledger.is_empty() {
        return Err(ReconError::NoInput(format!(
            "no ledger files in {}",
            config.paths.dir_inbox.display()
        )));
    }

    let path_report = derive_report_path(config);
    let mut outcome = reconcile_files(&l_ledger, &l_events, &path_report, config)?;

    if config.archive.if_enabled {
        let l_inputs: Vec<PathBuf> = l_ledger.into_iter().chain(l_events).collect();
        let report_archive = archive_files(
            &l_inputs,
            &config.paths.dir_processed,
            SpecArchiveOptions {
                rule_conflict: config.archive.rule_conflict,
                num_workers_max: config.archive.num_workers_max,
                if_dry_run: config.archive.if_dry_run,
                ..SpecArchiveOptions::default()
            },
        )?;
        for err in &report_archive.errors {
            warn!(path = %err.path.display(), error = %err.exception, "archive failed");
        }
        info!("{report_archive}");
        outcome.report_archive = Some(report_archive);
    } else {
        debug!("archiving disabled");
    }
    Ok(outcome)
}
