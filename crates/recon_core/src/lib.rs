//! `recon_core`:
//! reconciliation of a delimited ledger export against a JSON event feed.
//!
//! - `conf`      : canonical column names, formats and default presets
//! - `spec`      : config models, feed records and errors
//! - `util`      : amount/date/timestamp parsing helpers
//! - `ingest`    : feed readers, event collapsing, frame builders
//! - `reconcile` : left join of posted rows against events
//! - `timing`    : duration columns and maxima
//! - `pivot`     : counts by transaction code and delay minute
//! - `report`    : run reports and the XLSX workbook
//! - `pipeline`  : discover/ingest/reconcile/report/archive job
//! - `transfer`  : balance transfer handler over data-access traits
pub mod conf;
pub mod ingest;
pub mod pipeline;
pub mod pivot;
pub mod reconcile;
pub mod report;
pub mod spec;
pub mod timing;
pub mod transfer;
pub mod util;

pub use ingest::{
    build_event_frame, build_ledger_frame, collapse_events, filter_events_by_status,
    read_event_feed, read_ledger_feed,
};
pub use pipeline::{
    SpecReconOutcome, SpecReconciliation, build_reconciliation, derive_report_path,
    discover_inputs, reconcile_files, run_reconciliation,
};
pub use pivot::{EnumDelayBucket, SpecDelayPivot, build_delay_pivot};
pub use reconcile::{count_matched, reconcile_frames};
pub use report::{
    ReportIngest, ReportRecon, ReportReconBuilder, derive_report_frame, write_recon_workbook,
};
pub use spec::{
    ReconError, SpecArchiveConfig, SpecEventFeedOptions, SpecEventFields, SpecEventRecord,
    SpecLedgerColumns, SpecLedgerFeedOptions, SpecLedgerRecord, SpecPathsConfig,
    SpecReconConfig, SpecReportOptions,
};
pub use timing::{
    SpecDurationMaxima, derive_duration_maxima, derive_timing_columns, format_duration_millis,
    format_minutes_seconds,
};
pub use transfer::{
    AccountDao, BalanceTransferHandler, SpecAccount, SpecTransferRecord, SpecTransferRequest,
    StorageError, TransferDao, TransferError,
};

pub use recon_io_fs::{EnumArchiveConflictStrategy, ReportArchive};
