//! `recon_io_fs`:
//! inbox discovery and archive moves for the reconciliation batch.
//!
//! - `discover` : scan the inbox for feed files
//! - `archive`  : move consumed files into the processed directory
//! - `spec`     : enums/options/errors
//! - `report`   : archive run report
//! - `util`     : pattern, move and free-name helpers

pub mod archive;
pub mod discover;
pub mod report;
pub mod spec;
mod util;

pub use archive::archive_files;
pub use discover::discover_files;
pub use report::{ReportArchive, ReportArchiveBuilder};
pub use util::derive_free_path;
pub use spec::{
    EnumArchiveConflictStrategy, EnumMoveKind, EnumPatternMode, FsError, SpecArchiveError,
    SpecArchiveOptions, SpecDiscoverOptions,
};
