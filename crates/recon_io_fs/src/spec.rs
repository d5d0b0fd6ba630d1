//! Discovery/archive specification models and top-level error types.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

////////////////////////////////////////////////////////////////////////////////
// #region EnumsInit

/// Pattern matching mode for include/exclude lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumPatternMode {
    /// Shell-like wildcards (`*`, `?`, character classes).
    #[default]
    Glob,
    /// Regular expression pattern.
    Regex,
    /// Substring match.
    Literal,
}

/// Policy when the processed directory already holds a file of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumArchiveConflictStrategy {
    /// Leave the inbox file where it is.
    Skip,
    /// Replace the archived file.
    Overwrite,
    /// Record an error and leave the inbox file where it is.
    Error,
    /// Archive under a suffixed name (`feed_2.csv`, `feed_3.csv`, ...).
    #[default]
    Rename,
}

/// How one archive task was committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumMoveKind {
    /// Same-filesystem rename.
    Renamed,
    /// Copy + remove fallback (e.g. across devices).
    Copied,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region StructsAndErrors

/// Input options for [`crate::discover::discover_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecDiscoverOptions {
    /// Include patterns applied to file basename.
    pub patterns_include: Option<Vec<String>>,
    /// Exclude patterns applied to file basename.
    pub patterns_exclude: Option<Vec<String>>,
    /// Pattern interpretation mode.
    pub rule_pattern: EnumPatternMode,
    /// Maximum depth below the inbox (`1` = top-level files only, `None` = unlimited).
    pub depth_limit: Option<usize>,
    /// Ignore dot-files and dot-directories.
    pub if_skip_hidden: bool,
}

impl Default for SpecDiscoverOptions {
    fn default() -> Self {
        Self {
            patterns_include: None,
            patterns_exclude: None,
            rule_pattern: EnumPatternMode::Glob,
            depth_limit: Some(1),
            if_skip_hidden: true,
        }
    }
}

/// Input options for [`crate::archive::archive_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecArchiveOptions {
    /// Conflict behavior for files already present in the processed directory.
    pub rule_conflict: EnumArchiveConflictStrategy,
    /// Maximum worker threads for the move stage.
    pub num_workers_max: Option<usize>,
    /// Do not mutate filesystem; record what would happen.
    pub if_dry_run: bool,
    /// Keep permissions/mtime/xattrs when the copy fallback is used.
    pub if_preserve_metadata: bool,
}

impl Default for SpecArchiveOptions {
    fn default() -> Self {
        Self {
            rule_conflict: EnumArchiveConflictStrategy::Rename,
            num_workers_max: None,
            if_dry_run: false,
            if_preserve_metadata: true,
        }
    }
}

/// One archive failure item with path + error text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecArchiveError {
    /// Failed source or destination path.
    pub path: PathBuf,
    /// User-facing error text.
    pub exception: String,
}

/// Setup-stage failures. Per-file problems go into the report instead.
#[derive(Debug, Error)]
pub enum FsError {
    /// Invalid include/exclude pattern.
    #[error("Invalid pattern in include/exclude: {0}")]
    InvalidPattern(String),
    /// Invalid depth value.
    #[error("{0}")]
    InvalidDepthLimit(String),
    /// Scanned path is not a directory.
    #[error("Source is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),
    /// Processed directory could not be prepared.
    #[error("Failed to initialize destination {}: {message}", .path.display())]
    DestinationInitFailed {
        /// Destination path that failed initialization.
        path: PathBuf,
        /// Underlying IO error text.
        message: String,
    },
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
