use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use regex::Regex;

use crate::spec::{EnumMoveKind, EnumPatternMode, FsError};

////////////////////////////////////////////////////////////////////////////////
// #region PatternMatching

#[derive(Debug, Clone)]
pub(crate) enum TypePatternSeq {
    Literal(Vec<String>),
    Glob(Vec<GlobMatcher>),
    Regex(Vec<Regex>),
}

impl TypePatternSeq {
    fn is_match(&self, value: &str) -> bool {
        match self {
            Self::Literal(v) => v.iter().any(|p| value.contains(p.as_str())),
            Self::Glob(v) => v.iter().any(|p| p.is_match(value)),
            Self::Regex(v) => v.iter().any(|p| p.is_match(value)),
        }
    }
}

/// Compiled include/exclude pair for basename filtering.
#[derive(Debug, Clone, Default)]
pub(crate) struct SpecPatternFilter {
    patterns_include: Option<TypePatternSeq>,
    patterns_exclude: Option<TypePatternSeq>,
}

impl SpecPatternFilter {
    pub(crate) fn from_raw(
        patterns_include: Option<&[String]>,
        patterns_exclude: Option<&[String]>,
        rule_pattern: EnumPatternMode,
    ) -> Result<Self, FsError> {
        Ok(Self {
            patterns_include: compile_patterns(patterns_include, rule_pattern)?,
            patterns_exclude: compile_patterns(patterns_exclude, rule_pattern)?,
        })
    }

    /// `true` when `value` passes include (if any) and misses every exclude.
    pub(crate) fn is_selected(&self, value: &str) -> bool {
        let if_included = self
            .patterns_include
            .as_ref()
            .is_none_or(|p| p.is_match(value));
        let if_excluded = self
            .patterns_exclude
            .as_ref()
            .is_some_and(|p| p.is_match(value));
        if_included && !if_excluded
    }
}

fn compile_patterns(
    patterns: Option<&[String]>,
    rule_pattern: EnumPatternMode,
) -> Result<Option<TypePatternSeq>, FsError> {
    let Some(patterns) = patterns else {
        return Ok(None);
    };
    if patterns.is_empty() {
        return Ok(None);
    }

    match rule_pattern {
        EnumPatternMode::Literal => Ok(Some(TypePatternSeq::Literal(patterns.to_vec()))),
        EnumPatternMode::Glob => {
            let mut l_glob = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let matcher = Glob::new(pattern)
                    .map_err(|e| FsError::InvalidPattern(e.to_string()))?
                    .compile_matcher();
                l_glob.push(matcher);
            }
            Ok(Some(TypePatternSeq::Glob(l_glob)))
        }
        EnumPatternMode::Regex => {
            let mut l_regex = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                let regex =
                    Regex::new(pattern).map_err(|e| FsError::InvalidPattern(e.to_string()))?;
                l_regex.push(regex);
            }
            Ok(Some(TypePatternSeq::Regex(l_regex)))
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region PathUtilities

pub(crate) fn is_hidden_name(name: &str) -> bool {
    name.starts_with('.')
}

pub(crate) fn calculate_worker_limit(num_workers_max: Option<usize>) -> usize {
    let n_cpu = std::thread::available_parallelism()
        .map(|v| v.get())
        .unwrap_or(1);

    match num_workers_max {
        Some(n) => n.clamp(1, n_cpu),
        None => n_cpu.clamp(1, 8),
    }
}

/// First free `stem_{n}.ext` (n >= 2) next to `path_dst`, skipping `reserved` names.
pub(crate) fn derive_suffixed_destination(
    path_dst: &Path,
    reserved: &std::collections::HashSet<PathBuf>,
) -> PathBuf {
    let path_parent = path_dst.parent().unwrap_or(Path::new("."));
    let c_stem = path_dst
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let c_ext = path_dst
        .extension()
        .map(|s| format!(".{}", s.to_string_lossy()))
        .unwrap_or_default();

    let mut n_idx = 2usize;
    loop {
        let path_candidate = path_parent.join(format!("{c_stem}_{n_idx}{c_ext}"));
        if !path_candidate.exists() && !reserved.contains(&path_candidate) {
            return path_candidate;
        }
        n_idx += 1;
    }
}

/// `path_dst` itself when free, else the first free suffixed sibling.
pub fn derive_free_path(path_dst: &Path) -> PathBuf {
    if path_dst.exists() {
        derive_suffixed_destination(path_dst, &std::collections::HashSet::new())
    } else {
        path_dst.to_path_buf()
    }
}

/// Move `path_src` to `path_dst`, falling back to copy + remove when rename fails.
pub(crate) fn move_file(
    path_src: &Path,
    path_dst: &Path,
    if_preserve_metadata: bool,
) -> Result<EnumMoveKind, io::Error> {
    if fs::rename(path_src, path_dst).is_ok() {
        return Ok(EnumMoveKind::Renamed);
    }

    if if_preserve_metadata {
        copy_file_with_metadata(path_src, path_dst)?;
    } else {
        fs::copy(path_src, path_dst)?;
    }
    fs::remove_file(path_src)?;
    Ok(EnumMoveKind::Copied)
}

pub(crate) fn copy_file_with_metadata(
    path_file_src: &Path,
    path_file_dst: &Path,
) -> Result<(), io::Error> {
    fs::copy(path_file_src, path_file_dst)?;
    #[cfg(target_os = "linux")]
    {
        apply_metadata_linux(path_file_src, path_file_dst)?;
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn apply_metadata_linux(path_file_src: &Path, path_file_dst: &Path) -> Result<(), io::Error> {
    use filetime::{FileTime, set_file_times};

    let stat_src = fs::metadata(path_file_src)?;
    fs::set_permissions(path_file_dst, stat_src.permissions())?;
    set_file_times(
        path_file_dst,
        FileTime::from_last_access_time(&stat_src),
        FileTime::from_last_modification_time(&stat_src),
    )?;

    // Best effort: filesystems without xattr support just lose them.
    if let Ok(iter_xattr_names) = xattr::list(path_file_src) {
        for name in iter_xattr_names {
            if let Some(raw_value) = xattr::get(path_file_src, &name).ok().flatten() {
                let _ = xattr::set(path_file_dst, &name, &raw_value);
            }
        }
    }
    Ok(())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn pattern_filter_glob_include_and_exclude() {
        let filter = SpecPatternFilter::from_raw(
            Some(&["*.csv".to_string()]),
            Some(&["*_draft.csv".to_string()]),
            EnumPatternMode::Glob,
        )
        .expect("compile");

        assert!(filter.is_selected("ledger_20240301.csv"));
        assert!(!filter.is_selected("ledger_draft.csv"));
        assert!(!filter.is_selected("events.json"));
    }

    #[test]
    fn pattern_filter_without_patterns_selects_everything() {
        let filter = SpecPatternFilter::from_raw(None, Some(&[]), EnumPatternMode::Regex)
            .expect("compile");
        assert!(filter.is_selected("anything.bin"));
    }

    #[test]
    fn pattern_filter_regex_and_literal() {
        let filter_regex = SpecPatternFilter::from_raw(
            Some(&[r"^events_\d{8}\.json$".to_string()]),
            None,
            EnumPatternMode::Regex,
        )
        .expect("compile");
        assert!(filter_regex.is_selected("events_20240301.json"));
        assert!(!filter_regex.is_selected("events_latest.json"));

        let filter_literal = SpecPatternFilter::from_raw(
            Some(&["ledger".to_string()]),
            None,
            EnumPatternMode::Literal,
        )
        .expect("compile");
        assert!(filter_literal.is_selected("daily_ledger.txt"));
        assert!(!filter_literal.is_selected("events.json"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let err = SpecPatternFilter::from_raw(
            Some(&["(unclosed".to_string()]),
            None,
            EnumPatternMode::Regex,
        )
        .expect_err("invalid regex");
        assert!(matches!(err, FsError::InvalidPattern(_)));
    }

    #[test]
    fn suffixed_destination_skips_reserved_names() {
        let path_dst = PathBuf::from("/nonexistent-recon-dir/feed.csv");
        let mut reserved = HashSet::new();
        reserved.insert(PathBuf::from("/nonexistent-recon-dir/feed_2.csv"));

        assert_eq!(
            derive_suffixed_destination(&path_dst, &reserved),
            PathBuf::from("/nonexistent-recon-dir/feed_3.csv")
        );
    }

    #[test]
    fn free_path_suffixes_only_taken_names() {
        let dir = std::env::temp_dir().join(format!("recon_io_fs_free_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("create dir");
        let path_dst = dir.join("report.xlsx");
        assert_eq!(derive_free_path(&path_dst), path_dst);

        fs::write(&path_dst, "x").expect("write");
        fs::write(dir.join("report_2.xlsx"), "x").expect("write");
        assert_eq!(derive_free_path(&path_dst), dir.join("report_3.xlsx"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn worker_limit_is_at_least_one() {
        assert_eq!(calculate_worker_limit(Some(0)), 1);
        assert!(calculate_worker_limit(None) >= 1);
    }
}
