//! Inbox scanning for ledger and event feed files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::spec::{FsError, SpecDiscoverOptions};
use crate::util::{SpecPatternFilter, is_hidden_name};

/// List regular files under `dir_inbox` that match `spec_options`.
///
/// Patterns apply to the basename. Depth `1` means direct children only.
/// Unreadable entries are logged and skipped. The result is sorted by path so
/// repeated runs see the same order.
pub fn discover_files<P: AsRef<Path>>(
    dir_inbox: P,
    spec_options: &SpecDiscoverOptions,
) -> Result<Vec<PathBuf>, FsError> {
    if spec_options.depth_limit == Some(0) {
        return Err(FsError::InvalidDepthLimit(
            "Arg `depth_limit` must be >= 1 or None.".to_string(),
        ));
    }

    let path_dir_inbox = dir_inbox.as_ref();
    if !path_dir_inbox.is_dir() {
        return Err(FsError::SourceNotDirectory(path_dir_inbox.to_path_buf()));
    }

    let spec_filter = SpecPatternFilter::from_raw(
        spec_options.patterns_include.as_deref(),
        spec_options.patterns_exclude.as_deref(),
        spec_options.rule_pattern,
    )?;

    let mut l_files = Vec::new();
    walk_directory(path_dir_inbox, 1, spec_options, &spec_filter, &mut l_files);
    l_files.sort();
    debug!(
        dir = %path_dir_inbox.display(),
        n_files = l_files.len(),
        "discovered inbox files"
    );
    Ok(l_files)
}

fn walk_directory(
    path_root: &Path,
    n_depth: usize,
    spec_options: &SpecDiscoverOptions,
    spec_filter: &SpecPatternFilter,
    l_files: &mut Vec<PathBuf>,
) {
    let iter_entries = match fs::read_dir(path_root) {
        Ok(iter) => iter,
        Err(e) => {
            warn!(dir = %path_root.display(), error = %e, "failed to read directory");
            return;
        }
    };

    for entry_res in iter_entries {
        let entry = match entry_res {
            Ok(v) => v,
            Err(e) => {
                warn!(dir = %path_root.display(), error = %e, "failed to read directory entry");
                continue;
            }
        };

        let path_entry = entry.path();
        let c_name = entry.file_name().to_string_lossy().to_string();
        if spec_options.if_skip_hidden && is_hidden_name(&c_name) {
            continue;
        }

        // Follow symlinks: a linked feed file counts as a feed file.
        let Ok(meta_entry) = fs::metadata(&path_entry) else {
            warn!(path = %path_entry.display(), "failed to inspect entry");
            continue;
        };

        if meta_entry.is_dir() {
            let if_descend = spec_options.depth_limit.is_none_or(|n| n_depth < n);
            if if_descend {
                walk_directory(&path_entry, n_depth + 1, spec_options, spec_filter, l_files);
            }
        } else if meta_entry.is_file() {
            if spec_filter.is_selected(&c_name) {
                l_files.push(path_entry);
            }
        } else {
            warn!(path = %path_entry.display(), "special file skipped");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::discover_files;
    use crate::spec::{EnumPatternMode, FsError, SpecDiscoverOptions};

    static CNT_TEST_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TestDir {
        path: PathBuf,
    }

    impl TestDir {
        fn new() -> Self {
            let n = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos();
            let n_seq = CNT_TEST_DIR.fetch_add(1, Ordering::SeqCst);
            let path = std::env::temp_dir().join(format!("recon_discover_test_{n}_{n_seq}"));
            std::fs::create_dir_all(&path).expect("create test dir");
            Self { path }
        }

        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Drop for TestDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.path);
        }
    }

    fn write_text(path: &Path, txt: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
    }

    fn names(l_paths: &[PathBuf]) -> Vec<String> {
        l_paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn discover_top_level_sorted_and_filtered() {
        let tmp = TestDir::new();
        write_text(&tmp.path().join("b_ledger.csv"), "x");
        write_text(&tmp.path().join("a_ledger.csv"), "x");
        write_text(&tmp.path().join("notes.txt"), "x");
        write_text(&tmp.path().join(".hidden.csv"), "x");
        write_text(&tmp.path().join("nested/c_ledger.csv"), "x");

        let spec_options = SpecDiscoverOptions {
            patterns_include: Some(vec!["*.csv".to_string()]),
            ..SpecDiscoverOptions::default()
        };
        let l_files = discover_files(tmp.path(), &spec_options).expect("discover");
        assert_eq!(names(&l_files), vec!["a_ledger.csv", "b_ledger.csv"]);
    }

    #[test]
    fn discover_unlimited_depth_descends() {
        let tmp = TestDir::new();
        write_text(&tmp.path().join("events_1.json"), "[]");
        write_text(&tmp.path().join("day2/events_2.json"), "[]");
        write_text(&tmp.path().join("day2/deep/events_3.json"), "[]");

        let spec_options = SpecDiscoverOptions {
            patterns_include: Some(vec![r"^events_\d+\.json$".to_string()]),
            rule_pattern: EnumPatternMode::Regex,
            depth_limit: None,
            ..SpecDiscoverOptions::default()
        };
        let l_files = discover_files(tmp.path(), &spec_options).expect("discover");
        assert_eq!(l_files.len(), 3);
    }

    #[test]
    fn discover_rejects_missing_dir_and_zero_depth() {
        let tmp = TestDir::new();
        let err = discover_files(tmp.path().join("missing"), &SpecDiscoverOptions::default())
            .expect_err("missing dir");
        assert!(matches!(err, FsError::SourceNotDirectory(_)));

        let spec_options = SpecDiscoverOptions {
            depth_limit: Some(0),
            ..SpecDiscoverOptions::default()
        };
        let err = discover_files(tmp.path(), &spec_options).expect_err("zero depth");
        assert!(matches!(err, FsError::InvalidDepthLimit(_)));
    }
}
