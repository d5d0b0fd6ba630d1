//! Move processed feed files out of the inbox.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::report::{ReportArchive, ReportArchiveBuilder};
use crate::spec::{EnumArchiveConflictStrategy, EnumMoveKind, FsError, SpecArchiveOptions};
use crate::util::{calculate_worker_limit, derive_suffixed_destination, move_file};

#[derive(Debug, Clone)]
struct SpecArchiveTask {
    path_file_src: PathBuf,
    path_file_dst: PathBuf,
}

type TypeMoveResult = (PathBuf, PathBuf, Result<EnumMoveKind, String>);

/// Move every file in `files` into `dir_processed`.
///
/// Destinations are planned serially so that two inputs with the same
/// basename never race for one name; the moves themselves run on a rayon
/// pool. Per-file failures land in the report. Only setup failures (the
/// processed directory cannot be created) are returned as [`FsError`].
pub fn archive_files<P: AsRef<Path>>(
    files: &[PathBuf],
    dir_processed: P,
    spec_options: SpecArchiveOptions,
) -> Result<ReportArchive, FsError> {
    let path_dir_processed = dir_processed.as_ref().to_path_buf();
    let mut builder_report = ReportArchiveBuilder::default();
    builder_report.add_requested(files.len() as u64);

    if !spec_options.if_dry_run {
        fs::create_dir_all(&path_dir_processed).map_err(|e| FsError::DestinationInitFailed {
            path: path_dir_processed.clone(),
            message: e.to_string(),
        })?;
    }

    let l_tasks = plan_archive_tasks(files, &path_dir_processed, spec_options, &mut builder_report);
    if spec_options.if_dry_run {
        for spec_task in &l_tasks {
            info!(
                src = %spec_task.path_file_src.display(),
                dst = %spec_task.path_file_dst.display(),
                "dry-run: would archive"
            );
            builder_report.add_skipped();
        }
        return Ok(builder_report.build());
    }

    let n_workers_max = calculate_worker_limit(spec_options.num_workers_max);
    let l_results = execute_archive_tasks(
        l_tasks,
        n_workers_max,
        spec_options.if_preserve_metadata,
        &mut builder_report,
    );
    for (path_file_src, path_file_dst, res_move) in l_results {
        match res_move {
            Ok(kind) => builder_report.add_archived(path_file_dst, kind),
            Err(msg) => {
                warn!(src = %path_file_src.display(), error = %msg, "archive move failed");
                builder_report.add_error(path_file_src, msg);
            }
        }
    }
    Ok(builder_report.build())
}

fn plan_archive_tasks(
    files: &[PathBuf],
    path_dir_processed: &Path,
    spec_options: SpecArchiveOptions,
    builder_report: &mut ReportArchiveBuilder,
) -> Vec<SpecArchiveTask> {
    let mut set_reserved: HashSet<PathBuf> = HashSet::new();
    let mut l_tasks = Vec::with_capacity(files.len());

    for path_file_src in files {
        let Some(name_file) = path_file_src.file_name() else {
            builder_report.add_error(path_file_src.clone(), "Path has no file name.".to_string());
            continue;
        };
        if !path_file_src.is_file() {
            builder_report.add_error(
                path_file_src.clone(),
                "Source file does not exist.".to_string(),
            );
            continue;
        }

        let mut path_file_dst = path_dir_processed.join(name_file);
        let if_conflict = path_file_dst.exists() || set_reserved.contains(&path_file_dst);
        if if_conflict {
            match spec_options.rule_conflict {
                EnumArchiveConflictStrategy::Skip => {
                    builder_report.add_skipped();
                    continue;
                }
                EnumArchiveConflictStrategy::Error => {
                    builder_report.add_error(
                        path_file_src.clone(),
                        format!("Destination exists: {}", path_file_dst.display()),
                    );
                    continue;
                }
                EnumArchiveConflictStrategy::Overwrite => {
                    if set_reserved.contains(&path_file_dst) {
                        builder_report.add_warning(format!(
                            "Duplicate basename in one run, later file wins: {}",
                            path_file_src.display()
                        ));
                    }
                }
                EnumArchiveConflictStrategy::Rename => {
                    path_file_dst = derive_suffixed_destination(&path_file_dst, &set_reserved);
                    builder_report.add_renamed();
                }
            }
        }

        set_reserved.insert(path_file_dst.clone());
        l_tasks.push(SpecArchiveTask {
            path_file_src: path_file_src.clone(),
            path_file_dst,
        });
    }
    l_tasks
}

fn run_task(spec_task: SpecArchiveTask, if_preserve_metadata: bool) -> TypeMoveResult {
    let res_move = move_file(
        &spec_task.path_file_src,
        &spec_task.path_file_dst,
        if_preserve_metadata,
    )
    .map_err(|e| e.to_string());
    (spec_task.path_file_src, spec_task.path_file_dst, res_move)
}

fn execute_archive_tasks(
    l_tasks: Vec<SpecArchiveTask>,
    n_workers_max: usize,
    if_preserve_metadata: bool,
    builder_report: &mut ReportArchiveBuilder,
) -> Vec<TypeMoveResult> {
    if l_tasks.is_empty() {
        return Vec::new();
    }

    // Overwrite can map two sources onto one destination; keep those serial.
    let mut set_seen = HashSet::new();
    let if_unique_dst = l_tasks
        .iter()
        .all(|t| set_seen.insert(t.path_file_dst.clone()));

    if n_workers_max <= 1 || !if_unique_dst {
        return l_tasks
            .into_iter()
            .map(|t| run_task(t, if_preserve_metadata))
            .collect();
    }

    let Ok(thread_pool) = ThreadPoolBuilder::new().num_threads(n_workers_max).build() else {
        builder_report.add_warning(format!(
            "Failed to initialize thread pool (workers={n_workers_max}); fallback to serial move."
        ));
        return l_tasks
            .into_iter()
            .map(|t| run_task(t, if_preserve_metadata))
            .collect();
    };

    thread_pool.install(|| {
        l_tasks
            .into_par_iter()
            .map(|t| run_task(t, if_preserve_metadata))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::archive_files;
    use crate::spec::{EnumArchiveConflictStrategy, SpecArchiveOptions};

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
            let path = std::env::temp_dir().join(format!("recon_archive_test_{n}_{n_seq}"));
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

    fn write_text(path: &Path, txt: &str) -> PathBuf {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, txt).expect("write text");
        path.to_path_buf()
    }

    #[test]
    fn archive_moves_files_into_processed() {
        let tmp = TestDir::new();
        let a = write_text(&tmp.path().join("inbox/ledger.csv"), "l");
        let b = write_text(&tmp.path().join("inbox/events.json"), "[]");
        let dir_processed = tmp.path().join("processed");

        let report = archive_files(
            &[a.clone(), b.clone()],
            &dir_processed,
            SpecArchiveOptions::default(),
        )
        .expect("archive");
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.archived_count(), 2);
        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(
            std::fs::read_to_string(dir_processed.join("ledger.csv")).expect("read"),
            "l"
        );
    }

    #[test]
    fn archive_rename_conflict_appends_suffix() {
        let tmp = TestDir::new();
        let dir_processed = tmp.path().join("processed");
        write_text(&dir_processed.join("ledger.csv"), "old");
        let a = write_text(&tmp.path().join("inbox/ledger.csv"), "new");
        let b = write_text(&tmp.path().join("inbox/sub/ledger.csv"), "newer");

        let report = archive_files(&[a, b], &dir_processed, SpecArchiveOptions::default())
            .expect("archive");
        assert_eq!(report.cnt_renamed, 2);
        assert_eq!(
            std::fs::read_to_string(dir_processed.join("ledger.csv")).expect("read"),
            "old"
        );
        assert_eq!(
            std::fs::read_to_string(dir_processed.join("ledger_2.csv")).expect("read"),
            "new"
        );
        assert_eq!(
            std::fs::read_to_string(dir_processed.join("ledger_3.csv")).expect("read"),
            "newer"
        );
    }

    #[test]
    fn archive_skip_and_error_leave_inbox_untouched() {
        let tmp = TestDir::new();
        let dir_processed = tmp.path().join("processed");
        write_text(&dir_processed.join("ledger.csv"), "old");
        let a = write_text(&tmp.path().join("inbox/ledger.csv"), "new");

        let spec_skip = SpecArchiveOptions {
            rule_conflict: EnumArchiveConflictStrategy::Skip,
            ..SpecArchiveOptions::default()
        };
        let report = archive_files(std::slice::from_ref(&a), &dir_processed, spec_skip)
            .expect("archive");
        assert_eq!(report.cnt_skipped, 1);
        assert!(a.exists());

        let spec_error = SpecArchiveOptions {
            rule_conflict: EnumArchiveConflictStrategy::Error,
            ..SpecArchiveOptions::default()
        };
        let report = archive_files(std::slice::from_ref(&a), &dir_processed, spec_error)
            .expect("archive");
        assert_eq!(report.error_count(), 1);
        assert!(a.exists());
    }

    #[test]
    fn archive_overwrite_replaces_existing() {
        let tmp = TestDir::new();
        let dir_processed = tmp.path().join("processed");
        write_text(&dir_processed.join("ledger.csv"), "old");
        let a = write_text(&tmp.path().join("inbox/ledger.csv"), "new");

        let spec_options = SpecArchiveOptions {
            rule_conflict: EnumArchiveConflictStrategy::Overwrite,
            num_workers_max: Some(1),
            ..SpecArchiveOptions::default()
        };
        let report = archive_files(&[a], &dir_processed, spec_options).expect("archive");
        assert_eq!(report.archived_count(), 1);
        assert_eq!(
            std::fs::read_to_string(dir_processed.join("ledger.csv")).expect("read"),
            "new"
        );
    }

    #[test]
    fn archive_dry_run_does_not_touch_filesystem() {
        let tmp = TestDir::new();
        let a = write_text(&tmp.path().join("inbox/ledger.csv"), "l");
        let dir_processed = tmp.path().join("processed");

        let spec_options = SpecArchiveOptions {
            if_dry_run: true,
            ..SpecArchiveOptions::default()
        };
        let report = archive_files(&[a.clone()], &dir_processed, spec_options).expect("archive");
        assert_eq!(report.cnt_skipped, 1);
        assert_eq!(report.archived_count(), 0);
        assert!(a.exists());
        assert!(!dir_processed.exists());
    }

    #[test]
    fn archive_missing_source_is_reported() {
        let tmp = TestDir::new();
        let report = archive_files(
            &[tmp.path().join("inbox/missing.csv")],
            tmp.path().join("processed"),
            SpecArchiveOptions::default(),
        )
        .expect("archive");
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.cnt_requested, 1);
    }
}
