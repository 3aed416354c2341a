use snaplog::backend::{SnapshotBackend, SubvolumeEntry};
use snaplog::copy::{copy_out, historical_path, Destination};
use snaplog::error::{Error, Result};
use snaplog::history::{select, select_by_id, History, Selection};
use snaplog::logger::Logger;
use snaplog::render::{write_log, write_volumes, LogOptions, OutputFormat};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// In-memory backend: canned subvolumes and find-new answers keyed by (snapshot, base).
#[derive(Default)]
struct FakeBackend {
    subvolumes: Vec<SubvolumeEntry>,
    changes: HashMap<(PathBuf, u64), Vec<&'static str>>,
    times: HashMap<PathBuf, String>,
    calls: RefCell<Vec<String>>,
}

impl FakeBackend {
    fn snapshot(mut self, path: impl Into<PathBuf>, transaction: u64, created: &str) -> Self {
        let path = path.into();
        self.times.insert(path.clone(), created.to_string());
        self.subvolumes.push(SubvolumeEntry::new(path, transaction));
        self
    }

    fn subvolume(mut self, path: &str, transaction: u64) -> Self {
        self.subvolumes.push(SubvolumeEntry::new(path, transaction));
        self
    }

    fn changed(mut self, snapshot: impl Into<PathBuf>, base: u64, files: Vec<&'static str>) -> Self {
        self.changes.insert((snapshot.into(), base), files);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

impl SnapshotBackend for FakeBackend {
    fn list_subvolumes(&self, mount: &Path) -> Result<Vec<SubvolumeEntry>> {
        self.calls.borrow_mut().push(format!("list {}", mount.display()));
        Ok(self.subvolumes.clone())
    }

    fn creation_time(&self, snapshot: &Path) -> Result<String> {
        self.calls.borrow_mut().push(format!("show {}", snapshot.display()));
        self.times
            .get(snapshot)
            .cloned()
            .ok_or_else(|| Error::MetadataUnavailable(snapshot.to_path_buf()))
    }

    fn find_changed_paths(&self, snapshot: &Path, base: u64) -> Result<Vec<PathBuf>> {
        self.calls.borrow_mut().push(format!("find-new {} {}", snapshot.display(), base));
        let files = self
            .changes
            .get(&(snapshot.to_path_buf(), base))
            .cloned()
            .unwrap_or_default();
        Ok(files.into_iter().map(PathBuf::from).collect())
    }
}

const S1: &str = "/home/.snapshots/1/snapshot";
const S2: &str = "/home/.snapshots/2/snapshot";

/// Two commits: commit 1 (transaction 100) wrote `a` and `b/c`, commit 2 (transaction 200) rewrote `b/c`.
fn two_commit_backend() -> FakeBackend {
    FakeBackend::default()
        .snapshot(S2, 200, "2024-05-02T09:00:00+00:00")
        .snapshot(S1, 100, "2024-05-01T09:00:00+00:00")
        .subvolume("/home/@home", 4000)
        .changed(S1, 0, vec!["a", "b/c"])
        .changed(S2, 100, vec!["b/c"])
}

fn run_log(backend: &FakeBackend, selection: Selection, target: &str, no_files: bool) -> Result<String> {
    let logger = Logger::silent();
    let history = History::load(backend, Path::new("/home"), &logger)?;
    let commits = history.commits();
    let selected = select(&commits, &selection)?;
    let mut out = Vec::new();
    let options = LogOptions {
        target: Path::new(target),
        no_files,
        format: OutputFormat::Human,
    };
    write_log(&history, &selected, options, &mut out, &logger)?;
    Ok(String::from_utf8(out).unwrap())
}

#[test]
fn test_log_full_history_newest_first() {
    let backend = two_commit_backend();
    let output = run_log(&backend, Selection::All, "/home", false).unwrap();
    assert_eq!(
        output,
        "\
2024-05-02T09:00:00+00:00 2 /home/.snapshots/2/snapshot /home/b/c
2024-05-01T09:00:00+00:00 1 /home/.snapshots/1/snapshot /home/a
2024-05-01T09:00:00+00:00 1 /home/.snapshots/1/snapshot /home/b/c
"
    );
}

#[test]
fn test_log_single_commit_uses_its_window() {
    let backend = two_commit_backend();
    let output = run_log(&backend, Selection::Single("/2/".to_string()), "/home", false).unwrap();
    assert_eq!(output, "2024-05-02T09:00:00+00:00 2 /home/.snapshots/2/snapshot /home/b/c\n");

    // Only the selected commit was diffed, against the previous commit's transaction
    let finds: Vec<String> = backend.calls().into_iter().filter(|c| c.starts_with("find-new")).collect();
    assert_eq!(finds, vec![format!("find-new {} 100", S2)]);
}

#[test]
fn test_log_since_commit_includes_older() {
    let backend = two_commit_backend();
    let output = run_log(&backend, Selection::Since("/2/".to_string()), "/home/a", false).unwrap();
    assert_eq!(output, "2024-05-01T09:00:00+00:00 1 /home/.snapshots/1/snapshot /home/a\n");
}

#[test]
fn test_log_filters_by_path_components() {
    let backend = FakeBackend::default()
        .snapshot(S1, 100, "2024-05-01T09:00:00+00:00")
        .changed(S1, 0, vec!["b/c", "bc", "b"]);

    let output = run_log(&backend, Selection::All, "/home/b", false).unwrap();
    let files: Vec<&str> = output.lines().map(|l| l.rsplit(' ').next().unwrap()).collect();
    assert_eq!(files, vec!["/home/b/c", "/home/b"]);
}

#[test]
fn test_no_files_one_record_per_commit() {
    let backend = FakeBackend::default()
        .snapshot(S1, 100, "2024-05-01T09:00:00+00:00")
        .changed(S1, 0, vec!["docs/1.md", "docs/2.md", "docs/3.md", "other"]);

    let output = run_log(&backend, Selection::All, "/home/docs", true).unwrap();
    assert_eq!(output, "2024-05-01T09:00:00+00:00 1 /home/.snapshots/1/snapshot\n");
}

#[test]
fn test_irrelevant_commits_skip_metadata_lookup() {
    let backend = two_commit_backend();
    let output = run_log(&backend, Selection::All, "/home/a", true).unwrap();
    assert_eq!(output.lines().count(), 1);

    let shows: Vec<String> = backend.calls().into_iter().filter(|c| c.starts_with("show")).collect();
    assert_eq!(shows, vec![format!("show {}", S1)]);
}

#[test]
fn test_missing_creation_time_is_fatal() {
    let backend = FakeBackend::default()
        .subvolume(S1, 100)
        .changed(S1, 0, vec!["a"]);

    let err = run_log(&backend, Selection::All, "/home", false).unwrap_err();
    assert!(matches!(err, Error::MetadataUnavailable(p) if p == PathBuf::from(S1)));
}

#[test]
fn test_non_numeric_subvolumes_excluded_from_commits() {
    let backend = two_commit_backend();
    let history = History::load(&backend, Path::new("/home"), &Logger::silent()).unwrap();

    assert_eq!(history.snapshots().len(), 3);
    let commits = history.commits();
    assert_eq!(commits.len(), 2);
    assert!(commits.iter().all(|s| s.commit.is_some()));

    // The non-commit subvolume still takes part in ordering
    assert_eq!(history.snapshots()[0].path, PathBuf::from("/home/@home"));
    assert_eq!(history.snapshots()[0].previous_transaction, 200);
}

#[test]
fn test_commit_reference_resolution() {
    let backend = FakeBackend::default()
        .subvolume("/home/.snapshots/12/snapshot", 300)
        .subvolume("/home/archive/12/snapshot", 200)
        .subvolume("/home/.snapshots/5/snapshot", 100);
    let history = History::load(&backend, Path::new("/home"), &Logger::silent()).unwrap();
    let commits = history.commits();

    assert!(matches!(select_by_id(&commits, 12), Err(Error::AmbiguousCommit { count: 2, .. })));
    assert!(matches!(select_by_id(&commits, 99), Err(Error::NoSuchCommit(_))));
    assert_eq!(select_by_id(&commits, 5).unwrap().transaction, 100);

    let err = select(&commits, &Selection::Single("12".to_string())).unwrap_err();
    assert!(matches!(err, Error::AmbiguousCommit { .. }));
}

#[test]
fn test_volumes_lists_everything() {
    let backend = two_commit_backend();
    let history = History::load(&backend, Path::new("/home"), &Logger::silent()).unwrap();

    let mut out = Vec::new();
    write_volumes(history.snapshots(), OutputFormat::Human, &mut out).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "\
/home/@home 4000 200 -
/home/.snapshots/2/snapshot 200 100 2
/home/.snapshots/1/snapshot 100 0 1
"
    );
}

/// Accepts `budget` writes, then reports a closed pipe
struct ClosingWriter {
    budget: usize,
    data: Vec<u8>,
}

impl Write for ClosingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "reader closed"));
        }
        self.budget -= 1;
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn test_closed_output_stops_backend_calls() {
    let backend = two_commit_backend();
    let logger = Logger::silent();
    let history = History::load(&backend, Path::new("/home"), &logger).unwrap();
    let commits = history.commits();
    let mut out = ClosingWriter { budget: 0, data: Vec::new() };
    let options = LogOptions {
        target: Path::new("/home"),
        no_files: true,
        format: OutputFormat::Human,
    };

    let err = write_log(&history, &commits, options, &mut out, &logger).unwrap_err();
    assert!(err.is_broken_pipe());

    // The older commit was never diffed
    let finds = backend.calls().into_iter().filter(|c| c.starts_with("find-new")).count();
    assert_eq!(finds, 1);
}

#[test]
fn test_copy_round_trip_matches_logged_commit() {
    let mount = TempDir::new().unwrap();
    let snapshot = mount.path().join(".snapshots/3/snapshot");
    fs::create_dir_all(snapshot.join("user")).unwrap();
    fs::write(snapshot.join("user/doc.txt"), b"as it was at commit 3\n").unwrap();
    fs::create_dir_all(mount.path().join("user")).unwrap();
    fs::write(mount.path().join("user/doc.txt"), b"as it is today\n").unwrap();

    let backend = FakeBackend::default()
        .snapshot(snapshot.clone(), 100, "2024-05-01T09:00:00+00:00")
        .changed(snapshot.clone(), 0, vec!["user/doc.txt"]);
    let logger = Logger::silent();
    let history = History::load(&backend, mount.path(), &logger).unwrap();
    let live = mount.path().join("user/doc.txt");

    // log reports the file as changed in commit 3
    let commits = history.commits();
    let mut log = Vec::new();
    let options = LogOptions {
        target: &live,
        no_files: false,
        format: OutputFormat::Json,
    };
    write_log(&history, &commits, options, &mut log, &logger).unwrap();
    let record: serde_json::Value = serde_json::from_slice(&log).unwrap();
    assert_eq!(record["commit"], 3);
    assert_eq!(record["file"], live.to_str().unwrap());

    // copy brings back the historical bytes
    let commit = select_by_id(&commits, 3).unwrap();
    let source = historical_path(history.mount(), &commit.path, &live).unwrap();
    let dest_dir = TempDir::new().unwrap();
    let dest = dest_dir.path().join("doc.txt");
    copy_out(&source, &commit.path, &Destination::Path(dest.clone()), &mut io::sink(), &logger).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), b"as it was at commit 3\n");

    // and so does streaming it
    let mut streamed = Vec::new();
    copy_out(&source, &commit.path, &Destination::Stdout, &mut streamed, &logger).unwrap();
    assert_eq!(streamed, fs::read(&dest).unwrap());
}

#[test]
fn test_copy_directory_to_stdout_refused() {
    let mount = TempDir::new().unwrap();
    let snapshot = mount.path().join(".snapshots/3/snapshot");
    fs::create_dir_all(snapshot.join("user")).unwrap();

    let err = copy_out(
        &snapshot.join("user"),
        &snapshot,
        &Destination::parse(Some("-")),
        &mut Vec::new(),
        &Logger::silent(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::StreamingDirectoryUnsupported(_)));
}
