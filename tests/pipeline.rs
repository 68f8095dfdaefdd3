//! End-to-end runs of the organizing pipeline over temporary trees

use chrono::{Local, TimeZone};
use copyphotos::error::{MetadataError, TagError};
use copyphotos::time::{DateField, MetadataDecoder, TagLookup};
use copyphotos::{Action, Config, Pipeline, RecordingReporter, TransferMode};
use filetime::FileTime;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{TempDir, tempdir};
use walkdir::WalkDir;

/// Treats files whose content is `EXIF:<date>` as carrying an original capture time
struct PrefixDecoder;

struct OriginalOnly(String);

impl TagLookup for OriginalOnly {
    fn get(&self, field: DateField) -> Result<String, TagError> {
        match field {
            DateField::Original => Ok(self.0.clone()),
            _ => Err(TagError::NotFound),
        }
    }
}

impl MetadataDecoder for PrefixDecoder {
    fn decode(&self, reader: &mut BufReader<File>) -> Result<Box<dyn TagLookup>, MetadataError> {
        let mut content = String::new();
        reader
            .read_to_string(&mut content)
            .map_err(|e| MetadataError(e.to_string()))?;
        match content.strip_prefix("EXIF:") {
            Some(date) => Ok(Box::new(OriginalOnly(date.trim().to_string()))),
            None => Err(MetadataError("no metadata".into())),
        }
    }
}

struct Workspace {
    _dir: TempDir,
    source: PathBuf,
    dest: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempdir().unwrap();
        let source = dir.path().join("card");
        let dest = dir.path().join("library");
        fs::create_dir_all(&source).unwrap();
        Self { _dir: dir, source, dest }
    }

    /// Write a source file with a local-noon modification time
    fn file(&self, rel: &str, content: &str, mtime: (i32, u32, u32)) -> PathBuf {
        let path = self.source.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        let (y, m, d) = mtime;
        let local = Local.with_ymd_and_hms(y, m, d, 12, 0, 0).single().unwrap();
        filetime::set_file_mtime(&path, FileTime::from_unix_time(local.timestamp(), 0)).unwrap();
        path
    }

    fn config(&self, mode: TransferMode) -> Config {
        let mut config = Config {
            source_dir: self.source.clone(),
            dest_dir: self.dest.clone(),
            mode,
            ..Config::default()
        };
        config.formats.raw = "%Y/%Y-%m-%d_RAW".into();
        config.formats.movie = "%Y/%Y-%m-%d_MOV".into();
        config
    }
}

fn run(config: Config) -> (copyphotos::RunSummary, Vec<Action>) {
    let reporter = Arc::new(RecordingReporter::new());
    let summary = Pipeline::new(config)
        .unwrap()
        .with_decoder(Arc::new(PrefixDecoder))
        .with_reporter(reporter.clone())
        .run()
        .unwrap();
    (summary, reporter.actions())
}

/// Relative path -> content of every file under `root`
fn snapshot(root: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    if !root.exists() {
        return BTreeMap::new();
    }
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn copy_organizes_by_kind_and_date() {
    let ws = Workspace::new();
    ws.file("DCIM/a.JPG", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    ws.file("DCIM/b.NEF", "EXIF:2020:01:02 08:30:00", (2023, 1, 1));
    ws.file("DCIM/c.mov", "movie bytes", (2023, 6, 15));
    ws.file("DCIM/d.tif", "EXIF:not a date", (2023, 6, 15));
    ws.file("DCIM/notes.txt", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));

    let (summary, actions) = run(ws.config(TransferMode::Copy));

    let tree = snapshot(&ws.dest);
    let expected: Vec<PathBuf> = vec![
        PathBuf::from("2020/2020-01-02_RAW/b.NEF"),
        PathBuf::from("2021/2021-07-04/a.JPG"),
        PathBuf::from("2023/2023-06-15/d.tif"),
        PathBuf::from("2023/2023-06-15_MOV/c.mov"),
    ];
    assert_eq!(tree.keys().cloned().collect::<Vec<_>>(), expected);
    assert_eq!(summary.discovered, 4);
    assert_eq!(summary.performed, 4);

    // Sources stay in copy mode
    assert_eq!(snapshot(&ws.source).len(), 5);
    assert_eq!(
        actions.iter().filter(|a| matches!(a, Action::Copy { .. })).count(),
        4
    );
}

#[test]
fn second_run_transfers_nothing() {
    let ws = Workspace::new();
    ws.file("a.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    ws.file("b.jpg", "plain", (2022, 2, 2));

    let (first, _) = run(ws.config(TransferMode::Copy));
    assert_eq!(first.performed, 2);
    let after_first = snapshot(&ws.dest);

    let (second, actions) = run(ws.config(TransferMode::Copy));
    assert_eq!(second.performed, 0);
    assert_eq!(second.dropped, 2);
    assert!(actions.is_empty());
    assert_eq!(snapshot(&ws.dest), after_first);
}

#[test]
fn move_empties_source() {
    let ws = Workspace::new();
    ws.file("x/a.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    ws.file("x/y/b.mpg", "clip", (2022, 2, 2));

    let (summary, _) = run(ws.config(TransferMode::Move));
    assert_eq!(summary.performed, 2);
    assert!(snapshot(&ws.source).is_empty());
    assert!(ws.dest.join("2021/2021-07-04/a.jpg").exists());
    assert!(ws.dest.join("2022/2022-02-02_MOV/b.mpg").exists());
}

#[test]
fn dry_run_touches_nothing() {
    for mode in [TransferMode::Copy, TransferMode::Move, TransferMode::DeleteDuplicates] {
        let ws = Workspace::new();
        ws.file("a.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
        ws.file("b.jpg", "plain", (2022, 2, 2));

        // Pre-seed one duplicate so delete mode has something to plan
        let dup = ws.dest.join("2021/2021-07-04/a.jpg");
        fs::create_dir_all(dup.parent().unwrap()).unwrap();
        fs::write(&dup, "EXIF:2021:07:04 10:00:00").unwrap();

        let source_before = snapshot(&ws.source);
        let dest_before = snapshot(&ws.dest);

        let mut config = ws.config(mode);
        config.dry_run = true;
        let (summary, actions) = run(config);

        assert_eq!(snapshot(&ws.source), source_before, "{:?}", mode);
        assert_eq!(snapshot(&ws.dest), dest_before, "{:?}", mode);
        assert!(!ws.dest.join("2022").exists());
        assert_eq!(summary.performed, 1, "{:?}", mode);
        assert!(!actions.is_empty());
    }
}

#[test]
fn excluded_paths_are_never_transferred() {
    let ws = Workspace::new();
    ws.file("Thumbs/a.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    ws.file("keep/b.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));

    let mut config = ws.config(TransferMode::Copy);
    config.exclude = Some("/thumbs/".into());
    let (summary, _) = run(config);

    assert_eq!(summary.discovered, 1);
    let tree = snapshot(&ws.dest);
    assert_eq!(tree.len(), 1);
    assert!(tree.contains_key(Path::new("2021/2021-07-04/b.jpg")));
}

#[test]
fn delete_duplicates_only_removes_equal_sizes() {
    let ws = Workspace::new();
    let same = ws.file("same.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    let changed = ws.file("changed.jpg", "EXIF:2021:07:04 10:00:00", (2023, 1, 1));
    let fresh = ws.file("fresh.jpg", "plain", (2022, 2, 2));

    let (copied, _) = run(ws.config(TransferMode::Copy));
    assert_eq!(copied.performed, 3);

    // Grow one destination so sizes no longer match, drop another entirely
    fs::write(ws.dest.join("2021/2021-07-04/changed.jpg"), "EXIF:2021:07:04 10:00:00 edited").unwrap();
    fs::remove_file(ws.dest.join("2022/2022-02-02/fresh.jpg")).unwrap();

    let (summary, actions) = run(ws.config(TransferMode::DeleteDuplicates));
    assert_eq!(summary.performed, 1);
    assert_eq!(actions, vec![Action::Remove(same.clone())]);
    assert!(!same.exists());
    assert!(changed.exists());
    assert!(fresh.exists());
}

#[test]
fn larger_source_needs_permission_to_overwrite() {
    let ws = Workspace::new();
    let source = ws.file("a.jpg", "EXIF:2021:07:04 10:00:00 full size", (2023, 1, 1));
    let dest = ws.dest.join("2021/2021-07-04/a.jpg");
    fs::create_dir_all(dest.parent().unwrap()).unwrap();
    fs::write(&dest, "truncated").unwrap();

    let (summary, actions) = run(ws.config(TransferMode::Copy));
    assert_eq!(summary.performed, 0);
    assert_eq!(
        actions,
        vec![Action::SizeMismatch { source: source.clone(), destination: dest.clone() }]
    );
    assert_eq!(fs::read_to_string(&dest).unwrap(), "truncated");

    let mut config = ws.config(TransferMode::Copy);
    config.allow_larger = true;
    let (summary, _) = run(config);
    assert_eq!(summary.performed, 1);
    assert_eq!(fs::read(&dest).unwrap(), fs::read(&source).unwrap());
}

#[test]
fn result_does_not_depend_on_pool_sizes() {
    let build = || {
        let ws = Workspace::new();
        for i in 0..40 {
            let day = 1 + (i % 28) as u32;
            if i % 3 == 0 {
                ws.file(&format!("d{}/img_{}.jpg", i % 5, i), &format!("EXIF:2019:03:{:02} 12:00:00", day), (2023, 1, 1));
            } else if i % 3 == 1 {
                ws.file(&format!("d{}/raw_{}.cr2", i % 5, i), "raw", (2020, 5, day));
            } else {
                ws.file(&format!("d{}/clip_{}.mov", i % 5, i), "clip", (2021, 8, day));
            }
        }
        ws
    };

    let serial = build();
    let mut config = serial.config(TransferMode::Copy);
    config.decoder_workers = 1;
    config.executor_workers = Some(1);
    config.candidate_queue = 1;
    config.request_queue = 1;
    run(config);

    let parallel = build();
    let mut config = parallel.config(TransferMode::Copy);
    config.decoder_workers = 8;
    config.executor_workers = Some(4);
    run(config);

    let serial_tree = snapshot(&serial.dest);
    assert_eq!(serial_tree.len(), 40);
    assert_eq!(serial_tree, snapshot(&parallel.dest));
}

#[test]
fn same_named_files_are_never_lost_under_parallel_moves() {
    for round in 0..10 {
        let ws = Workspace::new();
        let pairs = 120;
        for i in 0..pairs {
            // Same name, date and size, different bytes
            ws.file(&format!("d{}/a/IMG_{}.jpg", i, i), "first", (2022, 2, 2));
            ws.file(&format!("d{}/b/IMG_{}.jpg", i, i), "other", (2022, 2, 2));
        }

        let mut config = ws.config(TransferMode::Move);
        config.decoder_workers = 4;
        config.executor_workers = Some(4);
        let (summary, _) = run(config);

        let moved = snapshot(&ws.dest);
        let left = snapshot(&ws.source);
        assert_eq!(moved.len(), pairs, "round {}", round);
        assert_eq!(left.len(), pairs, "round {}", round);
        assert_eq!(summary.performed, pairs, "round {}", round);
        assert_eq!(summary.failed, 0, "round {}", round);
    }
}

#[test]
fn same_named_files_are_copied_once_under_parallel_copies() {
    let ws = Workspace::new();
    let pairs = 120;
    for i in 0..pairs {
        ws.file(&format!("d{}/a/IMG_{}.jpg", i, i), "first", (2022, 2, 2));
        ws.file(&format!("d{}/b/IMG_{}.jpg", i, i), "other", (2022, 2, 2));
    }

    let mut config = ws.config(TransferMode::Copy);
    config.executor_workers = Some(4);
    let (summary, _) = run(config);

    let copied = snapshot(&ws.dest);
    assert_eq!(copied.len(), pairs);
    assert_eq!(summary.performed, pairs);
    assert_eq!(summary.failed, 0);
    assert!(copied.values().all(|bytes| bytes == b"first" || bytes == b"other"));
}
