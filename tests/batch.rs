use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Mutex;

use assert_matches::assert_matches;

use scan_uploader::app::{ProgressEvent, ProgressSink};
use scan_uploader::batch::{PreflightCheck, Uploader, apply, enumerate_rows};
use scan_uploader::config::SheetPaths;
use scan_uploader::domain::ItemId;
use scan_uploader::error::UploadError;
use scan_uploader::internet_archive::{ArchiveService, UploadFile};
use scan_uploader::metadata::{CellValue, Metadata, Row};
use scan_uploader::processor::RowProcessor;
use scan_uploader::workbook::RowSource;

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

struct MemorySource {
    sheets: Vec<(String, Vec<Row>)>,
    reads: Rc<RefCell<Vec<String>>>,
}

impl RowSource for MemorySource {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|(name, _)| name.clone()).collect()
    }

    fn sheet_rows(&mut self, sheet: &str) -> Result<Vec<Row>, UploadError> {
        self.reads.borrow_mut().push(sheet.to_string());
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| UploadError::Spreadsheet {
                path: PathBuf::from("memory"),
                message: format!("no sheet {sheet}"),
            })
    }
}

#[derive(Default)]
struct RecordingArchive {
    uploads: Mutex<Vec<(ItemId, String, Metadata)>>,
}

impl ArchiveService for RecordingArchive {
    fn exists(&self, _identifier: &ItemId) -> Result<bool, UploadError> {
        Ok(false)
    }

    fn upload(
        &self,
        identifier: &ItemId,
        files: Vec<UploadFile>,
        metadata: &Metadata,
    ) -> Result<(), UploadError> {
        let mut uploads = self.uploads.lock().unwrap();
        for file in files {
            uploads.push((identifier.clone(), file.name, metadata.clone()));
        }
        Ok(())
    }
}

fn row(folder: &str) -> Row {
    [
        ("docID", CellValue::Text(folder.to_string())),
        ("collection", CellValue::Text("dimenovels".to_string())),
        ("title", CellValue::Text(format!("Title of {folder}"))),
    ]
    .into_iter()
    .collect()
}

fn scan_tree(folders: &[&str]) -> tempfile::TempDir {
    let temp = tempfile::tempdir().unwrap();
    for folder in folders {
        let dir = temp.path().join("DIMENOVELS").join(folder);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("p1.jpg"), b"page").unwrap();
    }
    temp
}

fn pairs_for(
    base: &Path,
    folders: &[&str],
) -> Vec<Result<(PathBuf, Metadata), UploadError>> {
    let source = MemorySource {
        sheets: vec![(
            "Sheet1".to_string(),
            folders.iter().map(|folder| row(folder)).collect(),
        )],
        reads: Rc::default(),
    };
    enumerate_rows(source, &SheetPaths::fixed("DIMENOVELS"), base).collect()
}

#[test]
fn rows_follow_sheet_then_row_order() {
    let reads = Rc::new(RefCell::new(Vec::new()));
    let source = MemorySource {
        sheets: vec![
            ("First".to_string(), vec![row("a1"), row("a2")]),
            ("Second".to_string(), vec![row("b1")]),
        ],
        reads: reads.clone(),
    };
    let paths = SheetPaths::default().with_override("Second", "second-batch");
    let mut pairs = enumerate_rows(source, &paths, Path::new("/scans"));

    let (dir, metadata) = pairs.next().unwrap().unwrap();
    assert_eq!(dir, PathBuf::from("/scans/First"));
    assert_eq!(metadata.get("image_folder"), Some("a1"));
    assert_eq!(*reads.borrow(), vec!["First".to_string()]);

    let rest: Vec<_> = pairs.map(Result::unwrap).collect();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0].1.get("image_folder"), Some("a2"));
    assert_eq!(rest[1].0, PathBuf::from("/scans/second-batch"));
    assert_eq!(rest[1].1.get("image_folder"), Some("b1"));
    assert_eq!(reads.borrow().len(), 2);
}

#[test]
fn sheet_read_error_ends_enumeration() {
    struct Broken;
    impl RowSource for Broken {
        fn sheet_names(&self) -> Vec<String> {
            vec!["One".to_string(), "Two".to_string()]
        }
        fn sheet_rows(&mut self, sheet: &str) -> Result<Vec<Row>, UploadError> {
            Err(UploadError::Spreadsheet {
                path: PathBuf::from("broken.xls"),
                message: sheet.to_string(),
            })
        }
    }

    let mut pairs = enumerate_rows(Broken, &SheetPaths::default(), Path::new("/scans"));
    assert_matches!(pairs.next(), Some(Err(UploadError::Spreadsheet { .. })));
    assert!(pairs.next().is_none());
}

#[test]
fn preflight_stops_at_first_missing_directory() {
    let temp = scan_tree(&["A", "C"]);
    let sink = RecordingSink::default();
    let mut check = PreflightCheck::new(&sink);

    let result = apply(pairs_for(temp.path(), &["A", "B", "C"]), &mut check);

    assert_matches!(
        result,
        Err(UploadError::MissingScanDirectory(path)) if path.ends_with("DIMENOVELS/B")
    );
    assert_eq!(check.checked(), 1);
    let messages = sink.messages.lock().unwrap();
    assert_eq!(messages.len(), 2);
    assert!(!messages.iter().any(|m| m.ends_with("/C")));
}

#[test]
fn preflight_passes_when_all_present() {
    let temp = scan_tree(&["A", "B"]);
    let mut check = PreflightCheck::new(&NoopSink);
    apply(pairs_for(temp.path(), &["A", "B"]), &mut check).unwrap();
    assert_eq!(check.checked(), 2);
}

#[test]
fn preflight_reports_missing_folder_field() {
    let temp = scan_tree(&[]);
    let blank: Row = [("docID", CellValue::Empty)].into_iter().collect();
    let source = MemorySource {
        sheets: vec![("Sheet1".to_string(), vec![blank])],
        reads: Rc::default(),
    };
    let pairs = enumerate_rows(source, &SheetPaths::default(), temp.path());
    let mut check = PreflightCheck::new(&NoopSink);
    assert_matches!(
        apply(pairs, &mut check),
        Err(UploadError::MissingField(field)) if field == "image_folder"
    );
}

#[test]
fn apply_accepts_closures_and_stops_on_error() {
    let mut seen = Vec::new();
    let pairs = pairs_for(Path::new("/scans"), &["x1", "x2", "x3"]);
    let result = apply(pairs, &mut |_dir: &Path, metadata: Metadata| -> Result<(), UploadError> {
        let folder = metadata.folder()?.to_string();
        seen.push(folder.clone());
        if folder == "x2" {
            return Err(UploadError::ArchiveHttp("connection reset".to_string()));
        }
        Ok(())
    });
    assert_matches!(result, Err(UploadError::ArchiveHttp(_)));
    assert_eq!(seen, vec!["x1", "x2"]);
}

#[test]
fn upload_limit_skips_remaining_rows() {
    let folders = ["r1", "r2", "r3", "r4", "r5"];
    let temp = scan_tree(&folders);
    let service = RecordingArchive::default();
    let processor = RowProcessor::new(&service, &NoopSink);
    let mut uploader = Uploader::new(processor, &NoopSink, Some(2), false);

    apply(pairs_for(temp.path(), &folders), &mut uploader).unwrap();

    assert_eq!(uploader.uploaded().len(), 2);
    assert_eq!(uploader.skipped(), 3);
    let uploads = service.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].1, "r1_images.zip");
    assert_eq!(uploads[1].1, "r2_images.zip");
}

#[test]
fn test_mode_overrides_collection_only() {
    let temp = scan_tree(&["t1", "t2"]);
    let service = RecordingArchive::default();
    let processor = RowProcessor::new(&service, &NoopSink);
    let mut uploader = Uploader::new(processor, &NoopSink, None, true);

    apply(pairs_for(temp.path(), &["t1", "t2"]), &mut uploader).unwrap();

    let uploads = service.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 2);
    for (_, name, metadata) in uploads.iter() {
        assert_eq!(metadata.get("collection"), Some("test_collection"));
        let folder = metadata.get("image_folder").unwrap();
        assert_eq!(name, &format!("{folder}_images.zip"));
        assert_eq!(metadata.get("title"), Some(format!("Title of {folder}").as_str()));
        assert_eq!(metadata.len(), 3);
    }
}

#[test]
fn process_next_returns_identifier_per_upload() {
    let temp = scan_tree(&["only"]);
    let service = RecordingArchive::default();
    let processor = RowProcessor::new(&service, &NoopSink);
    let mut uploader = Uploader::new(processor, &NoopSink, Some(1), false);

    let mut pairs = pairs_for(temp.path(), &["only", "only"]).into_iter();
    let (dir, metadata) = pairs.next().unwrap().unwrap();
    let first = uploader.process_next(&dir, metadata).unwrap();
    let (dir, metadata) = pairs.next().unwrap().unwrap();
    let second = uploader.process_next(&dir, metadata).unwrap();

    let first = first.unwrap();
    assert!(second.is_none());
    assert_eq!(uploader.uploaded()[0].identifier, first);
    assert_eq!(service.uploads.lock().unwrap()[0].0, first);
}
