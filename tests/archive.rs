use std::fs;
use std::sync::Mutex;

use assert_matches::assert_matches;
use zip::ZipArchive;

use scan_uploader::app::{ProgressEvent, ProgressKind, ProgressSink};
use scan_uploader::archive::build_archive;
use scan_uploader::domain::ItemId;
use scan_uploader::error::UploadError;

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
    kinds: Mutex<Vec<ProgressKind>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.kinds.lock().unwrap().push(event.kind);
        self.messages.lock().unwrap().push(event.message);
    }
}

fn entry_names(archive: scan_uploader::archive::ScanArchive) -> Vec<String> {
    let mut zip = ZipArchive::new(archive.into_file()).unwrap();
    let mut names: Vec<String> = (0..zip.len())
        .map(|i| zip.by_index(i).unwrap().name().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn excludes_xml_in_any_case() {
    let temp = tempfile::tempdir().unwrap();
    let scan = temp.path().join("abc123");
    fs::create_dir(&scan).unwrap();
    for name in ["p1.jpg", "p2.jpg", "p3.tif", "meta.xml", "SCAN.XML", "marc.Xml"] {
        fs::write(scan.join(name), name.as_bytes()).unwrap();
    }

    let sink = RecordingSink::default();
    let id: ItemId = "some-item".parse().unwrap();
    let archive = build_archive(&scan, &id, &sink).unwrap();
    assert_eq!(archive.entries().len(), 3);
    assert!(archive.size() > 0);

    assert_eq!(entry_names(archive), vec!["p1.jpg", "p2.jpg", "p3.tif"]);

    let messages = sink.messages.lock().unwrap();
    assert_eq!(messages.len(), 6);
    assert!(messages.iter().all(|m| m.ends_with("/6 to abc123 archive")));
    let kinds = sink.kinds.lock().unwrap();
    assert!(kinds.iter().all(|kind| *kind == ProgressKind::ArchiveEntry));
}

#[test]
fn entries_keep_file_contents_under_bare_names() {
    let temp = tempfile::tempdir().unwrap();
    let scan = temp.path().join("dime_0042");
    fs::create_dir(&scan).unwrap();
    fs::write(scan.join("0001.jp2"), b"page one").unwrap();

    let id: ItemId = "other-item".parse().unwrap();
    let archive = build_archive(&scan, &id, &RecordingSink::default()).unwrap();
    let mut zip = ZipArchive::new(archive.reader().unwrap()).unwrap();
    let mut entry = zip.by_name("0001.jp2").unwrap();
    let mut contents = Vec::new();
    std::io::Read::read_to_end(&mut entry, &mut contents).unwrap();
    assert_eq!(contents, b"page one");
}

#[test]
fn subdirectories_are_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let scan = temp.path().join("item");
    fs::create_dir_all(scan.join("thumbs")).unwrap();
    fs::write(scan.join("p1.jpg"), b"x").unwrap();

    let id: ItemId = "item-id".parse().unwrap();
    let archive = build_archive(&scan, &id, &RecordingSink::default()).unwrap();
    assert_eq!(entry_names(archive), vec!["p1.jpg"]);
}

#[test]
fn missing_directory_is_a_filesystem_error() {
    let temp = tempfile::tempdir().unwrap();
    let id: ItemId = "item-id".parse().unwrap();
    let result = build_archive(&temp.path().join("nope"), &id, &RecordingSink::default());
    assert_matches!(result, Err(UploadError::Filesystem(_)));
}

#[cfg(target_os = "linux")]
#[test]
fn non_utf8_names_are_archived_lossily() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let temp = tempfile::tempdir().unwrap();
    let scan = temp.path().join("latin1");
    fs::create_dir(&scan).unwrap();
    fs::write(scan.join(OsStr::from_bytes(b"p\xe9.jpg")), b"x").unwrap();
    fs::write(scan.join("p2.jpg"), b"y").unwrap();

    let id: ItemId = "item-id".parse().unwrap();
    let archive = build_archive(&scan, &id, &RecordingSink::default()).unwrap();
    assert_eq!(entry_names(archive), vec!["p2.jpg", "p\u{FFFD}.jpg"]);
}
