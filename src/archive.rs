use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom};
use std::path::Path;

use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::app::{ProgressEvent, ProgressKind, ProgressSink};
use crate::domain::ItemId;
use crate::error::UploadError;

const EXCLUDED_EXTENSION: &str = ".xml";

/// A finished zip of one scan directory, backed by an anonymous temp file.
///
/// The backing file is unlinked from the start and disappears once the
/// archive is dropped.
#[derive(Debug)]
pub struct ScanArchive {
    file: File,
    entries: Vec<String>,
    size: u64,
}

impl ScanArchive {
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn reader(&self) -> Result<File, UploadError> {
        let mut file = self
            .file
            .try_clone()
            .map_err(|err| UploadError::Filesystem(err.to_string()))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|err| UploadError::Filesystem(err.to_string()))?;
        Ok(file)
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

pub fn is_excluded(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(EXCLUDED_EXTENSION)
}

pub fn build_archive(
    scan_dir: &Path,
    _identifier: &ItemId,
    sink: &dyn ProgressSink,
) -> Result<ScanArchive, UploadError> {
    let total = fs::read_dir(scan_dir)
        .map_err(|err| io_error(scan_dir, err))?
        .count();
    let label = scan_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| scan_dir.display().to_string());

    let file = tempfile::tempfile().map_err(|err| io_error(scan_dir, err))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut entries = Vec::new();

    let listing = fs::read_dir(scan_dir).map_err(|err| io_error(scan_dir, err))?;
    for (index, entry) in listing.enumerate() {
        let entry = entry.map_err(|err| io_error(scan_dir, err))?;
        sink.event(ProgressEvent {
            kind: ProgressKind::ArchiveEntry,
            message: format!("Adding file {}/{} to {} archive", index + 1, total, label),
            elapsed: None,
        });

        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_excluded(&name) {
            debug!(file = %name, "skipping xml sidecar");
            continue;
        }
        if !path.is_file() {
            debug!(path = %path.display(), "skipping non-file entry");
            continue;
        }

        writer
            .start_file(name.as_str(), options)
            .map_err(|err| zip_error(scan_dir, err))?;
        let mut source = File::open(&path).map_err(|err| io_error(&path, err))?;
        io::copy(&mut source, &mut writer).map_err(|err| io_error(scan_dir, err))?;
        entries.push(name);
    }

    let mut file = writer.finish().map_err(|err| zip_error(scan_dir, err))?;
    let size = file
        .seek(SeekFrom::End(0))
        .map_err(|err| io_error(scan_dir, err))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|err| io_error(scan_dir, err))?;
    debug!(dir = %scan_dir.display(), entries = entries.len(), bytes = size, "archive built");

    Ok(ScanArchive {
        file,
        entries,
        size,
    })
}

fn is_storage_full(err: &io::Error) -> bool {
    // ENOSPC
    err.kind() == io::ErrorKind::StorageFull || err.raw_os_error() == Some(28)
}

fn io_error(path: &Path, err: io::Error) -> UploadError {
    if is_storage_full(&err) {
        UploadError::StorageExhausted(path.to_path_buf())
    } else {
        UploadError::Filesystem(format!("{}: {err}", path.display()))
    }
}

fn zip_error(path: &Path, err: ZipError) -> UploadError {
    match err {
        ZipError::Io(err) => io_error(path, err),
        other => UploadError::Archive(other.to_string()),
    }
}
