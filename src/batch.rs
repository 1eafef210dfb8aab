use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressKind, ProgressSink};
use crate::config::SheetPaths;
use crate::domain::{ItemId, TEST_COLLECTION, remote_archive_name};
use crate::error::UploadError;
use crate::internet_archive::ArchiveService;
use crate::metadata::{Metadata, Row, normalize};
use crate::processor::RowProcessor;
use crate::workbook::RowSource;

pub type RowPair = (PathBuf, Metadata);

/// Lazy walk over every row of every sheet, in sheet order then row order.
///
/// A sheet is only read once the previous one is exhausted. After an error
/// the iterator is finished.
pub struct RowPairs<R: RowSource> {
    source: R,
    pending: VecDeque<String>,
    paths: SheetPaths,
    base_dir: PathBuf,
    current: Option<(PathBuf, std::vec::IntoIter<Row>)>,
}

impl<R: RowSource> Iterator for RowPairs<R> {
    type Item = Result<RowPair, UploadError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((dir, rows)) = self.current.as_mut() {
                if let Some(row) = rows.next() {
                    return Some(Ok((dir.clone(), normalize(&row))));
                }
                self.current = None;
            }

            let sheet = self.pending.pop_front()?;
            match self.source.sheet_rows(&sheet) {
                Ok(rows) => {
                    let dir = self
                        .base_dir
                        .join(self.paths.segment_for(&sheet).as_std_path());
                    debug!(%sheet, dir = %dir.display(), rows = rows.len(), "entering sheet");
                    self.current = Some((dir, rows.into_iter()));
                }
                Err(err) => {
                    self.pending.clear();
                    return Some(Err(err));
                }
            }
        }
    }
}

pub fn enumerate_rows<R: RowSource>(
    source: R,
    paths: &SheetPaths,
    base_dir: &Path,
) -> RowPairs<R> {
    let pending = source.sheet_names().into_iter().collect();
    RowPairs {
        source,
        pending,
        paths: paths.clone(),
        base_dir: base_dir.to_path_buf(),
        current: None,
    }
}

pub trait RowAction {
    fn run(&mut self, dir: &Path, metadata: Metadata) -> Result<(), UploadError>;
}

impl<F> RowAction for F
where
    F: FnMut(&Path, Metadata) -> Result<(), UploadError>,
{
    fn run(&mut self, dir: &Path, metadata: Metadata) -> Result<(), UploadError> {
        self(dir, metadata)
    }
}

pub fn apply<I, A>(pairs: I, action: &mut A) -> Result<(), UploadError>
where
    I: IntoIterator<Item = Result<RowPair, UploadError>>,
    A: RowAction + ?Sized,
{
    for pair in pairs {
        let (dir, metadata) = pair?;
        action.run(&dir, metadata)?;
    }
    Ok(())
}

pub struct PreflightCheck<'a> {
    sink: &'a dyn ProgressSink,
    checked: usize,
}

impl<'a> PreflightCheck<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, checked: 0 }
    }

    pub fn checked(&self) -> usize {
        self.checked
    }
}

impl RowAction for PreflightCheck<'_> {
    fn run(&mut self, dir: &Path, metadata: Metadata) -> Result<(), UploadError> {
        let path = dir.join(metadata.folder()?);
        self.sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: format!("checking path: {}", path.display()),
            elapsed: None,
        });
        if !path.exists() {
            return Err(UploadError::MissingScanDirectory(path));
        }
        self.checked += 1;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedItem {
    pub identifier: ItemId,
    pub folder: String,
    pub remote_name: String,
}

pub struct Uploader<'a, S: ArchiveService> {
    processor: RowProcessor<'a, S>,
    sink: &'a dyn ProgressSink,
    limit: Option<usize>,
    test: bool,
    uploaded: Vec<UploadedItem>,
    skipped: usize,
}

impl<'a, S: ArchiveService> Uploader<'a, S> {
    pub fn new(
        processor: RowProcessor<'a, S>,
        sink: &'a dyn ProgressSink,
        limit: Option<usize>,
        test: bool,
    ) -> Self {
        Self {
            processor,
            sink,
            limit,
            test,
            uploaded: Vec::new(),
            skipped: 0,
        }
    }

    pub fn uploaded(&self) -> &[UploadedItem] {
        &self.uploaded
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn into_parts(self) -> (Vec<UploadedItem>, usize) {
        (self.uploaded, self.skipped)
    }

    pub fn process_next(
        &mut self,
        dir: &Path,
        mut metadata: Metadata,
    ) -> Result<Option<ItemId>, UploadError> {
        if self.limit.is_some_and(|limit| self.uploaded.len() >= limit) {
            self.skipped += 1;
            return Ok(None);
        }
        if self.test {
            metadata.set_collection(TEST_COLLECTION);
        }

        let identifier = self.processor.process(&metadata, dir)?;
        let folder = metadata.folder()?.to_string();
        self.uploaded.push(UploadedItem {
            identifier: identifier.clone(),
            remote_name: remote_archive_name(&folder),
            folder,
        });
        info!(count = self.uploaded.len(), item = %identifier, "upload complete");
        self.sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: format!("uploaded {}", self.uploaded.len()),
            elapsed: None,
        });
        Ok(Some(identifier))
    }
}

impl<S: ArchiveService> RowAction for Uploader<'_, S> {
    fn run(&mut self, dir: &Path, metadata: Metadata) -> Result<(), UploadError> {
        self.process_next(dir, metadata).map(|_| ())
    }
}
