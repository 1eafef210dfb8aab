use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::batch::{
    PreflightCheck, RowPair, RowPairs, UploadedItem, Uploader, apply, enumerate_rows,
};
use crate::config::ResolvedConfig;
use crate::error::UploadError;
use crate::internet_archive::ArchiveService;
use crate::processor::RowProcessor;
use crate::workbook::{RowSource, Workbook};

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    pub count: Option<usize>,
    pub test: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub rows_checked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadResult {
    pub uploaded: Vec<UploadedItem>,
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    Step,
    ArchiveEntry,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub kind: ProgressKind,
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<S: ArchiveService> {
    config: ResolvedConfig,
    service: S,
    retry_delay: Option<Duration>,
}

impl<S: ArchiveService> App<S> {
    pub fn new(config: ResolvedConfig, service: S) -> Self {
        Self {
            config,
            service,
            retry_delay: None,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Re-opens the workbook on every call.
    pub fn rows(&self) -> Result<RowPairs<Workbook>, UploadError> {
        let workbook = Workbook::open(self.config.workbook.as_std_path())?;
        Ok(self.rows_from(workbook))
    }

    pub fn rows_from<R: RowSource>(&self, source: R) -> RowPairs<R> {
        enumerate_rows(
            source,
            &self.config.sheets,
            self.config.base_dir.as_std_path(),
        )
    }

    pub fn preflight(&self, sink: &dyn ProgressSink) -> Result<CheckResult, UploadError> {
        let rows = self.rows()?;
        self.preflight_rows(rows, sink)
    }

    pub fn preflight_rows<I>(
        &self,
        rows: I,
        sink: &dyn ProgressSink,
    ) -> Result<CheckResult, UploadError>
    where
        I: IntoIterator<Item = Result<RowPair, UploadError>>,
    {
        sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: "Checking if rows in the spreadsheet exist as files...".to_string(),
            elapsed: None,
        });
        let mut check = PreflightCheck::new(sink);
        apply(rows, &mut check)?;
        info!(rows = check.checked(), "pre-flight passed");
        sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: "Confirmed all scans in the spreadsheet exist".to_string(),
            elapsed: None,
        });
        Ok(CheckResult {
            rows_checked: check.checked(),
        })
    }

    pub fn upload(
        &self,
        options: UploadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, UploadError> {
        let rows = self.rows()?;
        self.upload_rows(rows, options, sink)
    }

    pub fn upload_rows<I>(
        &self,
        rows: I,
        options: UploadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<UploadResult, UploadError>
    where
        I: IntoIterator<Item = Result<RowPair, UploadError>>,
    {
        sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: if options.test {
                "Starting test upload...".to_string()
            } else {
                "Starting real upload...".to_string()
            },
            elapsed: None,
        });
        let mut processor = RowProcessor::new(&self.service, sink);
        if let Some(delay) = self.retry_delay {
            processor = processor.with_retry_delay(delay);
        }
        let mut uploader = Uploader::new(processor, sink, options.count, options.test);
        apply(rows, &mut uploader)?;
        let (uploaded, skipped) = uploader.into_parts();
        info!(uploaded = uploaded.len(), skipped, "upload pass finished");
        sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: "Uploads complete".to_string(),
            elapsed: None,
        });
        Ok(UploadResult { uploaded, skipped })
    }
}
