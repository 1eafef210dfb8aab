use std::path::Path;
use std::time::{Duration, Instant};

use tracing::info;

use crate::allocator::{IdentifierAllocator, RETRY_DELAY};
use crate::app::{ProgressEvent, ProgressKind, ProgressSink};
use crate::archive::build_archive;
use crate::domain::{ItemId, remote_archive_name};
use crate::error::UploadError;
use crate::internet_archive::{ArchiveService, UploadFile};
use crate::metadata::Metadata;

pub struct RowProcessor<'a, S: ArchiveService> {
    service: &'a S,
    sink: &'a dyn ProgressSink,
    retry_delay: Duration,
}

impl<'a, S: ArchiveService> RowProcessor<'a, S> {
    pub fn new(service: &'a S, sink: &'a dyn ProgressSink) -> Self {
        Self {
            service,
            sink,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn process(&self, metadata: &Metadata, scan_parent: &Path) -> Result<ItemId, UploadError> {
        let folder = metadata.folder()?;
        let identifier = IdentifierAllocator::new(self.service)
            .with_delay(self.retry_delay)
            .allocate()?;

        self.sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: format!("Creating a zip file for {folder}"),
            elapsed: None,
        });
        let archive = build_archive(&scan_parent.join(folder), &identifier, self.sink)?;

        let name = remote_archive_name(folder);
        let upload = UploadFile {
            name: name.clone(),
            file: archive.reader()?,
            len: archive.size(),
        };
        let start = Instant::now();
        self.service.upload(&identifier, vec![upload], metadata)?;
        info!(item = %identifier, %folder, file = %name, "row uploaded");
        self.sink.event(ProgressEvent {
            kind: ProgressKind::Step,
            message: format!("uploaded {name} to {identifier}"),
            elapsed: Some(start.elapsed()),
        });
        Ok(identifier)
    }
}
