use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::domain::ItemId;
use crate::error::UploadError;
use crate::internet_archive::ArchiveService;

pub const RETRY_DELAY: Duration = Duration::from_millis(500);

pub struct IdentifierAllocator<'s, S: ArchiveService> {
    service: &'s S,
    generate: Box<dyn FnMut() -> ItemId + 's>,
    delay: Duration,
}

impl<'s, S: ArchiveService> IdentifierAllocator<'s, S> {
    pub fn new(service: &'s S) -> Self {
        Self {
            service,
            generate: Box::new(ItemId::generate),
            delay: RETRY_DELAY,
        }
    }

    pub fn with_generator(mut self, generate: impl FnMut() -> ItemId + 's) -> Self {
        self.generate = Box::new(generate);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Loops until a candidate is free. There is no attempt cap.
    pub fn allocate(&mut self) -> Result<ItemId, UploadError> {
        loop {
            let candidate = (self.generate)();
            if !self.service.exists(&candidate)? {
                return Ok(candidate);
            }
            debug!(identifier = %candidate, "identifier taken, retrying");
            thread::sleep(self.delay);
        }
    }
}
