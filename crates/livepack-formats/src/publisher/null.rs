//! Publisher that discards everything

use crate::archive::ArchiveEntry;
use crate::publisher::Publisher;
use crate::publisher::error::{PublishError, PublishResult};
use std::io::Read;

/// Counts payloads and drops them
///
/// Used when live update content is produced but not shipped anywhere yet.
#[derive(Debug, Default)]
pub struct NullPublisher {
    started: bool,
    count: usize,
    bytes: u64,
}

impl NullPublisher {
    /// Create a stopped publisher
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads received since creation
    pub fn count(&self) -> usize {
        self.count
    }

    /// Bytes received since creation
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Publisher for NullPublisher {
    fn name(&self) -> &str {
        "null"
    }

    fn start(&mut self) -> PublishResult<()> {
        if self.started {
            return Err(PublishError::AlreadyStarted(self.name().to_string()));
        }
        self.started = true;
        Ok(())
    }

    fn publish(&mut self, _entry: &ArchiveEntry, content: &mut dyn Read) -> PublishResult<()> {
        if !self.started {
            return Err(PublishError::NotStarted(self.name().to_string()));
        }
        self.bytes += std::io::copy(content, &mut std::io::sink())?;
        self.count += 1;
        Ok(())
    }

    fn stop(&mut self) -> PublishResult<()> {
        if !self.started {
            return Err(PublishError::NotStarted(self.name().to_string()));
        }
        self.started = false;
        Ok(())
    }
}
