//! Publisher copying into a content-addressed directory

use crate::archive::{ArchiveEntry, resource_pack_path, write_atomic};
use crate::publisher::Publisher;
use crate::publisher::error::{PublishError, PublishResult};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Copies payloads into a store directory named by hex digest
///
/// A file already present with the same content is left alone; different
/// content under the same name is a conflict.
#[derive(Debug)]
pub struct DirectoryPublisher {
    target: PathBuf,
    started: bool,
    written: usize,
    unchanged: usize,
}

impl DirectoryPublisher {
    /// Publish into `target`
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            started: false,
            written: 0,
            unchanged: 0,
        }
    }

    /// Store directory
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Files written by this publisher
    pub fn written(&self) -> usize {
        self.written
    }

    /// Payloads that were already present
    pub fn unchanged(&self) -> usize {
        self.unchanged
    }
}

impl Publisher for DirectoryPublisher {
    fn name(&self) -> &str {
        "directory"
    }

    fn start(&mut self) -> PublishResult<()> {
        if self.started {
            return Err(PublishError::AlreadyStarted(self.name().to_string()));
        }
        std::fs::create_dir_all(&self.target)?;
        self.started = true;
        Ok(())
    }

    fn publish(&mut self, entry: &ArchiveEntry, content: &mut dyn Read) -> PublishResult<()> {
        if !self.started {
            return Err(PublishError::NotStarted(self.name().to_string()));
        }

        let mut bytes = Vec::with_capacity(entry.stored_size as usize);
        content.read_to_end(&mut bytes)?;

        let path = resource_pack_path(&self.target, &entry.digest);
        match std::fs::read(&path) {
            Ok(existing) if existing == bytes => {
                debug!("{} already published", path.display());
                self.unchanged += 1;
                return Ok(());
            }
            Ok(_) => return Err(PublishError::Conflict { path }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        write_atomic(&path, &bytes)?;
        self.written += 1;
        Ok(())
    }

    fn stop(&mut self) -> PublishResult<()> {
        if !self.started {
            return Err(PublishError::NotStarted(self.name().to_string()));
        }
        self.started = false;
        debug!(
            "Directory publisher {}: {} written, {} unchanged",
            self.target.display(),
            self.written,
            self.unchanged
        );
        Ok(())
    }
}
