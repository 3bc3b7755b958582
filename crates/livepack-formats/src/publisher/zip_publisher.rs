//! Publisher writing one zip file

use crate::archive::{ArchiveEntry, temp_path};
use crate::publisher::Publisher;
use crate::publisher::error::{PublishError, PublishResult};
use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Collects resource pack payloads into a zip archive
///
/// Each payload is stored (payloads are already compressed where it helps)
/// under its hex digest. An optional manifest is added when the zip is
/// closed. The zip is written to a temporary sibling and renamed on `stop`.
pub struct ZipPublisher {
    path: PathBuf,
    manifest: Option<(String, Vec<u8>)>,
    writer: Option<ZipWriter<File>>,
    names: HashSet<String>,
}

impl ZipPublisher {
    /// Publish into the zip at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            manifest: None,
            writer: None,
            names: HashSet::new(),
        }
    }

    /// Add a manifest under `name` when the zip is closed
    pub fn with_manifest(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.manifest = Some((name.into(), bytes));
        self
    }

    /// Output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }
}

impl fmt::Debug for ZipPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipPublisher")
            .field("path", &self.path)
            .field("started", &self.writer.is_some())
            .field("published", &self.names.len())
            .finish_non_exhaustive()
    }
}

impl Publisher for ZipPublisher {
    fn name(&self) -> &str {
        "zip"
    }

    fn start(&mut self) -> PublishResult<()> {
        if self.writer.is_some() {
            return Err(PublishError::AlreadyStarted(self.name().to_string()));
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(temp_path(&self.path))?;
        self.writer = Some(ZipWriter::new(file));
        self.names.clear();
        debug!("Started zip publisher at {}", self.path.display());
        Ok(())
    }

    fn publish(&mut self, entry: &ArchiveEntry, content: &mut dyn Read) -> PublishResult<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(PublishError::NotStarted("zip".to_string()));
        };

        let name = entry.digest_hex();
        if self.names.contains(&name) {
            debug!("{name} already in zip");
            return Ok(());
        }

        // A failed read must not leave a truncated member behind
        let mut payload = Vec::with_capacity(entry.stored_size as usize);
        content.read_to_end(&mut payload)?;
        writer.start_file(name.as_str(), Self::options())?;
        writer.write_all(&payload)?;
        self.names.insert(name);
        Ok(())
    }

    fn stop(&mut self) -> PublishResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Err(PublishError::NotStarted(self.name().to_string()));
        };

        if let Some((name, bytes)) = &self.manifest {
            writer.start_file(name.as_str(), Self::options())?;
            writer.write_all(bytes)?;
        }
        let file = writer.finish()?;
        file.sync_all()?;
        std::fs::rename(temp_path(&self.path), &self.path)?;
        info!(
            "Wrote {} with {} resources",
            self.path.display(),
            self.names.len()
        );
        Ok(())
    }
}
