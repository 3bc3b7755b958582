//! Resource pack publishers
//!
//! A publisher receives the payloads that left the main archive. The
//! sequence is always `start`, any number of `publish` calls, then `stop`.
//! [`publish_resource_pack`] drives that sequence over the resource pack
//! directory and records a per-entry outcome, so one unreadable or rejected
//! payload does not stop the rest.

pub mod directory;
pub mod error;
pub mod null;
pub mod zip_publisher;

pub use directory::DirectoryPublisher;
pub use error::{PublishError, PublishResult};
pub use null::NullPublisher;
pub use zip_publisher::ZipPublisher;

use crate::archive::{ArchiveEntry, resource_pack_path};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{info, warn};

/// Sink for resource pack payloads
pub trait Publisher {
    /// Short name used in logs and errors
    fn name(&self) -> &str;

    /// Prepare the target
    fn start(&mut self) -> PublishResult<()>;

    /// Receive the stored payload of one entry
    fn publish(&mut self, entry: &ArchiveEntry, content: &mut dyn std::io::Read)
    -> PublishResult<()>;

    /// Flush and close the target
    fn stop(&mut self) -> PublishResult<()>;
}

/// Entry that could not be published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishFailure {
    /// First url of the entry
    pub url: String,
    /// Hex digest of the entry
    pub digest: String,
    /// Error message
    pub reason: String,
}

/// Outcome of a publish pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Hex digests published
    pub published: Vec<String>,
    /// Entries that failed
    pub failed: Vec<PublishFailure>,
}

impl PublishReport {
    /// Whether every entry was published
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of entries attempted
    pub fn attempted(&self) -> usize {
        self.published.len() + self.failed.len()
    }
}

/// Publish the resource pack payload of every entry
///
/// Errors from `start` and `stop` abort the pass; errors for a single entry
/// are recorded in the report.
pub fn publish_resource_pack<'e, I>(
    publisher: &mut dyn Publisher,
    entries: I,
    pack_dir: &Path,
) -> PublishResult<PublishReport>
where
    I: IntoIterator<Item = &'e ArchiveEntry>,
{
    publisher.start()?;

    let mut report = PublishReport::default();
    for entry in entries {
        let result = File::open(resource_pack_path(pack_dir, &entry.digest))
            .map_err(PublishError::from)
            .and_then(|file| publisher.publish(entry, &mut BufReader::new(file)));
        match result {
            Ok(()) => report.published.push(entry.digest_hex()),
            Err(e) => {
                warn!("Failed to publish {} ({}): {e}", entry.url, entry.digest_hex());
                report.failed.push(PublishFailure {
                    url: entry.url.clone(),
                    digest: entry.digest_hex(),
                    reason: e.to_string(),
                });
            }
        }
    }

    publisher.stop()?;
    info!(
        "Publisher {}: {} published, {} failed",
        publisher.name(),
        report.published.len(),
        report.failed.len()
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::write_resource_pack_file;
    use crate::graph::Inclusion;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn entry(digest: &[u8], url: &str, size: u32) -> ArchiveEntry {
        ArchiveEntry {
            source_path: PathBuf::from(url.trim_start_matches('/')),
            url: url.to_string(),
            urls: vec![url.to_string()],
            digest: digest.to_vec(),
            compressed: false,
            raw_size: size,
            stored_size: size,
            data_offset: 0,
            inclusion: Inclusion::Excluded,
        }
    }

    fn pack(dir: &Path) -> Vec<ArchiveEntry> {
        write_resource_pack_file(dir, &[0x01], b"first").unwrap();
        write_resource_pack_file(dir, &[0x02], b"second").unwrap();
        vec![entry(&[0x01], "/a.goc", 5), entry(&[0x02], "/b.goc", 6)]
    }

    #[test]
    fn test_null_publisher_counts() {
        let dir = TempDir::new().unwrap();
        let entries = pack(dir.path());
        let mut publisher = NullPublisher::new();

        let report = publish_resource_pack(&mut publisher, &entries, dir.path()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.published, vec!["01", "02"]);
        assert_eq!(publisher.count(), 2);
        assert_eq!(publisher.bytes(), 11);
    }

    #[test]
    fn test_missing_payload_is_partial_failure() {
        let dir = TempDir::new().unwrap();
        let mut entries = pack(dir.path());
        entries.insert(1, entry(&[0x03], "/missing.goc", 1));
        let mut publisher = NullPublisher::new();

        let report = publish_resource_pack(&mut publisher, &entries, dir.path()).unwrap();
        assert!(!report.is_success());
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.published, vec!["01", "02"]);
        assert_eq!(report.failed[0].url, "/missing.goc");
    }

    #[test]
    fn test_publish_before_start() {
        let mut publisher = NullPublisher::new();
        let err = publisher
            .publish(&entry(&[1], "/a.goc", 1), &mut &b"x"[..])
            .unwrap_err();
        assert!(err.is_usage_error());
    }

    #[test]
    fn test_directory_publisher_conflicts() {
        let dir = TempDir::new().unwrap();
        let entries = pack(&dir.path().join("pack"));
        let store = dir.path().join("store");

        let mut publisher = DirectoryPublisher::new(&store);
        let report =
            publish_resource_pack(&mut publisher, &entries, &dir.path().join("pack")).unwrap();
        assert!(report.is_success());
        assert_eq!(std::fs::read(store.join("02")).unwrap(), b"second");

        // Same content again is fine
        let report =
            publish_resource_pack(&mut publisher, &entries, &dir.path().join("pack")).unwrap();
        assert!(report.is_success());
        assert_eq!(publisher.unchanged(), 2);

        std::fs::write(store.join("01"), b"tampered").unwrap();
        let report =
            publish_resource_pack(&mut publisher, &entries, &dir.path().join("pack")).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].digest, "01");
    }

    #[test]
    fn test_zip_publisher_contents() {
        let dir = TempDir::new().unwrap();
        let entries = pack(dir.path());
        let zip_path = dir.path().join("out").join("resources.zip");

        let mut publisher =
            ZipPublisher::new(&zip_path).with_manifest("game.dmanifest", b"manifest".to_vec());
        let report = publish_resource_pack(&mut publisher, &entries, dir.path()).unwrap();
        assert!(report.is_success());

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 3);
        let mut content = String::new();
        archive
            .by_name("02")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "second");
        assert!(archive.by_name("game.dmanifest").is_ok());
    }

    /// Yields `limit` bytes, then fails
    struct FailingReader {
        limit: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.limit == 0 {
                return Err(std::io::Error::other("disk gone"));
            }
            let n = buf.len().min(self.limit);
            buf[..n].fill(b'x');
            self.limit -= n;
            Ok(n)
        }
    }

    #[test]
    fn test_zip_publisher_failed_read_can_retry() {
        let dir = TempDir::new().unwrap();
        let zip_path = dir.path().join("resources.zip");
        let payload = entry(&[0xab], "/big.goc", 100);

        let mut publisher = ZipPublisher::new(&zip_path);
        publisher.start().unwrap();
        assert!(
            publisher
                .publish(&payload, &mut FailingReader { limit: 10 })
                .is_err()
        );
        publisher
            .publish(&payload, &mut &[b'y'; 100][..])
            .unwrap();
        publisher.stop().unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut content = Vec::new();
        archive
            .by_name("ab")
            .unwrap()
            .read_to_end(&mut content)
            .unwrap();
        assert_eq!(content, vec![b'y'; 100]);
    }
}
