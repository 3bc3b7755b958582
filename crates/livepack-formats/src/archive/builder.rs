//! Archive builder
//!
//! The builder is a two-state machine:
//!
//! ```text
//! Collecting ──finalize(plan)──► Finalized ──write()──► .arci / .arcd / resource pack
//!     ▲ add()                        │ add() → AlreadyFinalized
//! ```
//!
//! `add` only records the source path and url. `finalize` reads every source,
//! compresses it when that makes it strictly smaller, hashes the stored
//! payload, merges identical payloads into one entry, applies the exclusion
//! plan, sorts by digest and assigns data offsets. With the `parallel`
//! feature the per-file work runs on the rayon pool; everything after it is
//! sequential.
//!
//! Payloads are not kept in memory between `finalize` and `write`. They are
//! read again while writing and checked against their digest, so a source
//! edited in between fails the build instead of producing a mismatching
//! archive.

use crate::archive::compression::{compress, should_use_compressed};
use crate::archive::entry::{ArchiveEntry, ResourceRecord};
use crate::archive::error::{ArchiveError, ArchiveResult};
use crate::archive::index::{ArchiveIndex, IndexEntry};
use crate::archive::legacy::{LegacyArchive, LegacyEntry};
use crate::archive::resource_pack::write_resource_pack_file;
use crate::archive::{DEFAULT_RESOURCE_PADDING, temp_path, write_atomic};
use crate::codec::padding_for;
use crate::graph::{ExclusionPlan, Inclusion};
use livepack_crypto::{HashAlgorithm, hash};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
struct PendingEntry {
    source_path: PathBuf,
    url: String,
    compress: bool,
}

#[derive(Debug)]
struct StoredPayload {
    digest: Vec<u8>,
    compressed: bool,
    raw_size: u32,
    stored_size: u32,
}

#[derive(Debug)]
enum BuilderState {
    Collecting {
        pending: Vec<PendingEntry>,
        urls: HashSet<String>,
    },
    Finalized {
        entries: Vec<ArchiveEntry>,
        records: Vec<ResourceRecord>,
        data_size: u64,
    },
}

/// Builder for archive index and data files
#[derive(Debug)]
pub struct ArchiveBuilder {
    hash_algorithm: HashAlgorithm,
    resource_padding: u32,
    compress: bool,
    state: BuilderState,
}

fn read_source(path: &Path) -> ArchiveResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            ArchiveError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            ArchiveError::SourceRead {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

fn to_u32(value: usize, what: &Path) -> ArchiveResult<u32> {
    u32::try_from(value)
        .map_err(|_| ArchiveError::TooLarge(format!("{} is {value} bytes", what.display())))
}

/// Read, optionally compress and hash one source
fn store_payload(
    source_path: &Path,
    try_compress: bool,
    algorithm: HashAlgorithm,
) -> ArchiveResult<(StoredPayload, Vec<u8>)> {
    let raw = read_source(source_path)?;
    let raw_size = to_u32(raw.len(), source_path)?;

    let (payload, compressed) = if try_compress {
        let candidate = compress(&raw);
        if should_use_compressed(&raw, &candidate) {
            (candidate, true)
        } else {
            (raw, false)
        }
    } else {
        (raw, false)
    };

    let digest = hash(&payload, algorithm)?;
    let stored = StoredPayload {
        digest,
        compressed,
        raw_size,
        stored_size: to_u32(payload.len(), source_path)?,
    };
    Ok((stored, payload))
}

/// Turn a relative path or loose url into `/a/b.ext` form
fn normalize_url(url: &str) -> ArchiveResult<String> {
    let url = url.replace('\\', "/");
    let trimmed = url.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(ArchiveError::InvalidUrl(url));
    }
    Ok(format!("/{trimmed}"))
}

impl ArchiveBuilder {
    /// Create a builder hashing payloads with `hash_algorithm`
    pub fn new(hash_algorithm: HashAlgorithm) -> Self {
        Self {
            hash_algorithm,
            resource_padding: DEFAULT_RESOURCE_PADDING,
            compress: true,
            state: BuilderState::Collecting {
                pending: Vec::new(),
                urls: HashSet::new(),
            },
        }
    }

    /// Align payloads in the data file to `padding` bytes
    pub fn with_resource_padding(mut self, padding: u32) -> Self {
        self.resource_padding = padding.max(1);
        self
    }

    /// Default compression choice for [`add`](Self::add)
    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Digest algorithm
    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.hash_algorithm
    }

    /// Payload alignment
    pub fn resource_padding(&self) -> u32 {
        self.resource_padding
    }

    /// Whether [`finalize`](Self::finalize) has succeeded
    pub fn is_finalized(&self) -> bool {
        matches!(self.state, BuilderState::Finalized { .. })
    }

    /// Record a source file under `url`
    ///
    /// Content is not read until finalize. Returns `false` when the url was
    /// already added.
    pub fn add(&mut self, source_path: impl Into<PathBuf>, url: &str) -> ArchiveResult<bool> {
        let compress = self.compress;
        self.add_with_compression(source_path, url, compress)
    }

    /// Record a source file, choosing whether to try compressing it
    ///
    /// The digest covers the stored payload, so identical content collapses
    /// into one entry only when it is added with the same choice. The same
    /// bytes stored raw under one url and compressed under another give two
    /// entries.
    pub fn add_with_compression(
        &mut self,
        source_path: impl Into<PathBuf>,
        url: &str,
        compress: bool,
    ) -> ArchiveResult<bool> {
        let BuilderState::Collecting { pending, urls } = &mut self.state else {
            return Err(ArchiveError::AlreadyFinalized);
        };

        let url = normalize_url(url)?;
        if !urls.insert(url.clone()) {
            debug!("Skipping duplicate url {url}");
            return Ok(false);
        }
        pending.push(PendingEntry {
            source_path: source_path.into(),
            url,
            compress,
        });
        Ok(true)
    }

    /// Record a file below `root`, deriving the url from its relative path
    pub fn add_relative(&mut self, root: &Path, source_path: &Path) -> ArchiveResult<bool> {
        let relative = source_path.strip_prefix(root).map_err(|_| {
            ArchiveError::InvalidUrl(format!(
                "{} is not below {}",
                source_path.display(),
                root.display()
            ))
        })?;
        let url = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        self.add(source_path, &url)
    }

    /// Number of urls added
    pub fn len(&self) -> usize {
        match &self.state {
            BuilderState::Collecting { pending, .. } => pending.len(),
            BuilderState::Finalized { records, .. } => records.len(),
        }
    }

    /// Whether nothing was added
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash and compress every source, apply `plan` and fix the entry order
    ///
    /// On failure the builder stays in the collecting state.
    pub fn finalize(&mut self, plan: &ExclusionPlan) -> ArchiveResult<()> {
        let BuilderState::Collecting { pending, .. } = &self.state else {
            return Err(ArchiveError::AlreadyFinalized);
        };

        let algorithm = self.hash_algorithm;
        let process = |entry: &PendingEntry| {
            store_payload(&entry.source_path, entry.compress, algorithm).map(|(stored, _)| stored)
        };

        #[cfg(feature = "parallel")]
        let stored: Vec<StoredPayload> = {
            use rayon::prelude::*;
            pending
                .par_iter()
                .map(process)
                .collect::<ArchiveResult<Vec<_>>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let stored: Vec<StoredPayload> = pending
            .iter()
            .map(process)
            .collect::<ArchiveResult<Vec<_>>>()?;

        // BTreeMap over Vec<u8> orders digests byte-wise, unsigned
        let mut by_digest: BTreeMap<Vec<u8>, ArchiveEntry> = BTreeMap::new();
        for (entry, payload) in pending.iter().zip(&stored) {
            let inclusion = plan.inclusion(&entry.url);
            by_digest
                .entry(payload.digest.clone())
                .and_modify(|existing| {
                    existing.urls.push(entry.url.clone());
                    existing.inclusion = existing.inclusion.min(inclusion);
                })
                .or_insert_with(|| ArchiveEntry {
                    source_path: entry.source_path.clone(),
                    url: entry.url.clone(),
                    urls: vec![entry.url.clone()],
                    digest: payload.digest.clone(),
                    compressed: payload.compressed,
                    raw_size: payload.raw_size,
                    stored_size: payload.stored_size,
                    data_offset: 0,
                    inclusion,
                });
        }

        let mut entries: Vec<ArchiveEntry> = by_digest.into_values().collect();
        let mut data_size = 0u64;
        for entry in entries
            .iter_mut()
            .filter(|e| e.inclusion == Inclusion::Bundled)
        {
            data_size += padding_for(data_size, self.resource_padding);
            entry.data_offset = u32::try_from(data_size).map_err(|_| {
                ArchiveError::TooLarge(format!("data offset {data_size} exceeds 32 bits"))
            })?;
            data_size += u64::from(entry.stored_size);
        }

        let inclusion_of: BTreeMap<&[u8], Inclusion> = entries
            .iter()
            .map(|e| (e.digest.as_slice(), e.inclusion))
            .collect();
        let records: Vec<ResourceRecord> = pending
            .iter()
            .zip(&stored)
            .map(|(entry, payload)| ResourceRecord {
                url: entry.url.clone(),
                digest: payload.digest.clone(),
                inclusion: inclusion_of
                    .get(payload.digest.as_slice())
                    .copied()
                    .unwrap_or(Inclusion::Bundled),
                compressed: payload.compressed,
                raw_size: payload.raw_size,
                stored_size: payload.stored_size,
            })
            .collect();

        let count = |inclusion: Inclusion| entries.iter().filter(|e| e.inclusion == inclusion).count();
        info!(
            "Finalized archive: {} resources, {} entries ({} bundled, {} excluded, {} dropped), {} data bytes",
            records.len(),
            entries.len(),
            count(Inclusion::Bundled),
            count(Inclusion::Excluded),
            count(Inclusion::Dropped),
            data_size
        );

        self.state = BuilderState::Finalized {
            entries,
            records,
            data_size,
        };
        Ok(())
    }

    fn finalized(&self) -> ArchiveResult<(&[ArchiveEntry], &[ResourceRecord], u64)> {
        match &self.state {
            BuilderState::Finalized {
                entries,
                records,
                data_size,
            } => Ok((entries, records, *data_size)),
            BuilderState::Collecting { .. } => Err(ArchiveError::NotFinalized),
        }
    }

    /// Every distinct payload, sorted by digest, dropped ones included
    pub fn entries(&self) -> ArchiveResult<&[ArchiveEntry]> {
        Ok(self.finalized()?.0)
    }

    /// One record per added url, in add order
    pub fn records(&self) -> ArchiveResult<&[ResourceRecord]> {
        Ok(self.finalized()?.1)
    }

    /// Size of the data file
    pub fn data_size(&self) -> ArchiveResult<u64> {
        Ok(self.finalized()?.2)
    }

    /// Entries written to the index
    pub fn index_entries(&self) -> ArchiveResult<impl Iterator<Item = &ArchiveEntry>> {
        Ok(self.entries()?.iter().filter(|e| e.inclusion.in_index()))
    }

    /// Entries whose payload belongs in the resource pack
    pub fn resource_pack_entries(&self) -> ArchiveResult<impl Iterator<Item = &ArchiveEntry>> {
        Ok(self
            .entries()?
            .iter()
            .filter(|e| e.inclusion.in_resource_pack()))
    }

    /// Index describing the finalized entries
    pub fn index(&self) -> ArchiveResult<ArchiveIndex> {
        let entries = self.index_entries()?.map(IndexEntry::from).collect();
        ArchiveIndex::new(self.hash_algorithm.digest_len() as u32, entries)
    }

    /// Stored payload of a finalized entry, re-read from its source
    pub fn load_payload(&self, entry: &ArchiveEntry) -> ArchiveResult<Vec<u8>> {
        let (stored, payload) =
            store_payload(&entry.source_path, entry.compressed, self.hash_algorithm)?;
        if stored.digest != entry.digest || stored.compressed != entry.compressed {
            return Err(ArchiveError::SourceChanged {
                path: entry.source_path.clone(),
            });
        }
        Ok(payload)
    }

    /// Write the index, the data file and the resource pack
    ///
    /// Index and data are written to temporary siblings and renamed into
    /// place only after both are complete.
    pub fn write(
        &self,
        index_path: &Path,
        data_path: &Path,
        resource_pack_dir: &Path,
    ) -> ArchiveResult<ArchiveIndex> {
        let index = self.index()?;

        let index_tmp = temp_path(index_path);
        let data_tmp = temp_path(data_path);
        let result = self
            .write_data(&data_tmp)
            .and_then(|()| self.write_resource_pack(resource_pack_dir).map(|_| ()))
            .and_then(|()| {
                let bytes = index.build()?;
                let mut file = File::create(&index_tmp)?;
                file.write_all(&bytes)?;
                file.sync_all()?;
                Ok(())
            });

        if let Err(e) = result {
            warn!("Archive write failed, removing partial output: {e}");
            let _ = std::fs::remove_file(&index_tmp);
            let _ = std::fs::remove_file(&data_tmp);
            return Err(e);
        }

        std::fs::rename(&data_tmp, data_path)?;
        std::fs::rename(&index_tmp, index_path)?;
        info!(
            "Wrote archive {} ({} entries) and {}",
            index_path.display(),
            index.entries.len(),
            data_path.display()
        );
        Ok(index)
    }

    fn write_data(&self, path: &Path) -> ArchiveResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        let mut position = 0u64;
        for entry in self
            .entries()?
            .iter()
            .filter(|e| e.inclusion == Inclusion::Bundled)
        {
            let padding = u64::from(entry.data_offset) - position;
            writer.write_all(&vec![0u8; padding as usize])?;
            let payload = self.load_payload(entry)?;
            writer.write_all(&payload)?;
            position = u64::from(entry.data_offset) + payload.len() as u64;
        }
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        Ok(())
    }

    /// Write the payload of every excluded and dropped entry to `dir`
    ///
    /// Returns the number of files newly written.
    pub fn write_resource_pack(&self, dir: &Path) -> ArchiveResult<usize> {
        let mut written = 0;
        for entry in self.resource_pack_entries()? {
            let payload = self.load_payload(entry)?;
            let (path, fresh) = write_resource_pack_file(dir, &entry.digest, &payload)?;
            if fresh {
                written += 1;
                debug!("Resource pack: {} -> {}", entry.url, path.display());
            }
        }
        Ok(written)
    }

    /// Build the legacy single-stream form of the finalized archive
    pub fn legacy_archive(&self) -> ArchiveResult<LegacyArchive> {
        let entries = self
            .index_entries()?
            .map(|entry| {
                let payload = match entry.inclusion {
                    Inclusion::Bundled => Some(self.load_payload(entry)?),
                    _ => None,
                };
                Ok(LegacyEntry {
                    digest: entry.digest.clone(),
                    flags: entry.flags(),
                    raw_size: entry.raw_size,
                    stored_size: entry.stored_size,
                    urls: entry.urls.clone(),
                    payload,
                })
            })
            .collect::<ArchiveResult<Vec<_>>>()?;
        LegacyArchive::new(self.hash_algorithm.digest_len() as u32, entries)
    }

    /// Write the legacy single-stream form to `path`
    pub fn write_legacy(&self, path: &Path) -> ArchiveResult<LegacyArchive> {
        let legacy = self.legacy_archive()?;
        write_atomic(path, &legacy.build()?)?;
        info!("Wrote legacy archive {}", path.display());
        Ok(legacy)
    }
}
