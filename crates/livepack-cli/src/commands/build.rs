//! `livepack build`
//!
//! Runs the whole pipeline for one [`BuildConfig`]:
//!
//! 1. collect the resource files and build the resource graph
//! 2. apply the exclusion list and finalize the archive
//! 3. write `.arci`, `.arcd` and the resource pack (optionally `.darc`)
//! 4. build and sign `.dmanifest` (optionally `.manifest_hash`)
//! 5. publish the resource pack

use crate::config::{BuildConfig, PublisherConfig};
use crate::error::{CommandError, CommandResult};
use livepack_crypto::{load_private_key, load_public_key};
use livepack_formats::archive::ArchiveBuilder;
use livepack_formats::graph::{Inclusion, ResourceGraph};
use livepack_formats::manifest::ManifestBuilder;
use livepack_formats::publisher::{
    DirectoryPublisher, NullPublisher, PublishReport, Publisher, ZipPublisher,
    publish_resource_pack,
};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Files produced by a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Archive index
    pub index: PathBuf,
    /// Archive data
    pub data: PathBuf,
    /// Resource pack directory
    pub resource_pack_dir: PathBuf,
    /// Signed manifest
    pub manifest: PathBuf,
    /// Manifest data hash, when requested
    pub manifest_hash: Option<PathBuf>,
    /// Public key copy, when configured
    pub public_key: Option<PathBuf>,
    /// Single-stream archive, when requested
    pub legacy_archive: Option<PathBuf>,
    /// Index identifier shared by the archive and the manifest
    pub archive_identifier: [u8; 16],
    /// Urls added
    pub resources: usize,
    /// Distinct payloads in the index
    pub index_entries: usize,
    /// Payloads written to the resource pack
    pub resource_pack_entries: usize,
    /// Publisher outcome
    pub publish: PublishReport,
}

impl BuildReport {
    /// Fail if any resource pack entry was not published
    pub fn ensure_published(&self) -> CommandResult<()> {
        if self.publish.is_success() {
            Ok(())
        } else {
            Err(CommandError::PartialPublish {
                failed: self.publish.failed.len(),
                attempted: self.publish.attempted(),
            })
        }
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Archive {} ({} resources, {} index entries, {} in resource pack)",
            hex::encode(self.archive_identifier),
            self.resources,
            self.index_entries,
            self.resource_pack_entries
        )?;
        writeln!(f, "  index:         {}", self.index.display())?;
        writeln!(f, "  data:          {}", self.data.display())?;
        writeln!(f, "  resource pack: {}", self.resource_pack_dir.display())?;
        writeln!(f, "  manifest:      {}", self.manifest.display())?;
        if let Some(path) = &self.manifest_hash {
            writeln!(f, "  manifest hash: {}", path.display())?;
        }
        if let Some(path) = &self.public_key {
            writeln!(f, "  public key:    {}", path.display())?;
        }
        if let Some(path) = &self.legacy_archive {
            writeln!(f, "  legacy:        {}", path.display())?;
        }
        write!(
            f,
            "Published {} of {} resource pack entries",
            self.publish.published.len(),
            self.publish.attempted()
        )?;
        for failure in &self.publish.failed {
            write!(
                f,
                "\n  failed {} ({}): {}",
                failure.url, failure.digest, failure.reason
            )?;
        }
        Ok(())
    }
}

/// Load, validate and run a configuration file
pub fn run_from_file(
    config_path: &Path,
    output_dir: Option<PathBuf>,
) -> CommandResult<BuildReport> {
    let mut config = BuildConfig::load(config_path)?;
    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }
    info!("Loaded build configuration {}", config_path.display());
    run(&config)
}

/// Run a build
pub fn run(config: &BuildConfig) -> CommandResult<BuildReport> {
    config.validate()?;

    let resources = collect_resources(config)?;
    let graph = build_graph(config, &resources)?;
    let plan = graph.exclusion_plan(config.excluded.iter().cloned());

    let mut archive = ArchiveBuilder::new(config.resource_hash_algorithm)
        .with_resource_padding(config.resource_padding)
        .with_compression(config.compress);
    for (path, url) in &resources {
        archive.add(path, url)?;
    }
    archive.finalize(&plan)?;

    std::fs::create_dir_all(&config.output_dir)?;
    let index_path = config.output_path("arci");
    let data_path = config.output_path("arcd");
    let pack_dir = config.resource_pack_dir();
    let index = archive.write(&index_path, &data_path, &pack_dir)?;
    let archive_identifier = index.identifier()?;

    let legacy_archive = if config.legacy_archive {
        let path = config.output_path("darc");
        archive.write_legacy(&path)?;
        Some(path)
    } else {
        None
    };

    // Manifest
    let mut manifest = ManifestBuilder::new(&graph)
        .with_resource_hash_algorithm(config.resource_hash_algorithm)
        .with_signature_hash_algorithm(config.signature_hash_algorithm)
        .with_signature_sign_algorithm(config.signature_sign_algorithm)
        .with_project_identifier(config.project_identifier.clone())
        .with_archive_identifier(archive_identifier)
        .with_excluded(config.excluded.iter().cloned());
    manifest.add_archive_records(archive.records()?)?;
    for version in &config.engine_versions {
        manifest.add_supported_engine_version(version)?;
    }

    let private_key = load_private_key(&config.private_key)?;
    let manifest_file = manifest.build_file(&private_key)?;
    let manifest_bytes = manifest_file.build()?;
    let manifest_path = config.output_path("dmanifest");
    std::fs::write(&manifest_path, &manifest_bytes)?;
    info!(
        "Wrote {} ({} bytes)",
        manifest_path.display(),
        manifest_bytes.len()
    );

    let public_key = match &config.public_key {
        Some(source) => {
            let key = load_public_key(source)?;
            manifest_file.verify(&key)?;
            let path = config.output_path("public.der");
            std::fs::copy(source, &path)?;
            debug!("Signature checked against {}", source.display());
            Some(path)
        }
        None => None,
    };

    let manifest_hash = if config.write_manifest_hash {
        let path = config.output_path("manifest_hash");
        std::fs::write(&path, manifest_file.data_hash()?)?;
        Some(path)
    } else {
        None
    };

    // Resource pack
    let pack_entries: Vec<_> = archive.resource_pack_entries()?.collect();
    let mut publisher = make_publisher(config, &manifest_bytes);
    let publish =
        publish_resource_pack(publisher.as_mut(), pack_entries.iter().copied(), &pack_dir)?;
    if !publish.is_success() {
        warn!(
            "{} resource pack entries were not published",
            publish.failed.len()
        );
    }

    let records = archive.records()?;
    info!(
        "Build finished: {} bundled, {} excluded, {} dropped",
        records
            .iter()
            .filter(|r| r.inclusion == Inclusion::Bundled)
            .count(),
        records
            .iter()
            .filter(|r| r.inclusion == Inclusion::Excluded)
            .count(),
        records
            .iter()
            .filter(|r| r.inclusion == Inclusion::Dropped)
            .count()
    );

    Ok(BuildReport {
        index: index_path,
        data: data_path,
        resource_pack_dir: pack_dir,
        manifest: manifest_path,
        manifest_hash,
        public_key,
        legacy_archive,
        archive_identifier,
        resources: records.len(),
        index_entries: index.entries.len(),
        resource_pack_entries: pack_entries.len(),
        publish,
    })
}

/// Source files and their urls, in add order
///
/// Listed resources keep their configured order. Without a list every file
/// below the content root is added, sorted by path.
pub fn collect_resources(config: &BuildConfig) -> CommandResult<Vec<(PathBuf, String)>> {
    let root = &config.content_root;
    if !config.resources.is_empty() {
        return Ok(config
            .resources
            .iter()
            .map(|relative| {
                let relative = relative.trim_start_matches('/');
                (root.join(relative), format!("/{relative}"))
            })
            .collect());
    }

    let mut resources = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let url = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        resources.push((entry.path().to_path_buf(), format!("/{url}")));
    }
    debug!(
        "Found {} resources below {}",
        resources.len(),
        root.display()
    );
    Ok(resources)
}

/// Resource graph from the configured roots and dependency edges
///
/// Without explicit roots, every resource that no dependency edge points
/// at hangs directly below the root.
pub fn build_graph(
    config: &BuildConfig,
    resources: &[(PathBuf, String)],
) -> CommandResult<ResourceGraph> {
    let mut graph = ResourceGraph::new();

    let roots: Vec<&str> = if config.roots.is_empty() {
        let children: HashSet<&str> = config
            .dependencies
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        resources
            .iter()
            .map(|(_, url)| url.as_str())
            .filter(|url| !children.contains(url))
            .collect()
    } else {
        config.roots.iter().map(String::as_str).collect()
    };
    for root in roots {
        graph.add_child(None, root)?;
    }

    for (parent, children) in &config.dependencies {
        let parent = graph.insert(parent)?;
        for child in children {
            let child = graph.insert(child)?;
            graph.link(parent, child)?;
        }
    }

    for (path, url) in resources {
        let id = graph.insert(url)?;
        graph.set_source_path(id, path);
    }
    Ok(graph)
}

fn make_publisher(config: &BuildConfig, manifest: &[u8]) -> Box<dyn Publisher> {
    match &config.publisher {
        PublisherConfig::Null => Box::new(NullPublisher::new()),
        PublisherConfig::Zip { path } => Box::new(ZipPublisher::new(path).with_manifest(
            format!("{}.dmanifest", config.archive_name),
            manifest.to_vec(),
        )),
        PublisherConfig::Directory { path } => Box::new(DirectoryPublisher::new(path)),
    }
}
