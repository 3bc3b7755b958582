//! Manifest builder

use crate::archive::{ResourceRecord, UNCOMPRESSED_SIZE};
use crate::graph::{Inclusion, ResourceGraph, ResourceKind};
use crate::manifest::data::ManifestData;
use crate::manifest::entry::{ResourceEntry, ResourceFlags};
use crate::manifest::error::{ManifestError, ManifestResult};
use crate::manifest::file::ManifestFile;
use crate::manifest::header::ManifestHeader;
use crate::manifest::{MANIFEST_VERSION, strip_quotes};
use livepack_crypto::{CryptoError, HashAlgorithm, RsaPrivateKey, SignAlgorithm, hash, sign};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

/// Collects resources and produces a signed manifest
///
/// The builder borrows the resource graph for the dependency queries that
/// fill `dependents_count` and the dependants of excluded proxies.
#[derive(Debug)]
pub struct ManifestBuilder<'a> {
    graph: &'a ResourceGraph,
    resource_hash_algorithm: HashAlgorithm,
    signature_hash_algorithm: HashAlgorithm,
    signature_sign_algorithm: SignAlgorithm,
    project_identifier: Option<String>,
    archive_identifier: [u8; 16],
    engine_versions: Vec<Vec<u8>>,
    resources: Vec<ResourceEntry>,
    positions: HashMap<String, usize>,
    excluded: HashSet<String>,
}

impl<'a> ManifestBuilder<'a> {
    /// Create a builder over `graph` with SHA1 digests and RSA signatures
    pub fn new(graph: &'a ResourceGraph) -> Self {
        Self {
            graph,
            resource_hash_algorithm: HashAlgorithm::Sha1,
            signature_hash_algorithm: HashAlgorithm::Sha1,
            signature_sign_algorithm: SignAlgorithm::Rsa,
            project_identifier: None,
            archive_identifier: [0; 16],
            engine_versions: Vec::new(),
            resources: Vec::new(),
            positions: HashMap::new(),
            excluded: HashSet::new(),
        }
    }

    /// Algorithm of the resource digests
    pub fn with_resource_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.resource_hash_algorithm = algorithm;
        self
    }

    /// Algorithm used to hash the data before signing
    pub fn with_signature_hash_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.signature_hash_algorithm = algorithm;
        self
    }

    /// Signing algorithm
    pub fn with_signature_sign_algorithm(mut self, algorithm: SignAlgorithm) -> Self {
        self.signature_sign_algorithm = algorithm;
        self
    }

    /// Project identifier, stored as its SHA1
    pub fn with_project_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.project_identifier = Some(identifier.into());
        self
    }

    /// Identifier of the archive index the manifest describes
    pub fn with_archive_identifier(mut self, identifier: [u8; 16]) -> Self {
        self.archive_identifier = identifier;
        self
    }

    /// Urls deferred to live update
    pub fn with_excluded<I, S>(mut self, excluded: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(excluded.into_iter().map(Into::into));
        self
    }

    /// Resource digest algorithm
    pub fn resource_hash_algorithm(&self) -> HashAlgorithm {
        self.resource_hash_algorithm
    }

    /// Signature hash algorithm
    pub fn signature_hash_algorithm(&self) -> HashAlgorithm {
        self.signature_hash_algorithm
    }

    /// Allow an engine version to load this content
    ///
    /// Surrounding double quotes are stripped before hashing.
    pub fn add_supported_engine_version(&mut self, version: &str) -> ManifestResult<()> {
        let digest = hash(strip_quotes(version).as_bytes(), HashAlgorithm::Sha1)?;
        if !self.engine_versions.contains(&digest) {
            self.engine_versions.push(digest);
        }
        Ok(())
    }

    /// Add one resource
    pub fn add_resource_entry(
        &mut self,
        url: &str,
        digest: Vec<u8>,
        flags: ResourceFlags,
        size: u32,
        compressed_size: u32,
    ) -> ManifestResult<()> {
        if self.positions.contains_key(url) {
            return Err(ManifestError::DuplicateResource(url.to_string()));
        }
        self.positions.insert(url.to_string(), self.resources.len());
        self.resources.push(ResourceEntry {
            url: url.to_string(),
            digest,
            flags,
            size,
            compressed_size,
            dependents_count: 0,
            dependants: Vec::new(),
        });
        Ok(())
    }

    /// Add every per-url record of a finalized archive
    pub fn add_archive_records(&mut self, records: &[ResourceRecord]) -> ManifestResult<()> {
        for record in records {
            let mut flags = match record.inclusion {
                Inclusion::Bundled => ResourceFlags::BUNDLED,
                Inclusion::Excluded | Inclusion::Dropped => ResourceFlags::EXCLUDED,
            };
            let compressed_size = if record.compressed {
                flags.insert(ResourceFlags::COMPRESSED);
                record.stored_size
            } else {
                UNCOMPRESSED_SIZE
            };
            self.add_resource_entry(
                &record.url,
                record.digest.clone(),
                flags,
                record.raw_size,
                compressed_size,
            )?;
        }
        Ok(())
    }

    /// Number of resources added
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Whether no resources were added
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Proxy chains above `url`, one per path from the root
    pub fn parent_proxy_chains(&self, url: &str) -> Vec<Vec<String>> {
        self.graph.parent_proxy_chains(url)
    }

    /// Resources needed to load `url`, stopping at nested proxies
    pub fn dependants(&self, url: &str) -> Vec<String> {
        self.graph.dependants(url)
    }

    /// Number of distinct resources that directly include `url`, the root excluded
    pub fn dependents_count(&self, url: &str) -> usize {
        self.graph.dependents_count(url)
    }

    /// Build the manifest header
    pub fn build_header(&self) -> ManifestResult<ManifestHeader> {
        let identifier = self
            .project_identifier
            .as_deref()
            .ok_or(ManifestError::MissingProjectIdentifier)?;
        Ok(ManifestHeader {
            resource_hash_algorithm: self.resource_hash_algorithm,
            signature_hash_algorithm: self.signature_hash_algorithm,
            signature_sign_algorithm: self.signature_sign_algorithm,
            project_identifier: hash(identifier.as_bytes(), HashAlgorithm::Sha1)?,
        })
    }

    /// Build the data section
    pub fn build_data(&self) -> ManifestResult<ManifestData> {
        let header = self.build_header()?;
        let expected = self.resource_hash_algorithm.digest_len();

        let mut resources = Vec::with_capacity(self.resources.len());
        for entry in &self.resources {
            if entry.digest.len() != expected {
                return Err(ManifestError::DigestLength {
                    url: entry.url.clone(),
                    expected,
                    actual: entry.digest.len(),
                });
            }

            let mut entry = entry.clone();
            entry.dependents_count = self.graph.dependents_count(&entry.url) as u32;
            if ResourceKind::from_url(&entry.url).is_proxy() && self.excluded.contains(&entry.url)
            {
                entry.dependants = self
                    .graph
                    .dependants(&entry.url)
                    .iter()
                    .filter_map(|url| self.positions.get(url))
                    .map(|&i| i as u32)
                    .collect();
                debug!(
                    "{} needs {} resources when loaded",
                    entry.url,
                    entry.dependants.len()
                );
            }
            resources.push(entry);
        }

        Ok(ManifestData {
            header,
            engine_versions: self.engine_versions.clone(),
            resources,
        })
    }

    /// Build and sign the manifest file
    pub fn build_file(&self, private_key: &RsaPrivateKey) -> ManifestResult<ManifestFile> {
        if self.signature_sign_algorithm != SignAlgorithm::Rsa {
            return Err(CryptoError::UnsupportedAlgorithm(
                self.signature_sign_algorithm.to_string(),
            )
            .into());
        }

        let data = self.build_data()?.build()?;
        let signature = sign(&data, private_key, self.signature_hash_algorithm)?;
        info!(
            "Built manifest: {} resources, {} engine versions, {} data bytes",
            self.resources.len(),
            self.engine_versions.len(),
            data.len()
        );

        Ok(ManifestFile {
            version: MANIFEST_VERSION,
            archive_identifier: self.archive_identifier,
            data,
            signature,
        })
    }

    /// Build, sign and serialize the manifest
    pub fn build(&self, private_key: &RsaPrivateKey) -> ManifestResult<Vec<u8>> {
        self.build_file(private_key)?.build()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::LiveFormat;
    use livepack_crypto::{RsaPublicKey, generate_key_pair};
    use pretty_assertions::assert_eq;
    use std::sync::OnceLock;

    fn keys() -> &'static (RsaPrivateKey, RsaPublicKey) {
        static KEYS: OnceLock<(RsaPrivateKey, RsaPublicKey)> = OnceLock::new();
        KEYS.get_or_init(|| generate_key_pair(512).expect("keygen"))
    }

    fn graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph.add_child(None, "/main.collectionc").unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/level1.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level1.goc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/level2.collectionproxyc")
            .unwrap();
        graph
            .add_child(Some("/level2.collectionproxyc"), "/level2.goc")
            .unwrap();
        graph
            .add_child(Some("/main.collectionc"), "/shared.goc")
            .unwrap();
        graph
            .add_child(Some("/level1.collectionproxyc"), "/shared.goc")
            .unwrap();
        graph
    }

    fn digest(url: &str) -> Vec<u8> {
        hash(url.as_bytes(), HashAlgorithm::Sha1).unwrap()
    }

    fn builder(graph: &ResourceGraph) -> ManifestBuilder<'_> {
        let mut builder = ManifestBuilder::new(graph)
            .with_project_identifier("Defold test")
            .with_archive_identifier([7; 16])
            .with_excluded(["/level1.collectionproxyc"]);
        for url in [
            "/main.collectionc",
            "/level1.collectionproxyc",
            "/level1.goc",
            "/level2.collectionproxyc",
            "/level2.goc",
            "/shared.goc",
        ] {
            builder
                .add_resource_entry(url, digest(url), ResourceFlags::BUNDLED, 10, UNCOMPRESSED_SIZE)
                .unwrap();
        }
        for version in ["alpha", "\"beta\"", "gamma", "delta", "alpha"] {
            builder.add_supported_engine_version(version).unwrap();
        }
        builder
    }

    #[test]
    fn test_header_hashes_project_identifier() {
        let graph = graph();
        let header = builder(&graph).build_header().expect("header");
        assert_eq!(header.project_identifier, digest("Defold test"));
        assert_eq!(header.resource_hash_algorithm, HashAlgorithm::Sha1);
        assert_eq!(header.signature_sign_algorithm, SignAlgorithm::Rsa);
    }

    #[test]
    fn test_missing_project_identifier() {
        let graph = graph();
        let builder = ManifestBuilder::new(&graph);
        assert!(matches!(
            builder.build_header().unwrap_err(),
            ManifestError::MissingProjectIdentifier
        ));
    }

    #[test]
    fn test_data_dependency_fields() {
        let graph = graph();
        let data = builder(&graph).build_data().expect("data");

        assert_eq!(data.engine_versions.len(), 4);
        assert!(data.supports_engine_version("beta").unwrap());

        let urls: Vec<&str> = data.resources.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls[0], "/main.collectionc");
        assert_eq!(data.find_url("/shared.goc").unwrap().dependents_count, 2);
        assert_eq!(data.find_url("/main.collectionc").unwrap().dependents_count, 0);

        // Only the excluded proxy records what it needs
        assert_eq!(
            data.dependant_urls("/level1.collectionproxyc"),
            vec!["/level1.goc", "/level2.collectionproxyc", "/shared.goc"]
        );
        assert!(data.find_url("/level2.collectionproxyc").unwrap().dependants.is_empty());
        assert!(data.find_url("/main.collectionc").unwrap().dependants.is_empty());
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let graph = graph();
        let mut builder = builder(&graph);
        let err = builder
            .add_resource_entry(
                "/level1.goc",
                digest("/level1.goc"),
                ResourceFlags::BUNDLED,
                1,
                UNCOMPRESSED_SIZE,
            )
            .unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateResource(_)));
    }

    #[test]
    fn test_digest_length_checked() {
        let graph = graph();
        let builder = builder(&graph).with_resource_hash_algorithm(HashAlgorithm::Sha256);
        assert!(matches!(
            builder.build_data().unwrap_err(),
            ManifestError::DigestLength {
                expected: 32,
                actual: 20,
                ..
            }
        ));
    }

    #[test]
    fn test_signed_file_verifies() {
        let graph = graph();
        let (private, public) = keys();
        let bytes = builder(&graph).build(private).expect("manifest");

        let file = ManifestFile::parse(&bytes).expect("parse");
        assert_eq!(file.version, MANIFEST_VERSION);
        assert_eq!(file.signature.len(), 64);
        let data = file.verify(public).expect("verify");
        assert_eq!(data.resources.len(), 6);

        file.verify_engine_version("gamma").expect("listed");
        file.verify_engine_version("\"delta\"").expect("quotes stripped");
        assert!(matches!(
            file.verify_engine_version("omega").unwrap_err(),
            ManifestError::EngineVersionNotSupported(_)
        ));
        file.verify_archive_identifier(&[7; 16]).expect("identifier");
        let err = file.verify_archive_identifier(&[8; 16]).unwrap_err();
        assert!(err.is_integrity_error());

        <ManifestFile as LiveFormat>::verify_round_trip(&bytes).expect("round trip");
        <ManifestData as LiveFormat>::verify_round_trip(&file.data).expect("round trip");
    }

    #[test]
    fn test_tampered_data_rejected() {
        let graph = graph();
        let (private, public) = keys();
        let mut file = builder(&graph).build_file(private).expect("manifest");

        let mut data = file.manifest_data().expect("data");
        data.resources[0].size += 1;
        file.data = data.build().expect("data");

        let err = file.verify(public).unwrap_err();
        assert!(matches!(err, ManifestError::SignatureMismatch));
        assert!(err.is_integrity_error());
    }

    #[test]
    fn test_data_hash_uses_signature_algorithm() {
        let graph = graph();
        let (private, _) = keys();
        let file = builder(&graph)
            .with_signature_hash_algorithm(HashAlgorithm::Sha256)
            .build_file(private)
            .expect("manifest");
        assert_eq!(
            file.data_hash().expect("hash"),
            hash(&file.data, HashAlgorithm::Sha256).unwrap()
        );
    }

    #[test]
    fn test_archive_records_flags() {
        let graph = graph();
        let mut builder = ManifestBuilder::new(&graph).with_project_identifier("p");
        builder
            .add_archive_records(&[
                ResourceRecord {
                    url: "/main.collectionc".to_string(),
                    digest: digest("a"),
                    inclusion: Inclusion::Bundled,
                    compressed: true,
                    raw_size: 100,
                    stored_size: 30,
                },
                ResourceRecord {
                    url: "/level2.goc".to_string(),
                    digest: digest("b"),
                    inclusion: Inclusion::Dropped,
                    compressed: false,
                    raw_size: 5,
                    stored_size: 5,
                },
            ])
            .expect("records");
        let data = builder.build_data().expect("data");

        let main = data.find_url("/main.collectionc").unwrap();
        assert_eq!(main.flags, ResourceFlags::BUNDLED | ResourceFlags::COMPRESSED);
        assert_eq!((main.size, main.compressed_size), (100, 30));

        let dropped = data.find_url("/level2.goc").unwrap();
        assert_eq!(dropped.flags, ResourceFlags::EXCLUDED);
        assert_eq!(dropped.compressed_size, UNCOMPRESSED_SIZE);
    }
}
