//! Command line and build configuration.
//!
//! The command line selects a subcommand; `build` reads everything else from
//! a JSON [`BuildConfig`]. Relative paths in the configuration resolve
//! against the directory holding the configuration file.
//!
//! # Example
//!
//! ```json
//! {
//!   "content_root": "build/default",
//!   "roots": ["/main.collectionc"],
//!   "dependencies": {
//!     "/main.collectionc": ["/level1.collectionproxyc"],
//!     "/level1.collectionproxyc": ["/level1.goc"]
//!   },
//!   "excluded": ["/level1.collectionproxyc"],
//!   "output_dir": "dist",
//!   "private_key": "keys/manifest.private.der",
//!   "project_identifier": "my game",
//!   "engine_versions": ["1.9.0"],
//!   "publisher": { "type": "zip", "path": "dist/resources.zip" }
//! }
//! ```

use crate::error::ConfigError;
use clap::{Parser, Subcommand};
use livepack_crypto::{DEFAULT_KEY_BITS, HashAlgorithm, SignAlgorithm};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(
    name = "livepack",
    about = "Build live-update archives, resource packs and signed manifests",
    version
)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse from the process arguments
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }
}

/// Subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the archive, resource pack and manifest from a JSON configuration
    Build {
        /// Build configuration file
        #[arg(long, env = "LIVEPACK_CONFIG")]
        config: PathBuf,

        /// Override the configured output directory
        #[arg(long, env = "LIVEPACK_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Generate a DER encoded RSA key pair for manifest signing
    Keygen {
        /// Private key output (PKCS#8 DER)
        #[arg(long)]
        private: PathBuf,

        /// Public key output (SubjectPublicKeyInfo DER)
        #[arg(long)]
        public: PathBuf,

        /// Modulus size in bits
        #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
        bits: usize,
    },

    /// Verify an archive against its signed manifest
    Verify {
        /// Archive index (.arci)
        #[arg(long)]
        index: PathBuf,

        /// Archive data (.arcd)
        #[arg(long)]
        data: PathBuf,

        /// Signed manifest (.dmanifest)
        #[arg(long)]
        manifest: PathBuf,

        /// Public key matching the signing key
        #[arg(long, env = "LIVEPACK_PUBLIC_KEY")]
        public_key: PathBuf,

        /// Engine version that must be supported by the manifest
        #[arg(long)]
        engine_version: Option<String>,
    },

    /// List archive entries
    Inspect {
        /// Archive index (.arci)
        #[arg(long)]
        index: PathBuf,

        /// Archive data (.arcd)
        #[arg(long)]
        data: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

/// Where resource pack payloads are published after a build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PublisherConfig {
    /// Count and discard
    #[default]
    Null,
    /// One zip file with the manifest added
    Zip {
        /// Zip output path
        path: PathBuf,
    },
    /// Content-addressed store directory
    Directory {
        /// Store directory
        path: PathBuf,
    },
}

fn default_archive_name() -> String {
    "game".to_string()
}

fn default_resource_hash_algorithm() -> HashAlgorithm {
    HashAlgorithm::Sha1
}

fn default_signature_hash_algorithm() -> HashAlgorithm {
    HashAlgorithm::Sha256
}

fn default_project_identifier() -> String {
    "<anonymous project>".to_string()
}

const fn default_resource_padding() -> u32 {
    livepack_formats::archive::DEFAULT_RESOURCE_PADDING
}

const fn default_true() -> bool {
    true
}

/// Build configuration read from JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Directory holding the compiled resources
    pub content_root: PathBuf,

    /// Resource files relative to `content_root`, in add order
    ///
    /// Empty means every file below `content_root`, in path order.
    #[serde(default)]
    pub resources: Vec<String>,

    /// Urls included directly by the root
    ///
    /// Empty means every resource that no other resource includes.
    #[serde(default)]
    pub roots: Vec<String>,

    /// Inclusion edges, parent url to child urls
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,

    /// Urls deferred to live update
    #[serde(default)]
    pub excluded: Vec<String>,

    /// Output directory
    pub output_dir: PathBuf,

    /// Base name of the output files
    #[serde(default = "default_archive_name")]
    pub archive_name: String,

    /// Digest algorithm for archive entries and manifest resources
    #[serde(default = "default_resource_hash_algorithm")]
    pub resource_hash_algorithm: HashAlgorithm,

    /// Digest algorithm for the manifest signature
    #[serde(default = "default_signature_hash_algorithm")]
    pub signature_hash_algorithm: HashAlgorithm,

    /// Signature algorithm
    #[serde(default)]
    pub signature_sign_algorithm: SignAlgorithm,

    /// Private key used to sign the manifest
    pub private_key: PathBuf,

    /// Public key copied next to the manifest
    #[serde(default)]
    pub public_key: Option<PathBuf>,

    /// Project name, stored hashed in the manifest header
    #[serde(default = "default_project_identifier")]
    pub project_identifier: String,

    /// Engine versions allowed to load the manifest
    #[serde(default)]
    pub engine_versions: Vec<String>,

    /// Alignment of payloads in the data file
    #[serde(default = "default_resource_padding")]
    pub resource_padding: u32,

    /// Try compressing payloads
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Also write the single-stream `.darc` archive
    #[serde(default)]
    pub legacy_archive: bool,

    /// Write the manifest data hash to `<name>.manifest_hash`
    #[serde(default)]
    pub write_manifest_hash: bool,

    /// Resource pack publisher
    #[serde(default)]
    pub publisher: PublisherConfig,
}

impl BuildConfig {
    /// Read a configuration file and resolve its relative paths
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            serde_json::from_str(&text).map_err(|source| ConfigError::InvalidJson {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Make every relative path absolute against `base`
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.content_root);
        resolve(&mut self.output_dir);
        resolve(&mut self.private_key);
        if let Some(public_key) = &mut self.public_key {
            resolve(public_key);
        }
        match &mut self.publisher {
            PublisherConfig::Null => {}
            PublisherConfig::Zip { path } | PublisherConfig::Directory { path } => resolve(path),
        }
    }

    /// Check the configuration before any work starts
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the content root or a key file does not exist
    /// - an algorithm is unset or the sign algorithm is not RSA
    /// - the archive name is empty or contains a path separator
    /// - the resource padding is zero
    /// - a url does not start with `/`
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.content_root.is_dir() {
            return Err(ConfigError::NotFound {
                what: "content root",
                path: self.content_root.clone(),
            });
        }
        if !self.private_key.is_file() {
            return Err(ConfigError::NotFound {
                what: "private key",
                path: self.private_key.clone(),
            });
        }
        if let Some(public_key) = &self.public_key
            && !public_key.is_file()
        {
            return Err(ConfigError::NotFound {
                what: "public key",
                path: public_key.clone(),
            });
        }

        if self.archive_name.is_empty() || self.archive_name.contains(['/', '\\']) {
            return Err(ConfigError::InvalidField {
                field: "archive_name",
                reason: format!("'{}' is not a plain file name", self.archive_name),
            });
        }
        if self.resource_padding == 0 {
            return Err(ConfigError::InvalidField {
                field: "resource_padding",
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, algorithm) in [
            ("resource_hash_algorithm", self.resource_hash_algorithm),
            ("signature_hash_algorithm", self.signature_hash_algorithm),
        ] {
            if algorithm == HashAlgorithm::Unknown {
                return Err(ConfigError::InvalidField {
                    field,
                    reason: "algorithm must be set".to_string(),
                });
            }
        }
        if self.signature_sign_algorithm != SignAlgorithm::Rsa {
            return Err(ConfigError::InvalidField {
                field: "signature_sign_algorithm",
                reason: format!("{} is not supported", self.signature_sign_algorithm),
            });
        }

        let urls = self
            .roots
            .iter()
            .chain(&self.excluded)
            .chain(self.dependencies.keys())
            .chain(self.dependencies.values().flatten());
        for url in urls {
            if !url.starts_with('/') {
                return Err(ConfigError::InvalidField {
                    field: "url",
                    reason: format!("'{url}' must start with '/'"),
                });
            }
        }

        Ok(())
    }

    /// Path of an output file named `<archive_name>.<extension>`
    pub fn output_path(&self, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}.{extension}", self.archive_name))
    }

    /// Resource pack directory
    pub fn resource_pack_dir(&self) -> PathBuf {
        self.output_dir.join("resource_pack")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) -> PathBuf {
        std::fs::create_dir_all(dir.join("content")).unwrap();
        std::fs::write(dir.join("private.der"), b"not checked here").unwrap();
        let path = dir.join("livepack.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    const MINIMAL: &str = r#"{
        "content_root": "content",
        "output_dir": "out",
        "private_key": "private.der"
    }"#;

    #[test]
    fn test_defaults_and_relative_paths() {
        let dir = TempDir::new().unwrap();
        let config = BuildConfig::load(&write_config(dir.path(), MINIMAL)).unwrap();

        assert_eq!(config.content_root, dir.path().join("content"));
        assert_eq!(config.archive_name, "game");
        assert_eq!(config.resource_hash_algorithm, HashAlgorithm::Sha1);
        assert_eq!(config.signature_hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.signature_sign_algorithm, SignAlgorithm::Rsa);
        assert_eq!(config.resource_padding, 4);
        assert!(config.compress);
        assert_eq!(config.publisher, PublisherConfig::Null);
        assert_eq!(config.output_path("arci"), dir.path().join("out/game.arci"));
        config.validate().unwrap();
    }

    #[test]
    fn test_publisher_and_algorithms() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "content_root": "content",
            "output_dir": "out",
            "private_key": "private.der",
            "resource_hash_algorithm": "md5",
            "signature_hash_algorithm": "sha512",
            "publisher": { "type": "directory", "path": "store" }
        }"#;
        let config = BuildConfig::load(&write_config(dir.path(), json)).unwrap();

        assert_eq!(config.resource_hash_algorithm, HashAlgorithm::Md5);
        assert_eq!(config.signature_hash_algorithm, HashAlgorithm::Sha512);
        assert_eq!(
            config.publisher,
            PublisherConfig::Directory {
                path: dir.path().join("store")
            }
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let json = r#"{
            "content_root": "content",
            "output_dir": "out",
            "private_key": "private.der",
            "compression": true
        }"#;
        let err = BuildConfig::load(&write_config(dir.path(), json)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }

    #[test]
    fn test_validate_rejects() {
        let dir = TempDir::new().unwrap();
        let base = BuildConfig::load(&write_config(dir.path(), MINIMAL)).unwrap();

        let mut config = base.clone();
        config.content_root = dir.path().join("missing");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotFound {
                what: "content root",
                ..
            })
        ));

        let mut config = base.clone();
        config.excluded = vec!["level1.collectionproxyc".to_string()];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField { field: "url", .. })
        ));

        let mut config = base.clone();
        config.signature_sign_algorithm = SignAlgorithm::Unknown;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.archive_name = "out/game".to_string();
        assert!(config.validate().is_err());

        let mut config = base;
        config.resource_padding = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "livepack",
            "keygen",
            "--private",
            "a.der",
            "--public",
            "b.der",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Keygen { bits, .. } if bits == DEFAULT_KEY_BITS
        ));

        let cli = Cli::try_parse_from([
            "livepack",
            "verify",
            "--index",
            "game.arci",
            "--data",
            "game.arcd",
            "--manifest",
            "game.dmanifest",
            "--public-key",
            "game.public.der",
            "--engine-version",
            "1.9.0",
        ])
        .unwrap();
        let Command::Verify { engine_version, .. } = cli.command else {
            unreachable!("parsed verify");
        };
        assert_eq!(engine_version.as_deref(), Some("1.9.0"));
    }
}
