//! Node configuration.

use std::fmt;
use std::path::PathBuf;

use anyhow::{bail, Context};

use cashio_core::{BlobCipher, ShardConfig};
use cashio_storage::TreeConfig;

use crate::cli::Cli;

/// Where the blob encryption key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Derived from an operator secret; stable across restarts.
    Secret(String),
    /// Random per process; for tests and throwaway deployments only.
    Ephemeral,
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Secret(_) => f.write_str("Secret(<redacted>)"),
            KeySource::Ephemeral => f.write_str("Ephemeral"),
        }
    }
}

impl KeySource {
    /// Build the cipher for this key source.
    pub fn cipher(&self) -> anyhow::Result<BlobCipher> {
        match self {
            KeySource::Secret(secret) => {
                BlobCipher::from_secret(secret.as_bytes()).context("deriving blob key")
            }
            KeySource::Ephemeral => Ok(BlobCipher::ephemeral()),
        }
    }
}

/// Complete node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Data directory for the RocksDB database.
    pub data_dir: PathBuf,

    /// Commitment tree settings.
    pub tree: TreeConfig,

    /// Blob sharding settings.
    pub shards: ShardConfig,

    /// Blob key source.
    pub key: KeySource,

    /// Log level.
    pub log_level: String,
}

impl NodeConfig {
    /// Create a node configuration from CLI arguments.
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        let key = match (&cli.blob_secret, cli.ephemeral) {
            (Some(secret), _) if !secret.is_empty() => KeySource::Secret(secret.clone()),
            (_, true) => KeySource::Ephemeral,
            _ => bail!("no blob key: set --blob-secret or CASHIO_BLOB_SECRET, or pass --ephemeral"),
        };

        Ok(Self {
            data_dir: cli.expanded_data_dir(),
            tree: TreeConfig::with_depth(cli.tree_depth),
            shards: ShardConfig {
                shard_count: cli.shard_count,
                max_blob_size: cli.max_blob_size,
                ..ShardConfig::default()
            },
            key,
            log_level: cli.log_level.clone(),
        })
    }

    /// Path of the RocksDB database.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("cashio.db")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.cashio"),
            tree: TreeConfig::default(),
            shards: ShardConfig::default(),
            key: KeySource::Ephemeral,
            log_level: "info".to_string(),
        }
    }
}
