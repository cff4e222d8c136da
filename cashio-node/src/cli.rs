//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use cashio_core::types::{DEFAULT_MAX_BLOB_SIZE, DEFAULT_SHARD_COUNT};
use cashio_storage::tree::{DEFAULT_TREE_DEPTH, MAX_TREE_DEPTH, MIN_TREE_DEPTH};

/// Cash.io commitment indexer and artifact store.
#[derive(Parser, Debug, Clone)]
#[command(name = "cashio-node")]
#[command(about = "Cash.io commitment indexer and artifact store")]
#[command(version)]
pub struct Cli {
    /// Data directory for the commitment tree and blob store.
    #[arg(long, default_value = "~/.cashio")]
    pub data_dir: PathBuf,

    /// Commitment tree depth. Cannot change once data exists.
    #[arg(
        long,
        default_value_t = DEFAULT_TREE_DEPTH,
        value_parser = clap::value_parser!(u8).range(MIN_TREE_DEPTH as i64..=MAX_TREE_DEPTH as i64)
    )]
    pub tree_depth: u8,

    /// Shards per stored blob.
    #[arg(long, default_value_t = DEFAULT_SHARD_COUNT, value_parser = clap::value_parser!(u32).range(1..))]
    pub shard_count: u32,

    /// Largest accepted blob, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_BLOB_SIZE)]
    pub max_blob_size: usize,

    /// Secret the blob encryption key is derived from.
    #[arg(long, env = "CASHIO_BLOB_SECRET", hide_env_values = true)]
    pub blob_secret: Option<String>,

    /// Use a random per-process blob key. Encrypted blobs are lost on restart.
    #[arg(long, conflicts_with = "blob_secret")]
    pub ephemeral: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Expand the data directory path (handle ~ for home).
    pub fn expanded_data_dir(&self) -> PathBuf {
        let path_str = self.data_dir.to_string_lossy();
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        }
        self.data_dir.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let cli = Cli::parse_from(["cashio-node", "--ephemeral"]);
        assert_eq!(cli.tree_depth, 20);
        assert_eq!(cli.shard_count, 16);
        assert_eq!(cli.max_blob_size, 64 * 1024 * 1024);
        assert!(cli.ephemeral);
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_depth_range() {
        assert!(Cli::try_parse_from(["cashio-node", "--tree-depth", "0"]).is_err());
        assert!(Cli::try_parse_from(["cashio-node", "--tree-depth", "33"]).is_err());
        let cli = Cli::try_parse_from(["cashio-node", "--tree-depth", "32"]).unwrap();
        assert_eq!(cli.tree_depth, 32);
    }

    #[test]
    fn test_secret_conflicts_with_ephemeral() {
        let result = Cli::try_parse_from(["cashio-node", "--blob-secret", "s", "--ephemeral"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tilde_expansion() {
        let cli = Cli::parse_from(["cashio-node", "--data-dir", "/var/lib/cashio"]);
        assert_eq!(cli.expanded_data_dir(), PathBuf::from("/var/lib/cashio"));

        let cli = Cli::parse_from(["cashio-node"]);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(cli.expanded_data_dir(), home.join(".cashio"));
        }
    }
}
