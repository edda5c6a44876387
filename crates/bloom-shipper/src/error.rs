//! Error types for the bloom shipper

use thiserror::Error;

/// Errors returned through the public shipper contract
///
/// Every variant keeps its underlying cause available via `source()`.
#[derive(Debug, Error)]
pub enum ShipperError {
    #[error("error creating block downloader: {0}")]
    DownloaderInit(#[source] DownloadError),

    #[error("error fetching active block references: {0}")]
    MetaFetch(#[source] StoreError),

    #[error("error starting block download: {0}")]
    DownloadSetup(#[source] DownloadError),

    #[error("failed to fetch blocks: operation cancelled")]
    Cancelled,

    #[error("failed to fetch blocks: {0}")]
    Download(#[source] DownloadError),

    #[error("failed to fetch blocks: result stream closed with {remaining} blocks outstanding")]
    StreamClosed { remaining: usize },

    #[error("error running callback function for block {block_path}: {source}")]
    Callback {
        block_path: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid shipper configuration: {0}")]
    InvalidConfig(String),
}

/// Errors from the manifest store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Invalid meta: {0}")]
    InvalidMeta(String),

    #[error("Meta client is stopped")]
    Stopped,
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::InvalidMeta(err.to_string())
    }
}

/// Errors from the block downloader and block store
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("Block not found: {block_path}")]
    BlockNotFound { block_path: String },

    #[error("Failed to download block {block_path}: {reason}")]
    Failed { block_path: String, reason: String },

    #[error("Too many blocks enqueued for tenant {tenant_id}: {requested} > {max}")]
    QueueFull {
        tenant_id: String,
        requested: usize,
        max: usize,
    },

    #[error("Block downloader is stopped")]
    Stopped,

    #[error("Invalid downloader configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to close block {block_path}: {reason}")]
    Close { block_path: String, reason: String },

    #[error("No async runtime available: {0}")]
    Runtime(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_download_error_is_preserved_as_source() {
        let err = ShipperError::Download(DownloadError::BlockNotFound {
            block_path: "blocks/a".to_string(),
        });
        let source = err.source().expect("source");
        assert_eq!(source.to_string(), "Block not found: blocks/a");
        assert!(err.to_string().starts_with("failed to fetch blocks"));
    }

    #[test]
    fn test_callback_error_names_block() {
        let err = ShipperError::Callback {
            block_path: "blocks/b".to_string(),
            source: anyhow::anyhow!("query failed"),
        };
        assert_eq!(
            err.to_string(),
            "error running callback function for block blocks/b: query failed"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_serde_error_maps_to_invalid_meta() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(StoreError::from(parse), StoreError::InvalidMeta(_)));
    }
}
