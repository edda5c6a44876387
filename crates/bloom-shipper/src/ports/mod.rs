//! Ports Layer
//!
//! Defines the interfaces (traits) for:
//! - Driving Ports (inbound) - API for external callers
//! - Driven Ports (outbound) - Manifest store, downloader, block store, limits

pub mod inbound;
pub mod outbound;

pub use inbound::BloomShipperApi;
pub use outbound::{
    BlockDownloader, BlockQuerier, BlockStore, BlockWithQuerier, DownloadStreams, Limits,
    MetaClient,
};
