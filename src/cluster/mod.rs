//! Keeping the cluster's primary proxy informed of the valid tokens.

mod client;
mod proxy;
mod replication;
mod smap;

pub use client::{ClusterApi, HttpClusterApi};
pub use proxy::{ProxyClient, ProxyState};
pub use replication::{
    replicate_once, start_replication_worker, ReplicationOutcome, ReplicationQueue,
};
pub use smap::{ClusterSnapshot, Member};

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Cluster map is empty")]
    EmptyClusterMap,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No primary proxy is known")]
    NoPrimary,
    #[error("Detecting primary proxy failed")]
    PrimaryDetectionFailed,
    #[error("{url} responded with status {status}")]
    Status { status: u16, url: String },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}
