//! Pushes the valid-token list to the primary proxy in the background.
//!
//! Token changes only enqueue a job. A single worker drains the queue, and
//! since every job snapshots the full token list when it runs, one pending
//! job covers any number of changes made before it starts.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

use super::proxy::ProxyClient;
use crate::manager::UserManager;

/// Sending half of the replication queue
#[derive(Debug, Clone)]
pub struct ReplicationQueue {
    jobs: mpsc::Sender<()>,
}

impl ReplicationQueue {
    /// Create the queue. The receiver goes to [`start_replication_worker`].
    pub fn channel() -> (Self, mpsc::Receiver<()>) {
        let (jobs, rx) = mpsc::channel(1);
        (Self { jobs }, rx)
    }

    /// Request a push. Never blocks.
    pub fn schedule(&self) {
        match self.jobs.try_send(()) {
            Ok(()) => trace!("Replication job queued"),
            Err(TrySendError::Full(())) => trace!("Replication job already pending"),
            Err(TrySendError::Closed(())) => debug!("Replication worker is not running"),
        }
    }
}

/// Result of a single replication run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationOutcome {
    /// No primary is known
    Skipped,
    Delivered { primary: String, version: i64 },
    /// Every reachable primary refused the list; the next change retries
    Abandoned,
}

/// Start the background replication worker
pub fn start_replication_worker(
    manager: Arc<UserManager>,
    proxy: Arc<ProxyClient>,
    mut jobs: mpsc::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while jobs.recv().await.is_some() {
            replicate_once(&manager, &proxy).await;
        }
        debug!("Replication queue closed");
    })
}

/// Save the token list locally and push it to the primary, following the
/// primary if it moved.
pub async fn replicate_once(manager: &UserManager, proxy: &ProxyClient) -> ReplicationOutcome {
    let mut primary = proxy.primary_url().await;
    if primary.is_empty() {
        warn!("No primary proxy known, skipping token replication");
        return ReplicationOutcome::Skipped;
    }

    let list = manager.token_list();
    if let Err(e) = manager.save_tokens() {
        error!(error = %e, "Failed to save tokens before replication");
    }

    let mut tried = Vec::new();
    loop {
        let err = match proxy.send_tokens(&primary, &list).await {
            Ok(()) => {
                debug!(
                    primary = %primary,
                    version = list.version,
                    tokens = list.tokens.len(),
                    "Token list delivered"
                );
                return ReplicationOutcome::Delivered {
                    primary,
                    version: list.version,
                };
            }
            Err(e) => e,
        };

        warn!(primary = %primary, error = %err, "Failed to push tokens to primary proxy");
        tried.push(primary);

        match proxy.detect_primary().await {
            Ok(next) if tried.contains(&next) => {
                warn!(primary = %next, "Rediscovered primary already refused the token list");
                return ReplicationOutcome::Abandoned;
            }
            Ok(next) => {
                proxy.persist().await;
                primary = next;
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Failed to rediscover primary proxy, tokens will be pushed on the next change"
                );
                return ReplicationOutcome::Abandoned;
            }
        }
    }
}
