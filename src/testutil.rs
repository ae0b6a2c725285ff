//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cluster::{ClusterApi, ClusterError, ClusterSnapshot, ProxyClient, ReplicationQueue};
use crate::config::{ClusterConfig, Config, NodeConfig, TokenConfig};
use crate::manager::UserManager;
use crate::storage::models::TokenList;
use crate::storage::MemoryStore;
use crate::AppState;

/// Token settings with a fixed secret and the default lifetime.
pub fn test_token_config() -> TokenConfig {
    TokenConfig {
        secret: "unit-test-signing-secret".to_string(),
        ..TokenConfig::default()
    }
}

/// A minimal `Config` suitable for unit tests (no primary configured).
pub fn test_config() -> Config {
    Config {
        cluster: ClusterConfig::default(),
        node: NodeConfig {
            bind_address: "127.0.0.1:52001".to_string(),
            data_dir: "/tmp/test".to_string(),
        },
        tokens: test_token_config(),
    }
}

/// Build a full `Arc<AppState>` on in-memory storage and a [`FakeCluster`].
///
/// The replication receiver is returned so jobs do not hit a closed queue.
pub fn test_state() -> (Arc<AppState>, tokio::sync::mpsc::Receiver<()>) {
    let config = test_config();
    let storage = Arc::new(MemoryStore::new());
    let (queue, jobs) = ReplicationQueue::channel();
    let manager = UserManager::open(storage.clone(), &config.tokens, queue).unwrap();
    let proxy = ProxyClient::new(Arc::new(FakeCluster::new()), storage);

    let state = Arc::new(AppState {
        config,
        manager: Arc::new(manager),
        proxy: Arc::new(proxy),
    });
    (state, jobs)
}

/// In-process stand-in for the rest of the cluster.
///
/// Members without a registered cluster map are unreachable. Every call is
/// recorded so tests can assert on probe and push order.
#[derive(Default)]
pub struct FakeCluster {
    failing_primaries: Mutex<HashSet<String>>,
    maps: Mutex<HashMap<String, ClusterSnapshot>>,
    probes: Mutex<Vec<String>>,
    pushes: Mutex<Vec<(String, TokenList)>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_map(&self, member_url: &str, smap: ClusterSnapshot) {
        self.maps.lock().insert(member_url.to_string(), smap);
    }

    pub fn fail_pushes_to(&self, primary_url: &str) {
        self.failing_primaries.lock().insert(primary_url.to_string());
    }

    pub fn probes(&self) -> Vec<String> {
        self.probes.lock().clone()
    }

    /// Every push attempt, failed ones included
    pub fn pushes(&self) -> Vec<(String, TokenList)> {
        self.pushes.lock().clone()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn cluster_map(&self, member_url: &str) -> Result<ClusterSnapshot, ClusterError> {
        self.probes.lock().push(member_url.to_string());
        self.maps
            .lock()
            .get(member_url)
            .cloned()
            .ok_or_else(|| ClusterError::Status {
                status: 503,
                url: member_url.to_string(),
            })
    }

    async fn push_tokens(&self, primary_url: &str, tokens: &TokenList) -> Result<(), ClusterError> {
        self.pushes
            .lock()
            .push((primary_url.to_string(), tokens.clone()));
        if self.failing_primaries.lock().contains(primary_url) {
            return Err(ClusterError::Status {
                status: 500,
                url: primary_url.to_string(),
            });
        }
        Ok(())
    }
}
