use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::client::ClusterApi;
use super::smap::ClusterSnapshot;
use super::ClusterError;
use crate::storage::models::TokenList;
use crate::storage::{load_json, save_json, KvStore, PROXY_KEY};

/// What this node knows about the primary proxy, as saved in `proxy.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyState {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub smap: Option<ClusterSnapshot>,
}

/// Tracks the primary proxy and finds it again when it moves.
///
/// The state lock is never held while talking to the network.
pub struct ProxyClient {
    api: Arc<dyn ClusterApi>,
    save_lock: Mutex<()>,
    state: RwLock<ProxyState>,
    storage: Arc<dyn KvStore>,
}

impl ProxyClient {
    pub fn new(api: Arc<dyn ClusterApi>, storage: Arc<dyn KvStore>) -> Self {
        Self {
            api,
            save_lock: Mutex::new(()),
            state: RwLock::new(ProxyState::default()),
            storage,
        }
    }

    /// Restore the saved state and check that the saved primary is still
    /// the primary. Falls back to `default_url` when nothing usable was saved.
    pub async fn init(&self, default_url: &str) {
        let loaded: Option<ProxyState> = match load_json(self.storage.as_ref(), PROXY_KEY) {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "Failed to load saved cluster state");
                None
            }
        };

        if let Some(loaded) = loaded {
            *self.state.write().await = loaded;
            match self.detect_primary().await {
                Ok(_) => self.persist().await,
                Err(e) => debug!(error = %e, "Keeping saved primary proxy"),
            }
        }

        let mut state = self.state.write().await;
        if state.url.is_empty() {
            state.url = default_url.to_string();
        }
        info!(primary = %state.url, "Cluster sync initialized");
    }

    pub async fn primary_url(&self) -> String {
        self.state.read().await.url.clone()
    }

    pub async fn snapshot(&self) -> ProxyState {
        self.state.read().await.clone()
    }

    /// Probe the known members for the current primary.
    ///
    /// Proxies are asked before storage nodes and the current primary is
    /// skipped. The first member naming a different, non-empty primary wins
    /// and its cluster map replaces ours.
    pub async fn detect_primary(&self) -> Result<String, ClusterError> {
        let (current, smap) = {
            let state = self.state.read().await;
            (state.url.clone(), state.smap.clone())
        };
        let smap = smap
            .filter(|smap| !smap.is_empty())
            .ok_or(ClusterError::EmptyClusterMap)?;

        for member in smap.members() {
            if member.url.is_empty() || member.url == current {
                continue;
            }

            let fresh = match self.api.cluster_map(&member.url).await {
                Ok(fresh) => fresh,
                Err(e) => {
                    warn!(
                        member = %member.id,
                        url = %member.url,
                        error = %e,
                        "Failed to fetch cluster map"
                    );
                    continue;
                }
            };
            if fresh.primary_url.is_empty() || fresh.primary_url == current {
                debug!(member = %member.id, "Member reports no new primary");
                continue;
            }

            let primary = fresh.primary_url.clone();
            {
                let mut state = self.state.write().await;
                state.url = primary.clone();
                state.smap = Some(fresh);
            }
            info!(old = %current, new = %primary, source = %member.id, "Primary proxy changed");
            return Ok(primary);
        }

        Err(ClusterError::PrimaryDetectionFailed)
    }

    /// Save the current state. Failures are logged.
    pub async fn persist(&self) {
        if let Err(e) = self.save().await {
            error!(error = %e, "Failed to save cluster state");
        }
    }

    async fn save(&self) -> Result<(), ClusterError> {
        let _guard = self.save_lock.lock().await;
        let state = self.snapshot().await;
        save_json(self.storage.as_ref(), PROXY_KEY, &state)?;
        Ok(())
    }

    /// Send the token list to `primary_url`
    pub async fn send_tokens(
        &self,
        primary_url: &str,
        tokens: &TokenList,
    ) -> Result<(), ClusterError> {
        if primary_url.is_empty() {
            return Err(ClusterError::NoPrimary);
        }
        self.api.push_tokens(primary_url, tokens).await
    }

    #[cfg(test)]
    pub(crate) async fn set_state(&self, state: ProxyState) {
        *self.state.write().await = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::smap::Member;
    use crate::storage::MemoryStore;
    use crate::testutil::FakeCluster;

    fn member(id: &str) -> Member {
        Member {
            id: id.to_string(),
            url: format!("http://{id}"),
        }
    }

    fn smap(primary: &str) -> ClusterSnapshot {
        ClusterSnapshot {
            primary_url: format!("http://{primary}"),
            proxies: vec![member("p1"), member("p2")],
            storage_nodes: vec![member("t1")],
        }
    }

    fn client(cluster: &Arc<FakeCluster>) -> (ProxyClient, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let client = ProxyClient::new(cluster.clone(), storage.clone());
        (client, storage)
    }

    #[tokio::test]
    async fn test_detect_primary_with_empty_map() {
        let cluster = Arc::new(FakeCluster::new());
        let (client, _storage) = client(&cluster);

        assert!(matches!(
            client.detect_primary().await,
            Err(ClusterError::EmptyClusterMap)
        ));
        assert!(cluster.probes().is_empty());
    }

    #[tokio::test]
    async fn test_detect_primary_skips_current_and_failing_members() {
        let cluster = Arc::new(FakeCluster::new());
        // p2 is down, t1 knows about the new primary
        cluster.set_map("http://t1", smap("p2"));
        let (client, _storage) = client(&cluster);
        client
            .set_state(ProxyState {
                url: "http://p1".to_string(),
                smap: Some(smap("p1")),
            })
            .await;

        let primary = client.detect_primary().await.unwrap();
        assert_eq!(primary, "http://p2");
        assert_eq!(cluster.probes(), vec!["http://p2", "http://t1"]);
        assert_eq!(client.primary_url().await, "http://p2");
        assert_eq!(client.snapshot().await.smap, Some(smap("p2")));
    }

    #[tokio::test]
    async fn test_detect_primary_fails_when_nobody_knows_better() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.set_map("http://p2", smap("p1"));
        cluster.set_map("http://t1", ClusterSnapshot::default());
        let (client, _storage) = client(&cluster);
        client
            .set_state(ProxyState {
                url: "http://p1".to_string(),
                smap: Some(smap("p1")),
            })
            .await;

        assert!(matches!(
            client.detect_primary().await,
            Err(ClusterError::PrimaryDetectionFailed)
        ));
        assert_eq!(client.primary_url().await, "http://p1");
    }

    #[tokio::test]
    async fn test_init_without_saved_state_uses_default() {
        let cluster = Arc::new(FakeCluster::new());
        let (client, storage) = client(&cluster);

        client.init("http://default").await;
        assert_eq!(client.primary_url().await, "http://default");
        assert!(!storage.contains(PROXY_KEY));
    }

    #[tokio::test]
    async fn test_init_follows_moved_primary_and_persists() {
        let cluster = Arc::new(FakeCluster::new());
        cluster.set_map("http://p2", smap("p2"));
        let (client, storage) = client(&cluster);
        save_json(
            storage.as_ref(),
            PROXY_KEY,
            &ProxyState {
                url: "http://p1".to_string(),
                smap: Some(smap("p1")),
            },
        )
        .unwrap();

        client.init("http://default").await;
        assert_eq!(client.primary_url().await, "http://p2");

        let saved: ProxyState = load_json(storage.as_ref(), PROXY_KEY).unwrap().unwrap();
        assert_eq!(saved.url, "http://p2");
    }

    #[tokio::test]
    async fn test_init_keeps_saved_primary_when_detection_fails() {
        let cluster = Arc::new(FakeCluster::new());
        let (client, storage) = client(&cluster);
        save_json(
            storage.as_ref(),
            PROXY_KEY,
            &ProxyState {
                url: "http://p1".to_string(),
                smap: Some(smap("p1")),
            },
        )
        .unwrap();

        client.init("http://default").await;
        assert_eq!(client.primary_url().await, "http://p1");
    }

    #[tokio::test]
    async fn test_send_tokens_requires_primary() {
        let cluster = Arc::new(FakeCluster::new());
        let (client, _storage) = client(&cluster);

        let result = client.send_tokens("", &TokenList::default()).await;
        assert!(matches!(result, Err(ClusterError::NoPrimary)));
        assert!(cluster.pushes().is_empty());
    }
}
