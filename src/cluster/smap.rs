use serde::{Deserialize, Serialize};

/// A cluster member as listed in the cluster map
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub url: String,
}

/// Cluster map as reported by any member.
///
/// Only used to find the primary proxy again after it moved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    #[serde(default, rename = "primaryURL")]
    pub primary_url: String,
    #[serde(default)]
    pub proxies: Vec<Member>,
    #[serde(default, rename = "storageNodes")]
    pub storage_nodes: Vec<Member>,
}

impl ClusterSnapshot {
    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty() && self.storage_nodes.is_empty()
    }

    /// Members in probe order: proxies first, then storage nodes
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.proxies.iter().chain(self.storage_nodes.iter())
    }
}
