use std::time::Duration;

use async_trait::async_trait;
use reqwest::Response;
use tracing::trace;

use super::smap::ClusterSnapshot;
use super::ClusterError;
use crate::storage::models::TokenList;

/// Network calls made to other cluster members
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Ask a member for its view of the cluster map
    async fn cluster_map(&self, member_url: &str) -> Result<ClusterSnapshot, ClusterError>;

    /// Hand the full token list to the primary proxy
    async fn push_tokens(&self, primary_url: &str, tokens: &TokenList) -> Result<(), ClusterError>;
}

/// [`ClusterApi`] over HTTP
#[derive(Debug, Clone)]
pub struct HttpClusterApi {
    client: reqwest::Client,
}

impl HttpClusterApi {
    pub fn new(timeout: Duration) -> Result<Self, ClusterError> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn cluster_map(&self, member_url: &str) -> Result<ClusterSnapshot, ClusterError> {
        let url = format!("{}/v1/daemon", member_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[("what", "smap")])
            .send()
            .await?;
        let response = check_status(&url, response)?;

        trace!(member = %member_url, "Fetched cluster map");
        Ok(response.json().await?)
    }

    async fn push_tokens(&self, primary_url: &str, tokens: &TokenList) -> Result<(), ClusterError> {
        let url = format!("{}/v1/tokens", primary_url.trim_end_matches('/'));
        let response = self.client.post(&url).json(tokens).send().await?;
        check_status(&url, response)?;
        Ok(())
    }
}

fn check_status(url: &str, response: Response) -> Result<Response, ClusterError> {
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        return Err(ClusterError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(response)
}
