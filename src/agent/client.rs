use std::time::Duration;

use anyhow::{bail, Context};
use serde::de::DeserializeOwned;

use crate::api::{
    ApplyEvent, Envelope, EventsRequest, EventsResponse, HeartbeatReport, HeartbeatResponse, ReconcileResponse,
    NODE_TOKEN_HEADER,
};
use crate::config::AgentConfig;

/// HTTP client for the agent endpoints of one node.
#[derive(Clone)]
pub struct ControlPlaneClient {
    client: reqwest::Client,
    base_url: String,
    node_id: String,
    token: String,
}

impl ControlPlaneClient {
    pub fn new(cfg: &AgentConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(concat!("nodehub-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: cfg.control_plane_url.trim_end_matches('/').to_string(),
            node_id: cfg.node_id.clone(),
            token: cfg.node_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn reconcile(&self, current_version: u64) -> anyhow::Result<ReconcileResponse> {
        let version = current_version.to_string();
        let res = self
            .client
            .get(self.url("/agent/reconcile"))
            .query(&[("node_id", self.node_id.as_str()), ("current_version", version.as_str())])
            .header(NODE_TOKEN_HEADER, &self.token)
            .send()
            .await
            .context("reconcile request failed")?;
        read_envelope(res).await.context("reconcile rejected")
    }

    pub async fn heartbeat(&self, report: &HeartbeatReport) -> anyhow::Result<HeartbeatResponse> {
        let res = self
            .client
            .post(self.url("/agent/heartbeat"))
            .query(&[("node_id", self.node_id.as_str())])
            .header(NODE_TOKEN_HEADER, &self.token)
            .json(report)
            .send()
            .await
            .context("heartbeat request failed")?;
        read_envelope(res).await.context("heartbeat rejected")
    }

    pub async fn send_events(&self, events: &[ApplyEvent]) -> anyhow::Result<EventsResponse> {
        let body = EventsRequest {
            node_id: self.node_id.clone(),
            events: events.to_vec(),
        };
        let res = self
            .client
            .post(self.url("/agent/events"))
            .header(NODE_TOKEN_HEADER, &self.token)
            .json(&body)
            .send()
            .await
            .context("events request failed")?;
        read_envelope(res).await.context("events rejected")
    }
}

/// Unwrap `{success, data, error}`; any non-2xx status is an error.
async fn read_envelope<T: DeserializeOwned>(res: reqwest::Response) -> anyhow::Result<T> {
    let status = res.status();
    let text = res.text().await.context("failed to read response body")?;
    let envelope: Envelope<T> = match serde_json::from_str(&text) {
        Ok(envelope) => envelope,
        Err(err) if status.is_success() => {
            return Err(err).context("malformed response envelope");
        }
        Err(_) => bail!("status {status}: {}", text.trim()),
    };

    if !status.is_success() || !envelope.success {
        match envelope.error {
            Some(error) => bail!("status {status}: {} {}", error.code, error.message),
            None => bail!("status {status}"),
        }
    }
    envelope.data.context("response envelope has no data")
}
