//! The node agent against a live control plane.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use nodehub::agent::{Agent, Applier, FileApplier, TickOutcome};
use nodehub::config::AgentConfig;
use nodehub::inventory::NewNode;
use nodehub::lifecycle::Shutdown;
use nodehub::model::{DesiredConfig, NewRelease, ReleaseStatus};
use nodehub::reconcile::NodeState;

mod common;
use common::{start_server, test_config, RunningServer, ADMIN_KEY};

async fn register(server: &RunningServer, name: &str) -> (String, String) {
    let view = server
        .state
        .inventory
        .create(NewNode {
            name: name.into(),
            node_type: "vps".into(),
            entry_direct: format!("{name}.example.com"),
            ..Default::default()
        })
        .await
        .unwrap();
    (view.node.id, view.node.token)
}

async fn queue_release(server: &RunningServer, node_id: &str) -> u64 {
    server
        .state
        .releases
        .create_release(NewRelease {
            node_ids: vec![node_id.to_string()],
            template_ids: vec!["tpl_builtin_trojan_tcp_tls".into()],
            params: json!({"password": "p"}),
        })
        .await
        .unwrap()
        .version
}

fn agent_config(server: &RunningServer, node_id: &str, token: &str, dir: &std::path::Path) -> AgentConfig {
    AgentConfig {
        control_plane_url: server.url(),
        node_id: node_id.to_string(),
        node_token: token.to_string(),
        heartbeat_interval_secs: 1,
        reconcile_interval_secs: 1,
        request_timeout_secs: 5,
        state_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

struct FailingApplier {
    calls: AtomicUsize,
}

#[async_trait]
impl Applier for FailingApplier {
    async fn apply(&self, _config: &DesiredConfig) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("xray refused the config")
    }
}

#[tokio::test]
async fn test_agent_applies_release_and_reports() {
    let server = start_server(test_config()).await;
    let (node_id, token) = register(&server, "alpha").await;
    let dir = tempfile::tempdir().unwrap();
    let applier = Arc::new(FileApplier::new(dir.path()));
    let agent = Agent::new(agent_config(&server, &node_id, &token, dir.path()), applier.clone()).unwrap();

    assert_eq!(agent.reconcile_once().await.unwrap(), TickOutcome::UpToDate);

    let version = queue_release(&server, &node_id).await;
    assert_eq!(agent.reconcile_once().await.unwrap(), TickOutcome::Applied(version));
    assert_eq!(agent.applied_version().await, version);
    assert_eq!(agent.queued_events().await, 0);

    let written: DesiredConfig = serde_json::from_slice(&std::fs::read(applier.path()).unwrap()).unwrap();
    assert_eq!(written.rev, version);
    assert_eq!(written.params["password"], "p");

    let view = server.state.inventory.get(&node_id).await.unwrap();
    assert_eq!(view.node.applied_version, version);
    assert_eq!(view.node.last_release_status, ReleaseStatus::Ok);
    assert_eq!(view.state, NodeState::Converged);

    agent.heartbeat_once().await.unwrap();
    let view = server.state.inventory.get(&node_id).await.unwrap();
    assert!(view.online);

    assert_eq!(agent.reconcile_once().await.unwrap(), TickOutcome::UpToDate);

    // A restarted agent resumes from its state file.
    drop(agent);
    let restarted = Agent::new(agent_config(&server, &node_id, &token, dir.path()), applier).unwrap();
    assert_eq!(restarted.applied_version().await, version);

    server.shutdown.trigger();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_failed_apply_is_reported_once() {
    let server = start_server(test_config()).await;
    let (node_id, token) = register(&server, "beta").await;
    let dir = tempfile::tempdir().unwrap();
    let applier = Arc::new(FailingApplier { calls: AtomicUsize::new(0) });
    let agent = Agent::new(agent_config(&server, &node_id, &token, dir.path()), applier.clone()).unwrap();

    let version = queue_release(&server, &node_id).await;
    assert_eq!(agent.reconcile_once().await.unwrap(), TickOutcome::Failed(version));
    assert_eq!(agent.reconcile_once().await.unwrap(), TickOutcome::Failed(version));
    assert_eq!(applier.calls.load(Ordering::SeqCst), 2);
    assert_eq!(agent.applied_version().await, 0);

    let view = server.state.inventory.get(&node_id).await.unwrap();
    assert_eq!(view.node.last_release_status, ReleaseStatus::Failed);
    assert_eq!(view.node.last_release_message, "xray refused the config");
    assert_eq!(view.node.applied_version, 0);
    assert_eq!(view.state, NodeState::Failed);

    server.shutdown.trigger();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_rejected_token_fails_ticks() {
    let server = start_server(test_config()).await;
    let (node_id, token) = register(&server, "gamma").await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = agent_config(&server, &node_id, &token, dir.path());
    config.node_token = "wrong".into();
    let agent = Agent::new(config, Arc::new(FileApplier::new(dir.path()))).unwrap();
    assert!(agent.reconcile_once().await.is_err());
    assert!(agent.heartbeat_once().await.is_err());

    server.shutdown.trigger();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_run_loop_converges_and_stops() {
    let server = start_server(test_config()).await;
    let (node_id, token) = register(&server, "delta").await;
    let version = queue_release(&server, &node_id).await;
    let dir = tempfile::tempdir().unwrap();
    let agent = Arc::new(
        Agent::new(
            agent_config(&server, &node_id, &token, dir.path()),
            Arc::new(FileApplier::new(dir.path())),
        )
        .unwrap(),
    );

    let shutdown = Shutdown::new();
    let runner = {
        let agent = agent.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { agent.run(&shutdown).await })
    };

    let mut converged = false;
    for _ in 0..50 {
        let view = server.state.inventory.get(&node_id).await.unwrap();
        if view.state == NodeState::Converged && view.online {
            converged = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(converged, "node did not converge to v{version}");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), runner).await.unwrap().unwrap();

    server.shutdown.trigger();
    server.handle.await.unwrap();
}

#[tokio::test]
async fn test_admin_key_hot_reload() {
    let server = start_server(test_config()).await;
    let client = reqwest::Client::new();
    let status = |key: &'static str| {
        let client = client.clone();
        let url = format!("{}/api/system/status", server.url());
        async move { client.get(url).header("x-admin-key", key).send().await.unwrap().status() }
    };
    assert_eq!(status(ADMIN_KEY).await, 200);

    let mut next = test_config();
    next.admin.api_key = "rotated-key".into();
    server.config_tx.send(next).unwrap();

    let mut rotated = false;
    for _ in 0..50 {
        if status("rotated-key").await == 200 {
            rotated = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(rotated);
    assert_eq!(status(ADMIN_KEY).await, 401);

    server.shutdown.trigger();
    server.handle.await.unwrap();
}
