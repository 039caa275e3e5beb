use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use vault_bootstrap::config::StageTimeouts;
use vault_bootstrap::error::RunnerError;
use vault_bootstrap::health::HealthPoller;
use vault_bootstrap::initializer::{ApiInitializer, InitializationSource, LogScrapeInitializer};
use vault_bootstrap::operator::OperatorTarget;
use vault_bootstrap::runner::{CapturedOutput, CommandRunner, CommandSpec};
use vault_bootstrap::sequencer::BootstrapSequencer;
use vault_bootstrap::state::BootstrapState;
use vault_bootstrap::unseal::UnsealCoordinator;
use vault_bootstrap::vault::VaultClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Answers every command with `logs` and records what it was asked to run.
#[derive(Default)]
struct RecordingRunner {
    logs: String,
    commands: Mutex<Vec<Vec<String>>>,
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CapturedOutput, RunnerError> {
        self.commands
            .lock()
            .expect("commands")
            .push(spec.args.iter().map(|arg| arg.value().to_string()).collect());
        Ok(CapturedOutput {
            logs: self.logs.clone(),
            exit_code: Some(0),
        })
    }
}

impl RecordingRunner {
    fn subcommands(&self) -> Vec<String> {
        self.commands
            .lock()
            .expect("commands")
            .iter()
            .filter_map(|args| args.get(2).cloned())
            .collect()
    }
}

fn target() -> OperatorTarget {
    OperatorTarget {
        image: "hashicorp/vault:1.14".to_string(),
        network: "traefik".to_string(),
        address: "http://vault:8200".to_string(),
    }
}

fn timeouts() -> StageTimeouts {
    StageTimeouts {
        init: Duration::from_secs(10),
        unseal: Duration::from_secs(10),
        status: Duration::from_secs(5),
    }
}

fn client(server: &MockServer) -> VaultClient {
    VaultClient::new(&server.uri(), None, Duration::from_secs(2)).expect("client")
}

fn sequencer(
    server: &MockServer,
    initializer: Box<dyn InitializationSource>,
    runner: Arc<RecordingRunner>,
) -> BootstrapSequencer {
    BootstrapSequencer::new(
        server.uri(),
        initializer,
        UnsealCoordinator::new(runner, target(), 2),
        Arc::new(client(server)),
        HealthPoller::new(5, Duration::from_millis(10)),
        timeouts(),
    )
}

async fn stub_seal_status(server: &MockServer, initialized: bool, sealed: bool) {
    Mock::given(method("GET"))
        .and(path("/v1/sys/seal-status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "initialized": initialized,
            "sealed": sealed,
            "t": 2
        })))
        .mount(server)
        .await;
}

async fn stub_health(server: &MockServer, sealed_responses: u64) {
    if sealed_responses > 0 {
        Mock::given(method("GET"))
            .and(path("/v1/sys/health"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({ "sealed": true })))
            .up_to_n_times(sealed_responses)
            .with_priority(1)
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/v1/sys/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sealed": false })))
        .mount(server)
        .await;
}

async fn health_calls(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .expect("recorded requests")
        .iter()
        .filter(|request| request.url.path() == "/v1/sys/health")
        .count()
}

#[tokio::test]
async fn api_bootstrap_unseals_with_threshold_shares() {
    let server = MockServer::start().await;
    stub_seal_status(&server, false, true).await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/init"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": ["k0", "k1", "k2"],
            "root_token": "s.root"
        })))
        .expect(1)
        .mount(&server)
        .await;
    stub_health(&server, 2).await;

    let runner = Arc::new(RecordingRunner::default());
    let initializer = ApiInitializer::new(client(&server), 3, 2);
    let mut sequencer = sequencer(&server, Box::new(initializer), runner.clone());

    let ready = sequencer.run().await.expect("ready");

    assert!(ready.initialized_now);
    assert_eq!(ready.unseal_keys.len(), 3);
    assert_eq!(
        ready.root_token.as_ref().map(|token| token.expose_secret()),
        Some("s.root")
    );
    assert_eq!(sequencer.state(), BootstrapState::Ready);
    let unsealed: Vec<String> = runner
        .commands
        .lock()
        .expect("commands")
        .iter()
        .filter_map(|args| args.last().cloned())
        .collect();
    assert_eq!(unsealed, vec!["k0", "k1"]);
    assert_eq!(health_calls(&server).await, 3);
}

#[tokio::test]
async fn log_scrape_bootstrap_runs_init_then_unseal_commands() {
    let server = MockServer::start().await;
    stub_seal_status(&server, false, true).await;
    stub_health(&server, 0).await;

    let runner = Arc::new(RecordingRunner {
        logs: "Unseal Key 1: k1\nUnseal Key 2: k2\nUnseal Key 3: k3\n\nInitial Root Token: s.r\n"
            .to_string(),
        ..RecordingRunner::default()
    });
    let initializer = LogScrapeInitializer::new(runner.clone(), target(), 3, 2);
    let mut sequencer = sequencer(&server, Box::new(initializer), runner.clone());

    let ready = sequencer.run().await.expect("ready");

    assert!(ready.initialized_now);
    assert_eq!(runner.subcommands(), vec!["init", "unseal", "unseal"]);
    assert_eq!(health_calls(&server).await, 1);
}

#[tokio::test]
async fn initialized_server_is_not_initialized_again() {
    let server = MockServer::start().await;
    stub_seal_status(&server, true, false).await;
    Mock::given(method("POST"))
        .and(path("/v1/sys/init"))
        .respond_with(ResponseTemplate::new(400))
        .expect(0)
        .mount(&server)
        .await;
    stub_health(&server, 0).await;

    let runner = Arc::new(RecordingRunner::default());
    let initializer = ApiInitializer::new(client(&server), 3, 2);
    let mut sequencer = sequencer(&server, Box::new(initializer), runner.clone());

    let ready = sequencer.run().await.expect("ready");

    assert!(!ready.initialized_now);
    assert!(ready.root_token.is_none());
    assert!(runner.subcommands().is_empty());
    assert_eq!(
        sequencer.history(),
        &[
            BootstrapState::NotStarted,
            BootstrapState::WaitingHealthy,
            BootstrapState::Ready
        ]
    );
}

#[tokio::test]
async fn unreachable_status_endpoint_fails_before_init() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/seal-status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let runner = Arc::new(RecordingRunner::default());
    let initializer = LogScrapeInitializer::new(runner.clone(), target(), 3, 2);
    let mut sequencer = sequencer(&server, Box::new(initializer), runner.clone());

    let err = sequencer.run().await.unwrap_err();

    assert_eq!(err.stage(), BootstrapState::NotStarted);
    assert!(err.to_string().contains("seal status"));
    assert_eq!(sequencer.state(), BootstrapState::Failed);
    assert!(runner.subcommands().is_empty());
}
