//! JSON-RPC over HTTP against a live server

use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ObjectParams;
use jsonrpsee::core::ClientError;
use jsonrpsee::http_client::{HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;
use jsonrpsee::server::ServerHandle;
use serde_json::Value;

use netdiag_api_rpc::error::code;
use netdiag_api_rpc::{RpcServer, RpcServerConfig};
use netdiag_core::application::{AdmissionConfig, AdmissionQueue, DiagnosticService};
use netdiag_core::domain::PrivilegePolicy;
use netdiag_core::port::command_executor::mocks::{GatedExecutor, MockCommandExecutor};
use netdiag_core::port::CommandExecutor;

async fn start(
    executor: Arc<dyn CommandExecutor>,
    config: AdmissionConfig,
) -> (HttpClient, ServerHandle) {
    let queue = AdmissionQueue::new(executor, config).unwrap();
    let service = Arc::new(DiagnosticService::new(queue, PrivilegePolicy::default()));
    let server = RpcServer::new(
        RpcServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        service,
    );
    let (addr, handle): (SocketAddr, ServerHandle) = server.start().await.unwrap();
    let client = HttpClientBuilder::default()
        .build(format!("http://{}", addr))
        .unwrap();
    (client, handle)
}

fn params(pairs: &[(&str, &str)]) -> ObjectParams {
    let mut params = ObjectParams::new();
    for (key, value) in pairs {
        params.insert(key, value).unwrap();
    }
    params
}

fn error_code(err: ClientError) -> i32 {
    match err {
        ClientError::Call(obj) => obj.code(),
        other => panic!("expected call error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_health_and_stats() {
    let (client, handle) = start(
        Arc::new(MockCommandExecutor::new_success("")),
        AdmissionConfig::new(3),
    )
    .await;

    let health: Value = client.request("admin.health.v1", rpc_params![]).await.unwrap();
    assert_eq!(health["status"], "OK");

    let stats: Value = client.request("admin.stats.v1", rpc_params![]).await.unwrap();
    assert_eq!(stats["max_concurrency"], 3);
    assert_eq!(stats["active"], 0);
    assert!(stats["uptime_seconds"].is_u64());

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_dig_returns_command_output() {
    let (client, handle) = start(
        Arc::new(MockCommandExecutor::new_success("example.com. 300 IN MX 10 mail.example.com.\n")),
        AdmissionConfig::new(2),
    )
    .await;

    let response: Value = client
        .request(
            "net.dig.v1",
            params(&[("domain", "example.com"), ("type", "MX")]),
        )
        .await
        .unwrap();
    assert!(response["result"]
        .as_str()
        .unwrap()
        .contains("mail.example.com"));

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_validation_and_policy_errors() {
    let exec = Arc::new(MockCommandExecutor::new_success(""));
    let (client, handle) = start(exec.clone(), AdmissionConfig::new(2)).await;

    let err = client
        .request::<Value, _>("net.whois.v1", params(&[]))
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::VALIDATION_ERROR);

    let err = client
        .request::<Value, _>("net.ping.v1", params(&[("host", "8.8.8.8; rm -rf /")]))
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::VALIDATION_ERROR);

    let err = client
        .request::<Value, _>(
            "net.nmap.v1",
            params(&[("host", "scanme.nmap.org"), ("options", "-sS")]),
        )
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::FORBIDDEN);

    assert_eq!(exec.call_count(), 0);
    handle.stop().unwrap();
}

#[tokio::test]
async fn test_command_failure_maps_to_execution_error() {
    let (client, handle) = start(
        Arc::new(MockCommandExecutor::new_fail("traceroute: unknown host")),
        AdmissionConfig::new(1),
    )
    .await;

    let err = client
        .request::<Value, _>("net.traceroute.v1", params(&[("host", "nowhere.invalid")]))
        .await
        .unwrap_err();
    match err {
        ClientError::Call(obj) => {
            assert_eq!(obj.code(), code::EXECUTION_FAILED);
            assert_eq!(obj.message(), "traceroute: unknown host");
        }
        other => panic!("expected call error, got {:?}", other),
    }

    handle.stop().unwrap();
}

#[tokio::test]
async fn test_full_backlog_is_overloaded() {
    let exec = Arc::new(GatedExecutor::new());
    let (client, handle) = start(
        exec.clone(),
        AdmissionConfig::new(1).with_max_pending(0),
    )
    .await;

    let busy = client.clone();
    let first = tokio::spawn(async move {
        busy.request::<Value, _>("net.whois.v1", params(&[("domain", "example.com")]))
            .await
    });
    exec.wait_started(1).await;

    let err = client
        .request::<Value, _>("net.whois.v1", params(&[("domain", "example.org")]))
        .await
        .unwrap_err();
    assert_eq!(error_code(err), code::OVERLOADED);

    assert!(exec.succeed("whois example.com"));
    let response = first.await.unwrap().unwrap();
    assert_eq!(response["result"], "whois example.com ok");

    handle.stop().unwrap();
}
