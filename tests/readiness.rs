use std::time::Duration;

use gocd_provision::config::{ProvisionConfig, ServerConfig};
use gocd_provision::http::GoCdClient;
use gocd_provision::media_type;
use gocd_provision::poll::WaitSpec;
use gocd_provision::readiness;
use gocd_provision::version::GoVersion;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn agents(state: &str) -> Value {
    json!({
        "_embedded": { "agents": [
            { "uuid": "adb9540a-b954-4571-9d9b-2f330739d4da", "hostname": "vagrant", "agent_state": state }
        ] }
    })
}

fn config_for(uri: &str) -> ProvisionConfig {
    let mut config = ProvisionConfig::default();
    config.server = ServerConfig {
        base_url: format!("{}/go", uri),
        request_timeout_secs: 5,
        ..ServerConfig::default()
    };
    config.timeouts.server_start_secs = 2;
    config.timeouts.agent_secs = 2;
    config.timeouts.interval_secs = 0;
    config
}

#[tokio::test(flavor = "multi_thread")]
async fn server_version_reports_core() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/api/version"))
        .and(header("accept", media_type::V1))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "version": "18.2.0",
            "build_number": "6228",
            "git_sha": "5ddc8a2a2d8ac8c5cfb6de3e3d1b4e1b7a5e0f39",
            "full_version": "18.2.0 (6228-5ddc8a2a2d8ac8c5cfb6de3e3d1b4e1b7a5e0f39)"
        })))
        .mount(&server)
        .await;

    let uri = server.uri();
    let (info, version) = tokio::task::spawn_blocking(move || {
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        (
            readiness::server_version(&client).unwrap(),
            readiness::current_version(&client).unwrap(),
        )
    })
    .await
    .unwrap();

    assert_eq!(info.core(), "18.2.0-6228");
    assert_eq!(version, GoVersion::new(18, 2, 0));
}

#[tokio::test(flavor = "multi_thread")]
async fn login_redirect_counts_as_running() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/auth/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/go/pipelines"))
        .mount(&server)
        .await;

    let uri = server.uri();
    let running = tokio::task::spawn_blocking(move || {
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        readiness::server_running(&client)
    })
    .await
    .unwrap();

    assert!(running);
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_on_login_is_not_running() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/auth/login"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let uri = server.uri();
    let running = tokio::task::spawn_blocking(move || {
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        readiness::server_running(&client)
    })
    .await
    .unwrap();

    assert!(!running);
}

#[tokio::test(flavor = "multi_thread")]
async fn service_status_rides_out_boot_errors_until_agent_is_idle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agents("Missing")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .and(header("accept", media_type::V4))
        .respond_with(ResponseTemplate::new(200).set_body_json(agents("Idle")))
        .mount(&server)
        .await;

    let uri = server.uri();
    let status = tokio::task::spawn_blocking(move || {
        let config = config_for(&uri);
        let client = GoCdClient::new(&config.server).unwrap();
        readiness::service_status(&client, &config, Some(&GoVersion::new(17, 3, 0)))
    })
    .await
    .unwrap()
    .unwrap();

    assert!(status.server_up);
    assert!(status.agent_idle);
    assert!(!status.postgres_checked);
}

#[tokio::test(flavor = "multi_thread")]
async fn agent_wait_times_out_with_last_state() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(agents("Building")))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        let spec = WaitSpec::new(Duration::from_millis(100), Duration::from_millis(20));
        readiness::wait_for_idle_agent(&client, &GoVersion::new(18, 2, 0), &spec)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.code.as_str(), "readiness.timeout");
    assert_eq!(err.details["lastObservation"], "agent states: Building");
}

#[tokio::test(flavor = "multi_thread")]
async fn agents_endpoint_missing_aborts_the_wait() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let uri = server.uri();
    let err = tokio::task::spawn_blocking(move || {
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        let spec = WaitSpec::new(Duration::from_secs(5), Duration::from_millis(20));
        readiness::wait_for_idle_agent(&client, &GoVersion::new(18, 2, 0), &spec)
    })
    .await
    .unwrap()
    .unwrap_err();

    assert_eq!(err.code.as_str(), "http.status");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn slow_agents_endpoint_cannot_stretch_the_window() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/go/api/agents"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(agents("Idle"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let uri = server.uri();
    let (err, elapsed) = tokio::task::spawn_blocking(move || {
        // The per-request timeout (5s) is well past the window.
        let client = GoCdClient::new(&config_for(&uri).server).unwrap();
        let spec = WaitSpec::new(Duration::from_millis(300), Duration::from_millis(50));
        let started = std::time::Instant::now();
        let result = readiness::wait_for_idle_agent(&client, &GoVersion::new(18, 2, 0), &spec);
        (result.unwrap_err(), started.elapsed())
    })
    .await
    .unwrap();

    assert_eq!(err.code.as_str(), "readiness.timeout");
    assert!(elapsed < Duration::from_secs(2), "wait took {:?}", elapsed);
}
