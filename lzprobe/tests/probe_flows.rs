//! End-to-end probe flows against mock services.
//!
//! Every flow runs with a static token credential so nothing here is
//! interactive; the device-code flow has its own tests next to its
//! implementation.

use std::time::Duration;

use lzprobe::config::Config;
use lzprobe::credentials::StaticTokenCredential;
use lzprobe::errors::Error;
use lzprobe::probes;
use lzprobe::probes::score::ScoreOptions;
use lzprobe::probes::storage::StorageOptions;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn base_config() -> Config {
    let mut config = Config::default();
    config.request_timeout = Duration::from_secs(5);
    config
}

const WRITE_OPTS: StorageOptions = StorageOptions {
    read_only: false,
    limit: 10,
};

#[test_log::test(tokio::test)]
async fn secret_probe_returns_the_bundle() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/sqldbpassword"))
        .and(query_param("api-version", "7.4"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": "hunter2",
            "id": format!("{}/secrets/sqldbpassword/abc123", server.uri()),
            "attributes": { "enabled": true },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config();
    config.vault.url = server.uri();
    config.vault.secret_name = "sqldbpassword".to_string();

    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::secret::run(&config, &credential, None).await.unwrap();

    assert!(report.success);
    let bundle = report.response_data.unwrap();
    assert_eq!(bundle["value"], "hunter2");
    assert!(!bundle["value"].as_str().unwrap().is_empty());
}

#[test_log::test(tokio::test)]
async fn secret_probe_surfaces_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "SecretNotFound" },
        })))
        .mount(&server)
        .await;

    let mut config = base_config();
    config.vault.url = server.uri();

    let credential = StaticTokenCredential::new("tok-1");
    let err = probes::secret::run(&config, &credential, Some("missing")).await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }), "got: {err:?}");
    assert!(err.to_string().contains("missing"), "got: {err}");
}

#[test_log::test(tokio::test)]
async fn secret_probe_refuses_placeholder_config() {
    let config = base_config();
    let credential = StaticTokenCredential::new("tok-1");

    let err = probes::secret::run(&config, &credential, None).await.unwrap_err();
    assert!(matches!(err, Error::Config { .. }), "got: {err:?}");
}

/// Point the configured abfss-style path at a mock server over plain HTTP.
fn lake_path_for(server: &MockServer, file: &str) -> String {
    let host = server.uri().trim_start_matches("http://").to_string();
    format!("abfs://test@{host}/{file}")
}

#[test_log::test(tokio::test)]
async fn storage_probe_round_trips_the_sample_table() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test/test.csv"))
        .and(query_param("resource", "file"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/test/test.csv"))
        .and(query_param("action", "append"))
        .and(query_param("position", "0"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/test/test.csv"))
        .and(query_param("action", "flush"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/test"))
        .and(query_param("resource", "filesystem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "paths": [
                { "name": "test.csv", "contentLength": "12", "isDirectory": "false" },
            ],
        })))
        .expect(1)
        .mount(&server)
        .await;
    // The read-back returns the rows in the opposite order; the comparison
    // must not care
    Mock::given(method("GET"))
        .and(path("/test/test.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello\n2\n1\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config();
    config.storage.path = lake_path_for(&server, "test.csv");

    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::storage::run(&config, &credential, WRITE_OPTS).await.unwrap();

    assert!(report.success, "report: {report:?}");
    let data = report.response_data.unwrap();
    assert_eq!(data["listing"][0]["name"], "test.csv");
    assert_eq!(data["read_back"], json!([{"hello": "2"}, {"hello": "1"}]));
}

#[test_log::test(tokio::test)]
async fn storage_probe_flags_read_back_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/test/test.csv"))
        .respond_with(ResponseTemplate::new(201))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/test/test.csv"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/test"))
        .and(query_param("resource", "filesystem"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "paths": [] })))
        .mount(&server)
        .await;
    // The store hands back someone else's rows
    Mock::given(method("GET"))
        .and(path("/test/test.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello\n7\n8\n"))
        .mount(&server)
        .await;

    let mut config = base_config();
    config.storage.path = lake_path_for(&server, "test.csv");

    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::storage::run(&config, &credential, WRITE_OPTS).await.unwrap();

    assert!(!report.success);
    assert!(report.error_message.unwrap().contains("read-back"));
}

#[test_log::test(tokio::test)]
async fn storage_probe_read_only_shows_existing_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/test/existing.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello\n1\n2\n3\n"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config();
    config.storage.path = lake_path_for(&server, "existing.csv");

    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::storage::run(
        &config,
        &credential,
        StorageOptions {
            read_only: true,
            limit: 2,
        },
    )
    .await
    .unwrap();

    assert!(report.success);
    assert_eq!(report.response_data.unwrap(), json!([{"hello": "1"}, {"hello": "2"}]));
}

#[test_log::test(tokio::test)]
async fn sql_probe_surfaces_missing_password_secret() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/secrets/sqldbPassword"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": "SecretNotFound" },
        })))
        .mount(&server)
        .await;

    let mut config = base_config();
    config.vault.url = server.uri();
    for target in config.sql.targets.values_mut() {
        target.host = "db.internal".to_string();
    }

    let credential = StaticTokenCredential::new("tok-1");
    let err = probes::sql::run(&config, &credential, "sqldb").await.unwrap_err();

    assert!(matches!(err, Error::NotFound { .. }), "got: {err:?}");
}

#[test_log::test(tokio::test)]
async fn sql_probe_rejects_unknown_target() {
    let mut config = base_config();
    for target in config.sql.targets.values_mut() {
        target.host = "db.internal".to_string();
    }

    let credential = StaticTokenCredential::new("tok-1");
    let err = probes::sql::run(&config, &credential, "warehouse").await.unwrap_err();

    assert!(matches!(err, Error::Config { .. }), "got: {err:?}");
    assert!(err.to_string().contains("warehouse"), "got: {err}");
}

#[test_log::test(tokio::test)]
async fn score_probe_reports_the_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "query": "What color is the fox",
            "context": "The quick brown fox jumped over the lazy dog.",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "brown" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config();
    config.scoring.uri = format!("{}/score", server.uri());

    let report = probes::score::run(&config, ScoreOptions::default()).await.unwrap();

    assert!(report.success);
    assert_eq!(report.status_code, Some(200));
    assert_eq!(report.response_data.unwrap()["answer"], "brown");
}

#[test_log::test(tokio::test)]
async fn score_probe_sends_bearer_key_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("authorization", "Bearer primary-key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "brown" })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = base_config();
    config.scoring.uri = format!("{}/score", server.uri());
    config.scoring.key = Some("primary-key-1".to_string());

    let report = probes::score::run(&config, ScoreOptions::default()).await.unwrap();
    assert!(report.success);
}

#[test_log::test(tokio::test)]
async fn score_probe_reports_misauthentication_as_unsuccessful() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/score"))
        .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
        .mount(&server)
        .await;

    let mut config = base_config();
    config.scoring.uri = format!("{}/score", server.uri());

    let report = probes::score::run(&config, ScoreOptions::default()).await.unwrap();

    assert!(!report.success);
    assert_eq!(report.status_code, Some(401));
    // Non-JSON bodies still reach the operator verbatim
    assert_eq!(report.response_data.unwrap()["raw"], "unauthorized");
}

#[test_log::test(tokio::test)]
async fn score_probe_surfaces_connection_errors() {
    // Bind a server to learn a free port, then drop it so nothing listens
    let server = MockServer::start().await;
    let dead_uri = format!("{}/score", server.uri());
    drop(server);

    let mut config = base_config();
    config.scoring.uri = dead_uri;

    let err = probes::score::run(&config, ScoreOptions::default()).await.unwrap_err();
    assert!(matches!(err, Error::Http(_)), "got: {err:?}");
}

/// Everything the model probe needs from the registry, mounted on one server.
async fn mount_registry(server: &MockServer, operation_states: &[&str]) {
    Mock::given(method("GET"))
        .and(path("/artifact"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"onnx-bytes".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/bidaf_onnx/versions"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "name": "bidaf_onnx",
            "id": "models:/bidaf_onnx/1",
            "version": 1,
        })))
        .mount(server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/settings"))
        .and(body_json(json!({ "image_build_compute": "test" })))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "operation_id": "op-1" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/packages"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({ "operation_id": "op-2" })))
        .mount(server)
        .await;

    // Non-terminal states first, each consumed once, then the terminal state
    let (terminal, in_flight) = operation_states.split_last().unwrap();
    for state in in_flight {
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": state })))
            .up_to_n_times(1)
            .mount(server)
            .await;
    }
    for op in ["op-1", "op-2"] {
        Mock::given(method("GET"))
            .and(path(format!("/operations/{op}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "state": terminal,
                "error": if *terminal == "Failed" { json!({"code": "ImageBuildFailure"}) } else { json!(null) },
            })))
            .mount(server)
            .await;
    }
}

fn model_config(server: &MockServer) -> Config {
    let mut config = base_config();
    config.workspace.url = server.uri();
    config.workspace.model_url = format!("{}/artifact", server.uri());
    config.workspace.poll_interval = Duration::from_millis(20);
    config.workspace.deployment_timeout = Duration::from_secs(5);
    config
}

#[test_log::test(tokio::test)]
async fn model_probe_deploys_and_scores() {
    let server = MockServer::start().await;
    mount_registry(&server, &["Running", "Succeeded"]).await;

    Mock::given(method("GET"))
        .and(path("/services/myservice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "myservice",
            "state": "Healthy",
            "scoring_uri": format!("{}/score", server.uri()),
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/services/myservice/listkeys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "primary_key": "key-1",
            "secondary_key": "key-2",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services/myservice/logs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "container started" })))
        .mount(&server)
        .await;
    // The freshly deployed endpoint is scored with the service's key
    Mock::given(method("POST"))
        .and(path("/score"))
        .and(header("authorization", "Bearer key-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "brown" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = model_config(&server);
    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::model::run(&config, &credential, false).await.unwrap();

    assert!(report.success, "report: {report:?}");
    let data = report.response_data.unwrap();
    assert_eq!(data["service"]["state"], "Healthy");
    assert_eq!(data["score"]["status"], 200);
    assert_eq!(data["score"]["body"]["answer"], "brown");
    assert_eq!(data["logs"], "container started");
}

#[test_log::test(tokio::test)]
async fn model_probe_package_only_builds_the_image() {
    let server = MockServer::start().await;
    mount_registry(&server, &["Succeeded"]).await;

    let config = model_config(&server);
    let credential = StaticTokenCredential::new("tok-1");
    let report = probes::model::run(&config, &credential, true).await.unwrap();

    assert!(report.success);
    let data = report.response_data.unwrap();
    assert_eq!(data["image_name"], "test_image");
    assert_eq!(data["operation_id"], "op-2");
}

#[test_log::test(tokio::test)]
async fn model_probe_surfaces_failed_deployments() {
    let server = MockServer::start().await;
    mount_registry(&server, &["Running", "Failed"]).await;

    let config = model_config(&server);
    let credential = StaticTokenCredential::new("tok-1");
    let err = probes::model::run(&config, &credential, false).await.unwrap_err();

    assert!(matches!(err, Error::OperationFailed { .. }), "got: {err:?}");
    assert!(err.to_string().contains("ImageBuildFailure"), "got: {err}");
}

#[test_log::test(tokio::test)]
async fn model_probe_times_out_on_stuck_operations() {
    let server = MockServer::start().await;
    // The operation never leaves Running
    mount_registry(&server, &["Running"]).await;

    let mut config = model_config(&server);
    config.workspace.deployment_timeout = Duration::from_millis(100);

    let credential = StaticTokenCredential::new("tok-1");
    let err = probes::model::run(&config, &credential, false).await.unwrap_err();

    assert!(matches!(err, Error::OperationTimeout { .. }), "got: {err:?}");
}
