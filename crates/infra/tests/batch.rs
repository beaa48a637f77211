//! Integration tests for the batch executor
//!
//! Exercises chunking, ordering, the halt flag and the synthetic failure
//! entries against a wiremock server.

mod support;

use std::sync::Arc;

use quotelink_infra::{BatchCommand, BatchExecutor, CallError};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use support::build_client;

fn commands(count: usize) -> Vec<BatchCommand> {
    (0..count).map(|i| BatchCommand::new(format!("cmd_{i}"), "profile")).collect()
}

#[tokio::test]
async fn test_seventy_five_commands_issue_two_submissions_in_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "result": {} } })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(Arc::clone(&client));

    let outcomes = executor.call_batch(&commands(75), false).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.is_success()));

    // Inspect the recorded submissions: 50 keys then 25, original order
    let requests = server.received_requests().await.unwrap();
    let bodies: Vec<Value> = requests
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();

    let first_cmd = bodies[0]["cmd"].as_object().unwrap();
    let second_cmd = bodies[1]["cmd"].as_object().unwrap();
    assert_eq!(first_cmd.len(), 50);
    assert_eq!(second_cmd.len(), 25);
    assert!(first_cmd.contains_key("cmd_0"));
    assert!(first_cmd.contains_key("cmd_49"));
    assert!(second_cmd.contains_key("cmd_50"));
    assert!(second_cmd.contains_key("cmd_74"));
    assert_eq!(bodies[0]["halt"], 0);

    server.verify().await;
}

#[tokio::test]
async fn test_empty_batch_fails_without_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(client);

    let error: CallError = executor.call_batch(&[], false).await.unwrap_err();
    assert_eq!(error.code, "invalid_batch");
    assert!(!error.is_retryable());

    server.verify().await;
}

#[tokio::test]
async fn test_non_object_command_params_fail_without_http() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "result": {} })))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(client);

    let commands = vec![BatchCommand::with_params("deal", "crm.deal.get", json!(5))];
    let error: CallError = executor.call_batch(&commands, false).await.unwrap_err();
    assert_eq!(error.code, "invalid_batch");
    assert!(error.message.contains("deal"));
    assert!(!error.is_retryable());

    server.verify().await;
}

#[tokio::test]
async fn test_halt_off_records_failed_chunk_and_continues() {
    let server = MockServer::start().await;

    // First chunk (contains cmd_0) fails with a non-retryable code
    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .and(body_string_contains("cmd_0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "ERROR_METHOD_NOT_FOUND"
        })))
        .expect(1)
        .mount(&server)
        .await;

    // Second chunk (contains cmd_50) succeeds
    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .and(body_string_contains("cmd_50"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "result": {} } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(client);

    let outcomes = executor.call_batch(&commands(75), false).await.unwrap();
    assert_eq!(outcomes.len(), 2);

    match &outcomes[0] {
        quotelink_infra::BatchOutcome::Failed { code, message } => {
            assert_eq!(code, "ERROR_METHOD_NOT_FOUND");
            assert!(!message.is_empty());
        }
        other => panic!("expected failed chunk, got {other:?}"),
    }
    assert!(outcomes[1].is_success());

    server.verify().await;
}

#[tokio::test]
async fn test_halt_on_abandons_remaining_chunks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .and(body_string_contains("cmd_0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "ERROR_METHOD_NOT_FOUND"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .and(body_string_contains("cmd_50"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "result": {} } })),
        )
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(client);

    let error = executor.call_batch(&commands(75), true).await.unwrap_err();
    assert_eq!(error.code, "ERROR_METHOD_NOT_FOUND");

    server.verify().await;
}

#[tokio::test]
async fn test_halt_flag_mirrored_into_payload() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/batch.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "result": { "result": {} } })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store) = build_client(&server.uri());
    let executor = BatchExecutor::new(client);

    executor.call_batch(&commands(3), true).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["halt"], 1);
    assert_eq!(body["cmd"].as_object().unwrap().len(), 3);

    server.verify().await;
}
