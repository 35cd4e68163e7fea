//! Integration tests for the command pipeline
//!
//! Drives the conductor against a mock chat completions endpoint:
//! - transient provider failures are retried with exponential backoff
//! - malformed model output is rejected without side effects
//! - a slow provider degrades instead of hanging
//! - commands queued while unconfigured run once a key appears, including
//!   a key written to the credentials file of a running engine

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use lifeos_engine::conductor::{
    CommandOutcome, Conductor, GenerationError, PipelineError, RecordingClock, Scheduler,
};
use lifeos_engine::config::{Config, StorageBackend};
use lifeos_engine::db::{InMemoryStore, StateStore};
use lifeos_engine::secrets::{FileSecrets, MemorySecrets, OPENAI_API_KEY};
use sdk::types::StatusReport;

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.llm.base_url = server.uri();
    config.storage.backend = StorageBackend::Memory;
    config
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

const ADD_MILK: &str =
    r#"{"intent":"add_task","actions":[{"type":"ADD_TASK","value":"buy milk"}]}"#;

#[tokio::test]
async fn test_rate_limited_provider_is_retried_with_backoff() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(ADD_MILK)))
        .with_priority(2)
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-test"));
    let clock = Arc::new(RecordingClock::new());
    let conductor =
        Conductor::from_config_with_clock(&config_for(&server), store.clone(), secrets, clock.clone());

    let outcome = conductor.submit("add task: buy milk").await.unwrap();
    let CommandOutcome::Executed(execution) = outcome else {
        panic!("expected the command to execute");
    };

    assert_eq!(execution.intent, "add_task");
    assert_eq!(execution.result, vec!["Task added: buy milk".to_string()]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 4, "three rate-limited attempts plus one success");
    assert_eq!(
        clock.sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );

    // Request body is a JSON-mode chat completion ending with the command
    let body: serde_json::Value = serde_json::from_slice(&requests[3].body).unwrap();
    assert_eq!(body["response_format"]["type"], "json_object");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert!(messages
        .last()
        .unwrap()["content"]
        .as_str()
        .unwrap()
        .contains("add task: buy milk"));

    let tasks = store.list_tasks().await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "buy milk");
    assert_eq!(store.memory_count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_exhausted_retries_surface_provider_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-test"));
    let clock = Arc::new(RecordingClock::new());
    let conductor =
        Conductor::from_config_with_clock(&config_for(&server), store.clone(), secrets, clock.clone());

    let err = conductor.submit("plan my week").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Generation(GenerationError::Provider { attempts: 5, .. })
    ));

    assert_eq!(server.received_requests().await.unwrap().len(), 5);
    let total: Duration = clock.sleeps().iter().sum();
    assert!(total <= Duration::from_secs(31));
    assert_eq!(store.memory_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_unauthorized_provider_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-wrong"));
    let clock = Arc::new(RecordingClock::new());
    let conductor =
        Conductor::from_config_with_clock(&config_for(&server), store, secrets, clock.clone());

    let err = conductor.submit("plan my week").await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_non_json_answer_is_rejected_with_raw_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion("Sure! I added that for you.")),
        )
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-test"));
    let conductor = Conductor::from_config(&config_for(&server), store.clone(), secrets);

    let err = conductor.submit("add task: buy milk").await.unwrap_err();
    match err {
        PipelineError::Invalid(e) => {
            assert_eq!(e.to_string(), "AI did not return valid JSON");
            assert_eq!(e.raw(), "Sure! I added that for you.");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert!(store.list_tasks().await.unwrap().is_empty());
    assert_eq!(store.memory_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_slow_provider_times_out_and_status_degrades() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion(ADD_MILK))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.llm.timeout_secs = 1;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-test"));
    let clock = Arc::new(RecordingClock::new());
    let conductor = Conductor::from_config_with_clock(&config, store.clone(), secrets, clock.clone());

    let err = conductor.submit("add task: buy milk").await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Generation(GenerationError::Timeout(_))
    ));
    assert!(clock.sleeps().is_empty(), "timeouts are not retried");

    let report = conductor.status().await;
    assert_eq!(report.score, StatusReport::NEUTRAL_SCORE);
    assert!(report.insight.starts_with("AI generation unavailable"));
    assert!(report.pending_actions.is_empty());
    assert!(store.recent_history(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_scores_ingested_metrics() {
    let server = MockServer::start().await;

    let answer = json!({
        "score": 72,
        "health_index": "80",
        "wealth_index": 140,
        "focus_index": 55,
        "insight": "Sleep is solid, spending is high.",
        "pending_actions": [
            { "action_type": "FINANCE_SWEEP", "target": "200", "priority": "high" }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(&answer.to_string())))
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new().with(OPENAI_API_KEY, "sk-test"));
    let conductor = Conductor::from_config(&config_for(&server), store.clone(), secrets);

    let mut metrics = serde_json::Map::new();
    metrics.insert("sleep_hours".to_string(), json!(7.5));
    metrics.insert("mood".to_string(), json!("good"));
    conductor.ingest(metrics).await.unwrap();

    let report = conductor.status().await;
    assert_eq!(report.score, 72);
    assert_eq!(report.health_index, 80);
    assert_eq!(report.wealth_index, 100, "indices are clamped to 0..=100");
    assert_eq!(report.pending_actions.len(), 1);
    assert_eq!(report.pending_actions[0].action_type, "FINANCE_SWEEP");

    // The snapshot reached the model
    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let prompt = body["messages"].as_array().unwrap().last().unwrap()["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(prompt.contains("sleep_hours: 7.5"));
    assert!(prompt.contains("mood: good"));

    let history = store.recent_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].score, 72);
}

#[tokio::test]
async fn test_queued_command_drains_once_key_is_set() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(ADD_MILK)))
        .mount(&server)
        .await;

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let secrets = Arc::new(MemorySecrets::new());
    let conductor = Arc::new(Conductor::from_config(
        &config_for(&server),
        store.clone(),
        secrets.clone(),
    ));

    let outcome = conductor.submit("add task: buy milk").await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Queued(_)));
    assert_eq!(conductor.queue().len().await, 1);

    // Nothing happens while the key is missing
    let handle = Scheduler::new(conductor.clone(), Duration::from_millis(50)).spawn();
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(conductor.queue().len().await, 1);
    assert!(server.received_requests().await.unwrap().is_empty());

    secrets.set(OPENAI_API_KEY, "sk-test");

    let mut drained = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if conductor.queue().is_empty().await {
            drained = true;
            break;
        }
    }
    handle.stop().await;

    assert!(drained, "scheduler should drain the queue once configured");
    assert_eq!(store.list_tasks().await.unwrap().len(), 1);
    assert_eq!(store.memory_count().await.unwrap(), 1);
    assert!(conductor.queue().dead_letters().await.is_empty());
}

#[tokio::test]
async fn test_key_written_to_credentials_file_drains_queue() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("Authorization", "Bearer sk-from-file"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(ADD_MILK)))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&server);
    config.core.data_dir = dir.path().to_path_buf();

    let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
    let conductor = Conductor::from_config(
        &config,
        store.clone(),
        Arc::new(FileSecrets::new(config.credentials_path())),
    );

    let outcome = conductor.submit("add task: buy milk").await.unwrap();
    assert!(matches!(outcome, CommandOutcome::Queued(_)));
    assert!(conductor.drain_queue().await.is_idle());

    std::fs::write(
        config.credentials_path(),
        "OPENAI_API_KEY = \"sk-from-file\"\n",
    )
    .unwrap();

    let report = conductor.drain_queue().await;
    assert_eq!(report.processed, 1);
    assert!(conductor.queue().is_empty().await);
    assert_eq!(store.list_tasks().await.unwrap()[0].title, "buy milk");
}
