mod support;

use std::{sync::Arc, time::Duration};

use itinerary_swarm::{
    config::{PlannerSettings, WorkerConfig},
    worker::{Consumer, Envelope, HealthMonitor, JsonLinesBroker, MemoryBroker},
    CapabilitySet, OrchestrationEngine,
};
use serde_json::{json, Value};
use support::{delegate, kyoto_itinerary, kyoto_request, submit, ScriptedBackend};

fn worker_config() -> WorkerConfig {
    let mut config = WorkerConfig::new("test-key");
    config.retry_backoff = Duration::from_millis(1);
    config
}

fn scripted_engine(backend: &Arc<ScriptedBackend>) -> Arc<OrchestrationEngine> {
    Arc::new(OrchestrationEngine::new(
        backend.clone(),
        CapabilitySet::unavailable("offline"),
        PlannerSettings::default(),
    ))
}

fn kyoto_backend() -> Arc<ScriptedBackend> {
    ScriptedBackend::new(vec![
        delegate("c1", "attractions", "Temples for day 1"),
        submit("c2", kyoto_itinerary()),
    ])
    .into_handle()
}

fn body(envelope: &Envelope) -> Value {
    serde_json::from_slice(&envelope.body).unwrap()
}

#[tokio::test]
async fn every_job_gets_exactly_one_result_with_its_correlation_id() {
    let backend = kyoto_backend();
    let broker = Arc::new(MemoryBroker::new());
    let health = HealthMonitor::new();
    health.set_engine_initialized(true);

    let consumer = Consumer::new(
        broker.clone(),
        scripted_engine(&backend),
        health.clone(),
        &worker_config(),
    );

    broker
        .push(Envelope::json(Some("job-1".to_string()), &kyoto_request()).unwrap())
        .unwrap();
    broker
        .push(Envelope::json(Some("job-2".to_string()), &json!({ "duration_days": 3 })).unwrap())
        .unwrap();
    broker.close();

    consumer.run().await.unwrap();

    let published = broker.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].1.correlation_id.as_deref(), Some("job-1"));
    assert_eq!(published[1].1.correlation_id.as_deref(), Some("job-2"));

    let itinerary = body(&published[0].1);
    assert_eq!(itinerary["destination"], "Kyoto, Japan");
    assert_eq!(itinerary["days"].as_array().unwrap().len(), 2);

    let failure = body(&published[1].1);
    assert_eq!(
        failure["error"],
        "Input validation error: Invalid request format or missing 'destination'."
    );
    assert_eq!(broker.acked(), vec![1, 2]);

    let report = health.report();
    assert!(report.engine_initialized);
    assert!(!report.consumer_alive);
    assert_eq!(report.status, "ERROR");
}

#[tokio::test]
async fn invalid_requests_make_no_model_calls() {
    let backend = kyoto_backend();
    let broker = Arc::new(MemoryBroker::new());
    let consumer = Consumer::new(
        broker.clone(),
        scripted_engine(&backend),
        HealthMonitor::new(),
        &worker_config(),
    );

    for body in [
        json!({ "destination": "Kyoto" }),
        json!({ "destination": "Kyoto", "startDate": "2025-04-03", "endDate": "2025-04-01" }),
        json!({ "destination": "  ", "duration_days": 2 }),
        json!(["not", "an", "object"]),
    ] {
        broker.push(Envelope::json(None, &body).unwrap()).unwrap();
    }
    broker.close();
    consumer.run().await.unwrap();

    assert_eq!(backend.total_calls(), 0);
    let published = broker.published();
    assert_eq!(published.len(), 4);
    for (_, envelope) in &published {
        assert!(body(envelope)["error"]
            .as_str()
            .unwrap()
            .starts_with("Input validation error"));
    }
}

#[tokio::test]
async fn json_lines_worker_answers_each_line() {
    let backend = kyoto_backend();
    let input = format!(
        "{}\n{}\n",
        json!({ "correlation_id": "abc", "body": kyoto_request() }),
        "{broken"
    );
    let broker = Arc::new(JsonLinesBroker::new(
        std::io::Cursor::new(input.into_bytes()),
        Vec::new(),
    ));

    let consumer = Consumer::new(
        broker.clone(),
        scripted_engine(&backend),
        HealthMonitor::new(),
        &worker_config(),
    );
    consumer.run().await.unwrap();
    drop(consumer);

    let Some(broker) = Arc::into_inner(broker) else {
        panic!("broker still shared");
    };
    let output = String::from_utf8(broker.into_writer()).unwrap();
    let lines: Vec<Value> = output
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["queue"], "results");
    assert_eq!(lines[0]["correlation_id"], "abc");
    assert_eq!(lines[0]["body"]["destination"], "Kyoto, Japan");
    assert!(lines[1]["correlation_id"].is_null());
    assert!(lines[1]["body"]["error"]
        .as_str()
        .unwrap()
        .starts_with("Failed to decode message"));
}
