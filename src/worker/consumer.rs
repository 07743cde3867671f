use std::{sync::Arc, time::Duration};

use tracing::{error, info, warn};

use super::{
    broker::{Delivery, Envelope, MessageBroker},
    health::HealthMonitor,
};
use crate::{
    config::WorkerConfig,
    error::{AgentError, Result},
    orchestration::ItineraryPlanner,
    planning::TravelRequest,
};

/// Consumes planning jobs one at a time and answers each with exactly one
/// result message on the results queue.
pub struct Consumer {
    broker: Arc<dyn MessageBroker>,
    planner: Arc<dyn ItineraryPlanner>,
    health: HealthMonitor,
    results_queue: String,
    retry_backoff: Duration,
    publish_attempts: u32,
}

impl Consumer {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        planner: Arc<dyn ItineraryPlanner>,
        health: HealthMonitor,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            broker,
            planner,
            health,
            results_queue: config.results_queue.clone(),
            retry_backoff: config.retry_backoff,
            publish_attempts: config.publish_attempts.max(1),
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    /// Run until the broker reports that its source is closed.
    ///
    /// Receive failures are retried indefinitely with the fixed backoff.
    pub async fn run(&self) -> Result<()> {
        self.health.set_consumer_alive(true);
        info!(target: "itinerary::worker", queue = %self.results_queue, "consumer started");

        loop {
            match self.broker.receive().await {
                Ok(Some(delivery)) => {
                    self.health.set_consumer_alive(true);
                    self.process(delivery).await;
                }
                Ok(None) => break,
                Err(err) => {
                    self.health.set_consumer_alive(false);
                    warn!(
                        target: "itinerary::worker",
                        error = %err,
                        delay_secs = self.retry_backoff.as_secs_f64(),
                        "receive failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
            }
        }

        self.health.set_consumer_alive(false);
        info!(target: "itinerary::worker", "consumer stopped");
        Ok(())
    }

    /// Plan one delivery, publish its single result, then ack.
    pub async fn process(&self, delivery: Delivery) {
        let Delivery { tag, envelope } = delivery;
        let correlation_id = envelope.correlation_id.clone();
        info!(
            target: "itinerary::worker",
            tag,
            correlation_id = correlation_id.as_deref().unwrap_or("-"),
            "job received"
        );

        let body = self.handle_body(&envelope.body).await;
        let reply = Envelope::new(correlation_id.clone(), body);

        if let Err(err) = self.publish_with_retry(reply).await {
            error!(
                target: "itinerary::worker",
                tag,
                correlation_id = correlation_id.as_deref().unwrap_or("-"),
                error = %err,
                "result could not be published; acknowledging anyway"
            );
        }

        if let Err(err) = self.broker.ack(tag).await {
            error!(target: "itinerary::worker", tag, error = %err, "ack failed");
        }
    }

    /// Result body for one inbound body: the itinerary JSON or an error object.
    pub async fn handle_body(&self, body: &[u8]) -> Vec<u8> {
        let payload = match self.plan(body).await {
            Ok(itinerary) => itinerary,
            Err(err) => {
                warn!(
                    target: "itinerary::worker",
                    code = err.error_code(),
                    error = %err,
                    "job failed"
                );
                err.to_job_result()
            }
        };

        serde_json::to_vec(&payload).unwrap_or_else(|err| {
            AgentError::Serialization(err)
                .to_job_result()
                .to_string()
                .into_bytes()
        })
    }

    async fn plan(&self, body: &[u8]) -> Result<serde_json::Value> {
        let request = TravelRequest::from_json_slice(body)?;
        let outcome = self.planner.plan(&request).await?;
        Ok(serde_json::to_value(&outcome.itinerary)?)
    }

    async fn publish_with_retry(&self, envelope: Envelope) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self
                .broker
                .publish(&self.results_queue, envelope.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(err) if attempt < self.publish_attempts => {
                    warn!(
                        target: "itinerary::worker",
                        attempt,
                        max_attempts = self.publish_attempts,
                        error = %err,
                        "publish failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
