use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Mutex as StdMutex,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout},
    sync::{mpsc, Mutex},
};
use tracing::{debug, warn};

use crate::error::{AgentError, Result};

/// A message body plus the opaque id the producer uses to match replies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub correlation_id: Option<String>,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(correlation_id: Option<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            correlation_id,
            body: body.into(),
        }
    }

    pub fn json(correlation_id: Option<String>, body: &Value) -> Result<Self> {
        Ok(Self::new(correlation_id, serde_json::to_vec(body)?))
    }

    /// Body parsed as JSON, or `None` for non-JSON bodies.
    pub fn body_json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// An inbound envelope waiting for acknowledgement.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub tag: u64,
    pub envelope: Envelope,
}

/// Queue transport the worker consumes from and publishes to.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Next inbound delivery; `Ok(None)` once the source is closed.
    async fn receive(&self) -> Result<Option<Delivery>>;

    /// Persistently publish one envelope to `queue`.
    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<()>;

    async fn ack(&self, tag: u64) -> Result<()>;
}

/// In-process broker backed by a tokio channel.
#[derive(Debug)]
pub struct MemoryBroker {
    sender: StdMutex<Option<mpsc::UnboundedSender<Envelope>>>,
    receiver: Mutex<mpsc::UnboundedReceiver<Envelope>>,
    next_tag: AtomicU64,
    published: StdMutex<Vec<(String, Envelope)>>,
    acked: StdMutex<Vec<u64>>,
    failing_publishes: AtomicUsize,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: StdMutex::new(Some(tx)),
            receiver: Mutex::new(rx),
            next_tag: AtomicU64::new(1),
            published: StdMutex::new(Vec::new()),
            acked: StdMutex::new(Vec::new()),
            failing_publishes: AtomicUsize::new(0),
        }
    }

    /// Enqueue an inbound envelope.
    pub fn push(&self, envelope: Envelope) -> Result<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| AgentError::Transport("memory broker lock poisoned".to_string()))?;
        let Some(sender) = guard.as_ref() else {
            return Err(AgentError::Transport("memory broker is closed".to_string()));
        };
        sender
            .send(envelope)
            .map_err(|_| AgentError::Transport("memory broker is closed".to_string()))
    }

    /// Stop accepting inbound envelopes; `receive` drains then returns `None`.
    pub fn close(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
    }

    /// Make the next `count` publishes fail with a transport error.
    pub fn fail_next_publishes(&self, count: usize) {
        self.failing_publishes.store(count, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, Envelope)> {
        self.published
            .lock()
            .map(|published| published.clone())
            .unwrap_or_default()
    }

    pub fn acked(&self) -> Vec<u64> {
        self.acked.lock().map(|acked| acked.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageBroker for MemoryBroker {
    async fn receive(&self) -> Result<Option<Delivery>> {
        let mut receiver = self.receiver.lock().await;
        Ok(receiver.recv().await.map(|envelope| Delivery {
            tag: self.next_tag.fetch_add(1, Ordering::SeqCst),
            envelope,
        }))
    }

    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<()> {
        let should_fail = self
            .failing_publishes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AgentError::Transport(format!(
                "publish to '{}' rejected",
                queue
            )));
        }

        self.published
            .lock()
            .map_err(|_| AgentError::Transport("memory broker lock poisoned".to_string()))?
            .push((queue.to_string(), envelope));
        Ok(())
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        self.acked
            .lock()
            .map_err(|_| AgentError::Transport("memory broker lock poisoned".to_string()))?
            .push(tag);
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct InboundLine {
    #[serde(default)]
    correlation_id: Option<String>,
    body: Option<Value>,
}

#[derive(Debug, Serialize)]
struct OutboundLine<'a> {
    queue: &'a str,
    correlation_id: Option<&'a str>,
    body: Value,
}

/// Broker speaking JSON lines: `{"correlation_id": "...", "body": {...}}` in,
/// `{"queue": "...", "correlation_id": "...", "body": {...}}` out.
///
/// A line that is not an envelope is delivered as a raw body without a
/// correlation id, so it still produces exactly one error result.
pub struct JsonLinesBroker<R, W> {
    lines: Mutex<Lines<R>>,
    writer: Mutex<W>,
    next_tag: AtomicU64,
}

pub type StdioBroker = JsonLinesBroker<BufReader<Stdin>, Stdout>;

impl StdioBroker {
    pub fn stdio() -> Self {
        JsonLinesBroker::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> JsonLinesBroker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            lines: Mutex::new(reader.lines()),
            writer: Mutex::new(writer),
            next_tag: AtomicU64::new(1),
        }
    }

    pub fn into_writer(self) -> W {
        self.writer.into_inner()
    }

    fn parse_line(line: &str) -> Envelope {
        match serde_json::from_str::<InboundLine>(line) {
            Ok(InboundLine {
                correlation_id,
                body: Some(Value::String(raw)),
            }) => Envelope::new(correlation_id, raw.into_bytes()),
            Ok(InboundLine {
                correlation_id,
                body: Some(body),
            }) => Envelope::new(correlation_id, body.to_string().into_bytes()),
            // a bare request object with no envelope around it
            Ok(InboundLine {
                correlation_id,
                body: None,
            }) => Envelope::new(correlation_id, line.as_bytes().to_vec()),
            Err(err) => {
                warn!(target: "itinerary::worker", error = %err, "inbound line is not an envelope");
                Envelope::new(None, line.as_bytes().to_vec())
            }
        }
    }
}

#[async_trait]
impl<R, W> MessageBroker for JsonLinesBroker<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn receive(&self) -> Result<Option<Delivery>> {
        let mut lines = self.lines.lock().await;
        loop {
            let Some(line) = lines
                .next_line()
                .await
                .map_err(|err| AgentError::Transport(format!("failed to read inbound line: {}", err)))?
            else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(Delivery {
                tag: self.next_tag.fetch_add(1, Ordering::SeqCst),
                envelope: Self::parse_line(line.trim()),
            }));
        }
    }

    async fn publish(&self, queue: &str, envelope: Envelope) -> Result<()> {
        let body = envelope
            .body_json()
            .unwrap_or_else(|| Value::String(String::from_utf8_lossy(&envelope.body).into_owned()));
        let mut line = serde_json::to_vec(&OutboundLine {
            queue,
            correlation_id: envelope.correlation_id.as_deref(),
            body,
        })?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|err| AgentError::Transport(format!("failed to write result: {}", err)))?;
        writer
            .flush()
            .await
            .map_err(|err| AgentError::Transport(format!("failed to flush result: {}", err)))
    }

    async fn ack(&self, tag: u64) -> Result<()> {
        debug!(target: "itinerary::worker", tag, "ack");
        Ok(())
    }
}
