//! Bridges the process-wide log facility into a per-request line queue.
//!
//! Producers emit log lines through `tracing` (or push directly through a [`LogSender`]).
//! The [`BridgeLayer`] renders each event as plain text and hands it to every sink
//! registered in its [`SinkRegistry`]. A [`LogBridge`] is one such sink: an unbounded
//! FIFO with a single consumer that pulls lines as they arrive.
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use futures::Stream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::field::{Field, Visit};
use tracing_subscriber::layer::Context;
use tracing_subscriber::Layer;

/// Write endpoint of a [`LogBridge`]; cheap to clone and safe to use from any thread
#[derive(Debug, Clone)]
pub struct LogSender {
    tx: UnboundedSender<String>,
}

impl LogSender {
    /// Enqueue a line without blocking. Returns false once the consumer is gone.
    pub fn push<S: Into<String>>(&self, line: S) -> bool {
        self.tx.send(line.into()).is_ok()
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    sinks: RwLock<HashMap<u64, LogSender>>,
}

/// Set of destinations that receive every line routed through the log facility
#[derive(Clone, Default)]
pub struct SinkRegistry {
    inner: Arc<RegistryInner>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, sink: LogSender) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .sinks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, sink);
        id
    }

    fn deregister(&self, id: u64) {
        self.inner
            .sinks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Deliver a line to every registered sink, pruning sinks whose consumer is gone
    pub fn dispatch(&self, line: &str) {
        let mut dead = Vec::new();
        {
            let sinks = self.inner.sinks.read().unwrap_or_else(|e| e.into_inner());
            for (id, sink) in sinks.iter() {
                if !sink.push(line) {
                    dead.push(*id);
                }
            }
        }
        for id in dead {
            self.deregister(id);
        }
    }

    pub fn sink_count(&self) -> usize {
        self.inner
            .sinks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|sink| !sink.is_closed())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.sink_count() == 0
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("sinks", &self.sink_count())
            .finish()
    }
}

/// Live registration of a sink; deregisters when dropped
struct Registration {
    registry: SinkRegistry,
    id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.registry.deregister(self.id);
    }
}

/// Unbounded FIFO of log lines with a single consumer
pub struct LogBridge {
    tx: LogSender,
    rx: UnboundedReceiver<String>,
    registration: Option<Registration>,
}

impl Default for LogBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBridge {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx: LogSender { tx },
            rx,
            registration: None,
        }
    }

    /// Register this bridge as a sink of `registry` until [`LogBridge::detach`] is called
    /// or the bridge is dropped. Attaching again replaces the previous registration.
    pub fn attach(&mut self, registry: &SinkRegistry) {
        let id = registry.register(self.tx.clone());
        self.registration = Some(Registration {
            registry: registry.clone(),
            id,
        });
    }

    pub fn detach(&mut self) {
        self.registration.take();
    }

    pub fn is_attached(&self) -> bool {
        self.registration.is_some()
    }

    pub fn sender(&self) -> LogSender {
        self.tx.clone()
    }

    pub fn push<S: Into<String>>(&self, line: S) {
        // the bridge owns its receiver, so this cannot fail while `self` is alive
        let _ = self.tx.push(line);
    }

    /// Wait for the next line. The bridge holds a sender of its own, so this only
    /// returns `None` if the channel is explicitly closed.
    pub async fn next_line(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Pull a buffered line without waiting
    pub fn try_next_line(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }

    /// Lines in arrival order as an endless stream
    pub fn produce(&mut self) -> impl Stream<Item = String> + '_ {
        async_stream::stream! {
            while let Some(line) = self.rx.recv().await {
                yield line;
            }
        }
    }
}

/// Renders `tracing` events as plain text lines and dispatches them to a [`SinkRegistry`]
#[derive(Debug, Clone)]
pub struct BridgeLayer {
    registry: SinkRegistry,
}

impl BridgeLayer {
    pub fn new(registry: SinkRegistry) -> Self {
        Self { registry }
    }
}

impl<S> Layer<S> for BridgeLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if self.registry.is_empty() {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.registry.dispatch(&visitor.finish());
    }
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}
