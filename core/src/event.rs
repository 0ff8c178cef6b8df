//! Event bus: pub/sub notifications for run and step lifecycle transitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock as AsyncRwLock;
use tracing::{error, warn};
use uuid::Uuid;

/// Lifecycle events published by the engine, scheduler, and job queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    RunStarted { run_id: Uuid, pipeline_id: String },
    StepStarted { run_id: Uuid, step: String },
    StepCompleted { run_id: Uuid, step: String },
    StepFailed { run_id: Uuid, step: String, message: String },
    RunCompleted { run_id: Uuid, status: String },
    RunCancelled { run_id: Uuid },
    JobQueued { job_id: Uuid },
    JobStarted { job_id: Uuid },
    JobCompleted { job_id: Uuid },
    SchedulerTick { due_job_count: usize },
    PluginRegistered { reference: String },
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::RunStarted { .. } => "run_started",
            Event::StepStarted { .. } => "step_started",
            Event::StepCompleted { .. } => "step_completed",
            Event::StepFailed { .. } => "step_failed",
            Event::RunCompleted { .. } => "run_completed",
            Event::RunCancelled { .. } => "run_cancelled",
            Event::JobQueued { .. } => "job_queued",
            Event::JobStarted { .. } => "job_started",
            Event::JobCompleted { .. } => "job_completed",
            Event::SchedulerTick { .. } => "scheduler_tick",
            Event::PluginRegistered { .. } => "plugin_registered",
        }
    }
}

pub type Handler = Arc<dyn Fn(Event) -> futures_lite_fut::BoxFuture + Send + Sync>;

/// Small local stand-in for `futures::future::BoxFuture` so this crate
/// doesn't need to pull in the whole `futures` crate for one alias.
pub mod futures_lite_fut {
    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
}

struct Subscription {
    event_type: String,
    handler: Handler,
    lock: AsyncMutex<()>,
}

/// Handler-callback pub/sub bus. Each subscription serializes its own
/// handler invocations (so a slow handler doesn't see events out of order)
/// while independent subscriptions dispatch concurrently.
///
/// Grounded on the subscribe/unsubscribe shape of an event bus used
/// elsewhere in the corpus for plugin-to-plugin notifications, adapted here
/// to key on event type rather than topic string.
#[derive(Clone)]
pub struct EventBus {
    subscriptions: Arc<AsyncRwLock<HashMap<u64, Arc<Subscription>>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Arc::new(AsyncRwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Subscribe a handler to a specific event type (e.g. `"step_failed"`),
    /// returning an opaque subscription id for later `unsubscribe`.
    pub async fn subscribe(&self, event_type: impl Into<String>, handler: Handler) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let subscription = Arc::new(Subscription {
            event_type: event_type.into(),
            handler,
            lock: AsyncMutex::new(()),
        });
        self.subscriptions.write().await.insert(id, subscription);
        id
    }

    pub async fn unsubscribe(&self, subscription_id: u64) -> bool {
        self.subscriptions.write().await.remove(&subscription_id).is_some()
    }

    /// Publish an event to every matching subscription. Each dispatch runs
    /// on its own task so one handler's latency never blocks another's;
    /// panics are caught by the supervising `JoinHandle` and logged, never
    /// propagated to the publisher.
    pub async fn publish(&self, event: Event) {
        let event_type = event.event_type();
        let matching: Vec<Arc<Subscription>> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| s.event_type == event_type)
            .cloned()
            .collect();

        for subscription in matching {
            let event = event.clone();
            tokio::spawn(async move {
                let _guard = subscription.lock.lock().await;
                let fut = (subscription.handler)(event);
                if let Err(join_err) = tokio::spawn(fut).await {
                    error!(error = %join_err, "event handler panicked");
                }
            });
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience used by publishers that want to fire-and-forget without
/// awaiting dispatch completion (e.g. the engine between steps).
pub fn spawn_publish(bus: EventBus, event: Event) {
    tokio::spawn(async move {
        bus.publish(event).await;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn counting_handler(counter: Arc<AtomicUsize>) -> Handler {
        Arc::new(move |_event| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        })
    }

    #[tokio::test]
    async fn publish_invokes_matching_subscribers() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("run_completed", counting_handler(counter.clone())).await;
        bus.publish(Event::RunCompleted {
            run_id: Uuid::new_v4(),
            status: "succeeded".to_string(),
        })
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_matching_event_type_is_ignored() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        bus.subscribe("run_completed", counting_handler(counter.clone())).await;
        bus.publish(Event::RunCancelled { run_id: Uuid::new_v4() }).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsubscribe_stops_future_dispatch() {
        let bus = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let id = bus.subscribe("run_cancelled", counting_handler(counter.clone())).await;
        bus.unsubscribe(id).await;
        bus.publish(Event::RunCancelled { run_id: Uuid::new_v4() }).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_affect_other_subscribers() {
        let bus = EventBus::new();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let panicking: Handler = Arc::new(|_event| Box::pin(async move { panic!("boom") }));
        bus.subscribe("run_cancelled", panicking).await;

        let order_clone = order.clone();
        let ok_handler: Handler = Arc::new(move |_event| {
            let order = order_clone.clone();
            Box::pin(async move {
                order.lock().unwrap().push("ran");
            })
        });
        bus.subscribe("run_cancelled", ok_handler).await;

        bus.publish(Event::RunCancelled { run_id: Uuid::new_v4() }).await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(*order.lock().unwrap(), vec!["ran"]);
    }
}
