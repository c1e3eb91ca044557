//! Operational helpers: logging and the in-memory event journal.

use std::{collections::VecDeque, sync::Arc};

use buzzer_types::{
    config::OpsConfig,
    events::{EventKind, SystemEvent},
    BuzzerError, Result,
};
use futures::{stream::BoxStream, StreamExt};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| BuzzerError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| BuzzerError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Bounded in-memory record of recently dispatched events. Oldest entries
/// are evicted first; nothing is persisted.
#[derive(Clone)]
pub struct EventJournal {
    capacity: usize,
    events: Arc<Mutex<VecDeque<SystemEvent>>>,
}

impl EventJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    pub async fn record_event(&self, event: SystemEvent) {
        let mut events = self.events.lock().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    pub async fn snapshot_events(&self) -> Vec<SystemEvent> {
        self.events.lock().await.iter().cloned().collect()
    }

    pub async fn count_kind(&self, kind: EventKind) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.kind == kind)
            .count()
    }

    /// Drains `stream` into the journal on a background task.
    pub fn attach(&self, mut stream: BoxStream<'static, SystemEvent>) -> JoinHandle<()> {
        let journal = self.clone();
        tokio::spawn(async move {
            info!("event journal attached (capacity {})", journal.capacity);
            while let Some(event) = stream.next().await {
                debug!("journal <- {:?}", event.kind);
                journal.record_event(event).await;
            }
            info!("event journal detached");
        })
    }
}
