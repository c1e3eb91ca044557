//! Single-writer race engine and the handle collaborators talk to.
//!
//! Start, stop, press, admission and removal commands all travel through one
//! bounded queue and are applied in arrival order by one task. A `stop`
//! therefore takes effect for every press queued behind it. Notification
//! metrics are partitioned per device and updated on the caller's task.

mod engine;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use buzzer_metrics::NotificationMetrics;
use buzzer_network::EventDispatcher;
use buzzer_registry::{Admission, ConnectionRegistry, RegistrySnapshot};
use buzzer_types::{
    config::BuzzerConfig,
    device::{DeviceAddress, Participant},
    events::EventPayload,
    press::{PressEvent, RaceStatus, RankedEntry},
    telemetry::RateSample,
    BuzzerError, Result,
};
use engine::{EngineCommand, RaceEngine};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};
use tracing::{info, trace};

/// Inbound command surface used by the web and GUI layers.
#[async_trait]
pub trait RaceControl: Send + Sync {
    async fn start_race(&self) -> Result<()>;
    async fn stop_race(&self) -> Result<()>;
    async fn query_order(&self) -> Result<Vec<RankedEntry>>;
    async fn configure_allowed_names(&self, names: Vec<String>) -> Result<()>;
}

/// Cloneable front door to a running race engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
    registry: watch::Receiver<RegistrySnapshot>,
    metrics: Arc<NotificationMetrics>,
    dispatcher: Arc<dyn EventDispatcher>,
    epoch: Instant,
}

/// Spawns the engine task and returns a handle to it.
pub fn spawn_engine(
    config: &BuzzerConfig,
    dispatcher: Arc<dyn EventDispatcher>,
) -> Result<(EngineHandle, JoinHandle<()>)> {
    let registry = ConnectionRegistry::new(&config.registry)?;
    let metrics = Arc::new(NotificationMetrics::new(config.metrics.buffer_size));
    let (snapshot_tx, snapshot_rx) = watch::channel(registry.snapshot());
    let (tx, rx) = mpsc::channel(config.engine.command_queue.max(1));

    let engine = RaceEngine::new(
        registry,
        Arc::clone(&metrics),
        Arc::clone(&dispatcher),
        snapshot_tx,
    );
    let task = tokio::spawn(engine.run(rx));
    info!(
        "race engine spawned (capacity {}, window {})",
        config.registry.max_participants, config.metrics.buffer_size
    );

    let handle = EngineHandle {
        tx,
        registry: snapshot_rx,
        metrics,
        dispatcher,
        epoch: Instant::now(),
    };
    Ok((handle, task))
}

impl EngineHandle {
    /// Seconds since the handle was created, on a monotonic clock.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    pub async fn admit(&self, address: impl Into<DeviceAddress>, name: &str) -> Result<Admission> {
        let address = address.into();
        let name = name.to_string();
        let result = self
            .request(|reply| EngineCommand::Admit {
                address,
                name,
                reply,
            })
            .await?;
        Ok(result?)
    }

    pub async fn remove(&self, address: impl Into<DeviceAddress>) -> Result<Option<Participant>> {
        let address = address.into();
        self.request(|reply| EngineCommand::Remove { address, reply })
            .await
    }

    /// Enqueues an already-decoded press for arbitration.
    pub async fn press(&self, event: PressEvent) -> Result<()> {
        self.tx
            .send(EngineCommand::Press(event))
            .await
            .map_err(|_| not_running())
    }

    /// Raw device notification: updates signal metrics and, when the
    /// payload carries a button id, forwards the press.
    ///
    /// Calls for one address must not overlap: a device delivers its
    /// notifications one at a time, and `rate_updated` is published after
    /// the window is updated, so overlapping calls could publish out of order.
    pub async fn notify(
        &self,
        address: impl Into<DeviceAddress>,
        payload: &[u8],
        timestamp: f64,
    ) -> Result<()> {
        let address = address.into();
        let snapshot = self.registry.borrow().clone();
        match self.metrics.observe(&snapshot, &address, timestamp) {
            Some(sample) => {
                self.dispatcher
                    .emit(EventPayload::RateUpdated(sample))
                    .await?
            }
            None => trace!("notification from unadmitted {}", address),
        }
        match PressEvent::from_payload(address, payload, timestamp) {
            Some(event) => self.press(event).await,
            None => Ok(()),
        }
    }

    /// Same as [`notify`](Self::notify), stamped with [`now`](Self::now).
    pub async fn notify_now(&self, address: impl Into<DeviceAddress>, payload: &[u8]) -> Result<()> {
        let timestamp = self.now();
        self.notify(address, payload, timestamp).await
    }

    /// Restarts signal monitoring for a device.
    pub fn start_monitoring(&self, address: impl Into<DeviceAddress>) {
        self.metrics.reset(&address.into());
    }

    pub fn rate_ranking(&self) -> Vec<RateSample> {
        self.metrics.rank_all()
    }

    pub fn rate_of(&self, address: impl Into<DeviceAddress>) -> Option<RateSample> {
        self.metrics.sample(&address.into())
    }

    pub async fn status(&self) -> Result<RaceStatus> {
        self.request(EngineCommand::Status).await
    }

    pub async fn participants(&self) -> Result<Vec<Participant>> {
        self.request(EngineCommand::Participants).await
    }

    /// Clears all state and ends the engine task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(EngineCommand::Shutdown).await
    }

    pub fn dispatcher(&self) -> Arc<dyn EventDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> EngineCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx.send(build(reply)).await.map_err(|_| not_running())?;
        response.await.map_err(|_| not_running())
    }
}

#[async_trait]
impl RaceControl for EngineHandle {
    async fn start_race(&self) -> Result<()> {
        self.request(EngineCommand::Start).await
    }

    async fn stop_race(&self) -> Result<()> {
        self.request(EngineCommand::Stop).await
    }

    async fn query_order(&self) -> Result<Vec<RankedEntry>> {
        self.request(EngineCommand::QueryOrder).await
    }

    async fn configure_allowed_names(&self, names: Vec<String>) -> Result<()> {
        let result = self
            .request(|reply| EngineCommand::ConfigureAllowedNames { names, reply })
            .await?;
        Ok(result?)
    }
}

pub fn engine_error(message: impl Into<String>) -> BuzzerError {
    BuzzerError::Engine(message.into())
}

fn not_running() -> BuzzerError {
    engine_error("race engine is not running")
}
