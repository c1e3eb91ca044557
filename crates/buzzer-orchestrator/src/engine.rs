use std::sync::Arc;

use buzzer_arbiter::{RaceArbiter, RecordOutcome};
use buzzer_metrics::NotificationMetrics;
use buzzer_network::EventDispatcher;
use buzzer_registry::{Admission, ConnectionRegistry, RegistrySnapshot};
use buzzer_types::{
    device::{DeviceAddress, Participant},
    events::{AdmissionErrorEvent, EventPayload},
    press::{PressEvent, RaceState, RaceStatus, RankedEntry},
    AdmissionError,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

pub(crate) type Reply<T> = oneshot::Sender<T>;

/// Everything that mutates race or registry state goes through this queue.
#[derive(Debug)]
pub(crate) enum EngineCommand {
    Start(Reply<()>),
    Stop(Reply<()>),
    Press(PressEvent),
    Admit {
        address: DeviceAddress,
        name: String,
        reply: Reply<Result<Admission, AdmissionError>>,
    },
    Remove {
        address: DeviceAddress,
        reply: Reply<Option<Participant>>,
    },
    ConfigureAllowedNames {
        names: Vec<String>,
        reply: Reply<Result<(), AdmissionError>>,
    },
    QueryOrder(Reply<Vec<RankedEntry>>),
    Status(Reply<RaceStatus>),
    Participants(Reply<Vec<Participant>>),
    Shutdown(Reply<()>),
}

/// Single owner of the arbiter and the registry.
pub(crate) struct RaceEngine {
    arbiter: RaceArbiter,
    registry: ConnectionRegistry,
    metrics: Arc<NotificationMetrics>,
    dispatcher: Arc<dyn EventDispatcher>,
    snapshot_tx: watch::Sender<RegistrySnapshot>,
}

impl RaceEngine {
    pub(crate) fn new(
        registry: ConnectionRegistry,
        metrics: Arc<NotificationMetrics>,
        dispatcher: Arc<dyn EventDispatcher>,
        snapshot_tx: watch::Sender<RegistrySnapshot>,
    ) -> Self {
        Self {
            arbiter: RaceArbiter::new(),
            registry,
            metrics,
            dispatcher,
            snapshot_tx,
        }
    }

    pub(crate) async fn run(mut self, mut rx: mpsc::Receiver<EngineCommand>) {
        info!("race engine running");
        while let Some(command) = rx.recv().await {
            if !self.handle(command).await {
                break;
            }
        }
        info!("race engine stopped");
    }

    /// Returns `false` once the engine should exit.
    async fn handle(&mut self, command: EngineCommand) -> bool {
        match command {
            EngineCommand::Start(reply) => {
                let notifications = self.arbiter.start();
                self.broadcast(notifications).await;
                let _ = reply.send(());
            }
            EngineCommand::Stop(reply) => {
                let notifications = self.arbiter.stop();
                self.broadcast(notifications).await;
                let _ = reply.send(());
            }
            EngineCommand::Press(event) => {
                if let RecordOutcome::Accepted(notifications) =
                    self.arbiter.record(&self.registry, event)
                {
                    self.broadcast(notifications).await;
                }
            }
            EngineCommand::Admit {
                address,
                name,
                reply,
            } => {
                let result = self.registry.admit(address.clone(), &name);
                match &result {
                    Ok(Admission::Admitted(participant)) => {
                        self.publish_snapshot();
                        self.metrics.track(&participant.address);
                        self.broadcast(vec![EventPayload::DeviceAdmitted(participant.clone())])
                            .await;
                    }
                    Ok(Admission::AlreadyAdmitted(_)) => {}
                    Err(reason) => {
                        self.report_admission_error(Some(address), reason.clone())
                            .await;
                    }
                }
                let _ = reply.send(result);
            }
            EngineCommand::Remove { address, reply } => {
                let removed = self.registry.remove(&address);
                if removed.is_some() {
                    self.publish_snapshot();
                    self.metrics.clear(&address);
                    self.broadcast(vec![EventPayload::DeviceRemoved(address)])
                        .await;
                }
                let _ = reply.send(removed);
            }
            EngineCommand::ConfigureAllowedNames { names, reply } => {
                let result = self.registry.configure_allowed_names(names);
                if let Err(reason) = &result {
                    self.report_admission_error(None, reason.clone()).await;
                }
                let _ = reply.send(result);
            }
            EngineCommand::QueryOrder(reply) => {
                let _ = reply.send(self.arbiter.current_order());
            }
            EngineCommand::Status(reply) => {
                let _ = reply.send(self.arbiter.status());
            }
            EngineCommand::Participants(reply) => {
                let _ = reply.send(self.registry.participants());
            }
            EngineCommand::Shutdown(reply) => {
                if self.arbiter.state() == RaceState::Active {
                    let notifications = self.arbiter.stop();
                    self.broadcast(notifications).await;
                }
                self.arbiter.reset();
                self.registry.clear();
                self.publish_snapshot();
                self.metrics.clear_all();
                info!("race engine cleaned up");
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn report_admission_error(
        &self,
        address: Option<DeviceAddress>,
        reason: AdmissionError,
    ) {
        warn!("admission error: {}", reason);
        self.broadcast(vec![EventPayload::AdmissionError(AdmissionErrorEvent {
            address,
            reason,
        })])
        .await;
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(self.registry.snapshot());
    }

    async fn broadcast(&self, notifications: Vec<EventPayload>) {
        for payload in notifications {
            debug!("emitting {:?}", payload.kind());
            if let Err(err) = self.dispatcher.emit(payload).await {
                warn!("dispatch failed: {err}");
            }
        }
    }
}
