//! Outbound notification fan-out to GUI, web, and log consumers.

use async_trait::async_trait;
use buzzer_types::{
    events::{EventKind, EventPayload, SystemEvent},
    Result,
};
use futures::{stream::BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{trace, warn};

/// Relay between the race engine and its external collaborators.
///
/// Publishing never waits on consumers. A consumer that falls behind loses
/// its oldest undelivered events; every consumer sees events in publish order.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    async fn publish(&self, event: SystemEvent) -> Result<()>;
    fn subscribe(&self) -> BoxStream<'static, SystemEvent>;
    fn subscribe_kinds(&self, kinds: Vec<EventKind>) -> BoxStream<'static, SystemEvent>;

    async fn emit(&self, payload: EventPayload) -> Result<()> {
        self.publish(SystemEvent::new(payload)).await
    }
}

/// In-process dispatcher backed by a broadcast channel.
#[derive(Clone)]
pub struct BroadcastDispatcher {
    tx: broadcast::Sender<SystemEvent>,
}

impl BroadcastDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl EventDispatcher for BroadcastDispatcher {
    async fn publish(&self, event: SystemEvent) -> Result<()> {
        trace!("publishing {:?}", event.kind);
        // No subscribers is not an error.
        let _ = self.tx.send(event);
        Ok(())
    }

    fn subscribe(&self) -> BoxStream<'static, SystemEvent> {
        BroadcastStream::new(self.tx.subscribe())
            .filter_map(|event| async move {
                match event {
                    Ok(event) => Some(event),
                    Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                        warn!("subscriber lagged, {} events dropped", skipped);
                        None
                    }
                }
            })
            .boxed()
    }

    fn subscribe_kinds(&self, kinds: Vec<EventKind>) -> BoxStream<'static, SystemEvent> {
        let mut rx = self.tx.subscribe();
        async_stream::stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if kinds.contains(&event.kind) {
                            yield event;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("{:?} subscriber lagged, {} events dropped", kinds, skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buzzer_types::press::RankedEntry;

    fn entry(rank: usize) -> RankedEntry {
        RankedEntry {
            rank,
            device_address: format!("dev-{rank}").into(),
            device_name: "unknown".into(),
            button_id: 0,
            timestamp: rank as f64,
        }
    }

    #[tokio::test]
    async fn subscribers_see_publish_order() {
        let dispatcher = BroadcastDispatcher::new(16);
        let mut stream = dispatcher.subscribe();

        dispatcher.emit(EventPayload::OrderReset).await.unwrap();
        dispatcher
            .emit(EventPayload::OrderUpdated(vec![entry(1)]))
            .await
            .unwrap();
        dispatcher.emit(EventPayload::Stopped).await.unwrap();

        let kinds: Vec<EventKind> = vec![
            stream.next().await.unwrap().kind,
            stream.next().await.unwrap().kind,
            stream.next().await.unwrap().kind,
        ];
        assert_eq!(
            kinds,
            [EventKind::OrderReset, EventKind::OrderUpdated, EventKind::Stopped]
        );
    }

    #[tokio::test]
    async fn kind_filter_skips_other_notifications() {
        let dispatcher = BroadcastDispatcher::new(16);
        let mut winners = dispatcher.subscribe_kinds(vec![EventKind::Winner]);

        dispatcher.emit(EventPayload::OrderReset).await.unwrap();
        dispatcher.emit(EventPayload::Winner(entry(1))).await.unwrap();

        let event = winners.next().await.unwrap();
        assert_eq!(event.kind, EventKind::Winner);
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let dispatcher = BroadcastDispatcher::new(4);
        assert_eq!(dispatcher.receiver_count(), 0);
        assert!(dispatcher.emit(EventPayload::Stopped).await.is_ok());
    }

    #[tokio::test]
    async fn slow_subscriber_drops_oldest() {
        let dispatcher = BroadcastDispatcher::new(2);
        let mut stream = dispatcher.subscribe();
        for rank in 1..=5 {
            dispatcher
                .emit(EventPayload::OrderUpdated(vec![entry(rank)]))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        for _ in 0..2 {
            if let EventPayload::OrderUpdated(order) = stream.next().await.unwrap().payload {
                seen.push(order[0].rank);
            }
        }
        assert_eq!(seen, [4, 5]);
    }
}
