use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    device::{DeviceAddress, Participant},
    errors::AdmissionError,
    press::RankedEntry,
    telemetry::RateSample,
};

/// Notification kinds moving through the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    OrderReset,
    OrderUpdated,
    Winner,
    Stopped,
    RateUpdated,
    AdmissionError,
    DeviceAdmitted,
    DeviceRemoved,
}

/// Immutable event envelope for broadcasting and journaling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    OrderReset,
    OrderUpdated(Vec<RankedEntry>),
    Winner(RankedEntry),
    Stopped,
    RateUpdated(RateSample),
    AdmissionError(AdmissionErrorEvent),
    DeviceAdmitted(Participant),
    DeviceRemoved(DeviceAddress),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionErrorEvent {
    pub address: Option<DeviceAddress>,
    pub reason: AdmissionError,
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::OrderReset => EventKind::OrderReset,
            EventPayload::OrderUpdated(_) => EventKind::OrderUpdated,
            EventPayload::Winner(_) => EventKind::Winner,
            EventPayload::Stopped => EventKind::Stopped,
            EventPayload::RateUpdated(_) => EventKind::RateUpdated,
            EventPayload::AdmissionError(_) => EventKind::AdmissionError,
            EventPayload::DeviceAdmitted(_) => EventKind::DeviceAdmitted,
            EventPayload::DeviceRemoved(_) => EventKind::DeviceRemoved,
        }
    }
}

impl SystemEvent {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: payload.kind(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_kind_follows_payload() {
        let event = SystemEvent::new(EventPayload::Stopped);
        assert_eq!(event.kind, EventKind::Stopped);

        let event = SystemEvent::new(EventPayload::DeviceRemoved("dev".into()));
        assert_eq!(event.kind, EventKind::DeviceRemoved);
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let event = SystemEvent::new(EventPayload::OrderUpdated(Vec::new()));
        let json = serde_json::to_value(&event).expect("serialize event");
        assert_eq!(json["payload"]["type"], "order_updated");
        assert_eq!(json["kind"], "OrderUpdated");
    }
}
