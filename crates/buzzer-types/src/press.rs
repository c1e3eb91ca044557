use serde::{Deserialize, Serialize};

use crate::device::DeviceAddress;

/// Decoded button-press notification. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressEvent {
    pub device_address: DeviceAddress,
    pub button_id: u8,
    /// Monotonic arrival time in seconds.
    pub timestamp: f64,
}

impl PressEvent {
    pub fn new(device_address: impl Into<DeviceAddress>, button_id: u8, timestamp: f64) -> Self {
        Self {
            device_address: device_address.into(),
            button_id,
            timestamp,
        }
    }

    /// Decodes a raw notification payload. The first byte is the button id.
    pub fn from_payload(
        device_address: impl Into<DeviceAddress>,
        payload: &[u8],
        timestamp: f64,
    ) -> Option<Self> {
        let button_id = *payload.first()?;
        Some(Self::new(device_address, button_id, timestamp))
    }
}

/// One row of the ranked press order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// 1-based position after sorting by timestamp.
    pub rank: usize,
    pub device_address: DeviceAddress,
    pub device_name: String,
    pub button_id: u8,
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RaceState {
    #[default]
    Idle,
    Active,
    Finished,
}

impl RaceState {
    pub fn accepts_presses(self) -> bool {
        matches!(self, RaceState::Active)
    }
}

/// Read-only view of the current (or last completed) race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RaceStatus {
    pub state: RaceState,
    pub winner: Option<RankedEntry>,
    pub order: Vec<RankedEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_first_byte_is_button_id() {
        let event = PressEvent::from_payload("dev", &[7, 1, 2], 1.5).expect("decoded");
        assert_eq!(event.button_id, 7);
        assert_eq!(event.device_address.as_str(), "dev");
        assert_eq!(event.timestamp, 1.5);
    }

    #[test]
    fn empty_payload_carries_no_press() {
        assert!(PressEvent::from_payload("dev", &[], 0.0).is_none());
    }

    #[test]
    fn only_active_accepts_presses() {
        assert!(!RaceState::Idle.accepts_presses());
        assert!(RaceState::Active.accepts_presses());
        assert!(!RaceState::Finished.accepts_presses());
    }
}
