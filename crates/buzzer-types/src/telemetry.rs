use serde::{Deserialize, Serialize};

use crate::device::DeviceAddress;

/// Signal-health reading for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub address: DeviceAddress,
    /// May be `f64::INFINITY` when two notifications share a timestamp.
    pub rate_hz: f64,
    pub delay_ms: f64,
    pub samples: usize,
}

impl RateSample {
    pub fn is_degenerate(&self) -> bool {
        self.rate_hz.is_infinite() || self.delay_ms == 0.0
    }
}
