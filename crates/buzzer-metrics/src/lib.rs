//! Per-device notification rate and delay tracking.
//!
//! Each device owns an independent sliding window of arrival timestamps.
//! Windows live in a sharded map, so different devices rarely contend.
//! A window exists only between admission and removal of its device.

use std::{cmp::Ordering, collections::VecDeque};

use buzzer_registry::AdmissionGate;
use buzzer_types::{device::DeviceAddress, telemetry::RateSample};
use dashmap::DashMap;
use tracing::trace;

/// Fixed-capacity window of recent notification timestamps for one device.
#[derive(Debug, Clone)]
pub struct NotificationWindow {
    capacity: usize,
    timestamps: VecDeque<f64>,
    rate_hz: f64,
    delay_ms: f64,
}

impl NotificationWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            timestamps: VecDeque::with_capacity(capacity),
            rate_hz: 0.0,
            delay_ms: 0.0,
        }
    }

    /// Records an arrival (seconds) and recomputes rate and delay.
    pub fn push(&mut self, timestamp: f64) {
        if self.timestamps.len() == self.capacity {
            self.timestamps.pop_front();
        }
        self.timestamps.push_back(timestamp);

        let len = self.timestamps.len();
        if len < 2 {
            return;
        }

        let span = if len == self.capacity {
            let (Some(first), Some(last)) = (self.timestamps.front(), self.timestamps.back())
            else {
                return;
            };
            (last - first) / (len - 1) as f64
        } else {
            self.timestamps[len - 1] - self.timestamps[len - 2]
        };

        if span > 0.0 {
            self.rate_hz = 1.0 / span;
            self.delay_ms = span * 1000.0;
        } else {
            self.rate_hz = f64::INFINITY;
            self.delay_ms = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
        self.rate_hz = 0.0;
        self.delay_ms = 0.0;
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.timestamps.len() == self.capacity
    }

    fn sample(&self, address: &DeviceAddress) -> RateSample {
        RateSample {
            address: address.clone(),
            rate_hz: self.rate_hz,
            delay_ms: self.delay_ms,
            samples: self.timestamps.len(),
        }
    }
}

/// Partitioned map of device windows.
#[derive(Debug)]
pub struct NotificationMetrics {
    buffer_size: usize,
    devices: DashMap<DeviceAddress, NotificationWindow>,
}

impl NotificationMetrics {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size,
            devices: DashMap::new(),
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Starts tracking a newly admitted device with an empty window.
    pub fn track(&self, address: &DeviceAddress) {
        self.devices
            .entry(address.clone())
            .and_modify(NotificationWindow::reset)
            .or_insert_with(|| NotificationWindow::new(self.buffer_size));
    }

    /// Records a notification. Returns `None` when the device is not admitted
    /// or is no longer tracked.
    pub fn observe<G: AdmissionGate + ?Sized>(
        &self,
        registry: &G,
        address: &DeviceAddress,
        timestamp: f64,
    ) -> Option<RateSample> {
        if !registry.is_admitted(address) {
            trace!("metrics ignoring unadmitted {}", address);
            return None;
        }
        let Some(mut window) = self.devices.get_mut(address) else {
            trace!("metrics ignoring untracked {}", address);
            return None;
        };
        window.push(timestamp);
        Some(window.sample(address))
    }

    /// Clears the window for a device whose monitoring restarts. Unknown
    /// addresses are ignored.
    pub fn reset(&self, address: &DeviceAddress) {
        if let Some(mut window) = self.devices.get_mut(address) {
            window.reset();
        }
    }

    /// Drops all state for a disconnected device.
    pub fn clear(&self, address: &DeviceAddress) {
        self.devices.remove(address);
    }

    pub fn clear_all(&self) {
        self.devices.clear();
    }

    pub fn sample(&self, address: &DeviceAddress) -> Option<RateSample> {
        self.devices
            .get(address)
            .map(|window| window.sample(address))
    }

    pub fn tracked(&self) -> usize {
        self.devices.len()
    }

    /// Snapshot of every tracked device, best signal first.
    ///
    /// Rate descending with an infinite rate counted as the lowest; ties by
    /// delay ascending with a zero delay counted as the highest.
    pub fn rank_all(&self) -> Vec<RateSample> {
        let mut samples: Vec<RateSample> = self
            .devices
            .iter()
            .map(|entry| entry.value().sample(entry.key()))
            .collect();
        samples.sort_by(compare_samples);
        samples
    }
}

fn rank_rate(rate_hz: f64) -> f64 {
    if rate_hz.is_infinite() {
        -1.0
    } else {
        rate_hz
    }
}

fn rank_delay(delay_ms: f64) -> f64 {
    if delay_ms == 0.0 {
        f64::INFINITY
    } else {
        delay_ms
    }
}

fn compare_samples(a: &RateSample, b: &RateSample) -> Ordering {
    rank_rate(b.rate_hz)
        .total_cmp(&rank_rate(a.rate_hz))
        .then_with(|| rank_delay(a.delay_ms).total_cmp(&rank_delay(b.delay_ms)))
        .then_with(|| a.address.cmp(&b.address))
}
