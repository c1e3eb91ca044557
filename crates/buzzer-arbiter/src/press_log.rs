use buzzer_types::press::{PressEvent, RankedEntry};

#[derive(Debug, Clone)]
struct LoggedPress {
    event: PressEvent,
    device_name: String,
    /// Position in arrival order, used for the first-accepted lookup.
    arrival: usize,
}

/// Presses of the current race: ascending by timestamp, one per device.
#[derive(Debug, Clone, Default)]
pub struct PressLog {
    entries: Vec<LoggedPress>,
}

impl PressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, event: &PressEvent) -> bool {
        self.entries
            .iter()
            .any(|logged| logged.event.device_address == event.device_address)
    }

    /// Returns `false` if the device already pressed in this race.
    pub fn insert(&mut self, event: PressEvent, device_name: String) -> bool {
        if self.contains(&event) {
            return false;
        }
        let arrival = self.entries.len();
        self.entries.push(LoggedPress {
            event,
            device_name,
            arrival,
        });
        // Stable: equal timestamps keep arrival order.
        self.entries
            .sort_by(|a, b| a.event.timestamp.total_cmp(&b.event.timestamp));
        true
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn ranked(&self) -> Vec<RankedEntry> {
        self.entries
            .iter()
            .enumerate()
            .map(|(idx, logged)| to_ranked(idx + 1, logged))
            .collect()
    }

    /// The press that arrived first, with its current display rank.
    pub fn first_accepted(&self) -> Option<RankedEntry> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, logged)| logged.arrival == 0)
            .map(|(idx, logged)| to_ranked(idx + 1, logged))
    }
}

fn to_ranked(rank: usize, logged: &LoggedPress) -> RankedEntry {
    RankedEntry {
        rank,
        device_address: logged.event.device_address.clone(),
        device_name: logged.device_name.clone(),
        button_id: logged.event.button_id,
        timestamp: logged.event.timestamp,
    }
}
