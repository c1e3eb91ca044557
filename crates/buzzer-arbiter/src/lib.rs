//! First-press race arbitration.

mod press_log;

pub use press_log::PressLog;

use buzzer_registry::AdmissionGate;
use buzzer_types::{
    events::EventPayload,
    press::{PressEvent, RaceState, RaceStatus, RankedEntry},
    DropReason,
};
use tracing::{info, trace};

/// Result of feeding one press into the arbiter.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Carries the notifications to broadcast, in emission order.
    Accepted(Vec<EventPayload>),
    Dropped(DropReason),
}

impl RecordOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, RecordOutcome::Accepted(_))
    }
}

/// Idle / Active / Finished state machine owning the current press log.
///
/// The winner is the first press accepted after `start`, latched until the
/// next `start`. Later presses only reorder the displayed ranking.
#[derive(Debug, Default)]
pub struct RaceArbiter {
    state: RaceState,
    log: PressLog,
    winner: Option<RankedEntry>,
}

impl RaceArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RaceState {
        self.state
    }

    pub fn winner(&self) -> Option<&RankedEntry> {
        self.winner.as_ref()
    }

    /// Hard reset into a fresh Active race.
    pub fn start(&mut self) -> Vec<EventPayload> {
        info!("race started (previous state {:?})", self.state);
        self.log.clear();
        self.winner = None;
        self.state = RaceState::Active;
        vec![EventPayload::OrderReset]
    }

    /// Freezes the log. Presses are dropped until the next `start`.
    pub fn stop(&mut self) -> Vec<EventPayload> {
        if self.state == RaceState::Active {
            info!("race stopped with {} presses", self.log.len());
            self.state = RaceState::Finished;
        }
        vec![EventPayload::Stopped]
    }

    pub fn record<G: AdmissionGate + ?Sized>(
        &mut self,
        gate: &G,
        event: PressEvent,
    ) -> RecordOutcome {
        if !self.state.accepts_presses() {
            return self.drop_press(&event, DropReason::InvalidState);
        }
        if !gate.is_admitted(&event.device_address) {
            return self.drop_press(&event, DropReason::NotAdmitted);
        }
        if self.log.contains(&event) {
            return self.drop_press(&event, DropReason::DuplicateInRace);
        }
        let name = gate
            .name_of(&event.device_address)
            .unwrap_or("unknown")
            .to_string();
        self.log.insert(event, name);

        let order = self.log.ranked();
        let mut notifications = vec![EventPayload::OrderUpdated(order)];
        if self.winner.is_none() {
            if let Some(first) = self.log.first_accepted() {
                info!(
                    "winner: {} ({}) button {}",
                    first.device_address, first.device_name, first.button_id
                );
                self.winner = Some(first.clone());
                notifications.push(EventPayload::Winner(first));
            }
        }
        RecordOutcome::Accepted(notifications)
    }

    /// Ranked snapshot; survives `stop` until the next `start`.
    pub fn current_order(&self) -> Vec<RankedEntry> {
        self.log.ranked()
    }

    pub fn status(&self) -> RaceStatus {
        RaceStatus {
            state: self.state,
            winner: self.winner.clone(),
            order: self.current_order(),
        }
    }

    /// Back to Idle with no log, as after construction.
    pub fn reset(&mut self) {
        self.log.clear();
        self.winner = None;
        self.state = RaceState::Idle;
    }

    fn drop_press(&self, event: &PressEvent, reason: DropReason) -> RecordOutcome {
        trace!(
            "dropping press from {}: {}",
            event.device_address,
            reason.as_str()
        );
        RecordOutcome::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buzzer_registry::ConnectionRegistry;
    use buzzer_types::device::DeviceAddress;

    fn registry(addresses: &[&str]) -> ConnectionRegistry {
        let mut registry = ConnectionRegistry::with_capacity(4);
        for address in addresses {
            registry
                .admit(DeviceAddress::new(*address), &address.to_uppercase())
                .unwrap();
        }
        registry
    }

    fn press(address: &str, button_id: u8, timestamp: f64) -> PressEvent {
        PressEvent::new(address, button_id, timestamp)
    }

    fn addresses(order: &[RankedEntry]) -> Vec<&str> {
        order.iter().map(|e| e.device_address.as_str()).collect()
    }

    #[test]
    fn idle_arbiter_rejects_presses() {
        let gate = registry(&["a"]);
        let mut arbiter = RaceArbiter::new();
        assert_eq!(
            arbiter.record(&gate, press("a", 1, 0.0)),
            RecordOutcome::Dropped(DropReason::InvalidState)
        );
        assert!(arbiter.current_order().is_empty());
    }

    #[test]
    fn start_emits_order_reset() {
        let mut arbiter = RaceArbiter::new();
        assert!(matches!(
            arbiter.start().as_slice(),
            [EventPayload::OrderReset]
        ));
        assert_eq!(arbiter.state(), RaceState::Active);
    }

    #[test]
    fn presses_are_ranked_by_timestamp() {
        let gate = registry(&["a", "b", "c"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        arbiter.record(&gate, press("b", 2, 5.0));
        arbiter.record(&gate, press("c", 3, 9.0));
        arbiter.record(&gate, press("a", 1, 7.0));

        let order = arbiter.current_order();
        assert_eq!(addresses(&order), ["b", "a", "c"]);
        let ranks: Vec<usize> = order.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
        assert_eq!(order[1].device_name, "A");
    }

    #[test]
    fn first_accepted_press_is_latched_winner() {
        let gate = registry(&["late", "early"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();

        let first = arbiter.record(&gate, press("late", 4, 10.0));
        let RecordOutcome::Accepted(notifications) = first else {
            panic!("first press should be accepted");
        };
        assert!(matches!(
            notifications.as_slice(),
            [EventPayload::OrderUpdated(_), EventPayload::Winner(w)] if w.device_address.as_str() == "late"
        ));

        let second = arbiter.record(&gate, press("early", 5, 1.0));
        let RecordOutcome::Accepted(notifications) = second else {
            panic!("second press should be accepted");
        };
        assert_eq!(notifications.len(), 1);
        assert_eq!(addresses(&arbiter.current_order()), ["early", "late"]);
        assert_eq!(
            arbiter.winner().map(|w| w.device_address.as_str()),
            Some("late")
        );
    }

    #[test]
    fn duplicate_press_changes_nothing() {
        let gate = registry(&["a"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        arbiter.record(&gate, press("a", 1, 1.0));
        let before = arbiter.status();

        assert_eq!(
            arbiter.record(&gate, press("a", 9, 0.5)),
            RecordOutcome::Dropped(DropReason::DuplicateInRace)
        );
        assert_eq!(arbiter.status(), before);
    }

    #[test]
    fn unadmitted_device_is_dropped() {
        let gate = registry(&["a"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        assert_eq!(
            arbiter.record(&gate, press("stranger", 1, 1.0)),
            RecordOutcome::Dropped(DropReason::NotAdmitted)
        );
        assert!(arbiter.winner().is_none());
    }

    #[test]
    fn stop_freezes_order() {
        let gate = registry(&["a", "b"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        arbiter.record(&gate, press("a", 1, 1.0));
        assert!(matches!(arbiter.stop().as_slice(), [EventPayload::Stopped]));
        let frozen = arbiter.current_order();

        for i in 0..5 {
            assert!(!arbiter.record(&gate, press("b", 2, i as f64)).is_accepted());
        }
        assert_eq!(arbiter.current_order(), frozen);
        assert_eq!(arbiter.state(), RaceState::Finished);
    }

    #[test]
    fn restart_clears_log_and_winner() {
        let gate = registry(&["a", "b"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        arbiter.record(&gate, press("a", 1, 1.0));
        arbiter.start();
        assert!(arbiter.current_order().is_empty());
        assert!(arbiter.winner().is_none());

        arbiter.record(&gate, press("b", 2, 2.0));
        assert_eq!(
            arbiter.winner().map(|w| w.device_address.as_str()),
            Some("b")
        );
    }

    #[test]
    fn equal_timestamps_keep_arrival_order() {
        let gate = registry(&["a", "b", "c"]);
        let mut arbiter = RaceArbiter::new();
        arbiter.start();
        arbiter.record(&gate, press("c", 1, 3.0));
        arbiter.record(&gate, press("a", 1, 3.0));
        arbiter.record(&gate, press("b", 1, 1.0));
        assert_eq!(addresses(&arbiter.current_order()), ["b", "c", "a"]);
    }
}
