use std::sync::Arc;

use parking_lot::Mutex;

use crate::trigger::EngineState;

/// Latest intensity/state pair as seen by the render path.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatusSnapshot {
    pub intensity: f64,
    pub state: EngineState,
    /// Number of `update` calls folded into this snapshot.
    pub updates: u64,
}

/// Single-writer, multi-reader status cell shared between the ingestion and
/// presentation paths. Every snapshot is a pair written by one `update`.
#[derive(Clone, Debug, Default)]
pub struct StatusPublisher {
    inner: Arc<Mutex<StatusSnapshot>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, intensity: f64, state: EngineState) {
        let mut slot = self.inner.lock();
        slot.intensity = intensity;
        slot.state = state;
        slot.updates = slot.updates.wrapping_add(1);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use super::*;

    fn state_for(step: u64) -> EngineState {
        match step % 3 {
            0 => EngineState::Idle,
            1 => EngineState::PulledBack,
            _ => EngineState::Engaged,
        }
    }

    #[test]
    fn starts_idle_and_empty() {
        let publisher = StatusPublisher::new();
        assert_eq!(publisher.snapshot(), StatusSnapshot::default());
    }

    #[test]
    fn snapshot_reflects_last_update() {
        let publisher = StatusPublisher::new();
        publisher.update(2_400.0, EngineState::PulledBack);
        publisher.update(4_800.0, EngineState::Engaged);

        let snapshot = publisher.snapshot();
        assert_eq!(snapshot.intensity, 4_800.0);
        assert_eq!(snapshot.state, EngineState::Engaged);
        assert_eq!(snapshot.updates, 2);
    }

    #[test]
    fn concurrent_snapshots_are_never_torn() {
        let publisher = StatusPublisher::new();
        let done = AtomicBool::new(false);

        thread::scope(|scope| {
            let writer = publisher.clone();
            let done_ref = &done;
            scope.spawn(move || {
                for step in 1..=200_000u64 {
                    writer.update(step as f64, state_for(step));
                }
                done_ref.store(true, Ordering::Release);
            });

            for _ in 0..2 {
                let reader = publisher.clone();
                let done_ref = &done;
                scope.spawn(move || {
                    let mut last_seen = 0u64;
                    while !done_ref.load(Ordering::Acquire) {
                        let snapshot = reader.snapshot();
                        let step = snapshot.intensity as u64;
                        assert_eq!(snapshot.state, state_for(step), "torn pair at {step}");
                        assert_eq!(snapshot.updates, step);
                        assert!(step >= last_seen, "snapshot went backwards");
                        last_seen = step;
                    }
                });
            }
        });

        assert_eq!(publisher.snapshot().updates, 200_000);
    }
}
