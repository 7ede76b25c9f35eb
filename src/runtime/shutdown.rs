use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl-C or SIGTERM.
    Signal,
    UiClosed,
    EndOfStream,
    ActuatorFailed,
    RenderFailed,
    IngestionFailed,
}

impl ShutdownReason {
    pub fn label(self) -> &'static str {
        match self {
            ShutdownReason::Signal => "signal",
            ShutdownReason::UiClosed => "ui-closed",
            ShutdownReason::EndOfStream => "end-of-stream",
            ShutdownReason::ActuatorFailed => "actuator-failed",
            ShutdownReason::RenderFailed => "render-failed",
            ShutdownReason::IngestionFailed => "ingestion-failed",
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(
            self,
            ShutdownReason::ActuatorFailed
                | ShutdownReason::RenderFailed
                | ShutdownReason::IngestionFailed
        )
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    reason: Mutex<Option<ShutdownReason>>,
}

/// Process-wide stop flag shared by both run-loop paths and the signal
/// handler. The first reason recorded wins.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if this call was the one that initiated shutdown.
    pub fn request(&self, reason: ShutdownReason) -> bool {
        let mut slot = self.inner.reason.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(reason);
        self.inner.requested.store(true, Ordering::Release);
        drop(slot);
        log::info!("shutdown requested: {reason}");
        true
    }

    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.inner.reason.lock()
    }

    /// Routes Ctrl-C and SIGTERM into `ShutdownReason::Signal`. Only one
    /// handler may be installed per process.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || {
            shutdown.request(ShutdownReason::Signal);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn first_reason_wins() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        assert_eq!(shutdown.reason(), None);

        assert!(shutdown.request(ShutdownReason::UiClosed));
        assert!(!shutdown.request(ShutdownReason::Signal));

        assert!(shutdown.is_requested());
        assert_eq!(shutdown.reason(), Some(ShutdownReason::UiClosed));
    }

    #[test]
    fn racing_requesters_record_exactly_one_winner() {
        let shutdown = Shutdown::new();
        let reasons = [
            ShutdownReason::Signal,
            ShutdownReason::UiClosed,
            ShutdownReason::EndOfStream,
            ShutdownReason::ActuatorFailed,
        ];

        let winners: usize = thread::scope(|scope| {
            let handles: Vec<_> = reasons
                .iter()
                .map(|&reason| {
                    let shutdown = shutdown.clone();
                    scope.spawn(move || shutdown.request(reason))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().expect("requester thread")))
                .sum()
        });

        assert_eq!(winners, 1);
        assert!(reasons.contains(&shutdown.reason().expect("reason recorded")));
    }

    #[test]
    fn failure_reasons() {
        assert!(ShutdownReason::ActuatorFailed.is_failure());
        assert!(!ShutdownReason::Signal.is_failure());
        assert_eq!(ShutdownReason::UiClosed.to_string(), "ui-closed");
    }
}
