use crate::trigger::TriggerAction;

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("input backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to {op} synthetic button: {message}")]
    Inject { op: &'static str, message: String },
}

/// Synthetic button primitive. The trigger engine guarantees it is never
/// asked to press twice or release without a press.
pub trait InputActuator {
    fn press(&mut self) -> Result<(), ActuatorError>;
    fn release(&mut self) -> Result<(), ActuatorError>;
}

impl<A: InputActuator + ?Sized> InputActuator for Box<A> {
    fn press(&mut self) -> Result<(), ActuatorError> {
        (**self).press()
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        (**self).release()
    }
}

/// Logs the decisions instead of injecting input.
#[derive(Debug, Default)]
pub struct DryRunActuator;

impl InputActuator for DryRunActuator {
    fn press(&mut self) -> Result<(), ActuatorError> {
        log::info!("actuator: press (dry run)");
        Ok(())
    }

    fn release(&mut self) -> Result<(), ActuatorError> {
        log::info!("actuator: release (dry run)");
        Ok(())
    }
}

#[cfg(feature = "mouse")]
pub use self::mouse::MouseActuator;

#[cfg(feature = "mouse")]
mod mouse {
    use enigo::{Button, Direction, Enigo, Mouse, Settings};

    use super::{ActuatorError, InputActuator};

    /// Left mouse button on the host's input system.
    pub struct MouseActuator {
        enigo: Enigo,
    }

    impl MouseActuator {
        pub fn new() -> Result<Self, ActuatorError> {
            let enigo = Enigo::new(&Settings::default())
                .map_err(|err| ActuatorError::Unavailable(err.to_string()))?;
            Ok(Self { enigo })
        }

        fn button(
            &mut self,
            direction: Direction,
            op: &'static str,
        ) -> Result<(), ActuatorError> {
            self.enigo
                .button(Button::Left, direction)
                .map_err(|err| ActuatorError::Inject {
                    op,
                    message: err.to_string(),
                })
        }
    }

    impl InputActuator for MouseActuator {
        fn press(&mut self) -> Result<(), ActuatorError> {
            self.button(Direction::Press, "press")
        }

        fn release(&mut self) -> Result<(), ActuatorError> {
            self.button(Direction::Release, "release")
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ActuatorStats {
    pub presses: u64,
    pub releases: u64,
    pub failures: u64,
}

/// Owns the actuator on the ingestion path and remembers whether a press may
/// still be down. A press counts as outstanding from the moment it is
/// attempted until a release succeeds, so a failed release is retried once
/// more at teardown. Dropping an unfinished guard releases too.
pub struct ActuatorGuard<A: InputActuator> {
    actuator: A,
    outstanding: bool,
    finished: bool,
    stats: ActuatorStats,
}

impl<A: InputActuator> ActuatorGuard<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            actuator,
            outstanding: false,
            finished: false,
            stats: ActuatorStats::default(),
        }
    }

    pub fn apply(&mut self, action: TriggerAction) -> Result<(), ActuatorError> {
        let result = match action {
            TriggerAction::Press => {
                self.outstanding = true;
                self.stats.presses += 1;
                self.actuator.press()
            }
            TriggerAction::Release => {
                self.stats.releases += 1;
                let result = self.actuator.release();
                if result.is_ok() {
                    self.outstanding = false;
                }
                result
            }
        };
        if result.is_err() {
            self.stats.failures += 1;
        }
        result
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding
    }

    pub fn stats(&self) -> ActuatorStats {
        self.stats
    }

    /// Final release attempt. Runs at most once; returns whether a release
    /// was issued.
    pub fn finish(&mut self) -> Result<bool, ActuatorError> {
        if self.finished {
            return Ok(false);
        }
        self.finished = true;
        if !self.outstanding {
            return Ok(false);
        }
        self.apply(TriggerAction::Release).map(|()| true)
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }
}

impl<A: InputActuator> Drop for ActuatorGuard<A> {
    fn drop(&mut self) {
        if self.finished || !self.outstanding {
            return;
        }
        log::warn!("actuator: guard dropped with press outstanding; releasing");
        if let Err(err) = self.actuator.release() {
            log::error!("actuator: release on drop failed: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording {
        calls: Vec<&'static str>,
        fail_press: bool,
        fail_releases: u32,
    }

    impl InputActuator for Recording {
        fn press(&mut self) -> Result<(), ActuatorError> {
            self.calls.push("press");
            if self.fail_press {
                return Err(ActuatorError::Inject {
                    op: "press",
                    message: "denied".into(),
                });
            }
            Ok(())
        }

        fn release(&mut self) -> Result<(), ActuatorError> {
            self.calls.push("release");
            if self.fail_releases > 0 {
                self.fail_releases -= 1;
                return Err(ActuatorError::Inject {
                    op: "release",
                    message: "denied".into(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn finish_is_silent_when_nothing_is_held() {
        let mut guard = ActuatorGuard::new(Recording::default());
        guard.apply(TriggerAction::Press).expect("press");
        guard.apply(TriggerAction::Release).expect("release");

        assert!(!guard.finish().expect("finish"));
        assert_eq!(guard.actuator().calls, ["press", "release"]);
    }

    #[test]
    fn finish_releases_outstanding_press_once() {
        let mut guard = ActuatorGuard::new(Recording::default());
        guard.apply(TriggerAction::Press).expect("press");

        assert!(guard.finish().expect("finish"));
        assert!(!guard.finish().expect("second finish"));
        assert_eq!(guard.stats().releases, 1);
        assert_eq!(guard.actuator().calls, ["press", "release"]);
    }

    #[test]
    fn failed_press_is_still_released_at_teardown() {
        let mut guard = ActuatorGuard::new(Recording {
            fail_press: true,
            ..Recording::default()
        });

        assert!(guard.apply(TriggerAction::Press).is_err());
        assert!(guard.is_outstanding());
        assert!(guard.finish().expect("finish"));
        assert_eq!(guard.stats().failures, 1);
        assert_eq!(guard.actuator().calls, ["press", "release"]);
    }

    #[test]
    fn failed_release_is_retried_once_more() {
        let mut guard = ActuatorGuard::new(Recording {
            fail_releases: 1,
            ..Recording::default()
        });
        guard.apply(TriggerAction::Press).expect("press");

        assert!(guard.apply(TriggerAction::Release).is_err());
        assert!(guard.is_outstanding());
        assert!(guard.finish().expect("retry succeeds"));
        assert_eq!(guard.actuator().calls, ["press", "release", "release"]);
    }

    #[test]
    fn drop_releases_unfinished_guard() {
        use std::{cell::RefCell, rc::Rc};

        struct Shared(Rc<RefCell<Vec<&'static str>>>);

        impl InputActuator for Shared {
            fn press(&mut self) -> Result<(), ActuatorError> {
                self.0.borrow_mut().push("press");
                Ok(())
            }

            fn release(&mut self) -> Result<(), ActuatorError> {
                self.0.borrow_mut().push("release");
                Ok(())
            }
        }

        let calls = Rc::new(RefCell::new(Vec::new()));
        {
            let mut guard = ActuatorGuard::new(Shared(calls.clone()));
            guard.apply(TriggerAction::Press).expect("press");
        }
        assert_eq!(*calls.borrow(), ["press", "release"]);
    }
}
