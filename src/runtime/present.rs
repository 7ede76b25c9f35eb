use std::time::Duration;

use crate::{
    render::{RenderControl, RenderSink},
    status::StatusPublisher,
};

use super::shutdown::{Shutdown, ShutdownReason};

/// Draws the latest status at a fixed cadence until shutdown. Returns the
/// number of frames rendered.
pub(super) fn run<R: RenderSink>(
    mut sink: R,
    publisher: &StatusPublisher,
    shutdown: &Shutdown,
    frame_period: Duration,
) -> u64 {
    let ticker = crossbeam::channel::tick(frame_period);
    let mut frames = 0u64;

    while !shutdown.is_requested() {
        if ticker.recv().is_err() || shutdown.is_requested() {
            break;
        }

        match sink.render(&publisher.snapshot()) {
            Ok(RenderControl::Continue) => frames += 1,
            Ok(RenderControl::Close) => {
                frames += 1;
                log::info!("render: surface closed");
                shutdown.request(ShutdownReason::UiClosed);
                break;
            }
            Err(err) => {
                log::error!("render: {err}");
                shutdown.request(ShutdownReason::RenderFailed);
                break;
            }
        }
    }

    if let Err(err) = sink.finish() {
        log::warn!("render: finish failed: {err}");
    }
    frames
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{
        render::{NullSink, RenderError},
        status::StatusSnapshot,
        trigger::EngineState,
    };

    struct CloseAfter {
        remaining: u32,
    }

    impl RenderSink for CloseAfter {
        fn render(&mut self, _snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError> {
            if self.remaining == 0 {
                return Ok(RenderControl::Close);
            }
            self.remaining -= 1;
            Ok(RenderControl::Continue)
        }
    }

    struct Failing;

    impl RenderSink for Failing {
        fn render(&mut self, _snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError> {
            Err(RenderError::Io(std::io::Error::other("terminal gone")))
        }
    }

    #[test]
    fn close_requests_ui_shutdown() {
        let publisher = StatusPublisher::new();
        publisher.update(1_000.0, EngineState::PulledBack);
        let shutdown = Shutdown::new();

        let sink = CloseAfter { remaining: 2 };
        let frames = run(sink, &publisher, &shutdown, Duration::from_millis(1));

        assert_eq!(frames, 3);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::UiClosed));
    }

    #[test]
    fn render_error_requests_failure_shutdown() {
        let shutdown = Shutdown::new();
        let frames = run(
            Failing,
            &StatusPublisher::new(),
            &shutdown,
            Duration::from_millis(1),
        );

        assert_eq!(frames, 0);
        assert_eq!(shutdown.reason(), Some(ShutdownReason::RenderFailed));
    }

    #[test]
    fn stops_when_shutdown_is_requested_elsewhere() {
        let shutdown = Shutdown::new();
        let publisher = StatusPublisher::new();

        thread::scope(|scope| {
            let presenter = scope.spawn(|| {
                run(NullSink, &publisher, &shutdown, Duration::from_millis(2))
            });
            thread::sleep(Duration::from_millis(20));
            shutdown.request(ShutdownReason::Signal);
            presenter.join().expect("presenter thread");
        });

        assert_eq!(shutdown.reason(), Some(ShutdownReason::Signal));
    }
}
