//! Two-path run loop: ingestion drives the trigger engine on the calling
//! thread at sensor rate, presentation renders status snapshots on a scoped
//! thread at a fixed frame rate. Teardown always ends with the final release.

mod ingest;
mod present;
mod shutdown;

use std::{
    thread,
    time::{Duration, Instant},
};

pub use self::shutdown::{Shutdown, ShutdownReason};

use self::ingest::{IngestCounters, Ingestion};
use crate::{
    actuator::{ActuatorGuard, InputActuator},
    render::RenderSink,
    source::SampleSource,
    status::StatusPublisher,
    store::SampleLog,
    trigger::TriggerEngine,
};

const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(33);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub reason: ShutdownReason,
    pub samples: u64,
    /// Samples with fewer than three channels.
    pub short_samples: u64,
    pub malformed: u64,
    pub transport_errors: u64,
    pub presses: u64,
    pub releases: u64,
    pub actuator_failures: u64,
    pub frames: u64,
    /// Whether teardown had to release a held button.
    pub final_release: bool,
}

pub struct RunLoop<S, A: InputActuator, R> {
    engine: TriggerEngine,
    source: S,
    actuator: A,
    sink: R,
    frame_period: Duration,
    sample_log: Option<SampleLog>,
    publisher: StatusPublisher,
    shutdown: Shutdown,
}

impl<S, A, R> RunLoop<S, A, R>
where
    S: SampleSource,
    A: InputActuator,
    R: RenderSink,
{
    pub fn new(engine: TriggerEngine, source: S, actuator: A, sink: R) -> Self {
        Self {
            engine,
            source,
            actuator,
            sink,
            frame_period: DEFAULT_FRAME_PERIOD,
            sample_log: None,
            publisher: StatusPublisher::new(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_frame_period(mut self, frame_period: Duration) -> Self {
        self.frame_period = frame_period;
        self
    }

    pub fn with_sample_log(mut self, sample_log: SampleLog) -> Self {
        self.sample_log = Some(sample_log);
        self
    }

    /// Shares an externally owned shutdown flag, e.g. one already wired to
    /// the signal handler.
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn publisher(&self) -> StatusPublisher {
        self.publisher.clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Runs until a shutdown trigger fires, then releases any held press.
    pub fn run(self) -> RunReport {
        let RunLoop {
            engine,
            source,
            actuator,
            sink,
            frame_period,
            sample_log,
            publisher,
            shutdown,
        } = self;

        let mut ingestion = Ingestion {
            engine,
            source,
            guard: ActuatorGuard::new(actuator),
            sample_log,
            counters: IngestCounters::default(),
        };
        publisher.update(0.0, ingestion.engine.state());

        let started = Instant::now();
        let frames = thread::scope(|scope| {
            let presenter = thread::Builder::new()
                .name("bow-present".into())
                .spawn_scoped(scope, || {
                    let _stop_on_panic = StopOnPanic::new(&shutdown, ShutdownReason::RenderFailed);
                    present::run(sink, &publisher, &shutdown, frame_period)
                });
            let presenter = match presenter {
                Ok(handle) => Some(handle),
                Err(err) => {
                    log::error!("runtime: failed to start presentation thread: {err}");
                    shutdown.request(ShutdownReason::RenderFailed);
                    None
                }
            };

            {
                let _stop_on_panic = StopOnPanic::new(&shutdown, ShutdownReason::IngestionFailed);
                ingestion.run(&publisher, &shutdown, started);
            }

            presenter.map_or(0, |handle| match handle.join() {
                Ok(frames) => frames,
                Err(_) => {
                    log::error!("runtime: presentation thread panicked");
                    0
                }
            })
        });

        let final_release = ingestion.teardown(&publisher);
        let stats = ingestion.guard.stats();
        let counters = ingestion.counters;
        let reason = shutdown.reason().unwrap_or(ShutdownReason::EndOfStream);

        let report = RunReport {
            reason,
            samples: counters.samples,
            short_samples: counters.short_samples,
            malformed: counters.malformed,
            transport_errors: counters.transport_errors,
            presses: stats.presses,
            releases: stats.releases,
            actuator_failures: stats.failures,
            frames,
            final_release,
        };
        log::info!(
            "runtime: stopped ({reason}) after {} samples, {} presses, {} releases",
            report.samples,
            report.presses,
            report.releases
        );
        report
    }
}

// A panic on either path must stop the other one, otherwise the scope would
// never join. The actuator guard's Drop releases any press still held when
// ingestion unwinds; a render panic goes through the normal teardown.
struct StopOnPanic<'a> {
    shutdown: &'a Shutdown,
    reason: ShutdownReason,
}

impl<'a> StopOnPanic<'a> {
    fn new(shutdown: &'a Shutdown, reason: ShutdownReason) -> Self {
        Self { shutdown, reason }
    }
}

impl Drop for StopOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shutdown.request(self.reason);
        }
    }
}
