use std::{
    thread,
    time::{Duration, Instant},
};

use crate::{
    actuator::{ActuatorGuard, InputActuator},
    sample::Sample,
    source::{SampleSource, SourceEvent},
    status::StatusPublisher,
    store::SampleLog,
    trigger::{TriggerAction, TriggerEngine},
};

use super::shutdown::{Shutdown, ShutdownReason};

// Pause after a transport error so a yanked cable does not spin the loop.
const TRANSPORT_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) struct IngestCounters {
    pub samples: u64,
    pub short_samples: u64,
    pub malformed: u64,
    pub transport_errors: u64,
}

/// Everything owned by the ingestion path: engine, source, actuator and the
/// optional raw capture. Never shared across threads.
pub(super) struct Ingestion<S, A: InputActuator> {
    pub engine: TriggerEngine,
    pub source: S,
    pub guard: ActuatorGuard<A>,
    pub sample_log: Option<SampleLog>,
    pub counters: IngestCounters,
}

impl<S: SampleSource, A: InputActuator> Ingestion<S, A> {
    pub fn run(&mut self, publisher: &StatusPublisher, shutdown: &Shutdown, started: Instant) {
        while !shutdown.is_requested() {
            match self.source.next_event() {
                Ok(SourceEvent::Sample(sample)) => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    self.ingest(now_ms, &sample, publisher, shutdown);
                }
                Ok(SourceEvent::Pending) => {}
                Ok(SourceEvent::EndOfStream) => {
                    log::info!("ingest: source reached end of stream");
                    shutdown.request(ShutdownReason::EndOfStream);
                }
                Err(err) if err.is_malformed() => {
                    self.counters.malformed += 1;
                    log::warn!("ingest: {err}");
                }
                Err(err) => {
                    self.counters.transport_errors += 1;
                    log::warn!("ingest: {err}; retrying");
                    thread::sleep(TRANSPORT_BACKOFF);
                }
            }
        }
    }

    fn ingest(
        &mut self,
        now_ms: u64,
        sample: &Sample,
        publisher: &StatusPublisher,
        shutdown: &Shutdown,
    ) {
        self.counters.samples += 1;
        if let Some(capture) = self.sample_log.as_mut() {
            capture.append(sample);
        }

        let output = self.engine.observe(now_ms, sample);
        if output.intensity.is_none() {
            self.counters.short_samples += 1;
            log::debug!("ingest: {}-channel sample ignored", sample.len());
        }

        if let Some(action) = output.action {
            self.actuate(now_ms, action, shutdown);
        }
        publisher.update(self.engine.last_intensity(), output.state);
    }

    fn actuate(&mut self, now_ms: u64, action: TriggerAction, shutdown: &Shutdown) {
        match self.guard.apply(action) {
            Ok(()) => log::info!(
                "trigger: {} at {now_ms} ms, intensity {:.1}",
                action.label(),
                self.engine.last_intensity()
            ),
            Err(err) => {
                log::error!("trigger: {} failed: {err}", action.label());
                shutdown.request(ShutdownReason::ActuatorFailed);
            }
        }
    }

    /// Final release. Disarms the engine, forwards its release, then lets the
    /// guard retry anything still outstanding. Returns whether a release
    /// reached the actuator.
    pub fn teardown(&mut self, publisher: &StatusPublisher) -> bool {
        let mut released = false;

        let output = self.engine.disarm();
        if let Some(action) = output.action {
            match self.guard.apply(action) {
                Ok(()) => released = true,
                Err(err) => log::error!("teardown: release failed: {err}"),
            }
        }

        match self.guard.finish() {
            Ok(issued) => released |= issued,
            Err(err) => log::error!("teardown: final release failed: {err}"),
        }

        if released {
            log::info!("teardown: released held button");
        }
        publisher.update(self.engine.last_intensity(), self.engine.state());
        released
    }
}
