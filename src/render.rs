use std::io::{self, Write};

use crate::{status::StatusSnapshot, trigger::EngineState};

// Gauge spans this multiple of the threshold so the marker sits inside it.
const GAUGE_FULL_SCALE_X100: u32 = 150;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderControl {
    Continue,
    /// The surface was closed by the user; the process should shut down.
    Close,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed writing status surface")]
    Io(#[from] io::Error),
}

/// Consumer of status snapshots, driven at the presentation cadence.
pub trait RenderSink: Send {
    fn render(&mut self, snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError>;

    fn finish(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

impl<R: RenderSink + ?Sized> RenderSink for Box<R> {
    fn render(&mut self, snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError> {
        (**self).render(snapshot)
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        (**self).finish()
    }
}

/// Discards every frame; used when running headless.
#[derive(Debug, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError> {
        Ok(RenderControl::Continue)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GaugeLayout {
    pub width: usize,
    pub threshold: f64,
    pub pulled_back_level: Option<f64>,
}

impl GaugeLayout {
    fn full_scale(&self) -> f64 {
        self.threshold * f64::from(GAUGE_FULL_SCALE_X100) / 100.0
    }

    fn cell_of(&self, value: f64) -> usize {
        let ratio = (value / self.full_scale()).clamp(0.0, 1.0);
        ((ratio * self.width as f64).round() as usize).min(self.width.saturating_sub(1))
    }

    /// One status line: `[####--:---|-----] engaged      4520.0`.
    pub fn line(&self, snapshot: &StatusSnapshot) -> String {
        let width = self.width.max(1);
        let filled = if snapshot.intensity <= 0.0 {
            0
        } else {
            ((snapshot.intensity / self.full_scale()).clamp(0.0, 1.0) * width as f64).round()
                as usize
        };
        let threshold_cell = self.cell_of(self.threshold);
        let pulled_back_cell = self.pulled_back_level.map(|level| self.cell_of(level));

        let fill = match snapshot.state {
            EngineState::Engaged => '#',
            EngineState::PulledBack => '=',
            EngineState::Idle => '-',
        };

        let mut bar = String::with_capacity(width + 2);
        bar.push('[');
        for cell in 0..width {
            let ch = if cell < filled {
                fill
            } else if cell == threshold_cell {
                '|'
            } else if Some(cell) == pulled_back_cell {
                ':'
            } else {
                ' '
            };
            bar.push(ch);
        }
        bar.push(']');

        format!(
            "{bar} {:<11} {:>9.1}",
            snapshot.state.label(),
            snapshot.intensity
        )
    }
}

/// Single-line gauge redrawn in place on a terminal.
pub struct TerminalGauge<W: Write + Send> {
    out: W,
    layout: GaugeLayout,
    last_line: String,
}

impl<W: Write + Send> TerminalGauge<W> {
    pub fn new(out: W, layout: GaugeLayout) -> Self {
        Self {
            out,
            layout,
            last_line: String::new(),
        }
    }
}

impl<W: Write + Send> RenderSink for TerminalGauge<W> {
    fn render(&mut self, snapshot: &StatusSnapshot) -> Result<RenderControl, RenderError> {
        let line = self.layout.line(snapshot);
        if line != self.last_line {
            write!(self.out, "\r{line}")?;
            self.out.flush()?;
            self.last_line = line;
        }
        Ok(RenderControl::Continue)
    }

    fn finish(&mut self) -> Result<(), RenderError> {
        if !self.last_line.is_empty() {
            writeln!(self.out)?;
            self.out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> GaugeLayout {
        GaugeLayout {
            width: 30,
            threshold: 4_000.0,
            pulled_back_level: Some(2_000.0),
        }
    }

    fn snapshot(intensity: f64, state: EngineState) -> StatusSnapshot {
        StatusSnapshot {
            intensity,
            state,
            updates: 1,
        }
    }

    #[test]
    fn idle_gauge_shows_markers_only() {
        let line = layout().line(&snapshot(0.0, EngineState::Idle));
        assert!(line.starts_with("[          :         |         ] idle"));
        assert!(line.ends_with("0.0"));
    }

    #[test]
    fn engaged_gauge_fills_past_threshold() {
        let line = layout().line(&snapshot(5_000.0, EngineState::Engaged));
        assert!(line.starts_with("[#########################     ] engaged"));
        assert!(line.ends_with("5000.0"));
    }

    #[test]
    fn overload_saturates_the_bar() {
        let line = layout().line(&snapshot(1.0e9, EngineState::Engaged));
        assert!(line.starts_with(&format!("[{}]", "#".repeat(30))));
    }

    #[test]
    fn terminal_gauge_skips_unchanged_frames() {
        let mut gauge = TerminalGauge::new(Vec::new(), layout());
        let frame = snapshot(2_500.0, EngineState::PulledBack);

        gauge.render(&frame).expect("first frame");
        gauge.render(&frame).expect("repeat frame");
        gauge.finish().expect("finish");

        let written = String::from_utf8(gauge.out.clone()).expect("utf8");
        assert_eq!(written.matches('\r').count(), 1);
        assert!(written.contains("pulled-back"));
        assert!(written.ends_with('\n'));
    }
}
