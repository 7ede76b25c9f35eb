//! Offline replay of recorded draw traces through the trigger engine.
//!
//! Trace lines are `ms,v0,v1,v2[,...]`; blank lines, `#` comments and an
//! optional `ms,...` header are skipped. Timestamps must not go backwards.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    sample::{parse_sample_line, Sample},
    trigger::{EngineState, TriggerAction, TriggerConfig, TriggerEngine},
};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TracePoint {
    pub t_ms: u64,
    pub sample: Sample,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReplayEvent {
    pub t_ms: u64,
    pub action: TriggerAction,
    pub intensity: f64,
    pub state: EngineState,
}

pub const EVENT_HEADER: &str = "event,ms,action,intensity,state";

pub fn load_trace(path: &Path) -> Result<Vec<TracePoint>, ReplayError> {
    let text = fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_trace(&text)
}

pub fn parse_trace(text: &str) -> Result<Vec<TracePoint>, ReplayError> {
    let mut out: Vec<TracePoint> = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("ms,") {
            continue;
        }

        let Some((ms, rest)) = trimmed.split_once(',') else {
            return Err(ReplayError::Parse {
                line,
                message: "expected `ms,v0,v1,v2`".into(),
            });
        };
        let t_ms = ms.trim().parse::<u64>().map_err(|_| ReplayError::Parse {
            line,
            message: format!("invalid timestamp `{}`", ms.trim()),
        })?;
        let sample = parse_sample_line(rest).map_err(|err| ReplayError::Parse {
            line,
            message: err.to_string(),
        })?;

        if let Some(prev) = out.last() {
            if t_ms < prev.t_ms {
                return Err(ReplayError::Parse {
                    line,
                    message: format!("timestamp {t_ms} goes back from {}", prev.t_ms),
                });
            }
        }
        out.push(TracePoint { t_ms, sample });
    }
    Ok(out)
}

/// Runs the trace through a fresh engine. A press still held when the trace
/// ends is released at the last timestamp, as a shutdown would.
pub fn replay(config: TriggerConfig, trace: &[TracePoint]) -> Vec<ReplayEvent> {
    let mut engine = TriggerEngine::new(config);
    let mut events = Vec::new();

    for point in trace {
        let output = engine.observe(point.t_ms, &point.sample);
        if let Some(action) = output.action {
            events.push(ReplayEvent {
                t_ms: point.t_ms,
                action,
                intensity: engine.last_intensity(),
                state: output.state,
            });
        }
    }

    let tail_ms = trace.last().map_or(0, |p| p.t_ms);
    let output = engine.disarm();
    if let Some(action) = output.action {
        events.push(ReplayEvent {
            t_ms: tail_ms,
            action,
            intensity: engine.last_intensity(),
            state: output.state,
        });
    }
    events
}

pub fn format_event(event: &ReplayEvent) -> String {
    format!(
        "event,{},{},{:.1},{}",
        event.t_ms,
        event.action.label(),
        event.intensity,
        event.state.label()
    )
}

/// Expected action labels, one per line or comma-separated.
pub fn parse_expected_actions(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split(','))
        .map(|label| label.trim().to_ascii_lowercase())
        .filter(|label| !label.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config(debounce_ms: u64) -> TriggerConfig {
        TriggerConfig::new(4_000.0, Some(0.5), Duration::from_millis(debounce_ms))
            .expect("valid config")
    }

    #[test]
    fn parses_points_and_skips_noise() {
        let trace = parse_trace("# rig capture\nms,a,b,c\n\n0,1,2,3\n 20 , 4,5,6 \n")
            .expect("valid trace");

        assert_eq!(trace.len(), 2);
        assert_eq!(trace[1].t_ms, 20);
        assert_eq!(trace[1].sample.channels(), [4.0, 5.0, 6.0]);
    }

    #[test]
    fn rejects_backwards_time_with_line_number() {
        let err = parse_trace("10,1,1,1\n5,1,1,1\n").expect_err("time went back");
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn rejects_bad_fields() {
        assert!(parse_trace("x,1,2,3\n").is_err());
        assert!(parse_trace("10,1,two,3\n").is_err());
        assert!(parse_trace("10\n").is_err());
    }

    #[test]
    fn debounce_blocks_quick_redraw() {
        let trace = parse_trace("0,5000,0,0\n50,3000,0,0\n100,5000,0,0\n250,5000,0,0\n")
            .expect("valid trace");
        let events = replay(config(200), &trace);

        let summary: Vec<(u64, &str)> = events
            .iter()
            .map(|e| (e.t_ms, e.action.label()))
            .collect();
        assert_eq!(
            summary,
            [(0, "press"), (50, "release"), (250, "press"), (250, "release")]
        );
    }

    #[test]
    fn formats_event_rows() {
        let event = ReplayEvent {
            t_ms: 1_200,
            action: TriggerAction::Press,
            intensity: 4_512.34,
            state: EngineState::Engaged,
        };
        assert_eq!(format_event(&event), "event,1200,press,4512.3,engaged");
    }

    #[test]
    fn expected_actions_accept_lines_or_commas() {
        assert_eq!(
            parse_expected_actions("# draws\nPress,release\nrelease\n"),
            ["press", "release", "release"]
        );
    }
}
