use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::Path,
    time::{SystemTime, UNIX_EPOCH},
};

use log::{LevelFilter, Log, Metadata, Record};
use parking_lot::Mutex;
use serde_json::json;

/// `log` backend: human lines on stderr plus an optional JSON-lines file.
/// Stdout stays free for the gauge and `replay` output.
pub struct Logger {
    level: LevelFilter,
    json_file: Option<Mutex<File>>,
    gauge_spacing: bool,
}

impl Logger {
    pub fn new(level: LevelFilter, json_path: Option<&Path>) -> io::Result<Self> {
        let json_file = match json_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Mutex::new(file))
            }
            None => None,
        };
        Ok(Self {
            level,
            json_file,
            gauge_spacing: false,
        })
    }

    /// Starts each stderr line on a fresh row so it does not land on the
    /// in-place gauge line. Only useful while the gauge is drawing.
    pub fn with_gauge_spacing(mut self, on: bool) -> Self {
        self.gauge_spacing = on;
        self
    }

    /// Installs this logger as the global `log` backend.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }

    fn stderr_line(&self, record: &Record<'_>) -> String {
        let lead = if self.gauge_spacing { "\n" } else { "" };
        format!(
            "{lead}[{:<5}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    }

    fn event(&self, record: &Record<'_>) {
        let Some(file) = &self.json_file else {
            return;
        };

        let entry = json!({
            "ts_ms": now_ms(),
            "level": record.level().as_str().to_ascii_lowercase(),
            "target": record.target(),
            "msg": record.args().to_string(),
        });

        let mut file = file.lock();
        let _ = writeln!(file, "{entry}");
        let _ = file.flush();
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{}", self.stderr_line(record));
        self.event(record);
    }

    fn flush(&self) {
        if let Some(file) = &self.json_file {
            let _ = file.lock().flush();
        }
    }
}

/// Parses `error|warn|info|debug|trace|off`, case-insensitively.
pub fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.trim()
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level `{raw}` (use off|error|warn|info|debug|trace)"))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
