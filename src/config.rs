use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    serial::SerialSettings,
    store::default_capture_path,
    trigger::{TriggerConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_PULLED_BACK_RATIO, DEFAULT_THRESHOLD},
};

pub const ENV_PORT: &str = "BOW_TRIGGER_PORT";
pub const ENV_BAUD: &str = "BOW_TRIGGER_BAUD";
pub const ENV_PORT_HINT: &str = "BOW_TRIGGER_PORT_HINT";
pub const ENV_LOG_JSON_PATH: &str = "BOW_TRIGGER_LOG_JSON_PATH";

pub const DEFAULT_BAUD: u32 = 115_200;
// Short enough that ingestion notices shutdown within one pending read.
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 50;
pub const DEFAULT_RESET_SETTLE_MS: u64 = 1_000;
pub const DEFAULT_FRAME_RATE: u32 = 30;
/// Above this the frame period rounds toward zero and the ticker spins.
pub const MAX_FRAME_RATE: u32 = 1_000;
pub const DEFAULT_GAUGE_WIDTH: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
    #[error("{name} invalid: {message}")]
    Env { name: &'static str, message: String },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub serial: SerialSection,
    pub trigger: TriggerSection,
    pub display: DisplaySection,
    pub log: LogSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerialSection {
    pub port: Option<String>,
    pub port_hint: Option<String>,
    pub baud: u32,
    pub read_timeout_ms: u64,
    pub reset_on_open: bool,
    pub reset_settle_ms: u64,
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            port: None,
            port_hint: None,
            baud: DEFAULT_BAUD,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            reset_on_open: true,
            reset_settle_ms: DEFAULT_RESET_SETTLE_MS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerSection {
    pub threshold: f64,
    /// Toggles the pulled-back display refinement.
    pub pulled_back: bool,
    pub pulled_back_ratio: f64,
    pub debounce_ms: u64,
}

impl Default for TriggerSection {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            pulled_back: true,
            pulled_back_ratio: DEFAULT_PULLED_BACK_RATIO,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DisplaySection {
    pub frame_rate: u32,
    pub gauge_width: usize,
    pub enabled: bool,
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            gauge_width: DEFAULT_GAUGE_WIDTH,
            enabled: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogSection {
    pub level: String,
    pub json_path: Option<PathBuf>,
    /// Raw sample capture; `None` disables it.
    pub samples_csv: Option<PathBuf>,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_path: None,
            samples_csv: Some(default_capture_path()),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })
    }

    /// Loads `path` when given, otherwise starts from defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Environment overrides, resolved through `lookup` so tests do not touch
    /// the process environment. Blank values are ignored.
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |name: &str| lookup(name).filter(|raw| !raw.trim().is_empty());

        if let Some(port) = get(ENV_PORT) {
            self.serial.port = Some(port.trim().to_string());
        }
        if let Some(hint) = get(ENV_PORT_HINT) {
            self.serial.port_hint = Some(hint.trim().to_string());
        }
        if let Some(raw) = get(ENV_BAUD) {
            self.serial.baud = raw.trim().parse::<u32>().map_err(|_| ConfigError::Env {
                name: ENV_BAUD,
                message: format!("`{raw}` is not an unsigned integer"),
            })?;
        }
        if let Some(path) = get(ENV_LOG_JSON_PATH) {
            self.log.json_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.trigger_config()?;
        if self.serial.baud == 0 {
            return Err(ConfigError::Invalid("serial baud must be > 0".into()));
        }
        if self.serial.read_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "serial read_timeout_ms must be > 0".into(),
            ));
        }
        if !(1..=MAX_FRAME_RATE).contains(&self.display.frame_rate) {
            return Err(ConfigError::Invalid(format!(
                "display frame_rate must be within 1..={MAX_FRAME_RATE}"
            )));
        }
        if self.display.gauge_width < 4 {
            return Err(ConfigError::Invalid(
                "display gauge_width must be >= 4".into(),
            ));
        }
        Ok(())
    }

    pub fn trigger_config(&self) -> Result<TriggerConfig, ConfigError> {
        let ratio = self
            .trigger
            .pulled_back
            .then_some(self.trigger.pulled_back_ratio);
        TriggerConfig::new(
            self.trigger.threshold,
            ratio,
            Duration::from_millis(self.trigger.debounce_ms),
        )
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs(1) / self.display.frame_rate.max(1)
    }

    pub fn serial_settings(&self, port: String) -> SerialSettings {
        SerialSettings {
            port,
            baud: self.serial.baud,
            read_timeout: Duration::from_millis(self.serial.read_timeout_ms),
            reset_on_open: self.serial.reset_on_open,
            reset_settle: Duration::from_millis(self.serial.reset_settle_ms),
        }
    }
}
