mod config;
mod core;

pub use self::config::{
    TriggerConfig, DEFAULT_DEBOUNCE_MS, DEFAULT_PULLED_BACK_RATIO, DEFAULT_THRESHOLD,
};
pub use self::core::{EngineState, TriggerAction, TriggerEngine, TriggerOutput};
