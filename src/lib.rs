//! Draw-force sensor to synthetic mouse button bridge.
//!
//! The trigger engine turns a noisy multi-channel stream into debounced
//! press/release decisions; the run loop drives it beside a status display
//! and guarantees a held button is released on every shutdown path.

pub mod actuator;
pub mod config;
pub mod logging;
pub mod port_detect;
pub mod render;
pub mod replay;
pub mod runtime;
pub mod sample;
pub mod serial;
pub mod source;
pub mod status;
pub mod store;
pub mod trigger;
