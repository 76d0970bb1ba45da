//! Configuration module.
//!
//! JSON configuration file with serde defaults per concern, plus a `PORT`
//! environment override. Structure:
//!
//! - [`types`]: root `Config` struct
//! - [`server`]: pump/sweep/broadcast knobs and default phase timers
//! - [`logging`]: logging configuration
//! - [`loader`]: loading functions
//! - [`defaults`]: default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod server;
pub mod types;

pub use loader::load;

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use server::{ServerConfig, TimersConfig};

pub use types::Config;
