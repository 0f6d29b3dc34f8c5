//! Loop configuration
//!
//! Read-only input to the recording loop: roll durations, trigger
//! sensitivity and the watchdog policy. The core owns no file format beyond
//! the JSON written by [`store`].

pub mod schema;
pub mod store;

pub use schema::LoopConfig;
pub use store::{load_config, save_config, ConfigError};
