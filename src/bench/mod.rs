pub mod config;

pub use config::{ContinuousConfig, DEFAULT_CONFIG, RunnerConfig, load_config, parse_config};
