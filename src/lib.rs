pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod failure;
pub mod key;
pub mod logging;
pub mod operation;
pub mod runner;
pub mod service;
pub mod stats;
pub mod strategy;

pub use config::LoadConfiguration;
pub use error::{LoadError, ServiceError};
pub use runner::{RunSummary, Runner, RunnerBuilder, RunnerConfig};
