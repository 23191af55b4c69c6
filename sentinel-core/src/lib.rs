pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod repository;
pub mod stats;

pub use config::Config;
pub use error::{Error, Result};
pub use stats::StatsAggregator;
