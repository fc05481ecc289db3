pub mod config;
pub mod ids;
pub mod telemetry;

pub use config::Config;
