//! Backend for the smart agriculture dashboard.
//!
//! Serves historical sensor readings (temperature, humidity, air pressure,
//! ultrasound distance and soil moisture) and a one-year hourly forecast
//! derived from them. See `main.rs` for the binary entry point.

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod error;
pub mod forecast;
pub mod models;
pub mod routes;

pub use config::Config;
pub use error::{DashboardError, ForecastError};

// Re-exported so that routes/*.rs only depend on their parent module, not on
// where each type lives.
pub use models::{ForecastRecord, Sensor, SensorReading};
