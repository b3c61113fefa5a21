//! Configuration loader for the `agrisense-dashboard` backend service.
//!
//! This module centralizes all runtime configuration values and their defaults,
//! loading from environment variables (with optional `.env` file support
//! provided by the caller). Every other module receives a [`Config`] instead of
//! reading `env::var` on its own.
use std::{env, net::SocketAddr, ops::RangeInclusive, path::PathBuf};

use anyhow::{anyhow, Result};
use chrono_tz::Tz;

/// Parse an optional numeric environment variable with a default value.
macro_rules! parse_env {
    ($var_name:expr, $ty:ty, $default:expr) => {
        env::var($var_name)
            .ok()
            .map(|v| v.trim().parse::<$ty>())
            .transpose()
            .map_err(|e| anyhow!("Invalid {}: {}", $var_name, e))?
            .unwrap_or($default)
    };
}

/// Read an optional path environment variable, falling back to a default.
macro_rules! path_env {
    ($var_name:expr, $default:expr) => {
        env::var($var_name)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from($default))
    };
}

pub const DEFAULT_DATA_PATH: &str = "./cleaned_data.csv";
pub const DEFAULT_FORECAST_PATH: &str = "./predicted_data_2024.csv";
pub const DEFAULT_STYLESHEET_PATH: &str = "./styles.css";

/// Years the forecast can cover.
pub const FORECAST_YEARS: RangeInclusive<i32> = 1900..=9999;

/// Strongly typed application configuration.
///
/// All fields are immutable after loading, ensuring a consistent configuration
/// snapshot for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct Config {
    // ---
    /// Historical sensor readings (`timestamp, TC, HUM, PRES, US, SOIL1`).
    pub data_path: PathBuf,

    /// Write-once forecast output.
    pub forecast_path: PathBuf,

    /// Calendar year covered by the forecast.
    pub forecast_year: i32,

    /// Stylesheet inlined into the landing page.
    pub stylesheet_path: PathBuf,

    /// Number of rows drawn for the landing page overview charts.
    pub sample_size: usize,

    /// IANA timezone of the deployment site, used to decide "today".
    pub site_timezone: Tz,

    /// Listen address for the HTTP server.
    pub bind_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            forecast_path: PathBuf::from(DEFAULT_FORECAST_PATH),
            forecast_year: 2024,
            stylesheet_path: PathBuf::from(DEFAULT_STYLESHEET_PATH),
            sample_size: 5000,
            site_timezone: chrono_tz::Europe::Belgrade,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

/// Load configuration from environment variables with defaults.
///
/// Optional:
/// - `DATA_PATH` – sensor CSV (default: `./cleaned_data.csv`)
/// - `FORECAST_PATH` – forecast CSV (default: `./predicted_data_2024.csv`)
/// - `FORECAST_YEAR` – target year, 1900..=9999 (default: 2024)
/// - `STYLESHEET_PATH` – landing page CSS (default: `./styles.css`)
/// - `SAMPLE_SIZE` – overview sample rows (default: 5000)
/// - `SITE_TIMEZONE` – site timezone name (default: `Europe/Belgrade`)
/// - `BIND_ADDR` – listen address (default: `0.0.0.0:8080`)
///
/// Returns an error if any variable is set but invalid.
pub fn load_from_env() -> Result<Config> {
    // ---
    let defaults = Config::default();

    let data_path = path_env!("DATA_PATH", DEFAULT_DATA_PATH);
    let forecast_path = path_env!("FORECAST_PATH", DEFAULT_FORECAST_PATH);
    let stylesheet_path = path_env!("STYLESHEET_PATH", DEFAULT_STYLESHEET_PATH);
    let forecast_year = parse_env!("FORECAST_YEAR", i32, defaults.forecast_year);
    let sample_size = parse_env!("SAMPLE_SIZE", usize, defaults.sample_size);
    let site_timezone = parse_env!("SITE_TIMEZONE", Tz, defaults.site_timezone);
    let bind_addr = parse_env!("BIND_ADDR", SocketAddr, defaults.bind_addr);

    if !FORECAST_YEARS.contains(&forecast_year) {
        return Err(anyhow!(
            "Invalid FORECAST_YEAR: {} is outside {}..={}",
            forecast_year,
            FORECAST_YEARS.start(),
            FORECAST_YEARS.end()
        ));
    }

    Ok(Config {
        data_path,
        forecast_path,
        forecast_year,
        stylesheet_path,
        sample_size,
        site_timezone,
        bind_addr,
    })
}

impl Config {
    /// Log the loaded configuration for debugging purposes.
    pub fn log_config(&self) {
        // ---
        tracing::info!("Configuration loaded:");
        tracing::info!("  DATA_PATH             : {}", self.data_path.display());
        tracing::info!("  FORECAST_PATH         : {}", self.forecast_path.display());
        tracing::info!("  FORECAST_YEAR         : {}", self.forecast_year);
        tracing::info!("  STYLESHEET_PATH       : {}", self.stylesheet_path.display());
        tracing::info!("  SAMPLE_SIZE           : {}", self.sample_size);
        tracing::info!("  SITE_TIMEZONE         : {}", self.site_timezone);
        tracing::info!("  BIND_ADDR             : {}", self.bind_addr);
    }
}
