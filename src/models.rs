//! Data models for the agriculture sensor dashboard.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

// ---

/// One of the five sensor channels of the monitoring deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sensor {
    #[serde(rename = "TC")]
    Tc,
    #[serde(rename = "HUM")]
    Hum,
    #[serde(rename = "PRES")]
    Pres,
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "SOIL1")]
    Soil1,
}

impl Sensor {
    /// Column order used by every CSV this service reads or writes.
    pub const ALL: [Sensor; 5] = [
        Sensor::Tc,
        Sensor::Hum,
        Sensor::Pres,
        Sensor::Us,
        Sensor::Soil1,
    ];

    pub fn index(self) -> usize {
        // ---
        match self {
            Sensor::Tc => 0,
            Sensor::Hum => 1,
            Sensor::Pres => 2,
            Sensor::Us => 3,
            Sensor::Soil1 => 4,
        }
    }

    /// Column name in the historical readings CSV.
    pub fn column(self) -> &'static str {
        // ---
        match self {
            Sensor::Tc => "TC",
            Sensor::Hum => "HUM",
            Sensor::Pres => "PRES",
            Sensor::Us => "US",
            Sensor::Soil1 => "SOIL1",
        }
    }

    /// Column name in the forecast CSV.
    pub fn predicted_column(self) -> &'static str {
        // ---
        match self {
            Sensor::Tc => "TC_predicted",
            Sensor::Hum => "HUM_predicted",
            Sensor::Pres => "PRES_predicted",
            Sensor::Us => "US_predicted",
            Sensor::Soil1 => "SOIL1_predicted",
        }
    }

    pub fn label(self) -> &'static str {
        // ---
        match self {
            Sensor::Tc => "Temperature",
            Sensor::Hum => "Humidity",
            Sensor::Pres => "Air Pressure",
            Sensor::Us => "Ultrasound",
            Sensor::Soil1 => "Soil Moisture",
        }
    }

    pub fn unit(self) -> &'static str {
        // ---
        match self {
            Sensor::Tc => "°C",
            Sensor::Hum => "%",
            Sensor::Pres => "hPa",
            Sensor::Us => "",
            Sensor::Soil1 => "%",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSensor(pub String);

impl fmt::Display for UnknownSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unknown sensor '{}'; expected one of TC, HUM, PRES, US, SOIL1",
            self.0
        )
    }
}

/// Accepts both the raw column (`TC`) and the forecast column (`TC_predicted`).
impl FromStr for Sensor {
    type Err = UnknownSensor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        let upper = s.trim().to_ascii_uppercase();
        let base = upper.strip_suffix("_PREDICTED").unwrap_or(&upper);
        Sensor::ALL
            .into_iter()
            .find(|sensor| sensor.column() == base)
            .ok_or_else(|| UnknownSensor(s.to_string()))
    }
}

/// A timestamped row of the historical sensor CSV.
///
/// Values are indexed by [`Sensor::index`]. `None` marks a cell that was empty
/// and could not be forward-filled (a leading gap).
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    // ---
    pub timestamp: NaiveDateTime,
    pub values: [Option<f64>; 5],
}

impl SensorReading {
    pub fn value(&self, sensor: Sensor) -> Option<f64> {
        self.values[sensor.index()]
    }
}

/// One hour of the annual forecast, one predicted value per sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    // ---
    pub timestamp: NaiveDateTime,
    pub values: [f64; 5],
}

impl ForecastRecord {
    pub fn value(&self, sensor: Sensor) -> f64 {
        self.values[sensor.index()]
    }
}

/// Anything the dashboard pages can filter by time and chart per sensor.
pub trait TimedRow {
    fn timestamp(&self) -> NaiveDateTime;
    fn sensor_value(&self, sensor: Sensor) -> Option<f64>;
}

impl TimedRow for SensorReading {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn sensor_value(&self, sensor: Sensor) -> Option<f64> {
        self.value(sensor)
    }
}

impl TimedRow for ForecastRecord {
    fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    fn sensor_value(&self, sensor: Sensor) -> Option<f64> {
        Some(self.value(sensor))
    }
}

/// A single chart point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}
