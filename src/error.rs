//! Error taxonomy shared by the dataset loader, the forecast generator and the
//! HTTP routes.

use std::{io, path::PathBuf};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::models::Sensor;

// ---

/// Failures raised while fitting or predicting a sensor's seasonal model.
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("{sensor} has {rows} usable hourly points after outlier removal; at least 2 are required")]
    InsufficientData { sensor: Sensor, rows: usize },

    #[error("Normal equations for {sensor} are not positive definite")]
    Singular { sensor: Sensor },

    #[error("Cannot forecast year {year}: outside the supported calendar")]
    UnsupportedYear { year: i32 },
}

/// Everything that can go wrong while serving a dashboard page.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Data file not found at path: {}", path.display())]
    DataFileMissing { path: PathBuf },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("CSV error in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Column '{column}' missing from {}", path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("Unparseable timestamp '{value}' at row {row}")]
    Timestamp { row: usize, value: String },

    #[error("Invalid value '{value}' in column '{column}' at row {row}")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Forecast generation failed: {0}")]
    Forecast(#[from] ForecastError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NoData(String),

    #[error("Background task failed: {0}")]
    Task(String),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl DashboardError {
    fn status(&self) -> StatusCode {
        // ---
        match self {
            DashboardError::DataFileMissing { .. } | DashboardError::NoData(_) => {
                StatusCode::NOT_FOUND
            }
            DashboardError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("{} ({})", self, status);
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}
