//! Server-rendered landing page: stylesheet, title and one average card per
//! sensor. Charts are drawn client-side from the JSON endpoints.

use std::fmt::Write as _;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use super::{blocking, AppState};
use crate::analysis;
use crate::error::DashboardError;
use crate::models::Sensor;
use crate::{dataset, Config};

// ---

const TITLE: &str = "Smart Agriculture Dashboard";
const FOOTER: &str = "<footer>Smart Agriculture Dashboard © 2024</footer>";

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

fn escape_html(raw: &str) -> String {
    // ---
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn error_banner(message: &str) -> String {
    format!("<div class=\"error\">{}</div>", escape_html(message))
}

/// Average cards, one per sensor.
fn render_cards(averages: &[Option<f64>; 5]) -> String {
    // ---
    let mut html = String::from("<div class=\"main\"><div class=\"card-row\">");
    for sensor in Sensor::ALL {
        let average = match averages[sensor.index()] {
            Some(v) => format!("{:.2}{}", v, sensor.unit()),
            None => "n/a".to_string(),
        };
        let _ = write!(
            html,
            "<div class=\"card\" data-sensor=\"{}\"><h2>{}</h2><p>Average: {}</p></div>",
            sensor.column(),
            sensor.label(),
            escape_html(&average)
        );
    }
    html.push_str("</div></div>");
    html
}

fn render_page(style: &str, body: &str) -> String {
    // ---
    format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{TITLE}</title>{style}</head>\
         <body><h1>Welcome to the {TITLE}</h1>{body}{FOOTER}</body></html>"
    )
}

async fn index(State(config): State<Config>) -> Response {
    // ---
    let stylesheet_path = config.stylesheet_path.clone();
    let data_path = config.data_path.clone();
    let loaded = blocking(move || {
        let css = std::fs::read_to_string(&stylesheet_path).map_err(|_| {
            DashboardError::DataFileMissing {
                path: stylesheet_path.clone(),
            }
        });
        let readings = dataset::load_readings(&data_path)?;
        Ok((css, analysis::averages(&readings)))
    })
    .await;

    match loaded {
        Ok((css, averages)) => {
            let (style, banner) = match css {
                Ok(css) => (format!("<style>{css}</style>"), String::new()),
                Err(_) => (
                    String::new(),
                    error_banner(&format!(
                        "CSS file not found at path: {}",
                        config.stylesheet_path.display()
                    )),
                ),
            };
            let body = format!("{banner}{}", render_cards(&averages));
            Html(render_page(&style, &body)).into_response()
        }
        Err(err) => {
            let status = match err {
                DashboardError::DataFileMissing { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!("Landing page failed: {}", err);
            (status, Html(render_page("", &error_banner(&err.to_string())))).into_response()
        }
    }
}
