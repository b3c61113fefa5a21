use std::{fs, path::Path};

use anyhow::Result;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tempfile::TempDir;
use tokio_test::assert_ok;

use agrisense_dashboard::{routes, Config};

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    timestamp: NaiveDateTime,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    sensor: String,
    label: String,
    min: Option<f64>,
    max: Option<f64>,
    points: Vec<SeriesPoint>,
}

/// Three weeks of hourly readings starting 2023-05-01.
fn write_readings(path: &Path) {
    // ---
    let start = NaiveDate::from_ymd_opt(2023, 5, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut body = String::from("timestamp,TC,HUM,PRES,US,SOIL1\n");
    for h in 0..24 * 21 {
        let ts = start + Duration::hours(h);
        let day = 2.0 * std::f64::consts::PI * (h % 24) as f64 / 24.0;
        let hum = if h == 5 { String::new() } else { format!("{}", 60.0 - 10.0 * day.sin()) };
        body.push_str(&format!(
            "{},{},{},{},{},{}\n",
            ts.format("%Y-%m-%d %H:%M:%S"),
            20.0 + 5.0 * day.sin(),
            hum,
            1013.0,
            40.0 + (h % 3) as f64,
            30.0
        ));
    }
    fs::write(path, body).unwrap();
}

fn test_config(dir: &TempDir) -> Config {
    // ---
    Config {
        data_path: dir.path().join("cleaned_data.csv"),
        forecast_path: dir.path().join("predicted_data_2024.csv"),
        stylesheet_path: dir.path().join("styles.css"),
        sample_size: 50,
        ..Config::default()
    }
}

async fn spawn_app(config: Config) -> Result<String> {
    // ---
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, routes::router(config)).await.ok();
    });
    Ok(format!("http://{}", addr))
}

async fn app_with_data() -> Result<(TempDir, Config, String)> {
    // ---
    let dir = tempfile::tempdir()?;
    let config = test_config(&dir);
    write_readings(&config.data_path);
    let base = spawn_app(config.clone()).await?;
    Ok((dir, config, base))
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let body: Value = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["data_present"], true);
    assert_eq!(body["forecast_ready"], false);
    Ok(())
}

#[tokio::test]
async fn summary_reports_averages() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let body: Value = Client::new()
        .get(format!("{}/api/summary", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body["rows"], 504);
    let sensors = body["sensors"].as_array().unwrap();
    assert_eq!(sensors.len(), 5);
    assert_eq!(sensors[0]["sensor"], "TC");
    assert_eq!(sensors[0]["label"], "Temperature");
    assert!((sensors[0]["average"].as_f64().unwrap() - 20.0).abs() < 1e-6);
    assert_eq!(sensors[2]["average"].as_f64(), Some(1013.0));
    Ok(())
}

#[tokio::test]
async fn readings_filter_by_single_day_hours() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let url = format!(
        "{}/api/readings?sensor=TC&start_date=2023-05-03&end_date=2023-05-03&start_time=06:00:00&end_time=12:00:00",
        base
    );
    let resp: SeriesResponse = Client::new().get(&url).send().await?.json().await?;

    assert_eq!(resp.sensor, "TC");
    assert_eq!(resp.label, "Temperature");
    assert_eq!(resp.points.len(), 7);
    assert_eq!(
        resp.points[0].timestamp,
        NaiveDate::from_ymd_opt(2023, 5, 3)
            .unwrap()
            .and_hms_opt(6, 0, 0)
            .unwrap()
    );
    let min = resp.min.unwrap();
    let max = resp.max.unwrap();
    assert!(resp.points.iter().all(|p| p.value >= min && p.value <= max));
    Ok(())
}

#[tokio::test]
async fn missing_humidity_is_forward_filled() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let url = format!(
        "{}/api/readings?sensor=HUM&start_date=2023-05-01&end_date=2023-05-01&start_time=04:00:00&end_time=05:00:00",
        base
    );
    let resp: SeriesResponse = Client::new().get(&url).send().await?.json().await?;
    assert_eq!(resp.points.len(), 2);
    assert_eq!(resp.points[0].value, resp.points[1].value);
    Ok(())
}

#[tokio::test]
async fn distribution_and_sample() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let client = Client::new();

    let body: Value = client
        .get(format!("{}/api/sensors/US/distribution", base))
        .send()
        .await?
        .json()
        .await?;
    let bins = body["bins"].as_array().unwrap();
    assert_eq!(bins.len(), 5);
    let total: u64 = bins.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 504);

    let rows: Vec<Value> = client
        .get(format!("{}/api/readings/sample", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(rows.len(), 50);

    let unknown = client
        .get(format!("{}/api/sensors/CO2/distribution", base))
        .send()
        .await?;
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    for bins in ["0", "101", "4398046511104"] {
        let resp = client
            .get(format!("{}/api/sensors/US/distribution?bins={}", base, bins))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let err: Value = resp.json().await?;
        assert_eq!(err["error"], "bins must be between 1 and 100");
    }

    // Server is still up
    let health = client.get(format!("{}/health", base)).send().await?;
    assert_eq!(health.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn correlation_pair_requires_two_factors() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let client = Client::new();

    let body: Value = client
        .get(format!("{}/api/correlation/pair?first=TC&second=HUM", base))
        .send()
        .await?
        .json()
        .await?;
    // Humidity mirrors temperature apart from one forward-filled hour
    assert!(body["coefficient"].as_f64().unwrap() < -0.99);
    assert_eq!(body["explanation"], "Very strong correlation.");

    let same = client
        .get(format!("{}/api/correlation/pair?first=TC&second=TC", base))
        .send()
        .await?;
    assert_eq!(same.status(), StatusCode::BAD_REQUEST);
    let err: Value = same.json().await?;
    assert_eq!(
        err["error"],
        "Please select two different factors to calculate correlation."
    );

    let matrix: Value = client
        .get(format!("{}/api/correlation", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(matrix["sensors"].as_array().unwrap().len(), 5);
    // Constant pressure has no defined coefficient
    assert!(matrix["values"][2][0].is_null());
    Ok(())
}

#[tokio::test]
async fn missing_data_file_is_reported() -> Result<()> {
    // ---
    let dir = tempfile::tempdir()?;
    let base = spawn_app(test_config(&dir)).await?;
    let client = Client::new();

    let resp = client.get(format!("{}/api/summary", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let err: Value = resp.json().await?;
    assert!(err["error"]
        .as_str()
        .unwrap()
        .starts_with("Data file not found at path"));

    let page = client.get(format!("{}/", base)).send().await?;
    assert_eq!(page.status(), StatusCode::NOT_FOUND);
    assert!(page.text().await?.contains("Data file not found at path"));
    Ok(())
}

#[tokio::test]
async fn landing_page_renders_cards() -> Result<()> {
    // ---
    let (_dir, cfg, base) = app_with_data().await?;
    let client = Client::new();

    let html = client.get(format!("{}/", base)).send().await?.text().await?;
    assert!(html.contains("CSS file not found at path"));
    assert!(html.contains("<h2>Soil Moisture</h2><p>Average: 30.00%</p>"));

    fs::write(&cfg.stylesheet_path, ".card { color: green; }")?;
    let html = client.get(format!("{}/", base)).send().await?.text().await?;
    assert!(html.contains("<style>.card { color: green; }</style>"));
    assert!(!html.contains("CSS file not found"));
    Ok(())
}

#[tokio::test]
async fn forecast_is_generated_once_and_served() -> Result<()> {
    // ---
    let (_dir, cfg, base) = app_with_data().await?;
    let client = Client::new();
    assert!(!cfg.forecast_path.exists());

    let url = format!(
        "{}/api/forecast?sensor=TC_predicted&start_date=2024-03-01&end_date=2024-03-01",
        base
    );
    let resp = client.get(&url).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let series: SeriesResponse = resp.json().await?;
    assert_eq!(series.sensor, "TC");
    assert_eq!(series.points.len(), 24);
    assert!(series.points.iter().all(|p| p.value.is_finite()));

    let written = assert_ok!(fs::read_to_string(&cfg.forecast_path));
    assert_eq!(written.lines().count(), 8_785);
    let modified = fs::metadata(&cfg.forecast_path)?.modified()?;

    // Second request reuses the file
    let again = client.get(&url).send().await?;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(fs::metadata(&cfg.forecast_path)?.modified()?, modified);
    assert_eq!(fs::read_to_string(&cfg.forecast_path)?, written);
    Ok(())
}

#[tokio::test]
async fn forecast_outlook_for_covered_and_uncovered_days() -> Result<()> {
    // ---
    let (_dir, _cfg, base) = app_with_data().await?;
    let client = Client::new();

    let body: Value = client
        .get(format!("{}/api/forecast/outlook?date=2024-06-10", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["date"], "2024-06-10");
    assert!(body["today"]["TC"].is_number());
    assert_eq!(body["next_days"].as_array().unwrap().len(), 3);
    assert_eq!(body["analytics"].as_array().unwrap().len(), 8);

    let outside = client
        .get(format!("{}/api/forecast/outlook?date=2030-01-01", base))
        .send()
        .await?;
    assert_eq!(outside.status(), StatusCode::NOT_FOUND);
    Ok(())
}
