mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use telemetry::{ErrorBody, LatestReading, Reading};
use tracing::{info, warn};

/// Pushes readings to a sensor relay the way a field device does.
#[derive(Debug, Parser)]
#[command(name = "simulator")]
struct Args {
    /// Base URL of the relay
    #[arg(long, env = "RELAY_URL", default_value = "http://localhost:3000")]
    relay_url: String,

    #[arg(long, env = "DEVICE_ID", default_value = "ESP32_001")]
    device_id: String,

    /// Delay between cycles
    #[arg(
        long,
        env = "INTERVAL_MS",
        default_value_t = 5000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,

    /// Number of cycles to run, 0 runs forever
    #[arg(long, env = "COUNT", default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let base = args.relay_url.trim_end_matches('/').to_string();

    info!("Starting device simulator");
    info!(
        "Relay: {}, Device: {}, Interval: {}ms",
        base, args.device_id, args.interval_ms
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .context("failed to build HTTP client")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut cycle = 0u64;

    loop {
        ticker.tick().await;
        cycle += 1;

        let reading = Reading {
            device_id: args.device_id.clone(),
            temperature: random_temperature(&mut rand::thread_rng()),
        };

        // Failures are logged and the device carries on at the next tick
        match save_reading(&client, &base, &reading).await {
            Ok(SaveOutcome::Saved(status)) => info!(
                "Saved {} @ {}°C ({})",
                reading.device_id, reading.temperature, status
            ),
            Ok(SaveOutcome::Rejected(status, error)) => {
                warn!("Relay rejected reading ({}): {}", status, error)
            }
            Err(e) => warn!("Save failed: {:#}", e),
        }
        match fetch_latest(&client, &base, &args.device_id).await {
            Ok(FetchOutcome::Latest(latest)) => info!(
                "Latest for {}: {}°C at {}",
                args.device_id, latest.temperature, latest.timestamp
            ),
            Ok(FetchOutcome::Unavailable(status, error)) => {
                warn!("Fetch returned {}: {}", status, error)
            }
            Err(e) => warn!("Fetch failed: {:#}", e),
        }

        if args.count > 0 && cycle >= args.count {
            info!("Completed {} cycles", cycle);
            return Ok(());
        }
    }
}

/// Temperature in [20.0, 30.0) with one decimal, as the firmware reports it.
fn random_temperature(rng: &mut impl Rng) -> f64 {
    rng.gen_range(200..300) as f64 / 10.0
}

/// What the relay made of one save attempt
#[derive(Debug, PartialEq)]
enum SaveOutcome {
    Saved(StatusCode),
    Rejected(StatusCode, String),
}

/// What the relay answered to one latest-query
#[derive(Debug)]
enum FetchOutcome {
    Latest(LatestReading),
    Unavailable(StatusCode, String),
}

async fn save_reading(client: &Client, base: &str, reading: &Reading) -> Result<SaveOutcome> {
    let resp = client
        .post(format!("{}/api/v1/data/save", base))
        .json(reading)
        .send()
        .await
        .context("relay unreachable")?;

    let status = resp.status();
    if status == StatusCode::OK || status == StatusCode::CREATED {
        Ok(SaveOutcome::Saved(status))
    } else {
        Ok(SaveOutcome::Rejected(status, error_text(resp).await))
    }
}

async fn fetch_latest(client: &Client, base: &str, device_id: &str) -> Result<FetchOutcome> {
    let resp = client
        .get(format!("{}/api/v1/data/latest", base))
        .query(&[("device", device_id)])
        .send()
        .await
        .context("relay unreachable")?;

    match resp.status() {
        StatusCode::OK => {
            let latest: LatestReading = resp.json().await.context("malformed latest reading")?;
            Ok(FetchOutcome::Latest(latest))
        }
        status => Ok(FetchOutcome::Unavailable(status, error_text(resp).await)),
    }
}

async fn error_text(resp: reqwest::Response) -> String {
    match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => "<no error body>".to_string(),
    }
}
