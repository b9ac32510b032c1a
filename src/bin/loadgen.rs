//! 压测客户端：模拟多个用户随机访问 `/health` 和 `/predict`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Uniform};
use reqwest::StatusCode;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info};

use housing_price_api::telemetry;
use housing_price_api::types::PredictRequest;

/// 每个特征的随机范围和保留小数位，贴近真实数据分布
const FEATURE_RANGES: [(f64, f64, i32); 8] = [
    (0.5, 15.0, 4),       // MedInc
    (1.0, 52.0, 1),       // HouseAge
    (2.0, 10.0, 2),       // AveRooms
    (0.5, 2.0, 2),        // AveBedrms
    (3.0, 35000.0, 0),    // Population
    (1.0, 10.0, 2),       // AveOccup
    (32.0, 42.0, 2),      // Latitude
    (-124.0, -114.0, 2),  // Longitude
];

/// health : predict = 1 : 3
const HEALTH_SHARE: f64 = 0.25;

#[derive(Parser, Debug, Clone)]
#[command(name = "loadgen", about = "Randomized traffic against the housing price API")]
struct Args {
    /// API base URL
    #[arg(long, env = "LOADGEN_HOST", default_value = "http://127.0.0.1:8000")]
    host: String,

    /// Number of concurrent simulated users
    #[arg(long, default_value_t = 10)]
    users: usize,

    /// How long to run
    #[arg(long, default_value_t = 60)]
    duration_secs: u64,

    /// Per-request timeout
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Endpoint {
    Health,
    Predict,
}

#[derive(Default)]
struct Stats {
    successes: Mutex<BTreeMap<Endpoint, u64>>,
    failures: Mutex<BTreeMap<(Endpoint, String), u64>>,
}

impl Stats {
    fn record(&self, endpoint: Endpoint, outcome: Result<(), String>) {
        match outcome {
            Ok(()) => *self.successes.lock().entry(endpoint).or_default() += 1,
            Err(reason) => {
                debug!(?endpoint, %reason, "request failed");
                *self.failures.lock().entry((endpoint, reason)).or_default() += 1;
            }
        }
    }

    fn report(&self) {
        let successes = self.successes.lock();
        let failures = self.failures.lock();
        for endpoint in [Endpoint::Health, Endpoint::Predict] {
            let ok = successes.get(&endpoint).copied().unwrap_or(0);
            let failed: u64 = failures
                .iter()
                .filter(|((e, _), _)| *e == endpoint)
                .map(|(_, n)| n)
                .sum();
            info!(?endpoint, ok, failed, "summary");
        }
        for ((endpoint, reason), n) in failures.iter() {
            info!(?endpoint, %reason, count = n, "failure breakdown");
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn random_features(rng: &mut StdRng) -> Vec<f64> {
    FEATURE_RANGES
        .iter()
        .map(|&(low, high, decimals)| round_to(Uniform::new_inclusive(low, high).sample(rng), decimals))
        .collect()
}

async fn check_health(client: &reqwest::Client, host: &str) -> Result<(), String> {
    let res = client
        .get(format!("{host}/health"))
        .send()
        .await
        .map_err(|e| format!("transport error: {e}"))?;
    if res.status() == StatusCode::OK {
        Ok(())
    } else {
        Err(format!("Health check failed: {}", res.status().as_u16()))
    }
}

async fn check_predict(client: &reqwest::Client, host: &str, features: Vec<f64>) -> Result<(), String> {
    let res = client
        .post(format!("{host}/predict"))
        .json(&PredictRequest { features })
        .send()
        .await
        .map_err(|e| format!("transport error: {e}"))?;

    match res.status() {
        StatusCode::OK => {
            let body: Value = res
                .json()
                .await
                .map_err(|_| "Failed to parse JSON".to_string())?;
            if body.get("prediction").is_some() {
                Ok(())
            } else {
                Err("Invalid response format".to_string())
            }
        }
        StatusCode::SERVICE_UNAVAILABLE => Err("Service unavailable".to_string()),
        other => Err(format!("Status code: {}", other.as_u16())),
    }
}

async fn run_user(
    id: usize,
    client: reqwest::Client,
    host: String,
    stats: Arc<Stats>,
    deadline: Instant,
) {
    let mut rng = StdRng::from_entropy();
    let wait = Uniform::new_inclusive(0.5, 2.0);

    // 先用一次 health 预热连接
    stats.record(Endpoint::Health, check_health(&client, &host).await);

    while Instant::now() < deadline {
        if rng.gen_bool(HEALTH_SHARE) {
            stats.record(Endpoint::Health, check_health(&client, &host).await);
        } else {
            let features = random_features(&mut rng);
            stats.record(Endpoint::Predict, check_predict(&client, &host, features).await);
        }

        let pause = Instant::now() + Duration::from_secs_f64(wait.sample(&mut rng));
        tokio::time::sleep_until(pause.min(deadline)).await;
    }
    debug!(user = id, "user finished");
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing("info");
    let args = Args::parse();

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.timeout_secs))
        .connect_timeout(Duration::from_secs(30))
        .build()?;

    info!(host = %args.host, users = args.users, duration_secs = args.duration_secs, "starting load");

    let stats = Arc::new(Stats::default());
    let deadline = Instant::now() + Duration::from_secs(args.duration_secs);

    let mut users = Vec::with_capacity(args.users);
    for id in 0..args.users {
        users.push(tokio::spawn(run_user(
            id,
            client.clone(),
            args.host.trim_end_matches('/').to_string(),
            Arc::clone(&stats),
            deadline,
        )));
    }
    for user in users {
        user.await?;
    }

    stats.report();
    Ok(())
}
