//! Health check command: asks a running glimpse server for its health report.

use std::{fmt, time::Duration};

use glimpse::api::HealthResponse;

use crate::cli::HealthArgs;

/// Why a server was judged unhealthy.
#[derive(Debug)]
pub enum Unhealthy {
    Unreachable { url: String, reason: String },
    HttpStatus(u16),
    BadBody(String),
    Status(String),
}

impl fmt::Display for Unhealthy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unhealthy::Unreachable { url, reason } => {
                write!(f, "unhealthy: failed to connect to {url}: {reason}")
            }
            Unhealthy::HttpStatus(status) => {
                write!(f, "unhealthy: server returned HTTP status {status}")
            }
            Unhealthy::BadBody(reason) => write!(f, "unhealthy: unreadable health body: {reason}"),
            Unhealthy::Status(status) => write!(f, "unhealthy: server reported '{status}'"),
        }
    }
}

impl std::error::Error for Unhealthy {}

/// Build the health endpoint URL from a base URL.
fn health_url(base: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.ends_with("/health") {
        base.to_string()
    } else {
        format!("{base}/health")
    }
}

/// Fetch and judge the health report at `base`.
async fn check(base: &str, timeout: Duration) -> Result<HealthResponse, Unhealthy> {
    let url = health_url(base);
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Unhealthy::Unreachable {
            url: url.clone(),
            reason: e.to_string(),
        })?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| Unhealthy::Unreachable {
            url: url.clone(),
            reason: e.to_string(),
        })?;
    if !response.status().is_success() {
        return Err(Unhealthy::HttpStatus(response.status().as_u16()));
    }

    let report: HealthResponse = response
        .json()
        .await
        .map_err(|e| Unhealthy::BadBody(e.to_string()))?;
    if report.status != "healthy" {
        return Err(Unhealthy::Status(report.status));
    }
    Ok(report)
}

/// Run the health check command
pub async fn run(args: &HealthArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = check(&args.url, Duration::from_secs(args.timeout)).await?;
    println!(
        "healthy: {} store, {} registered identities",
        report.store, report.identities
    );
    Ok(())
}
