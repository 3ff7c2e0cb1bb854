//! Public IP discovery by asking a panel of echo services at once
//!
//! Every endpoint gets its own task; [`Probe::run`] returns only after all
//! of them have answered, failed or timed out. There is no early exit on
//! the first answer: behind NAT or a proxy different services can disagree,
//! and the point is to see all of them.
//!
//! Failures are never errors. A dead endpoint shows up as a `debug!` line
//! and nothing else.

use crate::core::error::Result;
use crate::utils::round_duration;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default panel. Bare hostnames are fetched over plain HTTP.
pub const ENDPOINTS: &[&str] = &[
    "https://api.maao.cc/ip/",
    "https://d5k.top/ping",
    "https://api.ipify.org?format=json",
    "https://alanwei.azurewebsites.net/api/tool/ip",
    "https://httpbin.org/ip",
    "https://ident.me",
    "ip.gs",
    "ip.sb",
    "cip.cc",
    "icanhazip.com",
    "ipv4.icanhazip.com",
    "api.ipify.org",
    "ifconfig.me",
    "ifconfig.co",
    "ipecho.net/plain",
    "whatismyip.akamai.com",
    "inet-ip.info",
    "myip.ipip.net",
    "ipinfo.io",
    "ifcfg.cn",
    "4.ipw.cn",
    "members.3322.org/dyndns/getip",
    "curlmyip.com",
    "ip.appspot.com",
    "www.trackip.net/ip",
];

/// Prefixes `http://` onto endpoints given without a scheme.
pub fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.starts_with("http") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// Collapses every whitespace run to a single space so multi-line bodies
/// fit on one log line.
pub fn collapse_whitespace(body: &str) -> String {
    body.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One endpoint's answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub endpoint: String,
    pub body: String,
    pub elapsed: Duration,
}

impl fmt::Display for ProbeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:?}] {}: {}",
            round_duration(self.elapsed),
            self.endpoint,
            self.body
        )
    }
}

/// A configured probe: shared HTTP client, endpoint list and per-call timeout.
#[derive(Debug, Clone)]
pub struct Probe {
    client: reqwest::Client,
    endpoints: Vec<String>,
    timeout: Duration,
}

impl Probe {
    pub fn new<I, S>(endpoints: I, timeout: Duration) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let client = reqwest::ClientBuilder::new()
            .no_proxy()
            .connect_timeout(timeout)
            .timeout(timeout)
            .user_agent("curl")
            .build()?;

        Ok(Self {
            client,
            endpoints: endpoints
                .into_iter()
                .map(|e| normalize_endpoint(e.as_ref()))
                .collect(),
            timeout,
        })
    }

    pub fn with_default_endpoints() -> Result<Self> {
        Self::new(ENDPOINTS.iter().copied(), DEFAULT_TIMEOUT)
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Per-endpoint timeout, which also bounds a whole [`Probe::run`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queries every endpoint concurrently and waits for all of them.
    ///
    /// Each answer is logged as it arrives; the returned reports are in
    /// arrival order. Endpoints that fail, time out or return an empty body
    /// are left out.
    pub async fn run(&self) -> Vec<ProbeReport> {
        let mut tasks = JoinSet::new();
        for endpoint in &self.endpoints {
            tasks.spawn(probe_one(
                self.client.clone(),
                endpoint.clone(),
                self.timeout,
            ));
        }

        let mut reports = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(report)) => {
                    info!("{report}");
                    reports.push(report);
                }
                Ok(None) => {}
                Err(e) => debug!("Probe task did not finish: {e}"),
            }
        }
        reports
    }
}

async fn probe_one(
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
) -> Option<ProbeReport> {
    let start = Instant::now();
    let fetch = async {
        let response = client.get(endpoint.as_str()).send().await?;
        response.text().await
    };

    // The client timeout should fire first; this is the hard ceiling.
    let body = match tokio::time::timeout(timeout, fetch).await {
        Ok(Ok(body)) => body,
        Ok(Err(e)) => {
            debug!(endpoint = %endpoint, "Probe failed: {e}");
            return None;
        }
        Err(_) => {
            debug!(endpoint = %endpoint, "Probe timed out after {timeout:?}");
            return None;
        }
    };

    let body = collapse_whitespace(&body);
    if body.is_empty() {
        return None;
    }
    Some(ProbeReport {
        endpoint,
        body,
        elapsed: start.elapsed(),
    })
}
