//! Tencent Cloud Lighthouse firewall API client
//!
//! Two actions are used:
//!
//! - `DescribeFirewallRules`, paged with `Offset`/`Limit` until `TotalCount`
//!   rules have been collected
//! - `ModifyFirewallRules`, which replaces the instance's full rule list
//!
//! Every call is a signed JSON `POST /`. API errors arrive as HTTP 200 with a
//! `Response.Error` object and are surfaced verbatim as [`Error::Remote`].

use crate::config::LighthouseConfig;
use crate::core::error::{Error, Result};
use crate::core::firewall::{Action, Protocol, RemoteRule};
use crate::gateway::signing::{self, SigningRequest};
use crate::gateway::{ModifyAck, RemoteAuthority};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const SERVICE: &str = "lighthouse";
pub const API_VERSION: &str = "2020-03-24";
const PAGE_LIMIT: usize = 100;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rule record as the API serializes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireRule {
    protocol: Protocol,
    port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cidr_block: Option<String>,
    action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    firewall_rule_description: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl From<WireRule> for RemoteRule {
    // The API reports unset optional fields as empty strings
    fn from(rule: WireRule) -> Self {
        Self {
            protocol: rule.protocol,
            port: rule.port,
            cidr_block: blank_to_none(rule.cidr_block),
            action: rule.action,
            description: blank_to_none(rule.firewall_rule_description),
        }
    }
}

impl From<&RemoteRule> for WireRule {
    fn from(rule: &RemoteRule) -> Self {
        Self {
            protocol: rule.protocol,
            port: rule.port.clone(),
            cidr_block: rule.cidr_block.clone(),
            action: rule.action,
            firewall_rule_description: rule.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeFirewallRulesRequest<'a> {
    instance_id: &'a str,
    offset: usize,
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeFirewallRulesResponse {
    #[serde(default)]
    total_count: usize,
    #[serde(default)]
    firewall_rule_set: Vec<WireRule>,
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyFirewallRulesRequest<'a> {
    instance_id: &'a str,
    firewall_rules: Vec<WireRule>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModifyFirewallRulesResponse {
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiError {
    code: String,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    response: serde_json::Value,
}

/// Unwraps the `{"Response": {...}}` envelope into `T`, turning an embedded
/// `Error` object into [`Error::Remote`].
fn parse_response<T: DeserializeOwned>(status: reqwest::StatusCode, body: &str) -> Result<T> {
    let envelope: Envelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(_) if !status.is_success() => {
            return Err(Error::Remote {
                code: format!("HTTP {}", status.as_u16()),
                message: body.trim().to_string(),
                request_id: String::new(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(error) = envelope.response.get("Error") {
        let error: ApiError = serde_json::from_value(error.clone())?;
        let request_id = envelope
            .response
            .get("RequestId")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        return Err(Error::Remote {
            code: error.code,
            message: error.message,
            request_id,
        });
    }

    Ok(serde_json::from_value(envelope.response)?)
}

/// Builds the request URL and the `Host` value that gets signed.
///
/// A bare endpoint (`lighthouse.tencentcloudapi.com`) means HTTPS; an
/// endpoint with a scheme is used as-is.
fn endpoint_url(endpoint: &str) -> Result<(reqwest::Url, String)> {
    let raw = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}/")
    };
    let url = reqwest::Url::parse(&raw)
        .map_err(|e| Error::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
    let host = match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => return Err(Error::Config(format!("endpoint {endpoint:?} has no host"))),
    };
    Ok((url, host))
}

/// Client for one account and region. Constructed explicitly by the caller.
pub struct LighthouseClient {
    http: reqwest::Client,
    url: reqwest::Url,
    host: String,
    secret_id: String,
    secret_key: String,
    region: String,
}

impl LighthouseClient {
    pub fn new(config: &LighthouseConfig) -> Result<Self> {
        let (url, host) = endpoint_url(&config.endpoint)?;
        let http = reqwest::ClientBuilder::new()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            url,
            host,
            secret_id: config.secret_id.clone(),
            secret_key: config.secret_key.clone(),
            region: config.region.clone(),
        })
    }

    async fn call<Req, Resp>(&self, action: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        let payload = serde_json::to_string(request)?;
        let timestamp = chrono::Utc::now().timestamp();
        let authorization = signing::authorization(&SigningRequest {
            secret_id: &self.secret_id,
            secret_key: &self.secret_key,
            service: SERVICE,
            host: &self.host,
            payload: &payload,
            timestamp,
        });

        debug!(action, region = %self.region, "Calling Lighthouse API");

        let response = self
            .http
            .post(self.url.clone())
            .header(reqwest::header::AUTHORIZATION, authorization)
            .header(reqwest::header::CONTENT_TYPE, signing::CONTENT_TYPE)
            .header("X-TC-Action", action)
            .header("X-TC-Version", API_VERSION)
            .header("X-TC-Timestamp", timestamp.to_string())
            .header("X-TC-Region", &self.region)
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        parse_response(status, &body)
    }
}

#[async_trait]
impl RemoteAuthority for LighthouseClient {
    async fn describe_rules(&self, instance_id: &str) -> Result<Vec<RemoteRule>> {
        let mut rules = Vec::new();

        loop {
            let page: DescribeFirewallRulesResponse = self
                .call(
                    "DescribeFirewallRules",
                    &DescribeFirewallRulesRequest {
                        instance_id,
                        offset: rules.len(),
                        limit: PAGE_LIMIT,
                    },
                )
                .await?;

            let fetched = page.firewall_rule_set.len();
            debug!(
                fetched,
                total = page.total_count,
                request_id = %page.request_id,
                "DescribeFirewallRules page"
            );
            rules.extend(page.firewall_rule_set.into_iter().map(RemoteRule::from));

            if fetched == 0 || rules.len() >= page.total_count {
                break;
            }
        }

        Ok(rules)
    }

    async fn modify_rules(&self, instance_id: &str, rules: &[RemoteRule]) -> Result<ModifyAck> {
        let response: ModifyFirewallRulesResponse = self
            .call(
                "ModifyFirewallRules",
                &ModifyFirewallRulesRequest {
                    instance_id,
                    firewall_rules: rules.iter().map(WireRule::from).collect(),
                },
            )
            .await?;

        info!(request_id = %response.request_id, "ModifyFirewallRules succeeded");
        Ok(ModifyAck {
            request_id: response.request_id,
        })
    }
}
