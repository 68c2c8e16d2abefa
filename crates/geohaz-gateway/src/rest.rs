//! Blocking REST client for the Earth Engine API.
//!
//! Endpoints used (all relative to `{base_url}/v1/`):
//! - `POST projects/{project}/value:compute` - evaluate an expression
//! - `POST projects/{project}/maps` - register an image for tiling
//! - `GET {asset name}` - asset metadata
//!
//! Requests carry a pre-obtained bearer token. Failed requests are returned as
//! errors; nothing is retried here.

use crate::{
    AccessToken, AssetInfo, ComputeGateway, GatewayError, Result, TileSource, VisualizationOptions,
};
use ee_expr::{encode_expression, Node};
use geohaz_metrics::{metric_defs, metrics};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://earthengine.googleapis.com";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Project that owns legacy `users/...` style asset ids.
const LEGACY_PROJECT: &str = "projects/earthengine-legacy/assets";

/// Connection settings for [`RestGateway`].
#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// API root, without the `/v1` suffix.
    pub base_url: String,
    /// Cloud project billed for computations.
    pub project: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl RestGatewayConfig {
    /// Settings for a project with the default URL and timeout.
    pub fn new(project: impl Into<String>) -> Self {
        RestGatewayConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            project: project.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Counters for requests made by one gateway instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestStats {
    /// Requests sent.
    pub requests: u64,
    /// Requests that failed.
    pub failures: u64,
}

/// [`ComputeGateway`] over HTTPS.
pub struct RestGateway {
    config: RestGatewayConfig,
    token: AccessToken,
    client: reqwest::blocking::Client,
    requests: AtomicU64,
    failures: AtomicU64,
}

impl std::fmt::Debug for RestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestGateway")
            .field("base_url", &self.config.base_url)
            .field("project", &self.config.project)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct ComputeResponse {
    result: Value,
}

#[derive(Debug, Deserialize)]
struct MapResponse {
    name: String,
}

/// Resource name for an asset id, mapping legacy ids into the legacy project.
pub fn asset_resource_name(asset_id: &str) -> String {
    let asset_id = asset_id.trim().trim_start_matches('/');
    if asset_id.starts_with("projects/") {
        asset_id.to_string()
    } else {
        format!("{}/{}", LEGACY_PROJECT, asset_id)
    }
}

impl RestGateway {
    /// Create a gateway. Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(config: RestGatewayConfig, token: AccessToken) -> Result<Self> {
        if token.is_empty() {
            return Err(GatewayError::Config("access token is empty".to_string()));
        }
        if config.project.trim().is_empty() {
            return Err(GatewayError::Config("project is empty".to_string()));
        }
        let mut builder = reqwest::blocking::Client::builder().timeout(config.timeout);
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(RestGateway {
            config,
            token,
            client,
            requests: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    /// Request counters for this instance.
    pub fn stats(&self) -> RequestStats {
        RequestStats {
            requests: self.requests.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn project_url(&self, method: &str) -> String {
        self.url(&format!("projects/{}/{}", self.config.project, method))
    }

    /// Send a request and decode a JSON response, recording metrics either way.
    fn call<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<T> {
        let labels = [("endpoint", endpoint.to_string())];
        metrics::counter!(metric_defs::GATEWAY_REQUESTS.name, &labels).increment(1);
        self.requests.fetch_add(1, Ordering::Relaxed);

        let started = Instant::now();
        let result = self.send(request);
        let elapsed = started.elapsed();
        metrics::histogram!(metric_defs::GATEWAY_LATENCY.name, &labels)
            .record(elapsed.as_secs_f64() * 1000.0);

        match result {
            Ok(body) => {
                debug!(endpoint, elapsed_ms = elapsed.as_millis() as u64, "gateway call ok");
                serde_json::from_value(body)
                    .map_err(|e| GatewayError::Decode(format!("{} response: {}", endpoint, e)))
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                let error_labels = [
                    ("endpoint", endpoint.to_string()),
                    ("status", err.status_label()),
                ];
                metrics::counter!(metric_defs::GATEWAY_ERRORS.name, &error_labels).increment(1);
                warn!(endpoint, error = %err, "gateway call failed");
                Err(err)
            }
        }
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value> {
        let response = request
            .bearer_auth(self.token.secret())
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &text));
        }
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn transport_error(&self, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            GatewayError::Timeout(self.config.timeout)
        } else {
            GatewayError::Http(err)
        }
    }
}

fn is_loopback(base_url: &str) -> bool {
    reqwest::Url::parse(base_url)
        .ok()
        .and_then(|url| url.host_str().map(|h| matches!(h, "localhost" | "127.0.0.1" | "[::1]")))
        .unwrap_or(false)
}

/// Build an API error from a status and a (possibly non-JSON) body.
fn api_error(status: u16, body: &str) -> GatewayError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => GatewayError::Api {
            status,
            reason: error.status,
            message: error.message,
        },
        Err(_) => GatewayError::Api {
            status,
            reason: String::new(),
            message: body.chars().take(200).collect(),
        },
    }
}

impl ComputeGateway for RestGateway {
    fn compute_value(&self, expression: &Node) -> Result<Value> {
        let body = json!({ "expression": encode_expression(expression) });
        let request = self.client.post(self.project_url("value:compute")).json(&body);
        let response: ComputeResponse = self.call("compute", request)?;
        Ok(response.result)
    }

    fn create_map(&self, image: &Node, vis: &VisualizationOptions) -> Result<TileSource> {
        let body = json!({
            "expression": encode_expression(image),
            "fileFormat": "AUTO_JPEG_PNG",
            "visualizationOptions": vis,
        });
        let request = self.client.post(self.project_url("maps")).json(&body);
        let response: MapResponse = self.call("maps", request)?;

        let url_template = self.url(&format!("{}/tiles/{{z}}/{{x}}/{{y}}", response.name));
        Ok(TileSource {
            map_name: response.name,
            url_template,
        })
    }

    fn get_asset(&self, asset_id: &str) -> Result<AssetInfo> {
        let request = self.client.get(self.url(&asset_resource_name(asset_id)));
        self.call("assets", request)
    }
}
