use crate::config::BackendConfig;
use crate::types::{ScanRequest, ScanResult};
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use reqwest::redirect::Policy;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickScanRequest {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  pub is_login_page: bool,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub signals: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickScanResponse {
  pub risk_score: u8,
  #[serde(default)]
  pub reason: Option<String>,
}

/// The deep-analysis service. Both calls block and are bounded by the
/// configured deadline; an expired deadline surfaces as a transport error.
pub trait AnalysisBackend: Send + Sync {
  fn quick_scan(&self, req: &QuickScanRequest) -> anyhow::Result<QuickScanResponse>;
  fn full_scan(&self, req: &ScanRequest) -> anyhow::Result<ScanResult>;
}

pub struct HttpBackend {
  client: Client,
  base: Url,
}

impl HttpBackend {
  pub fn new(cfg: &BackendConfig) -> anyhow::Result<Self> {
    let base = Url::parse(&cfg.base_url)
      .with_context(|| format!("invalid backend base_url: {}", cfg.base_url))?;

    let client = Client::builder()
      .timeout(Duration::from_secs(cfg.timeout_seconds))
      .redirect(Policy::none())
      .build()
      .context("build HTTP client")?;

    Ok(Self { client, base })
  }

  /// Best-effort availability check, logged only. A down backend is not a
  /// startup error; scans fail open individually.
  pub fn probe_health(&self) {
    let Ok(url) = self.base.join("health") else {
      return;
    };
    match self.client.get(url.clone()).send() {
      Ok(resp) if resp.status().is_success() => {
        tracing::info!(host = %safe_url_label(&url), "analysis backend reachable");
      }
      Ok(resp) => {
        tracing::warn!(
          host = %safe_url_label(&url),
          status = resp.status().as_u16(),
          "analysis backend returned unexpected status"
        );
      }
      Err(e) => {
        tracing::warn!(
          host = %safe_url_label(&url),
          error = %e,
          "analysis backend unreachable; scans will fail open until it returns"
        );
      }
    }
  }

  fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
    &self,
    path: &str,
    body: &B,
  ) -> anyhow::Result<R> {
    let url = self
      .base
      .join(path)
      .with_context(|| format!("build URL for {path}"))?;

    let response = self
      .client
      .post(url.clone())
      .header(
        USER_AGENT,
        format!("Guardian/{}", env!("CARGO_PKG_VERSION")),
      )
      .json(body)
      .send()
      .with_context(|| format!("POST {}", safe_url_label(&url)))?;

    let status = response.status();
    if !status.is_success() {
      anyhow::bail!(
        "unexpected HTTP status {} for {}",
        status.as_u16(),
        safe_url_label(&url)
      );
    }

    let bytes = read_body_with_limit(response, MAX_RESPONSE_BYTES)?;
    serde_json::from_slice(&bytes)
      .with_context(|| format!("parse response from {}", safe_url_label(&url)))
  }
}

impl AnalysisBackend for HttpBackend {
  fn quick_scan(&self, req: &QuickScanRequest) -> anyhow::Result<QuickScanResponse> {
    self.post_json("scan/quick", req)
  }

  fn full_scan(&self, req: &ScanRequest) -> anyhow::Result<ScanResult> {
    self.post_json("scan/full", req)
  }
}

fn read_body_with_limit(
  mut response: reqwest::blocking::Response,
  max_bytes: usize,
) -> anyhow::Result<Vec<u8>> {
  use std::io::Read;

  let mut out = Vec::new();
  let mut limited = (&mut response).take((max_bytes.saturating_add(1)) as u64);
  limited.read_to_end(&mut out).context("read response body")?;

  if out.len() > max_bytes {
    anyhow::bail!("response exceeds max size {} bytes", max_bytes);
  }

  Ok(out)
}

fn safe_url_label(url: &Url) -> String {
  let host = url.host_str().unwrap_or("<no-host>");
  let mut path = url.path().to_string();
  if path.is_empty() {
    path = "/".to_string();
  }
  format!("{host}{path}")
}
