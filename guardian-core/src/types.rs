use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Opaque per-tab identifier assigned by the host browser.
pub type TabId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
  Page,
  Message,
  Image,
}

impl ScanType {
  pub fn as_str(&self) -> &'static str {
    match self {
      ScanType::Page => "page",
      ScanType::Message => "message",
      ScanType::Image => "image",
    }
  }
}

/// Page-level indicators produced by the in-page extractor. Immutable once
/// built; the orchestrator consumes it without mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoutSignal {
  pub url: String,
  pub is_login_page: bool,
  pub has_privacy_policy: bool,
  #[serde(default)]
  pub detected_keywords: BTreeSet<String>,
  #[serde(default)]
  pub detected_scam_indicators: BTreeSet<String>,
  #[serde(default)]
  pub detected_malware_indicators: BTreeSet<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
  pub url: String,
  pub scan_type: ScanType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  /// Base64-encoded screenshot payload for image scans.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image_data: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
  #[serde(rename = "type")]
  pub kind: String,
  pub value: String,
}

/// Full-pipeline result from the analysis service. Treated as opaque except
/// for `risk_score` and `voice_alert_ref`, which drive local decisions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
  pub risk_score: u8,
  pub threat_type: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub explanation: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub next_steps: Vec<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub evidence: Vec<Finding>,
  #[serde(
    default,
    rename = "mitreAttackTechniques",
    skip_serializing_if = "Vec::is_empty"
  )]
  pub mitre_techniques: Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub confidence: Option<f32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub voice_alert_ref: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub scan_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkippedReason {
  Localhost,
  None,
}

/// Latest known scan outcome for a live tab. Created on the first signal for
/// the tab, merge-updated on every later scan, removed when the tab closes.
///
/// `url` always matches the tab URL the contained result was produced for; a
/// completion for an older navigation must never land here (orchestrator
/// stale guard).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabState {
  pub tab_id: TabId,
  pub url: String,
  pub risk_score: u8,
  pub has_privacy_policy: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_result: Option<ScanResult>,
  pub skipped_reason: SkippedReason,
}

pub fn redact_url_for_log(url: &str) -> String {
  // Full URLs can carry tokens and personal data in paths/queries; logs only
  // ever get the host.
  match reqwest::Url::parse(url) {
    Ok(u) => u.host_str().unwrap_or("<no-host>").to_string(),
    Err(_) => "<unparsed>".to_string(),
  }
}

pub fn now_unix_ms() -> u64 {
  use std::time::{SystemTime, UNIX_EPOCH};
  SystemTime::now()
    .duration_since(UNIX_EPOCH)
    .unwrap_or_default()
    .as_millis() as u64
}
