use crate::audio::{AudioBridge, AudioSource, AudioSurfaceHost};
use crate::backend::{QuickScanRequest, QuickScanResponse};
use crate::badge::{self, BadgeState, BadgeSurface};
use crate::cache::{content_fingerprint, TtlCache};
use crate::config::Config;
use crate::history::{self, ScanRecord};
use crate::keywords;
use crate::link_filter;
use crate::schedule::IntervalSchedule;
use crate::store::{TabStatePatch, TabStore};
use crate::types::{
  redact_url_for_log, ScanRequest, ScanResult, ScanType, ScoutSignal, SkippedReason, TabId,
  TabState,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Fresh results at or above this risk with a voice-alert reference trigger
/// the audio bridge.
pub const VOICE_ALERT_RISK_THRESHOLD: u8 = 70;

/// Hover-link verdict handed back to the UI and memoized in the link cache.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkSafety {
  pub risk: u8,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
  pub cached: bool,
}

/// A full-pipeline call the event loop must perform. The tab id and target
/// URL captured here are what the stale guard compares against on
/// completion.
#[derive(Debug, Clone)]
pub struct ScanTicket {
  pub ticket_id: String,
  pub tab_id: Option<TabId>,
  pub request: ScanRequest,
  pub fingerprint: String,
  pub cache_ttl_ms: u64,
}

/// A quick-endpoint call for the paste path.
#[derive(Debug, Clone)]
pub struct QuickTicket {
  pub request: QuickScanRequest,
  pub fingerprint: String,
}

pub enum ScanDecision {
  /// Localhost exclusion fired; no network call happens.
  Skipped(ScanResult),
  /// Served from the result cache; side effects were already suppressed.
  Cached(ScanResult),
  Dispatch(ScanTicket),
}

pub enum LinkDecision {
  Resolved(LinkSafety),
  Dispatch(String),
}

pub enum PasteDecision {
  Cached(ScanResult),
  Dispatch(QuickTicket),
}

/// The scan-escalation state machine. Owns every keyed store and the badge
/// and audio surfaces; runs entirely on the coordinator thread. Network
/// calls are dispatched by the event loop from the tickets returned here and
/// their outcomes fed back through the `complete_*` methods.
pub struct Orchestrator {
  tabs: TabStore,
  results: TtlCache<String, ScanResult>,
  links: TtlCache<String, LinkSafety>,
  badge: Arc<dyn BadgeSurface>,
  audio: AudioBridge,
  focused_tab: Option<TabId>,
  result_sweep: IntervalSchedule,
  link_sweep: IntervalSchedule,
  rescan: Option<IntervalSchedule>,
  history_dir: Option<PathBuf>,
  page_ttl_ms: u64,
  content_ttl_ms: u64,
}

impl Orchestrator {
  pub fn new(
    cfg: &Config,
    badge: Arc<dyn BadgeSurface>,
    audio_host: Arc<dyn AudioSurfaceHost>,
    history_dir: Option<PathBuf>,
  ) -> Self {
    let sweep_ms = cfg.caches.sweep_interval_seconds.saturating_mul(1_000);
    let page_ttl_ms = cfg.caches.page_ttl_minutes.saturating_mul(60_000);
    let content_ttl_ms = cfg.caches.content_ttl_minutes.saturating_mul(60_000);
    let link_ttl_ms = cfg.caches.link_ttl_minutes.saturating_mul(60_000);

    Self {
      tabs: TabStore::new(),
      results: TtlCache::new(page_ttl_ms),
      links: TtlCache::new(link_ttl_ms),
      badge,
      audio: AudioBridge::new(audio_host),
      focused_tab: None,
      result_sweep: IntervalSchedule::new(sweep_ms),
      link_sweep: IntervalSchedule::new(sweep_ms),
      rescan: cfg
        .rescan
        .enabled
        .then(|| IntervalSchedule::new(cfg.rescan.interval_minutes.saturating_mul(60_000))),
      history_dir,
      page_ttl_ms,
      content_ttl_ms,
    }
  }

  /// Page-load signal from the extractor. Malformed URLs are scanned anyway;
  /// only a recognizably local host short-circuits.
  pub fn handle_signal(
    &mut self,
    tab_id: TabId,
    signal: &ScoutSignal,
    now_unix_ms: u64,
  ) -> ScanDecision {
    let host = host_of(&signal.url);
    if host.is_none() {
      tracing::debug!(tab_id, "signal URL did not parse; scanning anyway");
    }

    if is_local_host(host.as_deref()) {
      self.tabs.merge(
        tab_id,
        TabStatePatch {
          url: Some(signal.url.clone()),
          risk_score: Some(0),
          has_privacy_policy: Some(signal.has_privacy_policy),
          clear_last_result: true,
          skipped_reason: Some(SkippedReason::Localhost),
          ..Default::default()
        },
      );
      self.apply_badge(Some(tab_id), BadgeState::LocalhostSafe);
      tracing::debug!(tab_id, "local address excluded from scanning");
      return ScanDecision::Skipped(localhost_result());
    }

    let fingerprint = content_fingerprint("page", &signal.url);
    if let Some(hit) = self.results.lookup(&fingerprint, now_unix_ms) {
      tracing::debug!(
        tab_id,
        host = %redact_url_for_log(&signal.url),
        age_ms = hit.age_ms,
        "serving page scan from result cache"
      );
      self.apply_page_result(tab_id, signal, &hit.value);
      return ScanDecision::Cached(hit.value);
    }

    self.tabs.merge(
      tab_id,
      TabStatePatch {
        url: Some(signal.url.clone()),
        has_privacy_policy: Some(signal.has_privacy_policy),
        skipped_reason: Some(SkippedReason::None),
        ..Default::default()
      },
    );
    self.apply_badge(Some(tab_id), BadgeState::Scanning);

    ScanDecision::Dispatch(ScanTicket {
      ticket_id: uuid::Uuid::new_v4().to_string(),
      tab_id: Some(tab_id),
      request: ScanRequest {
        url: signal.url.clone(),
        scan_type: ScanType::Page,
        content: None,
        image_data: None,
      },
      fingerprint,
      cache_ttl_ms: self.page_ttl_ms,
    })
  }

  /// Explicit user action: no localhost exclusion, always the full pipeline.
  /// Content-keyed dedup still applies so repeated submissions of the same
  /// message or screenshot reuse the earlier analysis.
  pub fn handle_manual_scan(&mut self, request: ScanRequest, now_unix_ms: u64) -> ScanDecision {
    let ttl_ms = match request.scan_type {
      ScanType::Page => self.page_ttl_ms,
      ScanType::Message | ScanType::Image => self.content_ttl_ms,
    };
    let key_source = request
      .content
      .as_deref()
      .or(request.image_data.as_deref())
      .unwrap_or(&request.url);
    let fingerprint = content_fingerprint(request.scan_type.as_str(), key_source);

    if let Some(hit) = self.results.lookup(&fingerprint, now_unix_ms) {
      return ScanDecision::Cached(hit.value);
    }

    ScanDecision::Dispatch(ScanTicket {
      ticket_id: uuid::Uuid::new_v4().to_string(),
      tab_id: None,
      request,
      fingerprint,
      cache_ttl_ms: ttl_ms,
    })
  }

  /// Outcome of a dispatched full-pipeline call. Responses whose tab has
  /// navigated away since dispatch are discarded without touching state; the
  /// caller still receives the outcome of the call it made.
  pub fn complete_scan(
    &mut self,
    ticket: ScanTicket,
    outcome: anyhow::Result<ScanResult>,
    now_unix_ms: u64,
  ) -> anyhow::Result<ScanResult> {
    let Some(tab_id) = ticket.tab_id else {
      // Manual scan: no tab state or badge to update.
      let result = outcome?;
      self.finish_fresh_result(&ticket, &result, now_unix_ms);
      return Ok(result);
    };

    let stale = match self.tabs.get(tab_id) {
      None => true,
      Some(state) => state.url != ticket.request.url,
    };
    if stale {
      tracing::info!(
        tab_id,
        host = %redact_url_for_log(&ticket.request.url),
        "discarding stale scan response"
      );
      return outcome;
    }

    match outcome {
      Ok(result) => {
        // has_privacy_policy is deliberately absent from the patch: it was
        // set from the signal at dispatch and the result must not override
        // it.
        let state = self.tabs.merge(
          tab_id,
          TabStatePatch {
            risk_score: Some(result.risk_score),
            last_result: Some(result.clone()),
            skipped_reason: Some(SkippedReason::None),
            ..Default::default()
          },
        );
        let privacy = state.has_privacy_policy;
        self.apply_badge(
          Some(tab_id),
          badge::state_for(result.risk_score, privacy, SkippedReason::None),
        );
        self.finish_fresh_result(&ticket, &result, now_unix_ms);
        Ok(result)
      }
      Err(e) => {
        let state = self.tabs.merge(
          tab_id,
          TabStatePatch {
            risk_score: Some(0),
            clear_last_result: true,
            skipped_reason: Some(SkippedReason::None),
            ..Default::default()
          },
        );
        let privacy = state.has_privacy_policy;
        self.apply_badge(
          Some(tab_id),
          badge::state_for(0, privacy, SkippedReason::None),
        );
        tracing::warn!(
          tab_id,
          host = %redact_url_for_log(&ticket.request.url),
          error = ?e,
          "scan failed; badge fails open"
        );
        Err(e)
      }
    }
  }

  /// Legacy paste-analysis path: keyword signals plus the quick endpoint.
  pub fn handle_paste(&mut self, text: &str, now_unix_ms: u64) -> PasteDecision {
    let fingerprint = content_fingerprint("message", text);
    if let Some(hit) = self.results.lookup(&fingerprint, now_unix_ms) {
      return PasteDecision::Cached(hit.value);
    }

    let lower = text.to_lowercase();
    let mut matched: BTreeSet<String> = keywords::match_keywords(&lower, keywords::PHISHING_KEYWORDS);
    matched.extend(keywords::match_keywords(&lower, keywords::SCAM_INDICATORS));

    PasteDecision::Dispatch(QuickTicket {
      request: QuickScanRequest {
        url: None,
        content: Some(text.to_string()),
        is_login_page: false,
        signals: matched.into_iter().collect(),
      },
      fingerprint,
    })
  }

  pub fn complete_paste(
    &mut self,
    ticket: QuickTicket,
    outcome: anyhow::Result<QuickScanResponse>,
    now_unix_ms: u64,
  ) -> anyhow::Result<ScanResult> {
    let resp = outcome?;
    let result = quick_result(resp);
    self
      .results
      .store_with_ttl(ticket.fingerprint, result.clone(), self.content_ttl_ms, now_unix_ms);
    Ok(result)
  }

  /// Hover check: link cache, then the pure heuristic filter, then the quick
  /// endpoint. Whatever produced the verdict, it lands in the link cache.
  pub fn handle_link_check(&mut self, url: &str, now_unix_ms: u64) -> LinkDecision {
    if let Some(hit) = self.links.lookup(&url.to_string(), now_unix_ms) {
      let mut safety = hit.value;
      safety.cached = true;
      return LinkDecision::Resolved(safety);
    }

    let verdict = link_filter::quick_check(url);
    if verdict.suspicious {
      let safety = LinkSafety {
        risk: verdict.risk.unwrap_or(0),
        reason: verdict.reason,
        cached: false,
      };
      self.links.store(url.to_string(), safety.clone(), now_unix_ms);
      return LinkDecision::Resolved(safety);
    }

    LinkDecision::Dispatch(url.to_string())
  }

  pub fn complete_link_check(
    &mut self,
    url: String,
    outcome: anyhow::Result<QuickScanResponse>,
    now_unix_ms: u64,
  ) -> anyhow::Result<LinkSafety> {
    let resp = outcome?;
    let safety = LinkSafety {
      risk: resp.risk_score,
      reason: resp.reason,
      cached: false,
    };
    self.links.store(url, safety.clone(), now_unix_ms);
    Ok(safety)
  }

  pub fn get_tab_state(&self, tab_id: TabId) -> Option<TabState> {
    self.tabs.get(tab_id).cloned()
  }

  pub fn tab_focused(&mut self, tab_id: TabId) {
    self.focused_tab = Some(tab_id);
  }

  pub fn tab_removed(&mut self, tab_id: TabId) {
    self.tabs.remove(tab_id);
    if self.focused_tab == Some(tab_id) {
      self.focused_tab = None;
    }
  }

  /// Driven from the event loop between messages: cache sweeps on their own
  /// timers and the periodic rescan of the focused tab.
  pub fn tick(&mut self, now_unix_ms: u64) -> Vec<ScanTicket> {
    if self.result_sweep.tick(now_unix_ms) {
      let removed = self.results.sweep(now_unix_ms);
      if removed > 0 {
        tracing::debug!(removed, remaining = self.results.len(), "result cache sweep");
      }
    }
    if self.link_sweep.tick(now_unix_ms) {
      let removed = self.links.sweep(now_unix_ms);
      if removed > 0 {
        tracing::debug!(removed, remaining = self.links.len(), "link cache sweep");
      }
    }

    let rescan_due = match self.rescan.as_mut() {
      Some(s) => s.tick(now_unix_ms),
      None => false,
    };

    let mut tickets = Vec::new();
    if rescan_due {
      if let Some(ticket) = self.rescan_ticket() {
        tickets.push(ticket);
      }
    }
    tickets
  }

  fn rescan_ticket(&mut self) -> Option<ScanTicket> {
    let tab_id = self.focused_tab?;
    let state = self.tabs.get(tab_id)?;
    if state.url.is_empty() {
      return None;
    }
    if state.skipped_reason == SkippedReason::Localhost
      || is_local_host(host_of(&state.url).as_deref())
    {
      return None;
    }

    let url = state.url.clone();
    tracing::debug!(
      tab_id,
      host = %redact_url_for_log(&url),
      "periodic rescan of focused tab"
    );
    self.apply_badge(Some(tab_id), BadgeState::Scanning);

    // No cache lookup here: the point of the rescan is a fresh verdict for a
    // long-lived tab. The fresh result overwrites the cached entry.
    Some(ScanTicket {
      ticket_id: uuid::Uuid::new_v4().to_string(),
      tab_id: Some(tab_id),
      request: ScanRequest {
        url: url.clone(),
        scan_type: ScanType::Page,
        content: None,
        image_data: None,
      },
      fingerprint: content_fingerprint("page", &url),
      cache_ttl_ms: self.page_ttl_ms,
    })
  }

  fn apply_page_result(&mut self, tab_id: TabId, signal: &ScoutSignal, result: &ScanResult) {
    let state = self.tabs.merge(
      tab_id,
      TabStatePatch {
        url: Some(signal.url.clone()),
        risk_score: Some(result.risk_score),
        has_privacy_policy: Some(signal.has_privacy_policy),
        last_result: Some(result.clone()),
        skipped_reason: Some(SkippedReason::None),
        ..Default::default()
      },
    );
    let privacy = state.has_privacy_policy;
    self.apply_badge(
      Some(tab_id),
      badge::state_for(result.risk_score, privacy, SkippedReason::None),
    );
  }

  /// Side effects that only fresh (non-cached) results get: cache fill,
  /// voice alert, history record.
  fn finish_fresh_result(&mut self, ticket: &ScanTicket, result: &ScanResult, now_unix_ms: u64) {
    self.results.store_with_ttl(
      ticket.fingerprint.clone(),
      result.clone(),
      ticket.cache_ttl_ms,
      now_unix_ms,
    );

    if result.risk_score >= VOICE_ALERT_RISK_THRESHOLD {
      if let Some(audio_ref) = &result.voice_alert_ref {
        let alert_id = result
          .scan_id
          .clone()
          .unwrap_or_else(|| ticket.ticket_id.clone());
        self.audio.play_alert(&alert_id, AudioSource::from_alert_ref(audio_ref));
      }
    }

    if let Some(dir) = &self.history_dir {
      let record = ScanRecord::from_result(&ticket.request.url, ticket.request.scan_type, result);
      if let Err(e) = history::store_record(dir, &record) {
        tracing::warn!(error = ?e, "failed to store scan record (continuing)");
      }
    }
  }

  fn apply_badge(&self, tab_id: Option<TabId>, state: BadgeState) {
    self.badge.apply(tab_id, &badge::badge_for(state));
  }
}

fn host_of(url: &str) -> Option<String> {
  reqwest::Url::parse(url)
    .ok()
    .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

fn is_local_host(host: Option<&str>) -> bool {
  match host {
    Some(h) => h == "localhost" || h == "127.0.0.1" || h.ends_with(".local"),
    None => false,
  }
}

fn localhost_result() -> ScanResult {
  ScanResult {
    risk_score: 0,
    threat_type: "none".to_string(),
    explanation: Some("local address excluded from scanning".to_string()),
    next_steps: Vec::new(),
    evidence: Vec::new(),
    mitre_techniques: Vec::new(),
    confidence: None,
    voice_alert_ref: None,
    scan_id: None,
  }
}

/// Quick-endpoint responses are normalized to the shared result type so every
/// analysis path replies with the same shape. Classification thresholds
/// follow the backend's own fallback mapping.
fn quick_result(resp: QuickScanResponse) -> ScanResult {
  let threat_type = if resp.risk_score > 70 {
    "phishing"
  } else if resp.risk_score > 40 {
    "scam"
  } else if resp.risk_score > 20 {
    "privacy_violation"
  } else {
    "none"
  };

  ScanResult {
    risk_score: resp.risk_score,
    threat_type: threat_type.to_string(),
    explanation: resp.reason,
    next_steps: Vec::new(),
    evidence: Vec::new(),
    mitre_techniques: Vec::new(),
    confidence: None,
    voice_alert_ref: None,
    scan_id: None,
  }
}
