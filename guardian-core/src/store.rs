use crate::types::{ScanResult, SkippedReason, TabId, TabState};
use std::collections::HashMap;

/// Partial update for a tab entry. `None` fields keep their prior value;
/// `clear_last_result` drops the stored result (a failed scan leaves no
/// payload behind).
#[derive(Debug, Clone, Default)]
pub struct TabStatePatch {
  pub url: Option<String>,
  pub risk_score: Option<u8>,
  pub has_privacy_policy: Option<bool>,
  pub last_result: Option<ScanResult>,
  pub clear_last_result: bool,
  pub skipped_reason: Option<SkippedReason>,
}

/// Per-tab scan outcomes, keyed by the browser's tab id. Lifecycle follows
/// tab existence, not navigation: entries are created on the first signal
/// for a tab and removed on the tab-removal notification. Owned by the
/// coordinator thread, so entries for different tabs never contend.
#[derive(Debug, Default)]
pub struct TabStore {
  tabs: HashMap<TabId, TabState>,
}

impl TabStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn get(&self, tab_id: TabId) -> Option<&TabState> {
    self.tabs.get(&tab_id)
  }

  pub fn merge(&mut self, tab_id: TabId, patch: TabStatePatch) -> &TabState {
    let state = self.tabs.entry(tab_id).or_insert_with(|| TabState {
      tab_id,
      url: String::new(),
      risk_score: 0,
      has_privacy_policy: false,
      last_result: None,
      skipped_reason: SkippedReason::None,
    });

    if let Some(url) = patch.url {
      state.url = url;
    }
    if let Some(risk) = patch.risk_score {
      state.risk_score = risk;
    }
    if let Some(privacy) = patch.has_privacy_policy {
      state.has_privacy_policy = privacy;
    }
    if patch.clear_last_result {
      state.last_result = None;
    } else if let Some(result) = patch.last_result {
      state.last_result = Some(result);
    }
    if let Some(reason) = patch.skipped_reason {
      state.skipped_reason = reason;
    }

    state
  }

  pub fn remove(&mut self, tab_id: TabId) -> Option<TabState> {
    self.tabs.remove(&tab_id)
  }

  pub fn len(&self) -> usize {
    self.tabs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.tabs.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn merge_retains_unspecified_fields() {
    let mut store = TabStore::new();
    store.merge(
      7,
      TabStatePatch {
        url: Some("https://example.com/".to_string()),
        has_privacy_policy: Some(true),
        ..Default::default()
      },
    );
    store.merge(
      7,
      TabStatePatch {
        risk_score: Some(42),
        ..Default::default()
      },
    );

    let state = store.get(7).unwrap();
    assert_eq!(state.url, "https://example.com/");
    assert!(state.has_privacy_policy);
    assert_eq!(state.risk_score, 42);
  }

  #[test]
  fn clear_drops_result_payload() {
    let mut store = TabStore::new();
    store.merge(
      1,
      TabStatePatch {
        last_result: Some(ScanResult {
          risk_score: 90,
          threat_type: "phishing".to_string(),
          explanation: None,
          next_steps: Vec::new(),
          evidence: Vec::new(),
          mitre_techniques: Vec::new(),
          confidence: None,
          voice_alert_ref: None,
          scan_id: None,
        }),
        risk_score: Some(90),
        ..Default::default()
      },
    );
    store.merge(
      1,
      TabStatePatch {
        risk_score: Some(0),
        clear_last_result: true,
        ..Default::default()
      },
    );

    let state = store.get(1).unwrap();
    assert_eq!(state.risk_score, 0);
    assert!(state.last_result.is_none());
  }

  #[test]
  fn remove_is_per_tab() {
    let mut store = TabStore::new();
    store.merge(1, TabStatePatch::default());
    store.merge(2, TabStatePatch::default());
    store.remove(1);

    assert!(store.get(1).is_none());
    assert!(store.get(2).is_some());
  }
}
