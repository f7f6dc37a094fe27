pub mod debounce;

use guardian_core::keywords::{
  match_keywords, MALWARE_INDICATORS, PHISHING_KEYWORDS, SCAM_INDICATORS,
};
use guardian_core::types::ScoutSignal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Pastes shorter than this are dropped silently, not analyzed.
pub const MIN_PASTE_CHARS: usize = 10;

/// Structural login-form heuristics, checked in order after the
/// password-input test; the first hit decides.
pub const LOGIN_FORM_ACTION_TOKENS: &[&str] = &["login", "signin", "sign-in", "auth", "session"];
pub const LOGIN_INPUT_NAMES: &[&str] = &["username", "user", "email", "login"];

/// Matched against both link targets and link text, lower-cased.
pub const PRIVACY_LINK_PATTERNS: &[&str] =
  &["privacy", "privacy-policy", "privacy_policy", "datenschutz"];

/// The minimal DOM projection the extractor consumes. Built once per page
/// context from the rendered document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
  #[serde(default)]
  pub visible_text: String,
  #[serde(default)]
  pub forms: Vec<PageForm>,
  #[serde(default)]
  pub inputs: Vec<InputField>,
  #[serde(default)]
  pub links: Vec<PageLink>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageForm {
  #[serde(default)]
  pub action: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputField {
  #[serde(default, rename = "type")]
  pub kind: String,
  #[serde(default)]
  pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageLink {
  #[serde(default)]
  pub href: String,
  #[serde(default)]
  pub text: String,
}

/// One signal per page load. Pure over its inputs: the three keyword
/// detectors run independently over the lower-cased visible text and their
/// hits are unioned into `detected_keywords`; none short-circuits another.
pub fn extract_signal(snapshot: &PageSnapshot, url: &str) -> ScoutSignal {
  let text = snapshot.visible_text.to_lowercase();

  let phishing = match_keywords(&text, PHISHING_KEYWORDS);
  let scam = match_keywords(&text, SCAM_INDICATORS);
  let malware = match_keywords(&text, MALWARE_INDICATORS);

  let mut detected_keywords: BTreeSet<String> = phishing;
  detected_keywords.extend(scam.iter().cloned());
  detected_keywords.extend(malware.iter().cloned());

  ScoutSignal {
    url: url.to_string(),
    is_login_page: detect_login_form(snapshot),
    has_privacy_policy: detect_privacy_link(&snapshot.links),
    detected_keywords,
    detected_scam_indicators: scam,
    detected_malware_indicators: malware,
  }
}

/// One signal per paste event. Short pastes produce nothing at all.
pub fn extract_paste_signal(text: &str) -> Option<ScoutSignal> {
  if text.trim().chars().count() < MIN_PASTE_CHARS {
    return None;
  }

  let lower = text.to_lowercase();
  let phishing = match_keywords(&lower, PHISHING_KEYWORDS);
  let scam = match_keywords(&lower, SCAM_INDICATORS);
  let malware = match_keywords(&lower, MALWARE_INDICATORS);

  let mut detected_keywords: BTreeSet<String> = phishing;
  detected_keywords.extend(scam.iter().cloned());
  detected_keywords.extend(malware.iter().cloned());

  Some(ScoutSignal {
    url: String::new(),
    is_login_page: false,
    has_privacy_policy: false,
    detected_keywords,
    detected_scam_indicators: scam,
    detected_malware_indicators: malware,
  })
}

fn detect_login_form(snapshot: &PageSnapshot) -> bool {
  if snapshot
    .inputs
    .iter()
    .any(|i| i.kind.eq_ignore_ascii_case("password"))
  {
    return true;
  }

  if snapshot.forms.iter().any(|f| {
    let action = f.action.to_lowercase();
    LOGIN_FORM_ACTION_TOKENS.iter().any(|t| action.contains(t))
  }) {
    return true;
  }

  snapshot.inputs.iter().any(|i| {
    let name = i.name.to_lowercase();
    LOGIN_INPUT_NAMES.iter().any(|n| name == *n)
  })
}

fn detect_privacy_link(links: &[PageLink]) -> bool {
  links.iter().any(|l| {
    let href = l.href.to_lowercase();
    let text = l.text.to_lowercase();
    PRIVACY_LINK_PATTERNS
      .iter()
      .any(|p| href.contains(p) || text.contains(p))
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn snapshot_with_text(text: &str) -> PageSnapshot {
    PageSnapshot {
      visible_text: text.to_string(),
      ..Default::default()
    }
  }

  #[test]
  fn phishing_message_lights_up_all_detectors() {
    let snapshot = snapshot_with_text(
      "URGENT: your account is suspended. Verify now, wire transfer the fee, \
       then run invoice.exe to re-confirm.",
    );
    let signal = extract_signal(&snapshot, "https://example.com/");

    assert!(signal.detected_keywords.contains("urgent"));
    assert!(signal.detected_keywords.contains("suspended"));
    assert!(signal.detected_scam_indicators.contains("wire transfer"));
    assert!(signal.detected_malware_indicators.contains(".exe"));
    // Union: every per-detector hit also appears in the combined set.
    assert!(signal.detected_keywords.contains("wire transfer"));
    assert!(signal.detected_keywords.contains(".exe"));
  }

  #[test]
  fn detectors_are_independent() {
    let signal = extract_signal(
      &snapshot_with_text("you have won, congratulations"),
      "https://example.com/",
    );
    assert!(!signal.detected_scam_indicators.is_empty());
    assert!(signal.detected_malware_indicators.is_empty());
  }

  #[test]
  fn password_input_marks_login_page() {
    let snapshot = PageSnapshot {
      inputs: vec![InputField {
        kind: "password".to_string(),
        name: "pw".to_string(),
      }],
      ..Default::default()
    };
    assert!(extract_signal(&snapshot, "https://example.com/").is_login_page);
  }

  #[test]
  fn login_form_action_marks_login_page() {
    let snapshot = PageSnapshot {
      forms: vec![PageForm {
        action: "/api/SignIn".to_string(),
      }],
      ..Default::default()
    };
    assert!(extract_signal(&snapshot, "https://example.com/").is_login_page);
  }

  #[test]
  fn username_input_marks_login_page() {
    let snapshot = PageSnapshot {
      inputs: vec![InputField {
        kind: "text".to_string(),
        name: "Username".to_string(),
      }],
      ..Default::default()
    };
    assert!(extract_signal(&snapshot, "https://example.com/").is_login_page);
  }

  #[test]
  fn plain_page_is_not_a_login_page() {
    let snapshot = PageSnapshot {
      inputs: vec![InputField {
        kind: "search".to_string(),
        name: "q".to_string(),
      }],
      ..Default::default()
    };
    assert!(!extract_signal(&snapshot, "https://example.com/").is_login_page);
  }

  #[test]
  fn privacy_link_detected_by_target_or_text() {
    let by_href = PageSnapshot {
      links: vec![PageLink {
        href: "/legal/privacy-policy".to_string(),
        text: "Legal".to_string(),
      }],
      ..Default::default()
    };
    assert!(extract_signal(&by_href, "https://example.com/").has_privacy_policy);

    let by_text = PageSnapshot {
      links: vec![PageLink {
        href: "/p/42".to_string(),
        text: "Privacy Notice".to_string(),
      }],
      ..Default::default()
    };
    assert!(extract_signal(&by_text, "https://example.com/").has_privacy_policy);
  }

  #[test]
  fn short_paste_is_dropped() {
    assert!(extract_paste_signal("hi there").is_none());
    assert!(extract_paste_signal("   ").is_none());
  }

  #[test]
  fn paste_signal_carries_matched_keywords() {
    let signal = extract_paste_signal("urgent: verify your account today").unwrap();
    assert!(signal.detected_keywords.contains("urgent"));
    assert!(signal.detected_keywords.contains("verify"));
    assert!(signal.url.is_empty());
  }
}
