use serde::Serialize;
use std::net::Ipv4Addr;

// Rule list for the synchronous link check. First match wins; each rule is
// independently sufficient and there is no score summation across rules.
// This filter never performs I/O and never touches the link-safety cache.

/// Top-level domains with a long abuse record (free/low-cost registrations).
pub const LOW_TRUST_TLDS: &[&str] = &["tk", "ml", "ga", "cf", "gq", "xyz", "top", "click"];

/// Urgency wording that shows up in phishing link paths and hosts.
pub const URL_URGENCY_TOKENS: &[&str] = &[
  "urgent",
  "verify",
  "suspended",
  "expire",
  "account-locked",
  "security-alert",
  "confirm-identity",
];

/// Hosts with more labels than this trip the typosquatting heuristic.
pub const MAX_HOST_LABELS: usize = 4;

pub const RISK_LOW_TRUST_TLD: u8 = 85;
pub const RISK_BARE_IP_HOST: u8 = 80;
pub const RISK_URL_URGENCY: u8 = 65;
pub const RISK_EXCESSIVE_LABELS: u8 = 55;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkVerdict {
  pub suspicious: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub risk: Option<u8>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub reason: Option<String>,
}

impl LinkVerdict {
  fn clean() -> Self {
    Self {
      suspicious: false,
      risk: None,
      reason: None,
    }
  }

  fn flagged(risk: u8, reason: String) -> Self {
    Self {
      suspicious: true,
      risk: Some(risk),
      reason: Some(reason),
    }
  }
}

/// Synchronous short-circuit for obviously bad links. A clean verdict means
/// "unknown", not "safe"; callers fall back to the remote/caching path.
pub fn quick_check(url: &str) -> LinkVerdict {
  let lower = url.to_ascii_lowercase();
  let host = reqwest::Url::parse(&lower)
    .ok()
    .and_then(|u| u.host_str().map(|h| h.to_string()));

  if let Some(host) = host.as_deref() {
    if let Some(tld) = low_trust_tld(host) {
      return LinkVerdict::flagged(
        RISK_LOW_TRUST_TLD,
        format!("low-trust top-level domain .{tld}"),
      );
    }
  }

  if let Some(token) = URL_URGENCY_TOKENS.iter().find(|t| lower.contains(*t)) {
    return LinkVerdict::flagged(
      RISK_URL_URGENCY,
      format!("urgency wording in link ({token})"),
    );
  }

  if let Some(host) = host.as_deref() {
    if host.parse::<Ipv4Addr>().is_ok() {
      return LinkVerdict::flagged(RISK_BARE_IP_HOST, "bare IP address host".to_string());
    }

    let labels = host.split('.').filter(|l| !l.is_empty()).count();
    if labels > MAX_HOST_LABELS {
      return LinkVerdict::flagged(
        RISK_EXCESSIVE_LABELS,
        format!("host has {labels} dot-separated labels"),
      );
    }
  }

  LinkVerdict::clean()
}

fn low_trust_tld(host: &str) -> Option<&'static str> {
  let last_label = host.rsplit('.').next()?;
  LOW_TRUST_TLDS
    .iter()
    .find(|tld| **tld == last_label)
    .copied()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn low_trust_tld_is_flagged() {
    let v = quick_check("https://secure-login.example.tk/home");
    assert!(v.suspicious);
    assert_eq!(v.risk, Some(RISK_LOW_TRUST_TLD));
  }

  #[test]
  fn tld_rule_wins_over_later_rules() {
    // Urgency wording and deep nesting are both present; rule order holds.
    let v = quick_check("https://a.b.c.d.verify.example.xyz/");
    assert_eq!(v.risk, Some(RISK_LOW_TRUST_TLD));
  }

  #[test]
  fn urgency_wording_in_url() {
    let v = quick_check("https://example.com/verify-account-now");
    assert!(v.suspicious);
    assert_eq!(v.risk, Some(RISK_URL_URGENCY));
  }

  #[test]
  fn bare_ipv4_host() {
    let v = quick_check("http://203.0.113.9/index.html");
    assert!(v.suspicious);
    assert_eq!(v.risk, Some(RISK_BARE_IP_HOST));
  }

  #[test]
  fn deeply_nested_host() {
    let v = quick_check("https://a.b.c.d.example.com/");
    assert!(v.suspicious);
    assert_eq!(v.risk, Some(RISK_EXCESSIVE_LABELS));
  }

  #[test]
  fn four_labels_are_fine() {
    assert!(!quick_check("https://www.mail.example.com/").suspicious);
  }

  #[test]
  fn ordinary_url_is_clean() {
    let v = quick_check("https://en.wikipedia.org/wiki/Rust_(programming_language)");
    assert_eq!(v, LinkVerdict::clean());
  }

  #[test]
  fn unparseable_url_only_matches_text_rules() {
    assert!(!quick_check("not a url at all").suspicious);
    assert!(quick_check("not a url but urgent").suspicious);
  }

  #[test]
  fn idempotent() {
    let a = quick_check("https://example.tk/");
    let b = quick_check("https://example.tk/");
    assert_eq!(a, b);
  }
}
