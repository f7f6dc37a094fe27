use std::collections::BTreeSet;

// Vocabularies shared by the in-page extractor and the paste-analysis path.
// Matching is plain substring search over lower-cased text; phrases stay
// lower-case here for that reason.

/// Urgency/pressure wording and credential-harvesting vocabulary.
pub const PHISHING_KEYWORDS: &[&str] = &[
  "urgent",
  "immediate",
  "verify",
  "suspended",
  "expires",
  "limited time",
  "act now",
  "confirm",
  "re-confirm",
  "click here",
  "password",
  "credentials",
  "verify account",
  "confirm identity",
  "authenticate",
];

/// Too-good-to-be-true offers and money-movement vocabulary.
pub const SCAM_INDICATORS: &[&str] = &[
  "claim prize",
  "congratulations",
  "you have won",
  "inherited",
  "wire transfer",
  "western union",
  "gift card",
  "bank account",
  "refund",
  "billing problem",
];

/// Executable attachments and malware delivery vocabulary.
pub const MALWARE_INDICATORS: &[&str] = &[
  ".exe",
  ".scr",
  ".vbs",
  ".bat",
  ".pif",
  ".rar",
  "enable macros",
  "disable antivirus",
  "install this update",
];

/// Returns the subset of `vocab` present in `text_lower`. The caller is
/// responsible for lower-casing; the vocabularies are already lower-case.
pub fn match_keywords(text_lower: &str, vocab: &[&str]) -> BTreeSet<String> {
  vocab
    .iter()
    .filter(|kw| text_lower.contains(*kw))
    .map(|kw| kw.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn matches_multiple_phrases() {
    let text = "urgent: verify your account or it will be suspended";
    let hits = match_keywords(text, PHISHING_KEYWORDS);
    assert!(hits.contains("urgent"));
    assert!(hits.contains("verify"));
    assert!(hits.contains("suspended"));
    assert!(!hits.contains("password"));
  }

  #[test]
  fn clean_text_matches_nothing() {
    assert!(match_keywords("weather forecast for tuesday", SCAM_INDICATORS).is_empty());
  }
}
