use crate::types::{SkippedReason, TabId};
use serde::Serialize;

/// Risk scores strictly above this value show the danger badge.
pub const DANGER_RISK_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeState {
  Scanning,
  Danger,
  Privacy,
  Safe,
  LocalhostSafe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
  pub text: &'static str,
  pub color: &'static str,
}

/// Recomputed from scratch on every result; nothing is derived from the
/// previous badge. `Scanning` is applied separately at dispatch time and is
/// not reachable from a result.
pub fn state_for(risk_score: u8, has_privacy_policy: bool, skipped: SkippedReason) -> BadgeState {
  if skipped == SkippedReason::Localhost {
    return BadgeState::LocalhostSafe;
  }
  if risk_score > DANGER_RISK_THRESHOLD {
    return BadgeState::Danger;
  }
  if has_privacy_policy {
    return BadgeState::Privacy;
  }
  BadgeState::Safe
}

pub fn badge_for(state: BadgeState) -> Badge {
  match state {
    BadgeState::Scanning => Badge {
      text: "...",
      color: "#9e9e9e",
    },
    BadgeState::Danger => Badge {
      text: "!",
      color: "#d32f2f",
    },
    BadgeState::Privacy => Badge {
      text: "i",
      color: "#f9a825",
    },
    BadgeState::Safe => Badge {
      text: "OK",
      color: "#2e7d32",
    },
    BadgeState::LocalhostSafe => Badge {
      text: "DEV",
      color: "#607d8b",
    },
  }
}

/// Where badge updates land. `None` targets the default/global badge.
pub trait BadgeSurface: Send + Sync {
  fn apply(&self, tab_id: Option<TabId>, badge: &Badge);
}
