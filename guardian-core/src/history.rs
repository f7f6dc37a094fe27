use crate::types::{now_unix_ms, ScanResult, ScanType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One persisted scan outcome, written after every fresh full-pipeline
/// result so the dashboard can show recent activity across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
  pub record_id: String,
  #[serde(default)]
  pub scan_id: Option<String>,
  pub url: String,
  pub scan_type: ScanType,
  pub risk_score: u8,
  pub threat_type: String,
  pub created_at_unix_ms: u64,
}

impl ScanRecord {
  pub fn from_result(url: &str, scan_type: ScanType, result: &ScanResult) -> Self {
    Self {
      record_id: uuid::Uuid::new_v4().to_string(),
      scan_id: result.scan_id.clone(),
      url: url.to_string(),
      scan_type,
      risk_score: result.risk_score,
      threat_type: result.threat_type.clone(),
      created_at_unix_ms: now_unix_ms(),
    }
  }
}

pub fn store_record(history_dir: &Path, record: &ScanRecord) -> anyhow::Result<PathBuf> {
  fs::create_dir_all(history_dir)?;
  let file_path = history_dir.join(format!("{}.toml", record.record_id));

  let raw = toml::to_string_pretty(record)?;
  write_atomic(&file_path, &raw)?;
  Ok(file_path)
}

/// Most recent records first. Unreadable or malformed files are skipped, not
/// errors.
pub fn list_recent(history_dir: &Path, limit: usize) -> anyhow::Result<Vec<ScanRecord>> {
  if !history_dir.exists() {
    return Ok(Vec::new());
  }

  let mut entries: Vec<_> = fs::read_dir(history_dir)?
    .flatten()
    .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("toml"))
    .collect();

  entries.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
  entries.reverse();

  let mut out = Vec::new();
  for e in entries.into_iter().take(limit) {
    let raw = match fs::read_to_string(e.path()) {
      Ok(r) => r,
      Err(_) => continue,
    };
    match toml::from_str::<ScanRecord>(&raw) {
      Ok(rec) => out.push(rec),
      Err(_) => continue,
    }
  }

  Ok(out)
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  fs::create_dir_all(parent)?;

  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));
  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample_result(risk: u8) -> ScanResult {
    ScanResult {
      risk_score: risk,
      threat_type: "phishing".to_string(),
      explanation: None,
      next_steps: Vec::new(),
      evidence: Vec::new(),
      mitre_techniques: Vec::new(),
      confidence: None,
      voice_alert_ref: None,
      scan_id: Some("s-1".to_string()),
    }
  }

  #[test]
  fn record_round_trips_through_disk() {
    let dir = std::env::temp_dir().join(format!("guardian-history-{}", uuid::Uuid::new_v4()));
    let record = ScanRecord::from_result("https://example.com/", ScanType::Page, &sample_result(77));

    store_record(&dir, &record).unwrap();
    let listed = list_recent(&dir, 10).unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].record_id, record.record_id);
    assert_eq!(listed[0].risk_score, 77);
    assert_eq!(listed[0].scan_id.as_deref(), Some("s-1"));

    let _ = fs::remove_dir_all(&dir);
  }

  #[test]
  fn missing_dir_lists_empty() {
    let dir = std::env::temp_dir().join(format!("guardian-none-{}", uuid::Uuid::new_v4()));
    assert!(list_recent(&dir, 10).unwrap().is_empty());
  }
}
