use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct Config {
  pub logging: LoggingConfig,
  pub backend: BackendConfig,
  pub caches: CacheConfig,
  pub rescan: RescanConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
  #[serde(default = "default_log_level")]
  pub level: String,

  #[serde(default = "default_retention_days")]
  pub retention_days: u64,
}

fn default_log_level() -> String {
  "info".to_string()
}

fn default_retention_days() -> u64 {
  14
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      retention_days: default_retention_days(),
    }
  }
}

/// Remote analysis service. Every outbound call is bounded by
/// `timeout_seconds`; a call that outlives the deadline is a transport
/// failure like any other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
  #[serde(default = "default_backend_base_url")]
  pub base_url: String,

  #[serde(default = "default_backend_timeout_seconds")]
  pub timeout_seconds: u64,
}

fn default_backend_base_url() -> String {
  "http://127.0.0.1:8000".to_string()
}

fn default_backend_timeout_seconds() -> u64 {
  10
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      base_url: default_backend_base_url(),
      timeout_seconds: default_backend_timeout_seconds(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
  /// TTL for cached page scan results.
  #[serde(default = "default_page_ttl_minutes")]
  pub page_ttl_minutes: u64,

  /// TTL for cached message/image analyses (content-fingerprint keyed).
  #[serde(default = "default_content_ttl_minutes")]
  pub content_ttl_minutes: u64,

  /// TTL for hover-link safety verdicts.
  #[serde(default = "default_link_ttl_minutes")]
  pub link_ttl_minutes: u64,

  #[serde(default = "default_sweep_interval_seconds")]
  pub sweep_interval_seconds: u64,
}

fn default_page_ttl_minutes() -> u64 {
  10
}

fn default_content_ttl_minutes() -> u64 {
  60
}

fn default_link_ttl_minutes() -> u64 {
  5
}

fn default_sweep_interval_seconds() -> u64 {
  60
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      page_ttl_minutes: default_page_ttl_minutes(),
      content_ttl_minutes: default_content_ttl_minutes(),
      link_ttl_minutes: default_link_ttl_minutes(),
      sweep_interval_seconds: default_sweep_interval_seconds(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescanConfig {
  #[serde(default = "default_true")]
  pub enabled: bool,

  #[serde(default = "default_rescan_interval_minutes")]
  pub interval_minutes: u64,
}

fn default_true() -> bool {
  true
}

fn default_rescan_interval_minutes() -> u64 {
  5
}

impl Default for RescanConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      interval_minutes: default_rescan_interval_minutes(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
  #[serde(default)]
  pub logging: Option<LoggingConfig>,

  #[serde(default)]
  pub backend: Option<BackendConfig>,

  #[serde(default)]
  pub caches: Option<CacheConfig>,

  #[serde(default)]
  pub rescan: Option<RescanConfig>,
}

impl ConfigFile {
  fn normalize(self) -> Config {
    let mut cfg = Config::default();
    if let Some(l) = self.logging {
      cfg.logging = l;
    }
    if let Some(b) = self.backend {
      cfg.backend = b;
    }
    if let Some(c) = self.caches {
      cfg.caches = c;
    }
    if let Some(r) = self.rescan {
      cfg.rescan = r;
    }

    if let Some(reason) = validate_backend_config(&cfg.backend) {
      tracing::warn!(
        reason = %reason,
        "backend config invalid; falling back to defaults"
      );
      cfg.backend = BackendConfig::default();
    }

    if let Some(reason) = validate_cache_config(&cfg.caches) {
      tracing::warn!(
        reason = %reason,
        "cache config invalid; falling back to defaults"
      );
      cfg.caches = CacheConfig::default();
    }

    if cfg.rescan.enabled && cfg.rescan.interval_minutes == 0 {
      tracing::warn!("rescan interval_minutes must be > 0; periodic rescan disabled");
      cfg.rescan.enabled = false;
    }

    cfg
  }

  fn needs_upgrade(&self) -> bool {
    self.logging.is_none()
      || self.backend.is_none()
      || self.caches.is_none()
      || self.rescan.is_none()
  }
}

pub fn load_or_create_default(path: &Path) -> anyhow::Result<Config> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("config path has no parent: {}", path.display()))?;
  fs::create_dir_all(parent)?;

  if !path.exists() {
    let cfg = Config::default();
    write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
    return Ok(cfg);
  }

  let raw = fs::read_to_string(path)?;
  match toml::from_str::<ConfigFile>(&raw) {
    Ok(file) => {
      let cfg = file.clone().normalize();
      if file.needs_upgrade() {
        let _ = write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?);
        eprintln!(
          "Guardian: upgraded config defaults written to {}",
          path.display()
        );
      }
      Ok(cfg)
    }
    Err(e) => {
      let cfg = Config::default();
      let ts = crate::types::now_unix_ms() / 1000;
      let backup = parent.join(format!("config.toml.bad-{ts}"));
      let _ = fs::rename(path, &backup);
      write_atomic(path, &toml::to_string_pretty(&to_config_file(&cfg))?)?;
      eprintln!(
        "Guardian: invalid config at {} (backed up to {}): {e}",
        path.display(),
        backup.display()
      );
      Ok(cfg)
    }
  }
}

fn to_config_file(cfg: &Config) -> ConfigFile {
  ConfigFile {
    logging: Some(cfg.logging.clone()),
    backend: Some(cfg.backend.clone()),
    caches: Some(cfg.caches.clone()),
    rescan: Some(cfg.rescan.clone()),
  }
}

fn write_atomic(path: &Path, contents: &str) -> anyhow::Result<()> {
  let parent = path
    .parent()
    .ok_or_else(|| anyhow::anyhow!("file path has no parent: {}", path.display()))?;
  let tmp = parent.join(format!(
    ".{}.tmp",
    path.file_name().unwrap_or_default().to_string_lossy()
  ));

  fs::write(&tmp, contents)?;
  fs::rename(&tmp, path)?;
  Ok(())
}

fn validate_backend_config(cfg: &BackendConfig) -> Option<String> {
  if cfg.timeout_seconds == 0 {
    return Some("timeout_seconds must be > 0".to_string());
  }

  let Ok(url) = reqwest::Url::parse(&cfg.base_url) else {
    return Some(format!("invalid base_url: {}", cfg.base_url));
  };
  if url.scheme() != "http" && url.scheme() != "https" {
    return Some(format!("base_url must be http(s): {}", cfg.base_url));
  }
  if url.host_str().is_none() {
    return Some(format!("base_url has no host: {}", cfg.base_url));
  }

  None
}

fn validate_cache_config(cfg: &CacheConfig) -> Option<String> {
  if cfg.page_ttl_minutes == 0 {
    return Some("page_ttl_minutes must be > 0".to_string());
  }
  if cfg.content_ttl_minutes == 0 {
    return Some("content_ttl_minutes must be > 0".to_string());
  }
  if cfg.link_ttl_minutes == 0 {
    return Some("link_ttl_minutes must be > 0".to_string());
  }
  if cfg.sweep_interval_seconds == 0 {
    return Some("sweep_interval_seconds must be > 0".to_string());
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_sections_fall_back_to_defaults() {
    let file: ConfigFile = toml::from_str("[logging]\nlevel = \"debug\"\n").unwrap();
    let cfg = file.normalize();
    assert_eq!(cfg.logging.level, "debug");
    assert_eq!(cfg.backend.base_url, default_backend_base_url());
    assert_eq!(cfg.caches.link_ttl_minutes, 5);
    assert!(cfg.rescan.enabled);
  }

  #[test]
  fn invalid_backend_section_reverts_to_default() {
    let file: ConfigFile =
      toml::from_str("[backend]\nbase_url = \"not a url\"\ntimeout_seconds = 10\n").unwrap();
    let cfg = file.normalize();
    assert_eq!(cfg.backend.base_url, default_backend_base_url());
  }

  #[test]
  fn zero_rescan_interval_disables_rescan() {
    let file: ConfigFile =
      toml::from_str("[rescan]\nenabled = true\ninterval_minutes = 0\n").unwrap();
    let cfg = file.normalize();
    assert!(!cfg.rescan.enabled);
  }
}
