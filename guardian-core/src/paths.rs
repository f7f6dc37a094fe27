use std::path::{Path, PathBuf};

pub fn base_dir() -> anyhow::Result<PathBuf> {
  if let Ok(dir) = std::env::var("GUARDIAN_DATA_DIR") {
    if !dir.trim().is_empty() {
      return Ok(PathBuf::from(dir));
    }
  }

  let home = std::env::var("HOME")
    .or_else(|_| std::env::var("USERPROFILE"))
    .map_err(|_| anyhow::anyhow!("neither GUARDIAN_DATA_DIR nor a home directory is set"))?;
  Ok(PathBuf::from(home).join(".guardian"))
}

pub fn config_path(base: &Path) -> PathBuf {
  base.join("config.toml")
}

pub fn logs_dir(base: &Path) -> PathBuf {
  base.join("logs")
}

pub fn history_dir(base: &Path) -> PathBuf {
  base.join("history")
}
