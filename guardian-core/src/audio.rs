use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// An audio asset the host should play: a reference the host resolves
/// itself, or the synthesized clip inlined as base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioSource {
  Ref(String),
  #[serde(rename_all = "camelCase")]
  Inline { data_base64: String },
}

impl AudioSource {
  /// Alert references arrive in two forms: an asset id the host resolves
  /// itself, or the synthesized clip inlined as
  /// `<media-type>;base64,<payload>`.
  pub fn from_alert_ref(alert_ref: &str) -> Self {
    match alert_ref.split_once(";base64,") {
      Some((_, data)) => AudioSource::Inline {
        data_base64: data.to_string(),
      },
      None => AudioSource::Ref(alert_ref.to_string()),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceState {
  Created,
  AlreadyExists,
}

/// The detached playback surface. The coordinating context cannot render
/// audio itself; it only asks the host to materialize a surface and forwards
/// play commands to it.
pub trait AudioSurfaceHost: Send + Sync {
  fn ensure_surface(&self) -> anyhow::Result<SurfaceState>;
  fn play(&self, source: &AudioSource) -> anyhow::Result<()>;
}

/// Fire-and-forget alert dispatch. Playback is never on the critical path of
/// returning a scan result; failures are logged and dropped. Each distinct
/// scan id plays at most once, so cache replays stay silent.
pub struct AudioBridge {
  host: Arc<dyn AudioSurfaceHost>,
  surface_ready: Mutex<bool>,
  played: Mutex<HashSet<String>>,
}

impl AudioBridge {
  pub fn new(host: Arc<dyn AudioSurfaceHost>) -> Self {
    Self {
      host,
      surface_ready: Mutex::new(false),
      played: Mutex::new(HashSet::new()),
    }
  }

  pub fn play_alert(&self, scan_id: &str, source: AudioSource) {
    {
      let mut played = self.played.lock().unwrap();
      if !played.insert(scan_id.to_string()) {
        tracing::debug!(scan_id = %scan_id, "voice alert already played; replay suppressed");
        return;
      }
    }

    if let AudioSource::Inline { data_base64 } = &source {
      if base64::engine::general_purpose::STANDARD
        .decode(data_base64)
        .is_err()
      {
        tracing::warn!(scan_id = %scan_id, "inline audio payload is not valid base64; alert dropped");
        return;
      }
    }

    if let Err(e) = self.ensure_surface() {
      tracing::warn!(scan_id = %scan_id, error = ?e, "audio surface unavailable; alert dropped");
      return;
    }

    let host = Arc::clone(&self.host);
    let scan_id = scan_id.to_string();
    std::thread::spawn(move || {
      if let Err(e) = host.play(&source) {
        tracing::warn!(scan_id = %scan_id, error = ?e, "voice alert playback failed");
      }
    });
  }

  /// Single-flight surface creation: the lock is held across the host call,
  /// so concurrent callers never race to create two surfaces. The host
  /// reporting "already exists" is a normal success.
  fn ensure_surface(&self) -> anyhow::Result<()> {
    let mut ready = self.surface_ready.lock().unwrap();
    if *ready {
      return Ok(());
    }

    match self.host.ensure_surface()? {
      SurfaceState::Created => {
        tracing::debug!("audio playback surface created");
      }
      SurfaceState::AlreadyExists => {
        tracing::debug!("audio playback surface already present");
      }
    }

    *ready = true;
    Ok(())
  }
}
