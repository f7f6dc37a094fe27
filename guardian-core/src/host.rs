use crate::audio::{AudioSource, AudioSurfaceHost, SurfaceState};
use crate::badge::{Badge, BadgeSurface};
use crate::coordinator::Handle;
use crate::types::{ScanRequest, ScanType, ScoutSignal, TabId};
use serde::Deserialize;
use serde_json::json;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

// Line-delimited JSON over stdio: the transport the extension's background
// context uses to reach this process. Requests are an action-tagged union;
// badge and audio updates flow the other way as `event` lines on stdout.
// Logs never touch stdout.

#[derive(Debug, Deserialize)]
struct WireEnvelope {
  #[serde(default)]
  id: Option<u64>,
  #[serde(flatten)]
  request: WireRequest,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
enum WireRequest {
  #[serde(rename_all = "camelCase")]
  ScoutSignal { tab_id: TabId, signal: ScoutSignal },
  #[serde(rename_all = "camelCase")]
  ManualScan {
    url: String,
    scan_type: ScanType,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    image_data: Option<String>,
  },
  PasteAnalysis { text: String },
  #[serde(rename_all = "camelCase")]
  GetTabState { tab_id: TabId },
  CheckLinkSafety { url: String },
  #[serde(rename_all = "camelCase")]
  TabFocused { tab_id: TabId },
  #[serde(rename_all = "camelCase")]
  TabRemoved { tab_id: TabId },
}

/// Serialized access to the protocol stream. Shared between the request
/// loop's responses and the badge/audio event emitters so lines never
/// interleave mid-record.
#[derive(Clone)]
pub struct EventWriter {
  out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl EventWriter {
  pub fn stdout() -> Self {
    Self {
      out: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
    }
  }

  #[cfg(test)]
  fn sink(buf: Arc<Mutex<Vec<u8>>>) -> Self {
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);
    impl Write for SharedBuf {
      fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
      }
      fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
      }
    }
    Self {
      out: Arc::new(Mutex::new(Box::new(SharedBuf(buf)))),
    }
  }

  fn write_line(&self, value: &serde_json::Value) {
    // A closed stream means the host went away; nothing useful to do.
    let mut out = self.out.lock().unwrap();
    let _ = writeln!(out, "{value}");
    let _ = out.flush();
  }
}

/// Badge and audio rendered as protocol events. This is the detached
/// presentation surface the coordinating context forwards commands to; it
/// outlives any single request.
pub struct StdioSurface {
  writer: EventWriter,
}

impl StdioSurface {
  pub fn new(writer: EventWriter) -> Self {
    Self { writer }
  }
}

impl BadgeSurface for StdioSurface {
  fn apply(&self, tab_id: Option<TabId>, badge: &Badge) {
    self.writer.write_line(&json!({
      "event": "badge",
      "tabId": tab_id,
      "text": badge.text,
      "color": badge.color,
    }));
  }
}

impl AudioSurfaceHost for StdioSurface {
  fn ensure_surface(&self) -> anyhow::Result<SurfaceState> {
    self.writer.write_line(&json!({ "event": "ensureAudioSurface" }));
    Ok(SurfaceState::Created)
  }

  fn play(&self, source: &AudioSource) -> anyhow::Result<()> {
    let value = match source {
      AudioSource::Ref(r) => json!({ "event": "playAudio", "ref": r }),
      AudioSource::Inline { data_base64 } => {
        json!({ "event": "playAudio", "dataBase64": data_base64 })
      }
    };
    self.writer.write_line(&value);
    Ok(())
  }
}

/// Reads requests until stdin closes. Each request runs on its own thread so
/// a slow scan never blocks the next inbound line.
pub fn run(handle: Handle, writer: EventWriter) -> anyhow::Result<()> {
  let stdin = std::io::stdin();
  for line in stdin.lock().lines() {
    let line = line?;
    let line = line.trim();
    if line.is_empty() {
      continue;
    }

    match serde_json::from_str::<WireEnvelope>(line) {
      Ok(envelope) => {
        let handle = handle.clone();
        let writer = writer.clone();
        std::thread::spawn(move || {
          let outcome = dispatch(&handle, envelope.request);
          writer.write_line(&respond(envelope.id, outcome));
        });
      }
      Err(e) => {
        tracing::warn!(error = %e, "unparseable request line");
        writer.write_line(&json!({ "id": null, "error": format!("bad request: {e}") }));
      }
    }
  }

  tracing::info!("stdin closed; host loop ending");
  Ok(())
}

fn dispatch(handle: &Handle, request: WireRequest) -> anyhow::Result<serde_json::Value> {
  match request {
    WireRequest::ScoutSignal { tab_id, signal } => {
      let result = handle.scout_signal(tab_id, signal)?;
      Ok(serde_json::to_value(result)?)
    }
    WireRequest::ManualScan {
      url,
      scan_type,
      content,
      image_data,
    } => {
      let result = handle.manual_scan(ScanRequest {
        url,
        scan_type,
        content,
        image_data,
      })?;
      Ok(serde_json::to_value(result)?)
    }
    WireRequest::PasteAnalysis { text } => {
      let result = handle.paste_analysis(text)?;
      Ok(serde_json::to_value(result)?)
    }
    WireRequest::GetTabState { tab_id } => {
      let state = handle.get_tab_state(tab_id)?;
      Ok(serde_json::to_value(state)?)
    }
    WireRequest::CheckLinkSafety { url } => {
      let safety = handle.check_link_safety(url)?;
      Ok(serde_json::to_value(safety)?)
    }
    WireRequest::TabFocused { tab_id } => {
      handle.tab_focused(tab_id)?;
      Ok(json!({ "acknowledged": true }))
    }
    WireRequest::TabRemoved { tab_id } => {
      handle.tab_removed(tab_id)?;
      Ok(json!({ "acknowledged": true }))
    }
  }
}

fn respond(id: Option<u64>, outcome: anyhow::Result<serde_json::Value>) -> serde_json::Value {
  match outcome {
    Ok(value) => json!({ "id": id, "ok": value }),
    Err(e) => json!({ "id": id, "error": e.to_string() }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn action_tags_parse() {
    let raw = r#"{"id": 3, "action": "scoutSignal", "tabId": 7, "signal": {
      "url": "https://example.com/",
      "isLoginPage": true,
      "hasPrivacyPolicy": false
    }}"#;
    let envelope: WireEnvelope = serde_json::from_str(raw).unwrap();
    assert_eq!(envelope.id, Some(3));
    match envelope.request {
      WireRequest::ScoutSignal { tab_id, signal } => {
        assert_eq!(tab_id, 7);
        assert!(signal.is_login_page);
        assert!(signal.detected_keywords.is_empty());
      }
      _ => panic!("wrong variant"),
    }
  }

  #[test]
  fn manual_scan_payload_parses_inline_fields() {
    let raw = r#"{"action": "manualScan", "url": "https://example.com/x",
      "scanType": "message", "content": "check this out"}"#;
    let envelope: WireEnvelope = serde_json::from_str(raw).unwrap();
    match envelope.request {
      WireRequest::ManualScan {
        url,
        scan_type,
        content,
        ..
      } => {
        assert_eq!(url, "https://example.com/x");
        assert_eq!(scan_type, ScanType::Message);
        assert_eq!(content.as_deref(), Some("check this out"));
      }
      _ => panic!("wrong variant"),
    }
  }

  #[test]
  fn unknown_action_is_rejected() {
    assert!(serde_json::from_str::<WireEnvelope>(r#"{"action": "selfDestruct"}"#).is_err());
  }

  #[test]
  fn badge_events_are_single_lines() {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let surface = StdioSurface::new(EventWriter::sink(buf.clone()));

    surface.apply(
      Some(4),
      &Badge {
        text: "!",
        color: "#d32f2f",
      },
    );
    surface.apply(
      None,
      &Badge {
        text: "OK",
        color: "#2e7d32",
      },
    );

    let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);

    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["event"], "badge");
    assert_eq!(first["tabId"], 4);
    assert_eq!(first["text"], "!");

    let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert!(second["tabId"].is_null());
  }

  #[test]
  fn audio_events_cover_both_source_forms() {
    let buf = Arc::new(Mutex::new(Vec::new()));
    let surface = StdioSurface::new(EventWriter::sink(buf.clone()));

    surface.play(&AudioSource::Ref("alert-1".to_string())).unwrap();
    surface
      .play(&AudioSource::Inline {
        data_base64: "UklGRg==".to_string(),
      })
      .unwrap();

    let out = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    let by_ref: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(by_ref["ref"], "alert-1");
    let inline: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(inline["dataBase64"], "UklGRg==");
  }
}
