use crate::backend::{AnalysisBackend, QuickScanRequest, QuickScanResponse};
use crate::orchestrator::{
  LinkDecision, LinkSafety, Orchestrator, PasteDecision, QuickTicket, ScanDecision, ScanTicket,
};
use crate::types::{now_unix_ms, ScanRequest, ScanResult, ScoutSignal, TabId, TabState};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::time::Duration;

type Reply<T> = Sender<anyhow::Result<T>>;

/// Everything the coordinator reacts to: the inbound action set, host
/// notifications, and the completion messages posted back by scan workers.
pub enum Message {
  ScoutSignal {
    tab_id: TabId,
    signal: ScoutSignal,
    reply: Reply<ScanResult>,
  },
  ManualScan {
    request: ScanRequest,
    reply: Reply<ScanResult>,
  },
  PasteAnalysis {
    text: String,
    reply: Reply<ScanResult>,
  },
  GetTabState {
    tab_id: TabId,
    reply: Reply<Option<TabState>>,
  },
  CheckLinkSafety {
    url: String,
    reply: Reply<LinkSafety>,
  },
  TabFocused {
    tab_id: TabId,
  },
  TabRemoved {
    tab_id: TabId,
  },
  ScanFinished {
    ticket: ScanTicket,
    outcome: anyhow::Result<ScanResult>,
    reply: Option<Reply<ScanResult>>,
  },
  PasteFinished {
    ticket: QuickTicket,
    outcome: anyhow::Result<QuickScanResponse>,
    reply: Reply<ScanResult>,
  },
  LinkCheckFinished {
    url: String,
    outcome: anyhow::Result<QuickScanResponse>,
    reply: Reply<LinkSafety>,
  },
  Shutdown,
}

/// Single-threaded event loop around the orchestrator. All shared state
/// lives behind this thread; network calls run on short-lived workers that
/// post completions back into the same channel, so events for other tabs
/// interleave while a scan is in flight.
pub struct Coordinator {
  orchestrator: Orchestrator,
  backend: Arc<dyn AnalysisBackend>,
  tx: Sender<Message>,
  rx: Receiver<Message>,
}

impl Coordinator {
  pub fn new(orchestrator: Orchestrator, backend: Arc<dyn AnalysisBackend>) -> (Self, Handle) {
    let (tx, rx) = mpsc::channel();
    let handle = Handle { tx: tx.clone() };
    (
      Self {
        orchestrator,
        backend,
        tx,
        rx,
      },
      handle,
    )
  }

  pub fn run(mut self, tick: Duration) {
    tracing::info!("coordinator loop started");
    loop {
      match self.rx.recv_timeout(tick) {
        Ok(Message::Shutdown) => break,
        Ok(msg) => self.handle(msg),
        Err(mpsc::RecvTimeoutError::Timeout) => {}
        Err(mpsc::RecvTimeoutError::Disconnected) => break,
      }

      for ticket in self.orchestrator.tick(now_unix_ms()) {
        // Rescan tickets have no caller; failures land nowhere on purpose.
        self.dispatch_scan(ticket, None);
      }
    }
    tracing::info!("coordinator loop exiting");
  }

  fn handle(&mut self, msg: Message) {
    let now = now_unix_ms();
    match msg {
      Message::ScoutSignal {
        tab_id,
        signal,
        reply,
      } => match self.orchestrator.handle_signal(tab_id, &signal, now) {
        ScanDecision::Skipped(result) | ScanDecision::Cached(result) => {
          let _ = reply.send(Ok(result));
        }
        ScanDecision::Dispatch(ticket) => self.dispatch_scan(ticket, Some(reply)),
      },

      Message::ManualScan { request, reply } => {
        match self.orchestrator.handle_manual_scan(request, now) {
          ScanDecision::Skipped(result) | ScanDecision::Cached(result) => {
            let _ = reply.send(Ok(result));
          }
          ScanDecision::Dispatch(ticket) => self.dispatch_scan(ticket, Some(reply)),
        }
      }

      Message::PasteAnalysis { text, reply } => match self.orchestrator.handle_paste(&text, now) {
        PasteDecision::Cached(result) => {
          let _ = reply.send(Ok(result));
        }
        PasteDecision::Dispatch(ticket) => {
          let backend = Arc::clone(&self.backend);
          let tx = self.tx.clone();
          std::thread::spawn(move || {
            let outcome = backend.quick_scan(&ticket.request);
            let _ = tx.send(Message::PasteFinished {
              ticket,
              outcome,
              reply,
            });
          });
        }
      },

      Message::GetTabState { tab_id, reply } => {
        let _ = reply.send(Ok(self.orchestrator.get_tab_state(tab_id)));
      }

      Message::CheckLinkSafety { url, reply } => {
        match self.orchestrator.handle_link_check(&url, now) {
          LinkDecision::Resolved(safety) => {
            let _ = reply.send(Ok(safety));
          }
          LinkDecision::Dispatch(url) => {
            let backend = Arc::clone(&self.backend);
            let tx = self.tx.clone();
            let request = QuickScanRequest {
              url: Some(url.clone()),
              content: None,
              is_login_page: false,
              signals: Vec::new(),
            };
            std::thread::spawn(move || {
              let outcome = backend.quick_scan(&request);
              let _ = tx.send(Message::LinkCheckFinished {
                url,
                outcome,
                reply,
              });
            });
          }
        }
      }

      Message::TabFocused { tab_id } => self.orchestrator.tab_focused(tab_id),
      Message::TabRemoved { tab_id } => self.orchestrator.tab_removed(tab_id),

      Message::ScanFinished {
        ticket,
        outcome,
        reply,
      } => {
        let out = self.orchestrator.complete_scan(ticket, outcome, now);
        match reply {
          Some(reply) => {
            let _ = reply.send(out);
          }
          None => {
            if let Err(e) = out {
              tracing::debug!(error = ?e, "background rescan failed");
            }
          }
        }
      }

      Message::PasteFinished {
        ticket,
        outcome,
        reply,
      } => {
        let _ = reply.send(self.orchestrator.complete_paste(ticket, outcome, now));
      }

      Message::LinkCheckFinished {
        url,
        outcome,
        reply,
      } => {
        let _ = reply.send(self.orchestrator.complete_link_check(url, outcome, now));
      }

      // Handled in run() before dispatch.
      Message::Shutdown => {}
    }
  }

  fn dispatch_scan(&self, ticket: ScanTicket, reply: Option<Reply<ScanResult>>) {
    let backend = Arc::clone(&self.backend);
    let tx = self.tx.clone();
    std::thread::spawn(move || {
      let outcome = backend.full_scan(&ticket.request);
      let _ = tx.send(Message::ScanFinished {
        ticket,
        outcome,
        reply,
      });
    });
  }
}

/// Cloneable front door for hosts and in-process callers. Each request gets
/// its own reply channel; the send blocks only until the coordinator (or its
/// worker) answers.
#[derive(Clone)]
pub struct Handle {
  tx: Sender<Message>,
}

impl Handle {
  pub fn scout_signal(&self, tab_id: TabId, signal: ScoutSignal) -> anyhow::Result<ScanResult> {
    self.request(|reply| Message::ScoutSignal {
      tab_id,
      signal,
      reply,
    })
  }

  pub fn manual_scan(&self, request: ScanRequest) -> anyhow::Result<ScanResult> {
    self.request(|reply| Message::ManualScan { request, reply })
  }

  pub fn paste_analysis(&self, text: String) -> anyhow::Result<ScanResult> {
    self.request(|reply| Message::PasteAnalysis { text, reply })
  }

  pub fn get_tab_state(&self, tab_id: TabId) -> anyhow::Result<Option<TabState>> {
    self.request(|reply| Message::GetTabState { tab_id, reply })
  }

  pub fn check_link_safety(&self, url: String) -> anyhow::Result<LinkSafety> {
    self.request(|reply| Message::CheckLinkSafety { url, reply })
  }

  pub fn tab_focused(&self, tab_id: TabId) -> anyhow::Result<()> {
    self.notify(Message::TabFocused { tab_id })
  }

  pub fn tab_removed(&self, tab_id: TabId) -> anyhow::Result<()> {
    self.notify(Message::TabRemoved { tab_id })
  }

  pub fn shutdown(&self) {
    let _ = self.tx.send(Message::Shutdown);
  }

  fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Message) -> anyhow::Result<T> {
    let (reply_tx, reply_rx) = mpsc::channel();
    self
      .tx
      .send(build(reply_tx))
      .map_err(|_| anyhow::anyhow!("coordinator is not running"))?;
    reply_rx
      .recv()
      .map_err(|_| anyhow::anyhow!("coordinator dropped the request"))?
  }

  fn notify(&self, msg: Message) -> anyhow::Result<()> {
    self
      .tx
      .send(msg)
      .map_err(|_| anyhow::anyhow!("coordinator is not running"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::audio::{AudioSource, AudioSurfaceHost, SurfaceState};
  use crate::badge::{Badge, BadgeSurface};
  use crate::config::Config;
  use std::collections::BTreeSet;
  use std::sync::atomic::{AtomicUsize, Ordering};

  struct NullBadge;
  impl BadgeSurface for NullBadge {
    fn apply(&self, _tab_id: Option<TabId>, _badge: &Badge) {}
  }

  struct NullAudio;
  impl AudioSurfaceHost for NullAudio {
    fn ensure_surface(&self) -> anyhow::Result<SurfaceState> {
      Ok(SurfaceState::Created)
    }
    fn play(&self, _source: &AudioSource) -> anyhow::Result<()> {
      Ok(())
    }
  }

  #[derive(Default)]
  struct CountingBackend {
    full_calls: AtomicUsize,
    quick_calls: AtomicUsize,
  }

  impl AnalysisBackend for CountingBackend {
    fn quick_scan(&self, _req: &QuickScanRequest) -> anyhow::Result<QuickScanResponse> {
      self.quick_calls.fetch_add(1, Ordering::SeqCst);
      Ok(QuickScanResponse {
        risk_score: 30,
        reason: Some("test".to_string()),
      })
    }

    fn full_scan(&self, req: &ScanRequest) -> anyhow::Result<ScanResult> {
      self.full_calls.fetch_add(1, Ordering::SeqCst);
      Ok(ScanResult {
        risk_score: 12,
        threat_type: "none".to_string(),
        explanation: None,
        next_steps: Vec::new(),
        evidence: Vec::new(),
        mitre_techniques: Vec::new(),
        confidence: None,
        voice_alert_ref: None,
        scan_id: Some(format!("scan-of-{}", req.url)),
      })
    }
  }

  fn start(backend: Arc<CountingBackend>) -> (Handle, std::thread::JoinHandle<()>) {
    let orchestrator = Orchestrator::new(
      &Config::default(),
      Arc::new(NullBadge),
      Arc::new(NullAudio),
      None,
    );
    let (coordinator, handle) = Coordinator::new(orchestrator, backend);
    let join = std::thread::spawn(move || coordinator.run(Duration::from_millis(10)));
    (handle, join)
  }

  fn signal(url: &str) -> ScoutSignal {
    ScoutSignal {
      url: url.to_string(),
      is_login_page: false,
      has_privacy_policy: false,
      detected_keywords: BTreeSet::new(),
      detected_scam_indicators: BTreeSet::new(),
      detected_malware_indicators: BTreeSet::new(),
    }
  }

  #[test]
  fn page_signal_round_trips_through_the_backend() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    let result = handle.scout_signal(1, signal("https://example.com/")).unwrap();
    assert_eq!(result.risk_score, 12);
    assert_eq!(backend.full_calls.load(Ordering::SeqCst), 1);

    let state = handle.get_tab_state(1).unwrap().unwrap();
    assert_eq!(state.url, "https://example.com/");
    assert_eq!(state.risk_score, 12);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn localhost_signal_makes_no_remote_call() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    let result = handle
      .scout_signal(2, signal("http://localhost:3000/dev"))
      .unwrap();
    assert_eq!(result.risk_score, 0);
    assert_eq!(backend.full_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.quick_calls.load(Ordering::SeqCst), 0);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn second_signal_for_same_page_is_served_from_cache() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    handle.scout_signal(1, signal("https://example.com/")).unwrap();
    handle.scout_signal(3, signal("https://example.com/")).unwrap();
    assert_eq!(backend.full_calls.load(Ordering::SeqCst), 1);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn heuristic_link_verdict_needs_no_network() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    let safety = handle
      .check_link_safety("https://bait.example.tk/win".to_string())
      .unwrap();
    assert!(safety.risk >= 80);
    assert_eq!(backend.quick_calls.load(Ordering::SeqCst), 0);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn clean_link_falls_through_to_quick_endpoint() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    let safety = handle
      .check_link_safety("https://example.com/page".to_string())
      .unwrap();
    assert_eq!(safety.risk, 30);
    assert!(!safety.cached);
    assert_eq!(backend.quick_calls.load(Ordering::SeqCst), 1);

    let again = handle
      .check_link_safety("https://example.com/page".to_string())
      .unwrap();
    assert!(again.cached);
    assert_eq!(backend.quick_calls.load(Ordering::SeqCst), 1);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn paste_analysis_uses_quick_endpoint() {
    let backend = Arc::new(CountingBackend::default());
    let (handle, join) = start(backend.clone());

    let result = handle
      .paste_analysis("URGENT: verify your account immediately please".to_string())
      .unwrap();
    assert_eq!(result.risk_score, 30);
    assert_eq!(backend.quick_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.full_calls.load(Ordering::SeqCst), 0);

    handle.shutdown();
    join.join().unwrap();
  }

  #[test]
  fn requests_interleave_while_scans_are_in_flight() {
    struct SlowBackend {
      inner: CountingBackend,
    }
    impl AnalysisBackend for SlowBackend {
      fn quick_scan(&self, req: &QuickScanRequest) -> anyhow::Result<QuickScanResponse> {
        self.inner.quick_scan(req)
      }
      fn full_scan(&self, req: &ScanRequest) -> anyhow::Result<ScanResult> {
        std::thread::sleep(Duration::from_millis(150));
        self.inner.full_scan(req)
      }
    }

    let backend = Arc::new(SlowBackend {
      inner: CountingBackend::default(),
    });
    let orchestrator = Orchestrator::new(
      &Config::default(),
      Arc::new(NullBadge),
      Arc::new(NullAudio),
      None,
    );
    let (coordinator, handle) = Coordinator::new(orchestrator, backend);
    let join = std::thread::spawn(move || coordinator.run(Duration::from_millis(10)));

    let scanner = {
      let handle = handle.clone();
      std::thread::spawn(move || handle.scout_signal(1, signal("https://slow.example.com/")))
    };

    // While tab 1's scan is suspended in the backend, other requests for
    // other tabs keep flowing.
    std::thread::sleep(Duration::from_millis(30));
    assert!(handle.get_tab_state(2).unwrap().is_none());
    let safety = handle
      .check_link_safety("https://bait.example.tk/".to_string())
      .unwrap();
    assert!(safety.risk >= 80);

    let result = scanner.join().unwrap().unwrap();
    assert_eq!(result.risk_score, 12);

    handle.shutdown();
    join.join().unwrap();
  }
}
