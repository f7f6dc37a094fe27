use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Cancellable one-shot timer for hover detection: one instance per hovered
/// element, restarted on every pointer move. Cancellation takes effect
/// promptly; the pending callback never fires after `cancel` returns.
pub struct Debounce {
  delay: Duration,
  pending: Option<Arc<(Mutex<bool>, Condvar)>>,
}

impl Debounce {
  pub fn new(delay: Duration) -> Self {
    Self {
      delay,
      pending: None,
    }
  }

  /// Arms the timer; any previously armed callback is cancelled first.
  pub fn start<F>(&mut self, callback: F)
  where
    F: FnOnce() + Send + 'static,
  {
    self.cancel();

    let flag = Arc::new((Mutex::new(false), Condvar::new()));
    self.pending = Some(Arc::clone(&flag));
    let delay = self.delay;

    std::thread::spawn(move || {
      let (lock, cvar) = &*flag;
      let cancelled = lock.lock().unwrap();
      let (cancelled, _timeout) = cvar
        .wait_timeout_while(cancelled, delay, |cancelled| !*cancelled)
        .unwrap();
      if !*cancelled {
        drop(cancelled);
        callback();
      }
    });
  }

  pub fn cancel(&mut self) {
    if let Some(flag) = self.pending.take() {
      let (lock, cvar) = &*flag;
      *lock.lock().unwrap() = true;
      cvar.notify_all();
    }
  }
}

impl Drop for Debounce {
  fn drop(&mut self) {
    self.cancel();
  }
}
