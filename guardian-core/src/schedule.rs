/// Next-due interval timer polled from the coordinator tick. Each store owns
/// exactly one of these for its sweep; the rescanner owns its own.
#[derive(Debug, Clone)]
pub struct IntervalSchedule {
  interval_ms: u64,
  next_due_unix_ms: Option<u64>,
}

impl IntervalSchedule {
  pub fn new(interval_ms: u64) -> Self {
    Self {
      interval_ms,
      next_due_unix_ms: None,
    }
  }

  /// True when the interval has elapsed; arms the next deadline either way.
  /// The first tick only arms the timer.
  pub fn tick(&mut self, now_unix_ms: u64) -> bool {
    let Some(due) = self.next_due_unix_ms else {
      self.next_due_unix_ms = Some(now_unix_ms.saturating_add(self.interval_ms));
      return false;
    };

    if now_unix_ms < due {
      return false;
    }

    self.next_due_unix_ms = Some(now_unix_ms.saturating_add(self.interval_ms));
    true
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fires_once_per_interval() {
    let mut s = IntervalSchedule::new(1_000);
    assert!(!s.tick(0));
    assert!(!s.tick(500));
    assert!(s.tick(1_000));
    assert!(!s.tick(1_500));
    assert!(s.tick(2_100));
  }
}
