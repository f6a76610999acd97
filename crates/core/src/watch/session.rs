use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Lines of analysis output kept for failure classification.
pub const TRAILING_LINES: usize = 20;

/// Minimum spacing between triggered actions.
///
/// The first candidate always passes. A later candidate passes once at
/// least `cooldown` has elapsed since the last *accepted* one; rejected
/// candidates do not push the window forward.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    cooldown: Duration,
    last_trigger: Option<Instant>,
}

impl CooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_trigger: None,
        }
    }

    /// Decide whether a candidate at `now` triggers, recording it if so.
    pub fn try_trigger(&mut self, now: Instant) -> bool {
        let open = match self.last_trigger {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.cooldown,
        };
        if open {
            self.last_trigger = Some(now);
        }
        open
    }

    pub fn last_trigger(&self) -> Option<Instant> {
        self.last_trigger
    }
}

/// Bounded FIFO of the most recent lines; oldest dropped first.
#[derive(Debug, Clone)]
pub struct LineWindow {
    capacity: usize,
    lines: VecDeque<String>,
}

impl LineWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.to_string());
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The retained lines joined with `\n`.
    pub fn joined(&self) -> String {
        self.lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Mutable state of one watch run. Only the line-reading path touches it.
#[derive(Debug)]
pub struct WatchSession {
    pub gate: CooldownGate,
    pub window: LineWindow,
}

impl WatchSession {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            gate: CooldownGate::new(cooldown),
            window: LineWindow::new(TRAILING_LINES),
        }
    }
}
