//! Stuck detection.
//!
//! Two signals: the same failing call repeated, and successful actions that
//! leave the URL where it was. Actions that never navigate by design (waiting,
//! scrolling, typing) do not count toward the second.

use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

use crate::action::{SCROLL_PAGE, TYPE_TEXT, WAIT};

pub const STUCK_THRESHOLD: u32 = 3;

const URL_NEUTRAL_ACTIONS: [&str; 3] = [WAIT, SCROLL_PAGE, TYPE_TEXT];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StuckReason {
    /// The last `count` failures were all this call (name and arguments).
    RepeatedFailure { fingerprint: String, count: u32 },
    /// This many consecutive successful actions left the URL unchanged.
    NoProgress { count: u32 },
}

impl fmt::Display for StuckReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StuckReason::RepeatedFailure { fingerprint, count } => {
                write!(f, "{} failed {} times", fingerprint, count)
            }
            StuckReason::NoProgress { count } => {
                write!(f, "no URL change after {} actions", count)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressVerdict {
    Progressing,
    Stuck(StuckReason),
}

impl ProgressVerdict {
    pub fn is_stuck(&self) -> bool {
        matches!(self, ProgressVerdict::Stuck(_))
    }
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    /// Most recent failure fingerprints, oldest first, at most
    /// `STUCK_THRESHOLD` long.
    failures: Vec<String>,
    last_url: Option<String>,
    stuck_count: u32,
}

/// `name:arguments`. Object keys serialize sorted, so equal arguments always
/// give equal fingerprints.
pub fn fingerprint(tool_name: &str, arguments: &Value) -> String {
    format!("{}:{}", tool_name, arguments)
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stuck_count(&self) -> u32 {
        self.stuck_count
    }

    pub fn update(
        &mut self,
        tool_name: &str,
        arguments: &Value,
        success: bool,
        current_url: &str,
    ) -> ProgressVerdict {
        let verdict = self.evaluate(tool_name, arguments, success, current_url);
        self.last_url = Some(current_url.to_string());
        if let ProgressVerdict::Stuck(reason) = &verdict {
            warn!("Stuck detected: {}", reason);
        }
        verdict
    }

    fn evaluate(
        &mut self,
        tool_name: &str,
        arguments: &Value,
        success: bool,
        current_url: &str,
    ) -> ProgressVerdict {
        if !success {
            let key = fingerprint(tool_name, arguments);
            debug!("Failure of {}", key);
            self.failures.push(key);
            let window = STUCK_THRESHOLD as usize;
            if self.failures.len() > window {
                self.failures.drain(..self.failures.len() - window);
            }
            if self.failures.len() == window
                && self.failures.iter().all(|f| *f == self.failures[0])
            {
                self.stuck_count += 1;
                return ProgressVerdict::Stuck(StuckReason::RepeatedFailure {
                    fingerprint: self.failures[0].clone(),
                    count: STUCK_THRESHOLD,
                });
            }
            return ProgressVerdict::Progressing;
        }

        if URL_NEUTRAL_ACTIONS.contains(&tool_name) {
            return ProgressVerdict::Progressing;
        }

        match &self.last_url {
            Some(last) if last == current_url => {
                self.stuck_count += 1;
                debug!("URL unchanged ({} in a row)", self.stuck_count);
            }
            _ => self.stuck_count = 0,
        }

        if self.stuck_count >= STUCK_THRESHOLD {
            ProgressVerdict::Stuck(StuckReason::NoProgress {
                count: self.stuck_count,
            })
        } else {
            ProgressVerdict::Progressing
        }
    }

    /// Forget the failure history and counters, keeping the last URL. Used
    /// after a nudge so detection starts over from the current page.
    pub fn clear_window(&mut self) {
        self.failures.clear();
        self.stuck_count = 0;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
