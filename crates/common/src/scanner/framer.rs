//! Keystroke-to-barcode framing
//!
//! Keyboard-wedge scanners "type" their payload. A frame ends at Enter, at
//! a keystroke gap longer than [`FramerTiming::gap`], or when no key arrives
//! for [`FramerTiming::auto_flush`] after the last character (scanners that
//! send no terminator).
//!
//! The framer is a plain state machine: it never sleeps and never spawns.
//! Callers feed it key-downs with their timestamps and poll
//! [`ScanFramer::on_timer`] at [`ScanFramer::deadline`].

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, trace};

use super::keymap::Key;
use super::symbology::Symbology;

/// Default maximum gap between keystrokes of one scan
pub const DEFAULT_GAP_TIMEOUT: Duration = Duration::from_millis(100);
/// Default idle time before an unterminated scan is flushed
pub const DEFAULT_AUTO_FLUSH: Duration = Duration::from_millis(150);

/// Framing time constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramerTiming {
    pub gap: Duration,
    pub auto_flush: Duration,
}

impl Default for FramerTiming {
    fn default() -> Self {
        Self {
            gap: DEFAULT_GAP_TIMEOUT,
            auto_flush: DEFAULT_AUTO_FLUSH,
        }
    }
}

/// One completed barcode read
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanEvent {
    /// Buffer content with surrounding whitespace trimmed
    pub content: String,
    /// Length of `content` in characters
    pub length: usize,
    pub symbology: Symbology,
    /// Wall-clock time of the flush, milliseconds since the Unix epoch
    pub timestamp_ms: u64,
}

impl ScanEvent {
    fn new(content: &str) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            content: content.to_string(),
            length: content.chars().count(),
            symbology: Symbology::detect(content),
            timestamp_ms,
        }
    }
}

/// Owned auto-flush timer handle
///
/// Holds at most one deadline; rescheduling replaces it, so only the most
/// recent keystroke's timer can fire.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FlushTimer {
    deadline: Option<Instant>,
}

impl FlushTimer {
    pub fn reschedule(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

/// Scan framing state machine
///
/// Idle while the buffer is empty, accumulating otherwise.
#[derive(Debug)]
pub struct ScanFramer {
    timing: FramerTiming,
    buffer: String,
    last_key: Option<Instant>,
    timer: FlushTimer,
}

impl ScanFramer {
    pub fn new(timing: FramerTiming) -> Self {
        Self {
            timing,
            buffer: String::new(),
            last_key: None,
            timer: FlushTimer::default(),
        }
    }

    pub fn timing(&self) -> FramerTiming {
        self.timing
    }

    /// Reset for a new listening period
    pub fn start(&mut self) {
        self.buffer.clear();
        self.last_key = None;
        self.timer.cancel();
    }

    /// Stop listening; a partial scan is discarded, not flushed
    pub fn stop(&mut self) {
        if !self.buffer.is_empty() {
            debug!("Discarding partial scan of {} chars", self.buffer.len());
        }
        self.timer.cancel();
        self.buffer.clear();
        self.last_key = None;
    }

    /// Process one key-down at time `at`
    ///
    /// Returns the scan completed by this key, if any. Unmapped keys are
    /// ignored entirely and do not touch the gap timestamp. An auto-flush
    /// that fell due before `at` is applied first, so a late key never joins
    /// a scan that should already have been flushed.
    pub fn on_key_down(&mut self, key: Key, at: Instant) -> Option<ScanEvent> {
        if key == Key::Unmapped {
            return None;
        }

        let mut completed = None;
        if self.timer.is_due(at) {
            trace!("Auto-flush overdue, closing previous scan");
            completed = self.on_timer(at);
        } else if let Some(last) = self.last_key
            && at.saturating_duration_since(last) > self.timing.gap
            && !self.buffer.is_empty()
        {
            trace!("Keystroke gap exceeded, closing previous scan");
            self.timer.cancel();
            completed = self.flush();
        }
        self.last_key = Some(at);

        match key {
            Key::Enter => {
                self.timer.cancel();
                completed.or_else(|| self.flush())
            }
            Key::Char(c) => {
                self.buffer.push(c);
                self.timer.reschedule(at, self.timing.auto_flush);
                completed
            }
            Key::Unmapped => completed,
        }
    }

    /// Fire the auto-flush timer if it is due at `now`
    pub fn on_timer(&mut self, now: Instant) -> Option<ScanEvent> {
        if !self.timer.is_due(now) {
            return None;
        }
        self.timer.cancel();
        trace!("Auto-flush timer fired");
        self.flush()
    }

    /// When [`Self::on_timer`] should next be called
    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Characters accumulated so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    fn flush(&mut self) -> Option<ScanEvent> {
        let content = self.buffer.trim();
        let event = (!content.is_empty()).then(|| ScanEvent::new(content));
        self.buffer.clear();

        if let Some(event) = &event {
            debug!(
                "Scan complete: {} chars ({})",
                event.length, event.symbology
            );
        }
        event
    }
}

impl Default for ScanFramer {
    fn default() -> Self {
        Self::new(FramerTiming::default())
    }
}
