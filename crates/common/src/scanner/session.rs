//! Async scan session
//!
//! One tokio task owns the [`ScanFramer`] and its flush timer. Keystrokes
//! and timer expiry are handled on that single task, so a reschedule is
//! always applied before a stale timer could be observed.

use async_channel::{Receiver, Sender, bounded};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use super::framer::{FramerTiming, ScanEvent, ScanFramer};
use super::keymap::Key;

/// Queue depth for session input and published scans
const SESSION_QUEUE_DEPTH: usize = 256;

/// Input to a scan session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// Begin listening; clears any stale state
    Start,
    /// Stop listening; a partial scan is discarded
    Stop,
    /// Key-down from the single authoritative keystroke source
    Key(Key),
}

/// Sending side of a running scan session
#[derive(Debug, Clone)]
pub struct ScanSession {
    input: Sender<SessionInput>,
}

impl ScanSession {
    /// Spawn a session task on the current runtime
    ///
    /// Returns the session handle and the stream of completed scans. The task
    /// exits once every handle is dropped or the scan receiver is closed.
    pub fn spawn(timing: FramerTiming) -> (Self, Receiver<ScanEvent>) {
        let (input_tx, input_rx) = bounded(SESSION_QUEUE_DEPTH);
        let (event_tx, event_rx) = bounded(SESSION_QUEUE_DEPTH);

        tokio::spawn(run_session(ScanFramer::new(timing), input_rx, event_tx));

        (Self { input: input_tx }, event_rx)
    }

    pub async fn start(&self) -> crate::Result<()> {
        self.send(SessionInput::Start).await
    }

    pub async fn stop(&self) -> crate::Result<()> {
        self.send(SessionInput::Stop).await
    }

    pub async fn key(&self, key: Key) -> crate::Result<()> {
        self.send(SessionInput::Key(key)).await
    }

    /// Send input from a blocking thread (USB worker)
    pub fn send_blocking(&self, input: SessionInput) -> crate::Result<()> {
        self.input
            .send_blocking(input)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    async fn send(&self, input: SessionInput) -> crate::Result<()> {
        self.input
            .send(input)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

async fn run_session(
    mut framer: ScanFramer,
    input: Receiver<SessionInput>,
    events: Sender<ScanEvent>,
) {
    let mut listening = false;

    loop {
        let deadline = framer.deadline().map(Instant::from_std);

        let completed = tokio::select! {
            msg = input.recv() => {
                let Ok(msg) = msg else {
                    debug!("Scan session input closed");
                    break;
                };
                match msg {
                    SessionInput::Start => {
                        framer.start();
                        listening = true;
                        info!("Scan session listening");
                        None
                    }
                    SessionInput::Stop => {
                        framer.stop();
                        listening = false;
                        info!("Scan session stopped");
                        None
                    }
                    SessionInput::Key(key) if listening => {
                        framer.on_key_down(key, Instant::now().into_std())
                    }
                    SessionInput::Key(key) => {
                        trace!("Dropping {:?} while not listening", key);
                        None
                    }
                }
            }
            _ = wait_until(deadline) => framer.on_timer(Instant::now().into_std()),
        };

        if let Some(event) = completed
            && events.send(event).await.is_err()
        {
            warn!("Scan event receiver closed, ending session");
            break;
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
