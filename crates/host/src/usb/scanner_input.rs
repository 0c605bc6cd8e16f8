//! Keystroke capture from a keyboard-wedge scanner
//!
//! A capture owns a claimed HID interface on its own thread, polls the
//! interrupt IN endpoint, decodes boot keyboard reports and feeds the
//! resulting key-downs into a [`ScanSession`]. The session is the single
//! keystroke source for framing; nothing else feeds it while a capture runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use async_channel::Sender;
use common::scanner::{BootReportDecoder, ScanSession, SessionInput};
use common::{DeviceSelector, Error, HostEvent, Result};
use rusb::{Direction, TransferType};
use tracing::{debug, info, trace, warn};

use crate::usb::device::{ClaimedInterface, Endpoint, UsbDevice};

/// Poll interval; bounds how long a stop request waits
const READ_POLL: Duration = Duration::from_millis(100);

/// Consecutive read errors before the capture gives up
const MAX_CONSECUTIVE_READ_ERRORS: u32 = 3;

/// A running keystroke capture
pub struct KeystrokeCapture {
    selector: DeviceSelector,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl KeystrokeCapture {
    /// Claim `interface` on `device` and start forwarding keys to `session`
    pub fn start(
        device: &UsbDevice,
        interface: u8,
        session: ScanSession,
        events: Sender<HostEvent>,
    ) -> Result<Self> {
        let selector = DeviceSelector::new(device.vendor_id(), device.product_id());
        let endpoint = device
            .find_endpoint(interface, Direction::In, TransferType::Interrupt)
            .ok_or_else(|| {
                Error::Usb(format!(
                    "{} has no interrupt IN endpoint on interface {}",
                    selector, interface
                ))
            })?;
        let claimed = device
            .claim(interface)
            .map_err(|e| {
                Error::Usb(format!("claim interface {} of {}: {}", interface, selector, e))
            })?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread = std::thread::Builder::new()
            .name("keystroke-capture".to_string())
            .spawn(move || {
                let reader = ReportReader {
                    claimed,
                    endpoint,
                    session,
                    stop: thread_stop,
                };
                if let Some(reason) = reader.run() {
                    warn!("Keystroke capture on {} ended: {}", selector, reason);
                    let _ = events.send_blocking(HostEvent::ListenStopped {
                        device: selector,
                        reason,
                    });
                }
            })?;

        info!(
            "Capturing keystrokes from {} (endpoint {:#04x})",
            selector, endpoint.address
        );
        Ok(Self {
            selector,
            stop,
            thread: Some(thread),
        })
    }

    pub fn selector(&self) -> DeviceSelector {
        self.selector
    }

    /// Whether the capture thread ended on its own
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for KeystrokeCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("Keystroke capture thread for {} panicked", self.selector);
        }
        debug!("Keystroke capture for {} stopped", self.selector);
    }
}

struct ReportReader {
    claimed: ClaimedInterface,
    endpoint: Endpoint,
    session: ScanSession,
    stop: Arc<AtomicBool>,
}

impl ReportReader {
    /// Read until stopped; returns the reason when ending on its own
    fn run(self) -> Option<String> {
        let mut decoder = BootReportDecoder::new();
        let mut buffer = vec![0u8; usize::from(self.endpoint.max_packet_size.max(8))];
        let mut read_errors = 0;

        while !self.stop.load(Ordering::Relaxed) {
            let len = match self.claimed.handle().read_interrupt(
                self.endpoint.address,
                &mut buffer,
                READ_POLL,
            ) {
                Ok(len) => {
                    read_errors = 0;
                    len
                }
                Err(rusb::Error::Timeout) => continue,
                Err(rusb::Error::NoDevice) => return Some("device disconnected".to_string()),
                Err(e) => {
                    read_errors += 1;
                    warn!(
                        "Interrupt read failed ({}/{}): {}",
                        read_errors, MAX_CONSECUTIVE_READ_ERRORS, e
                    );
                    if read_errors >= MAX_CONSECUTIVE_READ_ERRORS {
                        return Some(format!(
                            "{} consecutive read errors, last: {}",
                            read_errors, e
                        ));
                    }
                    continue;
                }
            };

            trace!("Report: {:02x?}", &buffer[..len]);
            for key in decoder.feed(&buffer[..len]) {
                if self.session.send_blocking(SessionInput::Key(key)).is_err() {
                    return Some("scan session closed".to_string());
                }
            }
        }
        None
    }
}
