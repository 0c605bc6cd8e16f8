//! Async channel bridge between Tokio runtime and USB thread

use std::fmt;
use std::str::FromStr;

use async_channel::{Receiver, Sender, bounded};
use protocol::{DeviceIdentity, UsagePair};
use serde::Serialize;

use crate::classifier::Identification;
use crate::scanner::ScanSession;

/// Selects a device by vendor and product id (`VID:PID`, hex)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceSelector {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceSelector {
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub fn matches(&self, identity: &DeviceIdentity) -> bool {
        identity.vendor_id == self.vendor_id && identity.product_id == self.product_id
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

impl FromStr for DeviceSelector {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            let digits = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part);
            u16::from_str_radix(digits, 16)
                .map_err(|_| crate::Error::Config(format!("Invalid hex id '{}' in '{}'", part, s)))
        };

        let (vid, pid) = s
            .split_once(':')
            .ok_or_else(|| crate::Error::Config(format!("Expected VID:PID, got '{}'", s)))?;
        Ok(Self::new(parse(vid.trim())?, parse(pid.trim())?))
    }
}

/// An attached device with its current classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub bus: u8,
    pub address: u8,
    pub identity: DeviceIdentity,
    /// Usage pair from the report descriptor, when it could be read
    pub usage: Option<UsagePair>,
    pub identification: Identification,
}

impl DeviceRecord {
    pub fn selector(&self) -> DeviceSelector {
        DeviceSelector::new(self.identity.vendor_id, self.identity.product_id)
    }
}

/// Commands from Tokio runtime to USB thread
#[derive(Debug)]
pub enum HostCommand {
    /// List attached devices with their classification
    ListDevices {
        /// Channel to send response back
        response: tokio::sync::oneshot::Sender<Vec<DeviceRecord>>,
    },

    /// Re-run classification with report descriptor access
    ///
    /// The new result replaces the previous one even when it is weaker.
    Reclassify {
        device: DeviceSelector,
        response: tokio::sync::oneshot::Sender<crate::Result<DeviceRecord>>,
    },

    /// Transpile markup and send it to a printer
    Print {
        device: DeviceSelector,
        markup: String,
        /// Bytes written on success
        response: tokio::sync::oneshot::Sender<crate::Result<usize>>,
    },

    /// Forward keystrokes of a classified scanner into a scan session
    Listen {
        device: DeviceSelector,
        session: ScanSession,
        response: tokio::sync::oneshot::Sender<crate::Result<DeviceRecord>>,
    },

    /// Stop forwarding keystrokes
    StopListening,

    /// Shutdown the USB thread gracefully
    Shutdown,
}

/// USB events from the device manager
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Device hot-plugged (connected)
    DeviceArrived { device: DeviceRecord },

    /// Device removed
    DeviceLeft { bus: u8, address: u8 },

    /// Classification changed after descriptor access
    Reclassified {
        device: DeviceRecord,
        previous: Identification,
    },

    /// Keystroke capture ended (device gone or read errors)
    ListenStopped { device: DeviceSelector, reason: String },
}

/// Handle for Tokio runtime (async)
#[derive(Clone)]
pub struct HostBridge {
    cmd_tx: Sender<HostCommand>,
    event_rx: Receiver<HostEvent>,
}

impl HostBridge {
    /// Send a command to the USB thread
    pub async fn send_command(&self, cmd: HostCommand) -> crate::Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Receive an event from the USB thread
    pub async fn recv_event(&self) -> crate::Result<HostEvent> {
        self.event_rx
            .recv()
            .await
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Send a command and await its oneshot response
    pub async fn request<T>(
        &self,
        build: impl FnOnce(tokio::sync::oneshot::Sender<T>) -> HostCommand,
    ) -> crate::Result<T> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.send_command(build(tx)).await?;
        rx.await.map_err(|e| crate::Error::Channel(e.to_string()))
    }
}

/// Handle for USB thread (blocking)
pub struct HostWorker {
    cmd_rx: Receiver<HostCommand>,
    event_tx: Sender<HostEvent>,
}

impl HostWorker {
    /// Receive a command from Tokio runtime (blocking)
    pub fn recv_command(&self) -> crate::Result<HostCommand> {
        self.cmd_rx
            .recv_blocking()
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Try to receive a command without blocking
    pub fn try_recv_command(&self) -> Option<HostCommand> {
        self.cmd_rx.try_recv().ok()
    }

    /// Send an event to Tokio runtime (blocking)
    pub fn send_event(&self, event: HostEvent) -> crate::Result<()> {
        self.event_tx
            .send_blocking(event)
            .map_err(|e| crate::Error::Channel(e.to_string()))
    }

    /// Clone of the event sender, for hot-plug callbacks
    pub fn event_sender(&self) -> Sender<HostEvent> {
        self.event_tx.clone()
    }
}

/// Create the channel bridge between Tokio and USB thread
///
/// Returns (HostBridge for Tokio, HostWorker for USB thread)
pub fn create_host_bridge() -> (HostBridge, HostWorker) {
    let (cmd_tx, cmd_rx) = bounded(256);
    let (event_tx, event_rx) = bounded(256);

    (
        HostBridge { cmd_tx, event_rx },
        HostWorker { cmd_rx, event_tx },
    )
}
