//! USB worker thread
//!
//! Dedicated thread for USB events and transfers. Runs the libusb event loop
//! and talks to the Tokio runtime through the host bridge.

use std::time::Duration;

use common::{Classifier, DeviceRecord, DeviceSelector, Error, HostCommand, HostWorker, Result};
use common::scanner::ScanSession;
use protocol::Role;
use rusb::UsbContext;
use tracing::{debug, error, info, warn};

use crate::config::HostConfig;
use crate::usb::manager::DeviceManager;
use crate::usb::printer;
use crate::usb::scanner_input::KeystrokeCapture;

/// How long one libusb event pass may block before commands are checked
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// USB worker thread state
pub struct UsbWorkerThread {
    manager: DeviceManager,
    worker: HostWorker,
    config: HostConfig,
    capture: Option<KeystrokeCapture>,
}

impl UsbWorkerThread {
    pub fn new(
        worker: HostWorker,
        classifier: Classifier,
        config: HostConfig,
    ) -> std::result::Result<Self, rusb::Error> {
        let mut manager = DeviceManager::new(worker.event_sender(), classifier, config.usb)?;
        manager.initialize()?;

        Ok(Self {
            manager,
            worker,
            config,
            capture: None,
        })
    }

    /// Run until a Shutdown command arrives or the bridge closes
    pub fn run(mut self) -> std::result::Result<(), rusb::Error> {
        info!("USB worker thread started");

        loop {
            match self.worker.try_recv_command() {
                Some(HostCommand::Shutdown) => {
                    info!("USB worker shutting down");
                    break;
                }
                Some(cmd) => self.handle_command(cmd),
                None => {}
            }

            match self.manager.context().handle_events(Some(EVENT_TIMEOUT)) {
                Ok(()) => {}
                Err(rusb::Error::Interrupted) => {
                    debug!("USB event handling interrupted");
                }
                Err(e) => {
                    warn!("Error handling USB events: {}", e);
                    std::thread::sleep(EVENT_TIMEOUT);
                }
            }

            self.manager.process_hotplug();

            if self.capture.as_ref().is_some_and(|c| c.is_finished()) {
                self.capture = None;
            }
        }

        self.capture = None;
        info!("USB worker thread stopped");
        Ok(())
    }

    /// Handle a command, keeping the thread alive if a handler panics
    fn handle_command(&mut self, cmd: HostCommand) {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.handle_command_inner(cmd)
        }));

        if let Err(e) = result {
            error!("Panic in USB command handler: {:?}", e);
        }
    }

    fn handle_command_inner(&mut self, cmd: HostCommand) {
        match cmd {
            HostCommand::ListDevices { response } => {
                let devices = self.manager.list_devices();
                debug!("Listing {} devices", devices.len());
                let _ = response.send(devices);
            }

            HostCommand::Reclassify { device, response } => {
                let _ = response.send(self.manager.reclassify(device));
            }

            HostCommand::Print {
                device,
                markup,
                response,
            } => {
                let _ = response.send(self.print(device, &markup));
            }

            HostCommand::Listen {
                device,
                session,
                response,
            } => {
                let _ = response.send(self.listen(device, session));
            }

            HostCommand::StopListening => {
                if let Some(capture) = self.capture.take() {
                    info!("Stopping keystroke capture on {}", capture.selector());
                }
            }

            HostCommand::Shutdown => {
                // Handled in the main loop
            }
        }
    }

    fn print(&self, selector: DeviceSelector, markup: &str) -> Result<usize> {
        let device = self
            .manager
            .find(selector)
            .ok_or_else(|| Error::Usb(format!("No attached device matches {}", selector)))?;

        if device.record.identification.role != Role::Printer {
            warn!(
                "{} is classified as {}, printing anyway",
                selector, device.record.identification.role
            );
        }

        let job = printer::render(markup);
        printer::write_job(&device.usb, &job, self.config.printer.bulk_timeout())
    }

    /// Re-classify with descriptor access and start capturing a scanner
    fn listen(&mut self, selector: DeviceSelector, session: ScanSession) -> Result<DeviceRecord> {
        // Release any previous capture first so its interface is free
        self.capture = None;

        let record = self.manager.reclassify(selector)?;
        if record.identification.role != Role::Scanner {
            return Err(Error::Usb(format!(
                "{} is classified as {} ({}), not a scanner",
                selector, record.identification.role, record.identification.confidence
            )));
        }

        let interface = record
            .identity
            .hid_interfaces()
            .next()
            .map(|i| i.number)
            .ok_or_else(|| Error::Usb(format!("{} has no HID interface", selector)))?;

        let device = self
            .manager
            .find(selector)
            .ok_or_else(|| Error::Usb(format!("No attached device matches {}", selector)))?;

        self.capture = Some(KeystrokeCapture::start(
            &device.usb,
            interface,
            session,
            self.manager.event_sender(),
        )?);
        Ok(record)
    }
}

/// Spawn the USB worker thread
///
/// The thread runs until a Shutdown command is received or libusb fails to
/// initialize.
pub fn spawn_usb_worker(
    worker: HostWorker,
    classifier: Classifier,
    config: HostConfig,
) -> std::io::Result<std::thread::JoinHandle<std::result::Result<(), rusb::Error>>> {
    std::thread::Builder::new()
        .name("usb-worker".to_string())
        .spawn(move || {
            let worker_thread = UsbWorkerThread::new(worker, classifier, config)?;
            worker_thread.run()
        })
}
