//! USB device manager
//!
//! Handles device enumeration, hot-plug events and classification. This
//! module runs in the USB thread and owns the device registry.

use std::collections::HashMap;

use async_channel::{Receiver, Sender};
use common::{Classifier, DeviceRecord, DeviceSelector, Error, HostEvent, Result};
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use tracing::{debug, error, info, warn};

use crate::config::UsbSettings;
use crate::usb::descriptor::read_usage;
use crate::usb::device::UsbDevice;

/// Linux Foundation root hubs
const ROOT_HUB_VENDOR: u16 = 0x1d6b;
const USB_CLASS_HUB: u8 = 0x09;

/// A tracked device and its latest classification
pub struct TrackedDevice {
    pub usb: UsbDevice,
    pub record: DeviceRecord,
}

/// Hot-plug notice queued by the libusb callback for the worker loop
enum HotplugNotice {
    Arrived(Device<Context>),
    Left { bus: u8, address: u8 },
}

/// USB device manager
pub struct DeviceManager {
    context: Context,
    /// Registry of attached devices keyed by (bus, address)
    devices: HashMap<(u8, u8), TrackedDevice>,
    classifier: Classifier,
    settings: UsbSettings,
    _hotplug_registration: Option<Registration<Context>>,
    hotplug_tx: Sender<HotplugNotice>,
    hotplug_rx: Receiver<HotplugNotice>,
    event_sender: Sender<HostEvent>,
}

impl DeviceManager {
    pub fn new(
        event_sender: Sender<HostEvent>,
        classifier: Classifier,
        settings: UsbSettings,
    ) -> std::result::Result<Self, rusb::Error> {
        let context = Context::new()?;
        let (hotplug_tx, hotplug_rx) = async_channel::unbounded();

        Ok(Self {
            context,
            devices: HashMap::new(),
            classifier,
            settings,
            _hotplug_registration: None,
            hotplug_tx,
            hotplug_rx,
            event_sender,
        })
    }

    /// Enumerate attached devices and register hot-plug callbacks
    pub fn initialize(&mut self) -> std::result::Result<(), rusb::Error> {
        self.enumerate_devices()?;

        if rusb::has_hotplug() {
            self.register_hotplug()?;
        } else {
            warn!("libusb has no hot-plug support on this platform");
        }

        info!(
            "Device manager initialized with {} devices",
            self.devices.len()
        );
        Ok(())
    }

    fn enumerate_devices(&mut self) -> std::result::Result<(), rusb::Error> {
        let devices = self.context.devices()?;
        for device in devices.iter() {
            self.add_device(device);
        }
        debug!("Enumerated {} devices", self.devices.len());
        Ok(())
    }

    fn register_hotplug(&mut self) -> std::result::Result<(), rusb::Error> {
        let callback = HotplugCallback {
            notices: self.hotplug_tx.clone(),
        };

        let registration = HotplugBuilder::new()
            .enumerate(false) // We already enumerated
            .register(&self.context, Box::new(callback))?;

        self._hotplug_registration = Some(registration);
        debug!("Hot-plug callbacks registered");
        Ok(())
    }

    /// Track and classify a device; `None` for root hubs and failures
    fn add_device(&mut self, device: Device<Context>) -> Option<DeviceRecord> {
        let key = (device.bus_number(), device.address());
        if let Some(existing) = self.devices.get(&key) {
            return Some(existing.record.clone());
        }

        let usb = match UsbDevice::new(device) {
            Ok(usb) => usb,
            Err(e) => {
                warn!("Failed to read descriptor of bus={} addr={}: {}", key.0, key.1, e);
                return None;
            }
        };

        let identity = usb.identity();
        if identity.vendor_id == ROOT_HUB_VENDOR && identity.class == USB_CLASS_HUB {
            debug!("Skipping root hub on bus {}", key.0);
            return None;
        }

        // Static identity only; descriptor access waits for an explicit reclassify
        let identification = self.classifier.identify(&identity, None);
        info!(
            "{:04x}:{:04x} {} on bus={} addr={}: {} ({}, {})",
            identity.vendor_id,
            identity.product_id,
            display_name(&identity),
            key.0,
            key.1,
            identification.role,
            identification.confidence,
            identification.rule
        );

        let record = DeviceRecord {
            bus: key.0,
            address: key.1,
            identity,
            usage: None,
            identification,
        };
        self.devices.insert(
            key,
            TrackedDevice {
                usb,
                record: record.clone(),
            },
        );
        Some(record)
    }

    /// Drain hot-plug notices queued since the last call
    pub fn process_hotplug(&mut self) {
        while let Ok(notice) = self.hotplug_rx.try_recv() {
            match notice {
                HotplugNotice::Arrived(device) => self.handle_device_arrived(device),
                HotplugNotice::Left { bus, address } => self.handle_device_left(bus, address),
            }
        }
    }

    fn handle_device_arrived(&mut self, device: Device<Context>) {
        if let Some(record) = self.add_device(device)
            && let Err(e) = self
                .event_sender
                .send_blocking(HostEvent::DeviceArrived { device: record })
        {
            error!("Failed to send DeviceArrived event: {}", e);
        }
    }

    fn handle_device_left(&mut self, bus: u8, address: u8) {
        if let Some(removed) = self.devices.remove(&(bus, address)) {
            info!(
                "Removed {} on bus={} addr={}",
                removed.record.selector(),
                bus,
                address
            );
            if let Err(e) = self
                .event_sender
                .send_blocking(HostEvent::DeviceLeft { bus, address })
            {
                error!("Failed to send DeviceLeft event: {}", e);
            }
        }
    }

    /// Records of all tracked devices, ordered by bus and address
    pub fn list_devices(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> =
            self.devices.values().map(|d| d.record.clone()).collect();
        records.sort_by_key(|r| (r.bus, r.address));
        records
    }

    /// First tracked device matching `selector`
    pub fn find(&self, selector: DeviceSelector) -> Option<&TrackedDevice> {
        self.devices
            .values()
            .filter(|d| selector.matches(&d.record.identity))
            .min_by_key(|d| (d.record.bus, d.record.address))
    }

    /// Re-run classification with report descriptor access
    ///
    /// The new identification replaces the stored one even when weaker.
    pub fn reclassify(&mut self, selector: DeviceSelector) -> Result<DeviceRecord> {
        let key = self
            .find(selector)
            .map(|d| (d.record.bus, d.record.address))
            .ok_or_else(|| Error::Usb(format!("No attached device matches {}", selector)))?;
        let Some(tracked) = self.devices.get_mut(&key) else {
            return Err(Error::Usb(format!("No attached device matches {}", selector)));
        };

        let usage = read_usage(&tracked.usb, &tracked.record.identity, &self.settings);
        let identification = self.classifier.identify(&tracked.record.identity, usage);
        let previous = tracked.record.identification;

        tracked.record.usage = usage;
        tracked.record.identification = identification;
        let record = tracked.record.clone();

        if previous != identification {
            info!(
                "{} reclassified: {} ({}) -> {} ({})",
                selector,
                previous.role,
                previous.confidence,
                identification.role,
                identification.confidence
            );
            if let Err(e) = self.event_sender.send_blocking(HostEvent::Reclassified {
                device: record.clone(),
                previous,
            }) {
                error!("Failed to send Reclassified event: {}", e);
            }
        }
        Ok(record)
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn event_sender(&self) -> Sender<HostEvent> {
        self.event_sender.clone()
    }
}

/// Manufacturer and product, falling back to the known vendor name
pub fn display_name(identity: &protocol::DeviceIdentity) -> String {
    let manufacturer = identity
        .manufacturer
        .as_deref()
        .or_else(|| common::classifier::vendor_name(identity.vendor_id))
        .unwrap_or("Unknown Manufacturer");
    let product = identity.product.as_deref().unwrap_or("Unknown Product");
    format!("{} {}", manufacturer, product)
}

/// Hot-plug callback handler
///
/// libusb calls this from inside `handle_events`; the notice is queued and
/// handled by the worker loop once the call returns.
struct HotplugCallback {
    notices: Sender<HotplugNotice>,
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!(
            "Hot-plug callback: device arrived (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        let _ = self.notices.try_send(HotplugNotice::Arrived(device));
    }

    fn device_left(&mut self, device: Device<Context>) {
        debug!(
            "Hot-plug callback: device left (bus={}, addr={})",
            device.bus_number(),
            device.address()
        );
        let _ = self.notices.try_send(HotplugNotice::Left {
            bus: device.bus_number(),
            address: device.address(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::DeviceIdentity;

    #[test]
    fn test_display_name_falls_back_to_vendor_table() {
        let identity = DeviceIdentity::new(0x0c2e, 0x0b61);
        assert_eq!(display_name(&identity), "Honeywell Unknown Product");

        let named = DeviceIdentity::new(0x9999, 1)
            .with_manufacturer("ACME")
            .with_product("Wedge");
        assert_eq!(display_name(&named), "ACME Wedge");
    }
}
