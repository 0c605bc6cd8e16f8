//! USB device abstraction
//!
//! Wraps `rusb::Device` with its cached device descriptor and converts it to
//! the static [`DeviceIdentity`] the classifier works on. Interface access
//! goes through [`ClaimedInterface`], which releases the interface and hands
//! it back to the kernel driver when dropped.

use protocol::{DeviceIdentity, InterfaceDescriptor};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType};
use tracing::{debug, warn};

/// USB device wrapper with cached descriptor
pub struct UsbDevice {
    device: Device<Context>,
    descriptor: DeviceDescriptor,
}

/// An endpoint of the active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub interface: u8,
    pub address: u8,
    pub max_packet_size: u16,
}

impl UsbDevice {
    /// Create a new USB device wrapper
    ///
    /// Reads and caches the device descriptor.
    pub fn new(device: Device<Context>) -> Result<Self, rusb::Error> {
        let descriptor = device.device_descriptor()?;
        Ok(Self { device, descriptor })
    }

    pub fn vendor_id(&self) -> u16 {
        self.descriptor.vendor_id()
    }

    pub fn product_id(&self) -> u16 {
        self.descriptor.product_id()
    }

    /// Snapshot of the static identity used for classification
    ///
    /// String descriptors need the device opened; when that is not permitted
    /// the strings are left empty and classification relies on ids and
    /// class codes.
    pub fn identity(&self) -> DeviceIdentity {
        let mut identity = DeviceIdentity::new(self.vendor_id(), self.product_id()).with_class(
            self.descriptor.class_code(),
            self.descriptor.sub_class_code(),
            self.descriptor.protocol_code(),
        );

        match self.device.open() {
            Ok(handle) => {
                identity.manufacturer = self
                    .descriptor
                    .manufacturer_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
                identity.product = self
                    .descriptor
                    .product_string_index()
                    .and_then(|idx| handle.read_string_descriptor_ascii(idx).ok());
            }
            Err(e) => debug!(
                "Cannot open {:04x}:{:04x} for strings: {}",
                self.vendor_id(),
                self.product_id(),
                e
            ),
        }

        identity.interfaces = self.interfaces();
        identity
    }

    /// Interfaces of the active configuration (first alternate setting each)
    fn interfaces(&self) -> Vec<InterfaceDescriptor> {
        let config = match self.device.active_config_descriptor() {
            Ok(config) => config,
            Err(e) => {
                debug!("No active config descriptor: {}", e);
                return Vec::new();
            }
        };

        config
            .interfaces()
            .filter_map(|interface| interface.descriptors().next())
            .map(|desc| InterfaceDescriptor {
                number: desc.interface_number(),
                class: desc.class_code(),
                subclass: desc.sub_class_code(),
                protocol: desc.protocol_code(),
                endpoint_count: desc.num_endpoints(),
            })
            .collect()
    }

    /// First endpoint of `interface` with the given direction and type
    pub fn find_endpoint(
        &self,
        interface: u8,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        let config = self.device.active_config_descriptor().ok()?;

        for iface in config.interfaces().filter(|i| i.number() == interface) {
            for desc in iface.descriptors() {
                if let Some(ep) = desc
                    .endpoint_descriptors()
                    .find(|ep| ep.direction() == direction && ep.transfer_type() == transfer_type)
                {
                    return Some(Endpoint {
                        interface,
                        address: ep.address(),
                        max_packet_size: ep.max_packet_size(),
                    });
                }
            }
        }
        None
    }

    /// Open the device and claim `interface`
    pub fn claim(&self, interface: u8) -> Result<ClaimedInterface, rusb::Error> {
        let handle = self.device.open()?;
        ClaimedInterface::claim(handle, interface)
    }
}

/// A claimed interface; released (and the kernel driver reattached) on drop
pub struct ClaimedInterface {
    handle: DeviceHandle<Context>,
    number: u8,
    reattach: bool,
}

impl ClaimedInterface {
    /// Detach any kernel driver and claim `number` on `handle`
    pub fn claim(handle: DeviceHandle<Context>, number: u8) -> Result<Self, rusb::Error> {
        let reattach = match handle.kernel_driver_active(number) {
            Ok(true) => match handle.detach_kernel_driver(number) {
                Ok(()) => {
                    debug!("Detached kernel driver from interface {}", number);
                    true
                }
                Err(e) => {
                    warn!(
                        "Failed to detach kernel driver from interface {}: {}",
                        number, e
                    );
                    false
                }
            },
            Ok(false) => false,
            Err(e) => {
                debug!(
                    "Could not check kernel driver status for interface {}: {}",
                    number, e
                );
                false
            }
        };

        if let Err(e) = handle.claim_interface(number) {
            warn!("Failed to claim interface {}: {}", number, e);
            if reattach && let Err(e) = handle.attach_kernel_driver(number) {
                debug!("Could not reattach kernel driver to interface {}: {}", number, e);
            }
            return Err(e);
        }

        debug!("Claimed interface {}", number);
        Ok(Self {
            handle,
            number,
            reattach,
        })
    }

    pub fn handle(&self) -> &DeviceHandle<Context> {
        &self.handle
    }
}

impl Drop for ClaimedInterface {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.number) {
            warn!("Failed to release interface {}: {}", self.number, e);
        }
        if self.reattach {
            if let Err(e) = self.handle.attach_kernel_driver(self.number) {
                debug!(
                    "Could not reattach kernel driver to interface {}: {}",
                    self.number, e
                );
            } else {
                debug!("Reattached kernel driver to interface {}", self.number);
            }
        }
    }
}
