//! HID report descriptor access
//!
//! The descriptor is fetched with a GET_DESCRIPTOR control transfer on the
//! interface: the standard request first, then the class-typed form some
//! scanner firmwares expect. Every failure (no permission, busy interface, short or
//! timed-out transfer) degrades to `None`; the caller then classifies from
//! static identity alone.

use protocol::hid::{
    REQUEST_GET_DESCRIPTOR, REQUEST_TYPE_IN_CLASS_INTERFACE, REQUEST_TYPE_IN_STANDARD_INTERFACE,
    report_descriptor_value,
};
use protocol::{DeviceIdentity, UsagePair, parse_usage};
use tracing::debug;

use crate::config::UsbSettings;
use crate::usb::device::UsbDevice;

/// Read the report descriptor of `interface`
///
/// The interface is claimed only for the duration of the transfer.
pub fn read_report_descriptor(
    device: &UsbDevice,
    interface: u8,
    settings: &UsbSettings,
) -> Option<Vec<u8>> {
    let claimed = match device.claim(interface) {
        Ok(claimed) => claimed,
        Err(e) => {
            debug!(
                "Report descriptor of {:04x}:{:04x} interface {} unavailable: {}",
                device.vendor_id(),
                device.product_id(),
                interface,
                e
            );
            return None;
        }
    };

    let mut buffer = vec![0u8; settings.descriptor_buffer_len];
    for request_type in [REQUEST_TYPE_IN_STANDARD_INTERFACE, REQUEST_TYPE_IN_CLASS_INTERFACE] {
        let result = claimed.handle().read_control(
            request_type,
            REQUEST_GET_DESCRIPTOR,
            report_descriptor_value(),
            u16::from(interface),
            &mut buffer,
            settings.descriptor_timeout(),
        );

        match result {
            Ok(0) => debug!(
                "Empty report descriptor on interface {} (bmRequestType {:#04x})",
                interface, request_type
            ),
            Ok(len) => {
                buffer.truncate(len);
                debug!("Read {} byte report descriptor on interface {}", len, interface);
                return Some(buffer);
            }
            Err(e) => debug!(
                "GET_DESCRIPTOR (bmRequestType {:#04x}) failed on interface {}: {}",
                request_type, interface, e
            ),
        }
    }
    None
}

/// First usage pair of the device's first HID interface
pub fn read_usage(
    device: &UsbDevice,
    identity: &DeviceIdentity,
    settings: &UsbSettings,
) -> Option<UsagePair> {
    let interface = identity.hid_interfaces().next()?;
    let descriptor = read_report_descriptor(device, interface.number, settings)?;
    let usage = parse_usage(&descriptor);
    debug!(
        "{:04x}:{:04x} usage: {}",
        identity.vendor_id,
        identity.product_id,
        usage.map_or_else(|| "none".to_string(), |u| u.to_string())
    );
    usage
}
