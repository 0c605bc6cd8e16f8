//! Test utilities for pos-hid
//!
//! Mock device identities modelled on real POS hardware, plus a timeout
//! helper for async tests.
//!
//! # Example
//!
//! ```
//! use common::test_utils::mock_scanner;
//!
//! let scanner = mock_scanner(0x1a86, "USB Scanner");
//! assert_eq!(scanner.interfaces.len(), 1);
//! ```

use std::future::Future;
use std::time::Duration;

use protocol::types::{
    HID_PROTOCOL_KEYBOARD, HID_PROTOCOL_MOUSE, HID_PROTOCOL_NONE, HID_SUBCLASS_BOOT,
    HID_SUBCLASS_NONE, USB_CLASS_HID, USB_CLASS_PRINTER, USB_CLASS_SMART_CARD,
};
use protocol::{DeviceIdentity, InterfaceDescriptor};

use crate::channel::DeviceRecord;
use crate::classifier::Classifier;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// HID interface with the given subclass/protocol
pub fn hid_interface(number: u8, subclass: u8, protocol: u8) -> InterfaceDescriptor {
    InterfaceDescriptor {
        number,
        class: USB_CLASS_HID,
        subclass,
        protocol,
        endpoint_count: 1,
    }
}

/// Scanner in vendor-defined HID mode
pub fn mock_scanner(vendor_id: u16, product: &str) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, 0x0001)
        .with_product(product)
        .with_interface(hid_interface(0, HID_SUBCLASS_NONE, HID_PROTOCOL_NONE))
}

/// Boot protocol keyboard
pub fn mock_keyboard(vendor_id: u16, product: &str) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, 0x0002)
        .with_product(product)
        .with_interface(hid_interface(0, HID_SUBCLASS_BOOT, HID_PROTOCOL_KEYBOARD))
}

/// Boot protocol mouse
pub fn mock_mouse(vendor_id: u16, product: &str) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, 0x0003)
        .with_product(product)
        .with_interface(hid_interface(0, HID_SUBCLASS_BOOT, HID_PROTOCOL_MOUSE))
}

/// Printer-class device with one bidirectional interface
pub fn mock_printer(vendor_id: u16, product: &str) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, 0x0004)
        .with_product(product)
        .with_interface(InterfaceDescriptor {
            number: 0,
            class: USB_CLASS_PRINTER,
            subclass: 1,
            protocol: 2,
            endpoint_count: 2,
        })
}

/// CCID smart card reader
pub fn mock_card_reader(vendor_id: u16, product: &str) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, 0x0005)
        .with_product(product)
        .with_interface(InterfaceDescriptor {
            number: 0,
            class: USB_CLASS_SMART_CARD,
            subclass: 0,
            protocol: 0,
            endpoint_count: 3,
        })
}

/// Classify `identity` with the built-in tables and wrap it in a record
pub fn mock_record(bus: u8, address: u8, identity: DeviceIdentity) -> DeviceRecord {
    let identification = Classifier::builtin().identify(&identity, None);
    DeviceRecord {
        bus,
        address,
        identity,
        usage: None,
        identification,
    }
}

/// Timeout error for async tests
#[derive(Debug)]
pub struct TimeoutError {
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}

/// Run a future with a timeout
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}
