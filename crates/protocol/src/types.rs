//! Peripheral identity and classification types
//!
//! This module defines the static device snapshot read at enumeration time,
//! the HID usage pair recovered from a Report Descriptor, and the role and
//! confidence vocabulary the classifier answers with.

use serde::{Deserialize, Serialize};
use std::fmt;

/// USB class code for Human Interface Devices
pub const USB_CLASS_HID: u8 = 0x03;
/// USB class code for printers
pub const USB_CLASS_PRINTER: u8 = 0x07;
/// USB class code for smart card (CCID) readers
pub const USB_CLASS_SMART_CARD: u8 = 0x0B;

/// HID subclass with no boot interface (common on scanners)
pub const HID_SUBCLASS_NONE: u8 = 0;
/// HID boot interface subclass
pub const HID_SUBCLASS_BOOT: u8 = 1;
/// HID protocol: none / vendor defined
pub const HID_PROTOCOL_NONE: u8 = 0;
/// HID boot protocol: keyboard
pub const HID_PROTOCOL_KEYBOARD: u8 = 1;
/// HID boot protocol: mouse
pub const HID_PROTOCOL_MOUSE: u8 = 2;

/// Interface descriptor as seen in the active configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// bInterfaceNumber (used as wIndex for class requests)
    pub number: u8,
    /// bInterfaceClass
    pub class: u8,
    /// bInterfaceSubClass
    pub subclass: u8,
    /// bInterfaceProtocol
    pub protocol: u8,
    /// bNumEndpoints
    pub endpoint_count: u8,
}

impl InterfaceDescriptor {
    /// Whether this interface belongs to the HID class
    pub fn is_hid(&self) -> bool {
        self.class == USB_CLASS_HID
    }

    /// Whether this interface uses the given subclass/protocol pair
    pub fn matches(&self, subclass: u8, protocol: u8) -> bool {
        self.subclass == subclass && self.protocol == protocol
    }
}

/// Immutable device snapshot taken once at enumeration time
///
/// Re-enumeration after a permission grant may yield a richer [`UsagePair`],
/// but the identity itself is never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// Manufacturer string (if the device exposes one)
    pub manufacturer: Option<String>,
    /// Product string (if the device exposes one)
    pub product: Option<String>,
    /// Device class
    pub class: u8,
    /// Device subclass
    pub subclass: u8,
    /// Device protocol
    pub protocol: u8,
    /// Interfaces of the active configuration, in order
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl DeviceIdentity {
    /// Create an identity with no strings and no interfaces
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            manufacturer: None,
            product: None,
            class: 0,
            subclass: 0,
            protocol: 0,
            interfaces: Vec::new(),
        }
    }

    /// Builder: set the manufacturer string
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Builder: set the product string
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.product = Some(product.into());
        self
    }

    /// Builder: set the device class triple
    pub fn with_class(mut self, class: u8, subclass: u8, protocol: u8) -> Self {
        self.class = class;
        self.subclass = subclass;
        self.protocol = protocol;
        self
    }

    /// Builder: append an interface
    pub fn with_interface(mut self, interface: InterfaceDescriptor) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Manufacturer string lowercased, empty if absent
    pub fn manufacturer_lower(&self) -> String {
        self.manufacturer
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Product string lowercased, empty if absent
    pub fn product_lower(&self) -> String {
        self.product
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }

    /// Iterate over the HID-class interfaces
    pub fn hid_interfaces(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.interfaces.iter().filter(|i| i.is_hid())
    }

    /// Whether the device or any of its interfaces uses the given class
    pub fn has_class(&self, class: u8) -> bool {
        self.class == class || self.interfaces.iter().any(|i| i.class == class)
    }
}

/// First (Usage Page, Usage) pair found in a HID Report Descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UsagePair {
    pub usage_page: u16,
    pub usage: u16,
}

impl UsagePair {
    pub const fn new(usage_page: u16, usage: u16) -> Self {
        Self { usage_page, usage }
    }
}

impl fmt::Display for UsagePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}:{:#04x}", self.usage_page, self.usage)
    }
}

/// Peripheral role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Scanner,
    Keyboard,
    Printer,
    CardReader,
    Unknown,
}

impl Role {
    /// Roles the classifier can positively match, in tie-break order
    pub const CONCRETE: [Role; 4] = [
        Role::Scanner,
        Role::Keyboard,
        Role::CardReader,
        Role::Printer,
    ];
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Scanner => "scanner",
            Role::Keyboard => "keyboard",
            Role::Printer => "printer",
            Role::CardReader => "card-reader",
            Role::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Confidence tier attached to a classification
///
/// Ordered so that `High > Medium > Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Name keyword only
    Low,
    /// Interface protocol only, or allow-listed vendor without usage confirmation
    Medium,
    /// Usage or class-code match, or allow-listed vendor with a clean name
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::High > Confidence::Medium);
        assert!(Confidence::Medium > Confidence::Low);
    }

    #[test]
    fn test_identity_lowercase_names() {
        let identity = DeviceIdentity::new(0x1a86, 0xe026)
            .with_manufacturer("QinHeng")
            .with_product("USB Scanner");
        assert_eq!(identity.manufacturer_lower(), "qinheng");
        assert_eq!(identity.product_lower(), "usb scanner");
        assert_eq!(DeviceIdentity::new(1, 2).product_lower(), "");
    }

    #[test]
    fn test_has_class_checks_interfaces() {
        let identity = DeviceIdentity::new(0x04b8, 0x0202).with_interface(InterfaceDescriptor {
            number: 0,
            class: USB_CLASS_PRINTER,
            subclass: 1,
            protocol: 2,
            endpoint_count: 2,
        });
        assert!(identity.has_class(USB_CLASS_PRINTER));
        assert!(!identity.has_class(USB_CLASS_HID));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::CardReader.to_string(), "card-reader");
        assert_eq!(Role::Scanner.to_string(), "scanner");
    }

    #[test]
    fn test_usage_pair_display() {
        assert_eq!(UsagePair::new(0x01, 0x06).to_string(), "0x01:0x06");
    }
}
