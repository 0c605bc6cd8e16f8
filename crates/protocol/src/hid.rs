//! HID Report Descriptor parsing
//!
//! A Report Descriptor is a flat sequence of short items. Each item starts
//! with a one-byte prefix:
//!
//! ```text
//!   bit 7..4   bit 3..2   bit 1..0
//! [   tag   ][   type   ][  size   ]
//! ```
//!
//! `type` is 0 = Main, 1 = Global, 2 = Local; `size` 0/1/2/3 maps to
//! 0/1/2/4 data bytes, little-endian. Only the first Usage Page (Global,
//! tag 0) and first Usage (Local, tag 0) are of interest here: they describe
//! the top-level application collection and are enough to tell a keyboard
//! from a mouse from a barcode scanner.

use crate::types::UsagePair;

/// Generic Desktop Controls usage page
pub const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
/// Barcode Scanner usage page
pub const USAGE_PAGE_BARCODE_SCANNER: u16 = 0x8C;

/// Generic Desktop: Pointer
pub const USAGE_POINTER: u16 = 0x01;
/// Generic Desktop: Mouse
pub const USAGE_MOUSE: u16 = 0x02;
/// Generic Desktop: Keyboard
pub const USAGE_KEYBOARD: u16 = 0x06;
/// Generic Desktop: Keypad
pub const USAGE_KEYPAD: u16 = 0x07;

/// bmRequestType for GET_DESCRIPTOR aimed at an interface
/// (device-to-host | standard | interface recipient)
pub const REQUEST_TYPE_IN_STANDARD_INTERFACE: u8 = 0x80 | 0x01;
/// bmRequestType with the class type bit set
/// (device-to-host | class | interface recipient)
pub const REQUEST_TYPE_IN_CLASS_INTERFACE: u8 = 0x80 | 0x20 | 0x01;
/// bRequest: GET_DESCRIPTOR
pub const REQUEST_GET_DESCRIPTOR: u8 = 0x06;
/// HID Report descriptor type
pub const DESCRIPTOR_TYPE_REPORT: u8 = 0x22;

/// wValue for fetching report descriptor 0
pub const fn report_descriptor_value() -> u16 {
    (DESCRIPTOR_TYPE_REPORT as u16) << 8
}

const GLOBAL_TAG_USAGE_PAGE: u8 = 0;
const LOCAL_TAG_USAGE: u8 = 0;

/// Item type from bits 3..2 of the prefix byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemType {
    Main,
    Global,
    Local,
    Reserved,
}

impl ItemType {
    fn from_prefix(prefix: u8) -> Self {
        match (prefix >> 2) & 0x3 {
            0 => ItemType::Main,
            1 => ItemType::Global,
            2 => ItemType::Local,
            _ => ItemType::Reserved,
        }
    }
}

/// One short item from a Report Descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportItem<'a> {
    pub item_type: ItemType,
    pub tag: u8,
    pub data: &'a [u8],
}

impl ReportItem<'_> {
    /// Item data as an unsigned little-endian integer
    pub fn value(&self) -> u32 {
        self.data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
    }
}

/// Iterator over the items of a Report Descriptor
///
/// Stops (returns `None`) at the end of the buffer or as soon as an item's
/// declared data would run past it.
pub struct DescriptorItems<'a> {
    descriptor: &'a [u8],
    position: usize,
}

impl<'a> DescriptorItems<'a> {
    pub fn new(descriptor: &'a [u8]) -> Self {
        Self {
            descriptor,
            position: 0,
        }
    }
}

impl<'a> Iterator for DescriptorItems<'a> {
    type Item = ReportItem<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let prefix = *self.descriptor.get(self.position)?;
        let len = match prefix & 0x3 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };

        let start = self.position + 1;
        let data = self.descriptor.get(start..start + len)?;
        self.position = start + len;

        Some(ReportItem {
            item_type: ItemType::from_prefix(prefix),
            tag: (prefix >> 4) & 0xF,
            data,
        })
    }
}

/// Extract the first (Usage Page, Usage) pair from a Report Descriptor
///
/// Never fails. Truncated input yields whatever was captured before the
/// truncation point; if only one half was seen the other is reported as 0.
/// Items without data bytes are skipped. Returns `None` when neither value
/// was found.
pub fn parse_usage(descriptor: &[u8]) -> Option<UsagePair> {
    let mut usage_page = None;
    let mut usage = None;

    for item in DescriptorItems::new(descriptor) {
        if item.data.is_empty() {
            continue;
        }

        match (item.item_type, item.tag) {
            (ItemType::Global, GLOBAL_TAG_USAGE_PAGE) if usage_page.is_none() => {
                usage_page = Some(item.value() as u16);
            }
            (ItemType::Local, LOCAL_TAG_USAGE) if usage.is_none() => {
                usage = Some(item.value() as u16);
            }
            _ => {}
        }

        if usage_page.is_some() && usage.is_some() {
            break;
        }
    }

    if usage_page.is_none() && usage.is_none() {
        return None;
    }

    Some(UsagePair::new(
        usage_page.unwrap_or_default(),
        usage.unwrap_or_default(),
    ))
}
