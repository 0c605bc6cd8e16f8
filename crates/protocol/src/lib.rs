//! Protocol library for pos-hid
//!
//! This crate holds the I/O-free half of the point-of-sale peripheral stack:
//! the device identity model, HID Report Descriptor parsing, ESC/POS command
//! encoding, and the receipt markup transpiler. Everything here is pure and
//! may be called from any thread.
//!
//! # Example
//!
//! ```
//! use protocol::{parse_usage, UsagePair};
//!
//! // Usage Page (Generic Desktop), Usage (Keyboard)
//! let descriptor = [0x05, 0x01, 0x09, 0x06, 0xa1, 0x01];
//! assert_eq!(parse_usage(&descriptor), Some(UsagePair::new(0x01, 0x06)));
//! ```
//!
//! # Receipts
//!
//! ```
//! use protocol::transpile;
//!
//! let job = transpile("[center]**TOTAL**\n===\n");
//! assert_eq!(&job[..2], &[0x1B, 0x40]);
//! ```

pub mod escpos;
pub mod hid;
pub mod markup;
pub mod types;

pub use escpos::{Alignment, CharSize};
pub use hid::{DescriptorItems, ItemType, ReportItem, parse_usage};
pub use markup::{StyleState, encode_text, transpile, transpile_with_style};
pub use types::{Confidence, DeviceIdentity, InterfaceDescriptor, Role, UsagePair};
