//! USB subsystem
//!
//! rusb-backed adapters for the peripheral roles:
//! - Device enumeration, hot-plug detection and classification
//! - Report descriptor reads for permission-time reclassification
//! - Bulk OUT receipt printing
//! - Interrupt IN keystroke capture for keyboard-wedge scanners
//!
//! Everything here runs on a dedicated worker thread so blocking libusb
//! calls never stall the Tokio runtime.

pub mod descriptor;
pub mod device;
pub mod manager;
pub mod printer;
pub mod scanner_input;
pub mod worker;

pub use worker::spawn_usb_worker;
