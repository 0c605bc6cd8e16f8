//! Common functionality for pos-hid
//!
//! This crate holds the decision logic that sits between raw USB access and
//! the point-of-sale application: peripheral role classification, barcode
//! scan framing, the async channel bridge for the USB thread, the external
//! capability helper, and shared error handling and logging.

pub mod capability;
pub mod channel;
pub mod classifier;
pub mod error;
pub mod logging;
pub mod scanner;
pub mod test_utils;

pub use capability::{ConnectPolicy, ExternalCapability, connect_with_retry, wait_for_connection};
pub use channel::{
    DeviceRecord, DeviceSelector, HostBridge, HostCommand, HostEvent, HostWorker,
    create_host_bridge,
};
pub use classifier::{Classifier, Identification, Rule, Verdict, VendorOverride, VendorTables};
pub use error::{Error, Result};
pub use logging::setup_logging;
pub use scanner::{FramerTiming, Key, ScanEvent, ScanFramer, ScanSession, Symbology};
