//! Barcode scanner input: keystroke decoding, framing and the scan session

mod framer;
mod keymap;
mod report;
mod session;
mod symbology;

pub use framer::{
    DEFAULT_AUTO_FLUSH, DEFAULT_GAP_TIMEOUT, FlushTimer, FramerTiming, ScanEvent, ScanFramer,
};
pub use keymap::Key;
pub use report::BootReportDecoder;
pub use session::{ScanSession, SessionInput};
pub use symbology::Symbology;
