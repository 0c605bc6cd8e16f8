//! Receipt printing over a bulk OUT endpoint

use std::time::Duration;

use common::{Error, Result};
use protocol::transpile_with_style;
use rusb::{Direction, TransferType};
use tracing::{debug, info, warn};

use crate::usb::device::UsbDevice;

/// Printers expose their data pipe on interface 0
const PRINTER_INTERFACE: u8 = 0;

/// Transpile `markup` into one print job
///
/// Logs a warning when bold or underline is left open; the job still ends
/// with the style reset.
pub fn render(markup: &str) -> Vec<u8> {
    let (job, style) = transpile_with_style(markup);
    if style.has_unclosed() {
        warn!(
            "Markup leaves styles open (bold: {}, underline: {})",
            style.bold, style.underline
        );
    }
    job
}

/// Send an encoded job to the printer; returns the bytes written
///
/// Fails with [`Error::Transport`] when no bulk OUT endpoint exists, the
/// interface cannot be claimed, or the write fails or moves zero bytes.
/// There is no retry.
pub fn write_job(device: &UsbDevice, job: &[u8], timeout: Duration) -> Result<usize> {
    let endpoint = device
        .find_endpoint(PRINTER_INTERFACE, Direction::Out, TransferType::Bulk)
        .ok_or_else(|| {
            Error::Transport(format!(
                "{:04x}:{:04x} has no bulk OUT endpoint on interface {}",
                device.vendor_id(),
                device.product_id(),
                PRINTER_INTERFACE
            ))
        })?;

    let claimed = device
        .claim(endpoint.interface)
        .map_err(|e| Error::Transport(format!("claim interface {}: {}", endpoint.interface, e)))?;

    debug!(
        "Writing {} bytes to endpoint {:#04x} (timeout {:?})",
        job.len(),
        endpoint.address,
        timeout
    );

    let written = claimed
        .handle()
        .write_bulk(endpoint.address, job, timeout)
        .map_err(|e| Error::Transport(format!("bulk write: {}", e)))?;

    if written == 0 {
        return Err(Error::Transport("bulk write moved 0 bytes".to_string()));
    }
    if written < job.len() {
        warn!("Short write: {} of {} bytes", written, job.len());
    }

    info!(
        "Printed {} bytes to {:04x}:{:04x}",
        written,
        device.vendor_id(),
        device.product_id()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_wraps_job() {
        let job = render("**Total** 12.50");
        assert_eq!(&job[..2], &[0x1B, b'@']);
        assert!(job.windows(4).any(|w| w == [0x1D, b'V', 0x42, 0x00]));
    }

    #[test]
    fn test_render_unclosed_still_resets() {
        let job = render("[bold]open");
        assert_eq!(&job[job.len() - 9..job.len() - 6], &[0x1B, 0x45, 0x00]);
    }
}
