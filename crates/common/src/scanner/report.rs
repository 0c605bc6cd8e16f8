//! Boot protocol keyboard report decoding
//!
//! A boot keyboard report is 8 bytes:
//!
//! ```text
//! [modifiers][reserved][key 0][key 1][key 2][key 3][key 4][key 5]
//! ```
//!
//! Reports describe the keys *currently held*, so one physical press spans
//! several reports. The decoder diffs consecutive reports and yields each
//! press exactly once.

use super::keymap::Key;

const KEY_SLOTS: usize = 6;
const FIRST_KEY_BYTE: usize = 2;
/// Usage ID reported in every slot on keyboard rollover
const ERROR_ROLL_OVER: u8 = 0x01;

/// Turns a stream of boot keyboard reports into key-down events
#[derive(Debug, Default)]
pub struct BootReportDecoder {
    held: [u8; KEY_SLOTS],
}

impl BootReportDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys newly pressed in `report`, in slot order
    ///
    /// Reports shorter than three bytes and rollover error reports are
    /// ignored without changing the held-key state.
    pub fn feed(&mut self, report: &[u8]) -> Vec<Key> {
        let Some(slots) = report.get(FIRST_KEY_BYTE..) else {
            return Vec::new();
        };
        if slots.is_empty() {
            return Vec::new();
        }

        let mut current = [0u8; KEY_SLOTS];
        for (dst, &src) in current.iter_mut().zip(slots) {
            *dst = src;
        }

        if current.iter().any(|&k| k == ERROR_ROLL_OVER) {
            return Vec::new();
        }

        let pressed = current
            .iter()
            .filter(|&&k| k != 0 && !self.held.contains(&k))
            .map(|&k| Key::from_usage(k))
            .collect();

        self.held = current;
        pressed
    }

    /// Forget held keys (after a device reset or reattach)
    pub fn reset(&mut self) {
        self.held = [0; KEY_SLOTS];
    }
}
