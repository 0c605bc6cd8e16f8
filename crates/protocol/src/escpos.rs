//! # ESC/POS Command Builders
//!
//! Byte-exact encodings of the small ESC/POS subset receipt output relies on.
//! ESC/POS is stateless per command: every style change is an explicit
//! on/off or set command, there is no push/pop.
//!
//! | Command | Bytes | Effect |
//! |---------|-------|--------|
//! | ESC @ | 1B 40 | Initialize printer |
//! | ESC E n | 1B 45 n | Emphasis (bold) on/off |
//! | ESC - n | 1B 2D n | Underline on/off |
//! | ESC a n | 1B 61 n | Justification |
//! | GS ! n | 1D 21 n | Character size |
//! | LF | 0A | Print and feed one line |
//! | GS V 66 0 | 1D 56 42 00 | Feed and partial cut |

/// ESC - command prefix
pub const ESC: u8 = 0x1B;
/// GS - extended command prefix
pub const GS: u8 = 0x1D;
/// LF - print buffer and feed one line
pub const LF: u8 = 0x0A;

/// ESC @ - initialize printer
pub const INITIALIZE: [u8; 2] = [ESC, b'@'];

/// GS V 66 0 - feed to cutter and partial cut
pub const PARTIAL_CUT: [u8; 4] = [GS, b'V', 0x42, 0x00];

/// Text justification (ESC a n)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Character size byte for GS ! n
///
/// High nibble scales width, low nibble scales height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CharSize {
    #[default]
    Normal = 0x00,
    /// Double width only
    DoubleWidth = 0x10,
    /// Double width and height
    Double = 0x11,
    /// Triple width and height (largest used)
    Triple = 0x22,
}

impl CharSize {
    /// Map a `[size=N]` level to a size code
    pub fn from_level(level: i32) -> Self {
        match level {
            n if n >= 3 => CharSize::Triple,
            2 => CharSize::Double,
            _ => CharSize::Normal,
        }
    }
}

/// ESC E n
pub const fn bold(on: bool) -> [u8; 3] {
    [ESC, b'E', on as u8]
}

/// ESC - n
pub const fn underline(on: bool) -> [u8; 3] {
    [ESC, b'-', on as u8]
}

/// ESC a n
pub const fn align(alignment: Alignment) -> [u8; 3] {
    [ESC, b'a', alignment as u8]
}

/// GS ! n
pub const fn char_size(size: CharSize) -> [u8; 3] {
    [GS, b'!', size as u8]
}

/// Character-level reset appended after every job: bold off, underline off,
/// normal size. Alignment is line-level and is not reset.
pub fn style_reset() -> Vec<u8> {
    let mut out = Vec::with_capacity(9);
    out.extend_from_slice(&bold(false));
    out.extend_from_slice(&underline(false));
    out.extend_from_slice(&char_size(CharSize::Normal));
    out
}
