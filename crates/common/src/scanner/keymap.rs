//! HID keyboard usage decoding for keyboard-wedge scanners
//!
//! Only the characters barcode payloads are made of are mapped: digits,
//! lowercase letters, space and `- = . , / \`. Everything else decodes to
//! [`Key::Unmapped`] and is ignored by the framer.

/// Decoded key-down event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Enter or keypad Enter; terminates a frame
    Enter,
    /// A printable character from the mapped set
    Char(char),
    /// Any other key
    Unmapped,
}

// Usage IDs from the HID Keyboard/Keypad page (0x07)
const KEY_A: u8 = 0x04;
const KEY_Z: u8 = 0x1D;
const KEY_1: u8 = 0x1E;
const KEY_9: u8 = 0x26;
const KEY_0: u8 = 0x27;
const KEY_ENTER: u8 = 0x28;
const KEY_SPACE: u8 = 0x2C;
const KEY_MINUS: u8 = 0x2D;
const KEY_EQUALS: u8 = 0x2E;
const KEY_BACKSLASH: u8 = 0x31;
const KEY_COMMA: u8 = 0x36;
const KEY_PERIOD: u8 = 0x37;
const KEY_SLASH: u8 = 0x38;
const KEYPAD_SLASH: u8 = 0x54;
const KEYPAD_MINUS: u8 = 0x56;
const KEYPAD_ENTER: u8 = 0x58;
const KEYPAD_1: u8 = 0x59;
const KEYPAD_9: u8 = 0x61;
const KEYPAD_0: u8 = 0x62;
const KEYPAD_PERIOD: u8 = 0x63;

impl Key {
    /// Decode a HID keyboard usage ID
    pub fn from_usage(usage_id: u8) -> Self {
        match usage_id {
            KEY_ENTER | KEYPAD_ENTER => Key::Enter,
            KEY_A..=KEY_Z => Key::Char((b'a' + (usage_id - KEY_A)) as char),
            KEY_1..=KEY_9 => Key::Char((b'1' + (usage_id - KEY_1)) as char),
            KEYPAD_1..=KEYPAD_9 => Key::Char((b'1' + (usage_id - KEYPAD_1)) as char),
            KEY_0 | KEYPAD_0 => Key::Char('0'),
            KEY_SPACE => Key::Char(' '),
            KEY_MINUS | KEYPAD_MINUS => Key::Char('-'),
            KEY_EQUALS => Key::Char('='),
            KEY_PERIOD | KEYPAD_PERIOD => Key::Char('.'),
            KEY_COMMA => Key::Char(','),
            KEY_SLASH | KEYPAD_SLASH => Key::Char('/'),
            KEY_BACKSLASH => Key::Char('\\'),
            _ => Key::Unmapped,
        }
    }

    /// Build a key from a character, for sources that already deliver text
    pub fn from_char(c: char) -> Self {
        match c {
            '\r' | '\n' => Key::Enter,
            'a'..='z' | '0'..='9' | ' ' | '-' | '=' | '.' | ',' | '/' | '\\' => Key::Char(c),
            'A'..='Z' => Key::Char(c.to_ascii_lowercase()),
            _ => Key::Unmapped,
        }
    }
}
