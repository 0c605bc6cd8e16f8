//! Name keyword sets used by the classifier
//!
//! All matching is a case-insensitive substring test against the lowercased
//! manufacturer and product strings. CJK terms are matched as-is.

use protocol::Role;

/// Keyword sets consulted for one target role
#[derive(Debug, Clone, Copy)]
pub struct RoleKeywords {
    /// Terms naming the role itself
    pub own: &'static [&'static str],
    /// Terms that disqualify an allow-listed vendor from the fast path
    pub fast_path_conflicts: &'static [&'static str],
    /// Term sets naming the other roles; checked in product and manufacturer
    pub exclusions: &'static [&'static [&'static str]],
    /// Brand names of a different role; checked in the manufacturer only
    pub excluded_brands: &'static [&'static str],
    /// Non-POS device classes rejected when no own term is present
    pub adjacent: &'static [&'static str],
}

const SCANNER_TERMS: &[&str] = &["scanner", "barcode", "qr", "scan", "扫描", "条码"];
const KEYBOARD_TERMS: &[&str] = &["keyboard", "键盘", "keypad", "数字键盘", "numeric"];
const CARD_READER_TERMS: &[&str] = &[
    "card reader",
    "smart card",
    "ccid",
    "rfid",
    "nfc",
    "读卡器",
];
const PRINTER_TERMS: &[&str] = &["printer", "thermal", "receipt", "打印机"];
const POINTING_TERMS: &[&str] = &["mouse", "鼠标"];

/// Generic words that mark card hardware but are too broad for other roles
const CARD_WORDS: &[&str] = &["card", "reader"];

const SCANNER_BRANDS: &[&str] = &[
    "honeywell",
    "霍尼韦尔",
    "zebra",
    "symbol",
    "讯宝",
    "datalogic",
    "得利捷",
    "newland",
    "新大陆",
    "gsan",
    "景松",
];
const CARD_READER_BRANDS: &[&str] = &["acs", "omnikey", "gemalto", "vasco", "mingwah", "aohan"];

const SCANNER: RoleKeywords = RoleKeywords {
    own: SCANNER_TERMS,
    fast_path_conflicts: &[
        "card reader",
        "smart card",
        "ccid",
        "nfc",
        "rfid",
        "keyboard",
        "mouse",
        "keypad",
        "hub",
        "adapter",
    ],
    exclusions: &[KEYBOARD_TERMS, CARD_READER_TERMS, PRINTER_TERMS, CARD_WORDS],
    excluded_brands: CARD_READER_BRANDS,
    adjacent: POINTING_TERMS,
};

const KEYBOARD: RoleKeywords = RoleKeywords {
    own: KEYBOARD_TERMS,
    fast_path_conflicts: &[
        "scanner",
        "barcode",
        "qr",
        "scan",
        "card reader",
        "smart card",
        "ccid",
        "mouse",
    ],
    exclusions: &[SCANNER_TERMS, CARD_READER_TERMS, PRINTER_TERMS],
    excluded_brands: SCANNER_BRANDS,
    adjacent: POINTING_TERMS,
};

const CARD_READER: RoleKeywords = RoleKeywords {
    own: CARD_READER_TERMS,
    fast_path_conflicts: &["scanner", "barcode", "keyboard", "mouse", "printer"],
    exclusions: &[SCANNER_TERMS, KEYBOARD_TERMS, PRINTER_TERMS],
    excluded_brands: SCANNER_BRANDS,
    adjacent: POINTING_TERMS,
};

const PRINTER: RoleKeywords = RoleKeywords {
    own: PRINTER_TERMS,
    fast_path_conflicts: &["scanner", "barcode", "keyboard", "mouse", "card reader"],
    exclusions: &[SCANNER_TERMS, KEYBOARD_TERMS, CARD_READER_TERMS],
    excluded_brands: CARD_READER_BRANDS,
    adjacent: POINTING_TERMS,
};

const NONE: RoleKeywords = RoleKeywords {
    own: &[],
    fast_path_conflicts: &[],
    exclusions: &[],
    excluded_brands: &[],
    adjacent: &[],
};

/// Keyword sets for `role`
pub fn for_role(role: Role) -> &'static RoleKeywords {
    match role {
        Role::Scanner => &SCANNER,
        Role::Keyboard => &KEYBOARD,
        Role::CardReader => &CARD_READER,
        Role::Printer => &PRINTER,
        Role::Unknown => &NONE,
    }
}

/// Case-insensitive substring test; `haystack` must already be lowercase
pub fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    !haystack.is_empty() && keywords.iter().any(|k| haystack.contains(k))
}

/// Keyboard layout guessed from the product name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyboardLayout {
    /// Numeric keypad, roughly 17 keys
    Numeric,
    /// Full-size keyboard, roughly 104 keys
    Full,
}

impl KeyboardLayout {
    pub fn from_product(product: &str) -> Self {
        let product = product.to_lowercase();
        if ["numeric", "keypad", "num"].iter().any(|k| product.contains(k)) {
            KeyboardLayout::Numeric
        } else {
            KeyboardLayout::Full
        }
    }

    pub fn key_count(self) -> u32 {
        match self {
            KeyboardLayout::Numeric => 17,
            KeyboardLayout::Full => 104,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            KeyboardLayout::Numeric => "numeric",
            KeyboardLayout::Full => "full",
        }
    }
}
