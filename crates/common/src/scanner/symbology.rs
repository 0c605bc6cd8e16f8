//! Heuristic symbology detection from decoded scan content

use serde::Serialize;
use std::fmt;

/// Barcode family inferred from the shape of the decoded string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Symbology {
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "QR Code (URL)")]
    QrUrl,
    #[serde(rename = "QR Code")]
    Qr,
    #[serde(rename = "Numeric Barcode")]
    Numeric,
    #[serde(rename = "Code 128 / Code 39")]
    Code128,
}

impl Symbology {
    /// Classify decoded content; first matching rule wins
    pub fn detect(content: &str) -> Self {
        let all_digits = !content.is_empty() && content.bytes().all(|b| b.is_ascii_digit());

        match content.len() {
            13 if all_digits => return Symbology::Ean13,
            8 if all_digits => return Symbology::Ean8,
            12 if all_digits => return Symbology::UpcA,
            _ => {}
        }

        if content.starts_with("http://") || content.starts_with("https://") {
            Symbology::QrUrl
        } else if content.contains([':', ';']) {
            Symbology::Qr
        } else if all_digits {
            Symbology::Numeric
        } else {
            Symbology::Code128
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::QrUrl => "QR Code (URL)",
            Symbology::Qr => "QR Code",
            Symbology::Numeric => "Numeric Barcode",
            Symbology::Code128 => "Code 128 / Code 39",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
