//! Integration tests for the receipt markup transpiler
//!
//! Byte-exact checks of complete print jobs, including the fixed job
//! envelope (initialize, trailing feed + cut, style reset).

use protocol::escpos::{self, LF};
use protocol::{encode_text, transpile};

/// initialize + body + LF LF + partial cut + reset triad
fn job(body: &[u8]) -> Vec<u8> {
    let mut out = vec![0x1B, 0x40];
    out.extend_from_slice(body);
    out.extend_from_slice(&[0x0A, 0x0A]);
    out.extend_from_slice(&[0x1D, 0x56, 0x42, 0x00]);
    out.extend_from_slice(&[0x1B, 0x45, 0x00, 0x1B, 0x2D, 0x00, 0x1D, 0x21, 0x00]);
    out
}

mod envelope {
    use super::*;

    #[test]
    fn test_plain_text_job() {
        assert_eq!(transpile("Hello"), job(b"Hello"));
    }

    #[test]
    fn test_empty_job() {
        assert_eq!(transpile(""), job(b""));
    }

    #[test]
    fn test_plain_cjk_job() {
        let text = "欢迎光临 Welcome";
        assert_eq!(transpile(text), job(&encode_text(text)));
    }
}

mod separators {
    use super::*;

    #[test]
    fn test_equals_separator_between_lines() {
        let mut body = b"A\n".to_vec();
        body.extend_from_slice("=".repeat(32).as_bytes());
        body.push(LF);
        body.extend_from_slice(b"\nB");
        assert_eq!(transpile("A\n===\nB"), job(&body));
    }

    #[test]
    fn test_two_equals_stay_literal() {
        assert_eq!(transpile("A\n==\nB"), job(b"A\n==\nB"));
    }

    #[test]
    fn test_dash_separator_before_tag() {
        let mut body = "-".repeat(32).into_bytes();
        body.push(LF);
        body.extend_from_slice(&escpos::bold(true));
        body.extend_from_slice(b"x");
        assert_eq!(transpile("----[bold]x"), job(&body));
    }
}

mod tags {
    use super::*;

    #[test]
    fn test_unknown_bracket_tag_is_literal() {
        assert_eq!(transpile("[zzz]"), job(b"[zzz]"));
    }

    #[test]
    fn test_receipt_header() {
        let text = "[center][size=2]Store[/size]\n[left]__Item__ 9.90";
        let body = [
            &escpos::align(escpos::Alignment::Center)[..],
            &[0x1D, 0x21, 0x11],
            b"Store",
            &[0x1D, 0x21, 0x00],
            &[LF],
            &escpos::align(escpos::Alignment::Left),
            &[0x1B, 0x2D, 0x01],
            b"Item",
            &[0x1B, 0x2D, 0x00],
            b" 9.90",
        ]
        .concat();
        assert_eq!(transpile(text), job(&body));
    }

    #[test]
    fn test_bold_inner_markup_is_not_reparsed() {
        let body = [&escpos::bold(true)[..], b"[center]", &escpos::bold(false)].concat();
        assert_eq!(transpile("**[center]**"), job(&body));
    }
}
