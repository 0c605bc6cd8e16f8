//! # Receipt Markup Transpiler
//!
//! Converts the lightweight receipt markup used by the point-of-sale front end
//! into an ESC/POS byte stream. The markup mixes three dialects:
//!
//! - Markdown spans: `**bold**`, `*italic*`, `__underline__`, `~~strike~~`
//! - HTML-ish spans: `<xl>`, `<large>`, `<small>`, and `<br>`
//! - Bracket tags: `[bold]`, `[/bold]`, `[underline]`, `[center]`, `[size=2]`, ...
//!
//! plus separator lines (`===` / `---` on their own line). The transpiler is
//! total: anything it does not recognize is printed as literal text.
//!
//! Text is encoded as GB18030, which covers the full Unicode repertoire and is
//! what Chinese-market receipt printers expect.

use crate::escpos::{self, Alignment, CharSize, LF};
use encoding_rs::GB18030;

/// Width in characters of a printed separator line
pub const SEPARATOR_WIDTH: usize = 32;

/// Character-level style left open by bracket tags at the end of the body
///
/// Markdown and HTML-ish spans are always closed by the transpiler itself;
/// only `[bold]`, `[underline]` and alignment tags can leave state behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StyleState {
    pub bold: bool,
    pub underline: bool,
    pub alignment: Alignment,
}

impl StyleState {
    /// Whether a bracket tag left bold or underline switched on
    pub fn has_unclosed(&self) -> bool {
        self.bold || self.underline
    }
}

/// Transpile markup into a complete print job
///
/// Output layout: initialize, body, two line feeds, partial cut, then the
/// bold/underline/size reset triad.
pub fn transpile(text: &str) -> Vec<u8> {
    transpile_with_style(text).0
}

/// Like [`transpile`], also reporting the style state bracket tags left behind
pub fn transpile_with_style(text: &str) -> (Vec<u8>, StyleState) {
    let mut emitter = Emitter::new(text);
    emitter.run();
    let (body, style) = emitter.finish();

    let mut out = Vec::with_capacity(body.len() + 17);
    out.extend_from_slice(&escpos::INITIALIZE);
    out.extend_from_slice(&body);
    out.push(LF);
    out.push(LF);
    out.extend_from_slice(&escpos::PARTIAL_CUT);
    out.extend_from_slice(&escpos::style_reset());
    (out, style)
}

/// Encode text as GB18030
pub fn encode_text(text: &str) -> Vec<u8> {
    let (bytes, _, _) = GB18030.encode(text);
    bytes.into_owned()
}

struct Emitter {
    chars: Vec<char>,
    pos: usize,
    out: Vec<u8>,
    /// Literal characters not yet encoded
    pending: String,
    style: StyleState,
}

impl Emitter {
    fn new(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self {
            out: Vec::with_capacity(chars.len() * 2),
            chars,
            pos: 0,
            pending: String::new(),
            style: StyleState::default(),
        }
    }

    fn run(&mut self) {
        while self.pos < self.chars.len() {
            let matched = self.bold_span()
                || self.italic_span()
                || self.underline_span()
                || self.strike_span()
                || self.xl_span()
                || self.large_span()
                || self.small_span()
                || self.separator()
                || self.line_break()
                || self.bracket_tag();

            if !matched {
                self.literal_char();
            }
        }
    }

    fn finish(mut self) -> (Vec<u8>, StyleState) {
        self.flush_text();
        (self.out, self.style)
    }

    // ---- emission helpers ----

    fn flush_text(&mut self) {
        if !self.pending.is_empty() {
            let (bytes, _, _) = GB18030.encode(&self.pending);
            self.out.extend_from_slice(&bytes);
            self.pending.clear();
        }
    }

    fn command(&mut self, bytes: &[u8]) {
        self.flush_text();
        self.out.extend_from_slice(bytes);
    }

    fn text(&mut self, start: usize, end: usize) {
        self.pending.extend(&self.chars[start..end]);
    }

    fn literal_char(&mut self) {
        let c = self.chars[self.pos];
        if c == '\n' {
            self.command(&[LF]);
        } else {
            self.pending.push(c);
        }
        self.pos += 1;
    }

    // ---- scanning helpers ----

    fn remaining(&self) -> usize {
        self.chars.len() - self.pos
    }

    fn starts_with_at(&self, at: usize, pattern: &str) -> bool {
        let mut idx = at;
        for p in pattern.chars() {
            if self.chars.get(idx) != Some(&p) {
                return false;
            }
            idx += 1;
        }
        true
    }

    fn starts_with(&self, pattern: &str) -> bool {
        self.starts_with_at(self.pos, pattern)
    }

    fn find(&self, pattern: &str, from: usize) -> Option<usize> {
        (from..self.chars.len()).find(|&i| self.starts_with_at(i, pattern))
    }

    /// Match `open ... close` at the cursor; returns the inner span
    fn delimited(&self, open: &str, close: &str) -> Option<(usize, usize)> {
        if !self.starts_with(open) {
            return None;
        }
        let inner_start = self.pos + open.chars().count();
        let inner_end = self.find(close, inner_start)?;
        Some((inner_start, inner_end))
    }

    /// Markdown spans need at least one character after the opening pair
    fn markdown_span(&self, marker: &str) -> Option<(usize, usize)> {
        if self.remaining() <= 2 {
            return None;
        }
        self.delimited(marker, marker)
    }

    // ---- token rules, in priority order ----

    fn bold_span(&mut self) -> bool {
        let Some((start, end)) = self.markdown_span("**") else {
            return false;
        };
        self.command(&escpos::bold(true));
        self.text(start, end);
        self.command(&escpos::bold(false));
        self.pos = end + 2;
        true
    }

    fn italic_span(&mut self) -> bool {
        if self.remaining() <= 1 || self.chars[self.pos] != '*' || self.chars[self.pos + 1] == '*'
        {
            return false;
        }
        let Some(end) = self.find("*", self.pos + 1) else {
            return false;
        };
        self.text(self.pos + 1, end);
        self.pos = end + 1;
        true
    }

    fn underline_span(&mut self) -> bool {
        let Some((start, end)) = self.markdown_span("__") else {
            return false;
        };
        self.command(&escpos::underline(true));
        self.text(start, end);
        self.command(&escpos::underline(false));
        self.pos = end + 2;
        true
    }

    fn strike_span(&mut self) -> bool {
        let Some((start, end)) = self.markdown_span("~~") else {
            return false;
        };
        self.text(start, end);
        self.pos = end + 2;
        true
    }

    fn xl_span(&mut self) -> bool {
        let Some((start, end)) = self.delimited("<xl>", "</xl>") else {
            return false;
        };
        self.command(&escpos::char_size(CharSize::Double));
        self.command(&escpos::bold(true));
        self.text(start, end);
        self.command(&escpos::bold(false));
        self.command(&escpos::char_size(CharSize::Normal));
        self.pos = end + 5;
        true
    }

    fn large_span(&mut self) -> bool {
        let Some((start, end)) = self.delimited("<large>", "</large>") else {
            return false;
        };
        self.command(&escpos::char_size(CharSize::DoubleWidth));
        self.text(start, end);
        self.command(&escpos::char_size(CharSize::Normal));
        self.pos = end + 8;
        true
    }

    fn small_span(&mut self) -> bool {
        let Some((start, end)) = self.delimited("<small>", "</small>") else {
            return false;
        };
        self.text(start, end);
        self.pos = end + 8;
        true
    }

    /// A run of three or more `=` or `-` bounded by line/tag delimiters
    fn separator(&mut self) -> bool {
        let c = self.chars[self.pos];
        if c != '=' && c != '-' {
            return false;
        }

        let run_end = (self.pos..self.chars.len())
            .find(|&i| self.chars[i] != c)
            .unwrap_or(self.chars.len());
        if run_end - self.pos < 3 {
            return false;
        }

        let at_line_start =
            self.pos == 0 || matches!(self.chars[self.pos - 1], '\n' | ']' | '>');
        let at_line_end =
            run_end == self.chars.len() || matches!(self.chars[run_end], '\n' | '[' | '<');
        if !(at_line_start && at_line_end) {
            return false;
        }

        self.pending.extend(std::iter::repeat_n(c, SEPARATOR_WIDTH));
        self.command(&[LF]);
        self.pos = run_end;
        true
    }

    fn line_break(&mut self) -> bool {
        if !self.starts_with("<br>") {
            return false;
        }
        self.command(&[LF]);
        self.pos += 4;
        true
    }

    fn bracket_tag(&mut self) -> bool {
        if self.chars[self.pos] != '[' {
            return false;
        }
        let Some(close) = self.find("]", self.pos + 1) else {
            return false;
        };
        let tag: String = self.chars[self.pos + 1..close].iter().collect();

        let handled = match tag.as_str() {
            "bold" => {
                self.style.bold = true;
                self.command(&escpos::bold(true));
                true
            }
            "/bold" => {
                self.style.bold = false;
                self.command(&escpos::bold(false));
                true
            }
            "underline" => {
                self.style.underline = true;
                self.command(&escpos::underline(true));
                true
            }
            "/underline" => {
                self.style.underline = false;
                self.command(&escpos::underline(false));
                true
            }
            "left" => self.set_alignment(Alignment::Left),
            "center" => self.set_alignment(Alignment::Center),
            "right" => self.set_alignment(Alignment::Right),
            // Alignment persists until the next explicit alignment tag
            "/left" | "/center" | "/right" => true,
            "/size" => {
                self.command(&escpos::char_size(CharSize::Normal));
                true
            }
            _ => match tag.strip_prefix("size=") {
                Some(level) => {
                    let level = level.parse::<i32>().unwrap_or(1);
                    self.command(&escpos::char_size(CharSize::from_level(level)));
                    true
                }
                None => false,
            },
        };

        if handled {
            self.pos = close + 1;
        }
        handled
    }

    fn set_alignment(&mut self, alignment: Alignment) -> bool {
        self.style.alignment = alignment;
        self.command(&escpos::align(alignment));
        true
    }
}
