use once_cell::sync::Lazy;

// The engine is byte-level, not grapheme-level: the separator alphabet
// is a fixed set of bytes shared by index and query paths, and any
// non-separator byte (including bytes >= 0x80 from multi-byte UTF-8
// sequences) passes through a token verbatim.
//
// This set must never change without a full index rebuild.
pub const SEPARATORS: &str =
    " :;,.\t\u{b}\r\n\u{c}[]{}()<>+-=*&^%$#@!~`´'\"|\\/?·：“”_";

static SEPARATOR_TABLE: Lazy<[bool; 256]> = Lazy::new(|| {
    let mut table = [false; 256];
    for byte in SEPARATORS.bytes() {
        table[byte as usize] = true;
    }
    table
});

pub fn is_separator(byte: u8) -> bool {
    SEPARATOR_TABLE[byte as usize]
}

/// Lazy token stream over a text blob. A token is a maximal run of
/// non-separator bytes, ASCII-lowercased, kept only when its first byte
/// is ASCII alphanumeric.
pub struct Tokens<'a> {
    bytes: &'a [u8],
    pos: usize,
}

pub fn tokenize(text: &str) -> Tokens<'_> {
    Tokens {
        bytes: text.as_bytes(),
        pos: 0,
    }
}

impl Iterator for Tokens<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            while self.pos < self.bytes.len() && is_separator(self.bytes[self.pos]) {
                self.pos += 1;
            }
            if self.pos >= self.bytes.len() {
                return None;
            }
            let start = self.pos;
            while self.pos < self.bytes.len() && !is_separator(self.bytes[self.pos]) {
                self.pos += 1;
            }
            let mut word = self.bytes[start..self.pos].to_vec();
            if !word[0].is_ascii_alphanumeric() {
                continue;
            }
            word.make_ascii_lowercase();
            return Some(String::from_utf8_lossy(&word).into_owned());
        }
    }
}
