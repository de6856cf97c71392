//! Text helpers shared by the parsers
//!
//! ECU logs are mostly UTF-8 but frequently carry garbage bytes from serial
//! captures. Decoding drops invalid sequences instead of failing or inserting
//! replacement characters, so byte offsets stay meaningful for line counting.

use crate::types::{AnalyzerError, Result};
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Decode bytes as UTF-8, dropping invalid sequences
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Read a whole file with [`decode_lossy`]
pub fn read_to_string_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(decode_lossy(&bytes))
}

/// Iterate over the lines of a file with [`decode_lossy`] applied per line
///
/// Line terminators (`\n`, `\r\n`) are stripped. Read errors end the iteration
/// with an `Err` item.
pub fn lines_lossy(path: &Path) -> Result<impl Iterator<Item = Result<String>>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(reader.split(b'\n').map(|line| {
        let mut bytes = line?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        Ok(decode_lossy(&bytes))
    }))
}

/// Largest char boundary `<= index` (clamped to the string length)
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// 1-based line numbers for byte offsets, counted incrementally
///
/// Ascending offsets only scan the bytes since the previous call; an offset
/// before the previous one restarts from the beginning.
#[derive(Debug)]
pub struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            bytes: content.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    pub fn line_at(&mut self, offset: usize) -> usize {
        let offset = offset.min(self.bytes.len());
        if offset < self.offset {
            self.offset = 0;
            self.line = 1;
        }
        self.line += self.bytes[self.offset..offset]
            .iter()
            .filter(|&&b| b == b'\n')
            .count();
        self.offset = offset;
        self.line
    }
}

/// Cut a string to `limit` characters, appending `...` when something was cut
pub fn truncate_for_display(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &s[..cut]),
        None => s.to_string(),
    }
}

/// Compile a configured pattern, mapping failures to [`AnalyzerError::InvalidPattern`]
pub fn compile_pattern(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| AnalyzerError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_decode_lossy_drops_invalid_bytes() {
        let bytes = b"core\xff load\xc3: 1.0";
        assert_eq!(decode_lossy(bytes), "core load: 1.0");
        assert_eq!(decode_lossy("温度 ok".as_bytes()), "温度 ok");
    }

    #[test]
    fn test_lines_lossy_strips_terminators() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"first\r\nsec\xffond\nthird").unwrap();

        let lines: Vec<String> = lines_lossy(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_floor_char_boundary() {
        let s = "aé";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 1), 1);
        assert_eq!(floor_char_boundary(s, 100), s.len());
    }

    #[test]
    fn test_line_counter() {
        let mut lines = LineCounter::new("a\nb\nc\n\nd");
        assert_eq!(lines.line_at(0), 1);
        assert_eq!(lines.line_at(2), 2);
        assert_eq!(lines.line_at(2), 2);
        assert_eq!(lines.line_at(4), 3);
        assert_eq!(lines.line_at(7), 5);
        assert_eq!(lines.line_at(100), 5);

        // going backwards rescans from the start
        assert_eq!(lines.line_at(3), 2);
        assert_eq!(lines.line_at(6), 4);
    }

    #[test]
    fn test_truncate_for_display() {
        assert_eq!(truncate_for_display("abcdef", 3), "abc...");
        assert_eq!(truncate_for_display("abc", 3), "abc");
    }

    #[test]
    fn test_compile_pattern_error() {
        let err = compile_pattern("(unclosed").unwrap_err();
        assert!(matches!(err, AnalyzerError::InvalidPattern { .. }));
    }
}
