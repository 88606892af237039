use proc_macro2::LineColumn;
use serde::{Deserialize, Serialize};

/// Zero-based position in the form language servers expect: line index and
/// UTF-16 code unit offset within that line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Source text with a precomputed line table.
///
/// `proc-macro2` reports spans as 1-based lines and 0-based *character*
/// columns; this type converts them to byte offsets for slicing and to
/// UTF-16 columns for the analysis server.
#[derive(Debug, Clone)]
pub struct SourceText<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> SourceText<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { text, line_starts }
    }

    fn line(&self, line: usize) -> &'a str {
        let Some(&start) = self.line_starts.get(line.saturating_sub(1)) else {
            return "";
        };
        let end = self.line_starts.get(line).copied().unwrap_or(self.text.len());
        &self.text[start..end]
    }

    /// Byte offset of a span location. Out-of-range locations clamp to the end.
    pub fn byte_offset(&self, at: LineColumn) -> usize {
        let Some(&start) = self.line_starts.get(at.line.saturating_sub(1)) else {
            return self.text.len();
        };
        let line = self.line(at.line);
        let within = line.char_indices().nth(at.column).map(|(i, _)| i).unwrap_or(line.len());
        start + within
    }

    /// Text between two span locations.
    pub fn slice(&self, start: LineColumn, end: LineColumn) -> &'a str {
        let from = self.byte_offset(start);
        let to = self.byte_offset(end).max(from);
        &self.text[from..to]
    }

    /// Convert a span location into a zero-based UTF-16 position.
    pub fn position(&self, at: LineColumn) -> Position {
        let character: usize =
            self.line(at.line).chars().take(at.column).map(char::len_utf16).sum();
        Position { line: at.line.saturating_sub(1) as u32, character: character as u32 }
    }
}
