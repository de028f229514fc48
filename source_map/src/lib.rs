//! Source locations for Dang programs
//!
//! Every AST node and every error produced by the Dang core carries an
//! optional [`SourceLocation`]. The parser that produces those locations is an
//! external collaborator; this crate only describes them and keeps the source
//! text around so diagnostics can quote the offending line.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A position in source code (1-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
    pub byte_offset: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize, byte_offset: usize) -> Self {
        Self { line, column, byte_offset }
    }
}

/// Where a node came from: file, start position, and an optional end
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub filename: Arc<str>,
    pub start: SourcePosition,
    pub length: usize,
    pub end: Option<SourcePosition>,
}

impl SourceLocation {
    pub fn new(filename: impl Into<Arc<str>>, line: usize, column: usize) -> Self {
        Self {
            filename: filename.into(),
            start: SourcePosition::new(line, column, 0),
            length: 1,
            end: None,
        }
    }

    pub fn with_end(mut self, end: SourcePosition) -> Self {
        if end.line == self.start.line {
            self.length = end.column.saturating_sub(self.start.column).max(1);
        }
        self.end = Some(end);
        self
    }

    pub fn line(&self) -> usize {
        self.start.line
    }

    pub fn column(&self) -> usize {
        self.start.column
    }

    /// Whether a (line, column) falls inside this location.
    ///
    /// Locations without an end position cover `length` columns on their
    /// starting line.
    pub fn is_within(&self, line: usize, column: usize) -> bool {
        let after_start = (line, column) >= (self.start.line, self.start.column);
        match self.end {
            Some(end) => after_start && (line, column) <= (end.line, end.column),
            None => line == self.start.line && after_start && column < self.start.column + self.length,
        }
    }

    /// Smallest location covering both (must be from the same file)
    pub fn merge(&self, other: &SourceLocation) -> SourceLocation {
        debug_assert_eq!(self.filename, other.filename, "Cannot merge locations from different files");

        let start = self.start.min(other.start);
        let self_end = self.end.unwrap_or(self.start);
        let other_end = other.end.unwrap_or(other.start);
        SourceLocation {
            filename: self.filename.clone(),
            start,
            length: self.length.max(other.length),
            end: Some(self_end.max(other_end)),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.filename, self.start.line, self.start.column)
    }
}

/// Source text of one file with precomputed line starts
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
    pub line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: String, content: String) -> Self {
        let line_starts = compute_line_starts(&content);
        Self { name, content, line_starts }
    }

    /// Get a specific line (1-based line numbers)
    pub fn get_line(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 || line_number > self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line_number - 1];
        let end = self
            .line_starts
            .get(line_number)
            .copied()
            .unwrap_or(self.content.len());

        Some(self.content[start..end].trim_end_matches(['\n', '\r']))
    }

    /// Convert a byte offset to line and column (1-based)
    pub fn offset_to_line_col(&self, offset: usize) -> (usize, usize) {
        let line_index = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };

        let line_start = self.line_starts.get(line_index).copied().unwrap_or(0);
        (line_index + 1, offset - line_start + 1)
    }

    /// Build a location spanning two byte offsets of this file
    pub fn location(&self, start: usize, end: usize) -> SourceLocation {
        let (line, column) = self.offset_to_line_col(start);
        let (end_line, end_column) = self.offset_to_line_col(end);
        let mut loc = SourceLocation::new(self.name.as_str(), line, column)
            .with_end(SourcePosition::new(end_line, end_column, end));
        loc.start.byte_offset = start;
        loc
    }
}

/// Source files registered by name, used to quote lines in diagnostics
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: HashMap<String, SourceFile>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) -> &SourceFile {
        let name = name.into();
        self.files.insert(name.clone(), SourceFile::new(name.clone(), content.into()));
        &self.files[&name]
    }

    pub fn get_file(&self, name: &str) -> Option<&SourceFile> {
        self.files.get(name)
    }

    /// The source line a location points at, if the file is known
    pub fn line_for(&self, loc: &SourceLocation) -> Option<&str> {
        self.get_file(&loc.filename)?.get_line(loc.start.line)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn compute_line_starts(source: &str) -> Vec<usize> {
    let mut line_starts = vec![0];

    for (i, ch) in source.char_indices() {
        if ch == '\n' {
            line_starts.push(i + 1);
        }
    }

    line_starts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_lines() {
        let file = SourceFile::new("test.dang".to_string(), "let x = 1\nlet y = 2\nx + y".to_string());

        assert_eq!(file.get_line(1), Some("let x = 1"));
        assert_eq!(file.get_line(3), Some("x + y"));
        assert_eq!(file.get_line(4), None);
        assert_eq!(file.get_line(0), None);
    }

    #[test]
    fn test_offset_to_line_col() {
        let file = SourceFile::new("test.dang".to_string(), "hello\nworld\ntest".to_string());

        assert_eq!(file.offset_to_line_col(0), (1, 1));
        assert_eq!(file.offset_to_line_col(4), (1, 5));
        assert_eq!(file.offset_to_line_col(6), (2, 1));
        assert_eq!(file.offset_to_line_col(12), (3, 1));
    }

    #[test]
    fn test_location_display_and_within() {
        let loc = SourceLocation::new("main.dang", 3, 5).with_end(SourcePosition::new(3, 9, 0));

        assert_eq!(loc.to_string(), "main.dang:3:5");
        assert!(loc.is_within(3, 5));
        assert!(loc.is_within(3, 9));
        assert!(!loc.is_within(3, 10));
        assert!(!loc.is_within(2, 7));
    }

    #[test]
    fn test_location_without_end_uses_length() {
        let loc = SourceLocation::new("main.dang", 1, 1);
        assert!(loc.is_within(1, 1));
        assert!(!loc.is_within(1, 2));
    }

    #[test]
    fn test_merge_locations() {
        let a = SourceLocation::new("main.dang", 1, 3);
        let b = SourceLocation::new("main.dang", 2, 1).with_end(SourcePosition::new(2, 8, 0));

        let merged = a.merge(&b);
        assert_eq!(merged.start.line, 1);
        assert_eq!(merged.start.column, 3);
        assert_eq!(merged.end, Some(SourcePosition::new(2, 8, 0)));
    }

    #[test]
    fn test_source_map_line_for() {
        let mut map = SourceMap::new();
        map.add_file("main.dang", "pub x = 1\nassert { x == 2 }");

        let loc = SourceLocation::new("main.dang", 2, 1);
        assert_eq!(map.line_for(&loc), Some("assert { x == 2 }"));
        assert_eq!(map.len(), 1);
    }
}
