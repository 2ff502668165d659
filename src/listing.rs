//! Conversion between an ordered entry list and the editable text listing.
//!
//! The codec is pure and stateless: [`encode`] renders one line per entry in
//! entry order, [`decode`] splits edited text back into positioned lines. A
//! line that is completely empty marks its entry for deletion; a line that
//! still contains whitespace is kept apart from that marker so the reconciler
//! can reject it instead of silently treating it as a deletion.

use std::fmt;

use crate::entry::Entry;

/// Errors produced while decoding an edited listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingError {
    /// The edited text does not have one line per entry. Editors must not
    /// insert or remove lines; positional pairing would be meaningless.
    LineCountMismatch { expected: usize, actual: usize },
}

impl fmt::Display for ListingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingError::LineCountMismatch { expected, actual } => {
                write!(
                    f,
                    "Edited listing has {} lines but {} were expected; lines must not be added or removed",
                    actual, expected
                )
            }
        }
    }
}

impl std::error::Error for ListingError {}

/// One line of the user-edited listing, addressed by its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditedLine {
    position: usize,
    raw: String,
}

impl EditedLine {
    /// Creates a line from its zero-based position and raw content. The raw
    /// content must not contain the line terminator itself.
    pub fn new(position: usize, raw: impl Into<String>) -> Self {
        Self {
            position,
            raw: raw.into(),
        }
    }

    /// Zero-based index of this line in the edited text.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The line content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.raw.trim()
    }

    /// Returns true if the line was emptied entirely, which marks the paired
    /// entry for deletion.
    pub fn is_delete_marker(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns true if the line holds only whitespace. Such a line is neither
    /// a deletion nor a usable destination.
    pub fn is_blank(&self) -> bool {
        !self.raw.is_empty() && self.raw.trim().is_empty()
    }
}

/// Renders the listing shown to the user: one display line per entry, in
/// entry order, each terminated by a newline.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use umv::entry::Entry;
/// use umv::listing::{decode, encode};
///
/// let entries = vec![Entry::file(Path::new("notes/todo.txt"))];
/// let listing = encode(&entries);
/// assert_eq!(listing, "notes/todo.txt\n");
///
/// let lines = decode(&listing, entries.len()).unwrap();
/// assert_eq!(lines[0].text(), "notes/todo.txt");
/// ```
pub fn encode(entries: &[Entry]) -> String {
    let mut text = String::new();
    for entry in entries {
        text.push_str(entry.display_line());
        text.push('\n');
    }
    text
}

/// Splits edited text into positioned lines.
///
/// A single trailing newline is not counted as an extra line, and carriage
/// returns left by editors on other platforms are stripped. The number of
/// resulting lines must equal `expected`; no auto-repair is attempted.
///
/// # Errors
///
/// Returns [`ListingError::LineCountMismatch`] when the line count differs
/// from `expected`.
pub fn decode(text: &str, expected: usize) -> Result<Vec<EditedLine>, ListingError> {
    let mut lines = Vec::new();

    if !text.is_empty() {
        let body = text.strip_suffix('\n').unwrap_or(text);
        for (position, line) in body.split('\n').enumerate() {
            let raw = line.strip_suffix('\r').unwrap_or(line);
            lines.push(EditedLine::new(position, raw));
        }
    }

    if lines.len() != expected {
        return Err(ListingError::LineCountMismatch {
            expected,
            actual: lines.len(),
        });
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_encode_one_line_per_entry() {
        let entries = vec![
            Entry::file(Path::new("a.txt")),
            Entry::archive_member(Path::new("b.tar"), Path::new("c.txt")),
        ];

        assert_eq!(encode(&entries), "a.txt\nb.tar!/c.txt\n");
    }

    #[test]
    fn test_encode_empty_listing() {
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn test_decode_round_trips_unmodified_text() {
        let entries = vec![
            Entry::file(Path::new("a.txt")),
            Entry::file(Path::new("b/c.txt")),
        ];
        let lines = decode(&encode(&entries), 2).expect("decode failed");

        assert_eq!(lines[0].text(), "a.txt");
        assert_eq!(lines[1].text(), "b/c.txt");
        assert_eq!(lines[0].position(), 0);
        assert_eq!(lines[1].position(), 1);
    }

    #[test]
    fn test_decode_rejects_missing_line() {
        let result = decode("a.txt\n", 2);
        assert_eq!(
            result,
            Err(ListingError::LineCountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_decode_rejects_extra_line() {
        let result = decode("a.txt\nb.txt\nc.txt\n", 2);
        assert_eq!(
            result,
            Err(ListingError::LineCountMismatch {
                expected: 2,
                actual: 3
            })
        );
    }

    #[test]
    fn test_empty_line_is_delete_marker() {
        let lines = decode("a.txt\n\n", 2).expect("decode failed");
        assert!(!lines[0].is_delete_marker());
        assert!(lines[1].is_delete_marker());
    }

    #[test]
    fn test_whitespace_line_is_blank_not_delete() {
        let lines = decode("a.txt\n   \n", 2).expect("decode failed");
        assert!(!lines[1].is_delete_marker());
        assert!(lines[1].is_blank());
        assert_eq!(lines[1].text(), "");
    }

    #[test]
    fn test_missing_final_newline_is_tolerated() {
        let lines = decode("a.txt\nb.txt", 2).expect("decode failed");
        assert_eq!(lines[1].text(), "b.txt");
    }

    #[test]
    fn test_carriage_returns_are_stripped() {
        let lines = decode("a.txt\r\n\r\n", 2).expect("decode failed");
        assert_eq!(lines[0].text(), "a.txt");
        assert!(lines[1].is_delete_marker());
    }

    #[test]
    fn test_decode_empty_text_for_empty_listing() {
        assert_eq!(decode("", 0), Ok(Vec::new()));
    }
}
