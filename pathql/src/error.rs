//! Parse errors for PathQL statements

use std::fmt;

/// Failure to parse a statement or context chain
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    /// Byte offset into the statement where parsing stopped
    pub offset: Option<usize>,
    /// 1-based line of the offset
    pub line: Option<usize>,
    /// 1-based column of the offset
    pub column: Option<usize>,
}

impl ParseError {
    /// An error with no location attached
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
            line: None,
            column: None,
        }
    }

    /// An error located at the point where parsing stopped.
    ///
    /// `remaining` must be the unconsumed tail of `input`; the offset and
    /// line/column are derived from how much of `input` was consumed.
    pub fn located(message: impl Into<String>, input: &str, remaining: &str) -> Self {
        let offset = input.len().saturating_sub(remaining.len());
        let consumed = &input[..offset];
        let line_start = consumed.rfind('\n').map(|p| p + 1).unwrap_or(0);
        Self {
            message: message.into(),
            offset: Some(offset),
            line: Some(consumed.matches('\n').count() + 1),
            column: Some(offset - line_start + 1),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at line {}, column {}", line, column),
            _ => match self.offset {
                Some(offset) => write!(f, " at offset {}", offset),
                None => Ok(()),
            },
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_located_computes_line_and_column() {
        let input = "SELECT TREE\nFROM catalog AT *{";
        let remaining = "*{";
        let err = ParseError::located("bad filter", input, remaining);
        assert_eq!(err.offset, Some(input.len() - 2));
        assert_eq!(err.line, Some(2));
        assert_eq!(err.column, Some(17));
        assert_eq!(err.to_string(), "Parse error: bad filter at line 2, column 17");
    }

    #[test]
    fn test_unlocated_display() {
        let err = ParseError::new("incomplete input");
        assert_eq!(err.to_string(), "Parse error: incomplete input");
    }
}
