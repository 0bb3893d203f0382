//! Error types for reading and writing scene documents

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scene document at line {line}, column {column}: {message}")]
    Json {
        message: String,
        line: usize,
        column: usize,
        span: Span,
    },

    #[error("no room dimensions given; pass them in the document or with --room")]
    MissingRoom,

    #[error("invalid room dimensions {0:?}: every side must be a positive number")]
    InvalidRoom([f64; 3]),

    #[error("failed to write scene document: {0}")]
    Write(serde_json::Error),
}

impl DocumentError {
    /// Wrap a JSON error, locating it in `source`
    pub fn json(err: serde_json::Error, source: &str) -> Self {
        let line = err.line();
        let column = err.column();
        let start = byte_offset(source, line, column);
        let end = source[start..]
            .chars()
            .next()
            .map_or(start, |c| start + c.len_utf8());
        let message = err.to_string();
        // serde_json appends the location to its message
        let message = match message.rfind(" at line ") {
            Some(i) => message[..i].to_string(),
            None => message,
        };
        DocumentError::Json {
            message,
            line,
            column,
            span: start..end,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let DocumentError::Json { message, span, .. } = self else {
            return self.to_string();
        };
        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message("invalid scene document")
            .with_label(
                Label::new((filename, span.clone()))
                    .with_message(message)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);
        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Byte offset of a 1-based line and column; column 0 means the line start
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let mut offset = 0;
    for (n, text) in source.split_inclusive('\n').enumerate() {
        if n + 1 == line {
            let col = column.saturating_sub(1).min(text.len());
            let col = (0..=col).rev().find(|c| text.is_char_boundary(*c)).unwrap_or(0);
            return offset + col;
        }
        offset += text.len();
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_error(source: &str) -> DocumentError {
        let err = serde_json::from_str::<serde_json::Value>(source).unwrap_err();
        DocumentError::json(err, source)
    }

    #[test]
    fn test_byte_offset() {
        let source = "{\n  \"a\": 1,\n  oops\n}";
        assert_eq!(byte_offset(source, 1, 1), 0);
        assert_eq!(byte_offset(source, 3, 3), 14);
        assert_eq!(&source[14..18], "oops");
        assert_eq!(byte_offset(source, 9, 1), source.len());
    }

    #[test]
    fn test_json_error_span() {
        let source = "{\n  \"a\": 1,\n  oops\n}";
        let DocumentError::Json { line, span, .. } = parse_error(source) else {
            panic!("expected a JSON error");
        };
        assert_eq!(line, 3);
        assert!((12..19).contains(&span.start));
    }

    #[test]
    fn test_format_mentions_filename() {
        let source = "[1, 2,, 3]";
        let formatted = parse_error(source).format(source, "scene.json");
        assert!(formatted.contains("scene.json"));
        assert!(formatted.contains("invalid scene document"));
    }

    #[test]
    fn test_format_without_source_location() {
        let formatted = DocumentError::MissingRoom.format("", "scene.json");
        insta::assert_snapshot!(formatted, @"no room dimensions given; pass them in the document or with --room");
    }
}
