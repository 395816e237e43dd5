//! Documentation annotations on error call sites.
//!
//! An annotation is a comment placed before the statement that raises an
//! error. It names the error and spells out its human-readable message:
//!
//! ```js
//! // @error test:one Herp! A {what} happened
//! throw testMinErr('one', what);
//!
//! /**
//!  * @error herp
//!  * I accidentally {thing}
//!  */
//! throw derpMinErr('herp', thing);
//! ```
//!
//! Grammar, after comment delimiters and `*` gutters are stripped and lines
//! are joined with single spaces:
//!
//! ```text
//! annotation := "@error" WS header [WS message]
//! header     := [namespace ":"] code
//! message    := { text | "{" slot "}" | "{{" | "}}" }
//! ```
//!
//! Named slots are numbered by first appearance; numeric slots keep their
//! number.

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

/// Tag that opens an annotation.
pub const TAG: &str = "@error";

lazy_static! {
    /// `[namespace:]code`, where the namespace may be empty.
    static ref HEADER: Regex = Regex::new(r"^(?:([\w$.\-]*):)?([\w$.\-]+)$").unwrap();
}

/// Malformed annotations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("missing error code after @error")]
    MissingCode,
    #[error("invalid error header {0:?}")]
    InvalidHeader(String),
    #[error("unterminated slot at offset {0}")]
    UnterminatedSlot(usize),
    #[error("empty slot at offset {0}")]
    EmptySlot(usize),
    #[error("unmatched '}}' at offset {0}")]
    UnmatchedBrace(usize),
}

/// A piece of an annotated message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Slot(String),
}

/// A parsed `@error` annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Namespace from the header, if one was written.
    pub namespace: Option<String>,
    pub code: String,
    pub message: Vec<Segment>,
}

impl Annotation {
    /// Whether this annotation documents `code` in `namespace`.
    pub fn documents(&self, namespace: &str, code: &str) -> bool {
        self.code == code && self.namespace.as_deref().map_or(true, |ns| ns == namespace)
    }

    /// The message with slots rewritten as `{0}`, `{1}`, ...
    pub fn template(&self) -> String {
        let mut names: Vec<&str> = Vec::new();
        let mut out = String::new();

        for segment in &self.message {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Slot(slot) if slot.chars().all(|c| c.is_ascii_digit()) => {
                    out.push('{');
                    out.push_str(slot);
                    out.push('}');
                }
                Segment::Slot(slot) => {
                    let index = match names.iter().position(|n| *n == slot.as_str()) {
                        Some(i) => i,
                        None => {
                            names.push(slot);
                            names.len() - 1
                        }
                    };
                    out.push_str(&format!("{{{}}}", index));
                }
            }
        }

        out
    }
}

/// Parse a comment as an annotation.
///
/// Returns `Ok(None)` for comments that are not annotations at all.
pub fn parse(comment: &str) -> Result<Option<Annotation>, AnnotationError> {
    let body = comment_body(comment);
    let Some(rest) = body.strip_prefix(TAG) else {
        return Ok(None);
    };
    if !(rest.is_empty() || rest.starts_with(' ')) {
        // some other tag, e.g. `@errors`
        return Ok(None);
    }

    let rest = rest.trim_start();
    let (header, message) = match rest.split_once(' ') {
        Some((header, message)) => (header, message.trim()),
        None => (rest, ""),
    };
    if header.is_empty() {
        return Err(AnnotationError::MissingCode);
    }

    let caps = HEADER
        .captures(header)
        .ok_or_else(|| AnnotationError::InvalidHeader(header.to_string()))?;
    let namespace = caps.get(1).map(|m| m.as_str().to_string());
    let code = caps[2].to_string();

    Ok(Some(Annotation {
        namespace,
        code,
        message: parse_message(message)?,
    }))
}

/// Comment text without delimiters or gutters, whitespace collapsed.
fn comment_body(comment: &str) -> String {
    let comment = comment.trim();
    let inner = if let Some(line) = comment.strip_prefix("//") {
        line.to_string()
    } else if let Some(block) = comment.strip_prefix("/*") {
        let block = block.strip_suffix("*/").unwrap_or(block);
        block
            .lines()
            .map(|line| line.trim().trim_start_matches('*'))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        comment.to_string()
    };

    inner.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_message(message: &str) -> Result<Vec<Segment>, AnnotationError> {
    let mut segments = Vec::new();
    let mut text = String::new();
    let mut chars = message.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        match c {
            '{' if chars.peek().map(|(_, n)| *n) == Some('{') => {
                chars.next();
                text.push('{');
            }
            '}' if chars.peek().map(|(_, n)| *n) == Some('}') => {
                chars.next();
                text.push('}');
            }
            '{' => {
                let mut slot = String::new();
                let mut closed = false;
                for (_, s) in chars.by_ref() {
                    match s {
                        '}' => {
                            closed = true;
                            break;
                        }
                        '{' => return Err(AnnotationError::UnterminatedSlot(offset)),
                        _ => slot.push(s),
                    }
                }
                if !closed {
                    return Err(AnnotationError::UnterminatedSlot(offset));
                }
                let slot = slot.trim();
                if slot.is_empty() {
                    return Err(AnnotationError::EmptySlot(offset));
                }
                if !text.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut text)));
                }
                segments.push(Segment::Slot(slot.to_string()));
            }
            '}' => return Err(AnnotationError::UnmatchedBrace(offset)),
            _ => text.push(c),
        }
    }

    if !text.is_empty() {
        segments.push(Segment::Text(text));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_comment() {
        let annotation = parse("// @error test:one Herp! A {what} happened")
            .unwrap()
            .unwrap();

        assert_eq!(annotation.namespace.as_deref(), Some("test"));
        assert_eq!(annotation.code, "one");
        assert_eq!(
            annotation.message,
            vec![
                Segment::Text("Herp! A ".to_string()),
                Segment::Slot("what".to_string()),
                Segment::Text(" happened".to_string()),
            ]
        );
        assert_eq!(annotation.template(), "Herp! A {0} happened");
    }

    #[test]
    fn test_jsdoc_block_comment() {
        let comment = "/**\n   * @error herp\n   * I accidentally\n   *   {thing}\n   */";
        let annotation = parse(comment).unwrap().unwrap();

        assert_eq!(annotation.namespace, None);
        assert_eq!(annotation.code, "herp");
        assert_eq!(annotation.template(), "I accidentally {0}");
    }

    #[test]
    fn test_single_line_block_comment() {
        let annotation = parse("/* @error $compile:nodomevents Interpolations are forbidden */")
            .unwrap()
            .unwrap();
        assert_eq!(annotation.namespace.as_deref(), Some("$compile"));
        assert_eq!(annotation.code, "nodomevents");
        assert_eq!(annotation.template(), "Interpolations are forbidden");
    }

    #[test]
    fn test_slot_numbering() {
        let annotation = parse("// @error a {x} then {y} then {x} again").unwrap().unwrap();
        assert_eq!(annotation.template(), "{0} then {1} then {0} again");

        let annotation = parse("// @error b {1} before {0}").unwrap().unwrap();
        assert_eq!(annotation.template(), "{1} before {0}");
    }

    #[test]
    fn test_escaped_braces() {
        let annotation = parse("// @error c Expected {{ near {token}").unwrap().unwrap();
        assert_eq!(annotation.template(), "Expected { near {0}");
    }

    #[test]
    fn test_empty_namespace_header() {
        let annotation = parse("// @error :bare Plain").unwrap().unwrap();
        assert_eq!(annotation.namespace.as_deref(), Some(""));
        assert!(annotation.documents("", "bare"));
        assert!(!annotation.documents("ng", "bare"));
    }

    #[test]
    fn test_documents() {
        let scoped = parse("// @error ng:areq Bad").unwrap().unwrap();
        assert!(scoped.documents("ng", "areq"));
        assert!(!scoped.documents("other", "areq"));
        assert!(!scoped.documents("ng", "badcfg"));

        let unscoped = parse("// @error areq Bad").unwrap().unwrap();
        assert!(unscoped.documents("anything", "areq"));
    }

    #[test]
    fn test_code_without_message() {
        let annotation = parse("// @error quiet").unwrap().unwrap();
        assert!(annotation.message.is_empty());
        assert_eq!(annotation.template(), "");
    }

    #[test]
    fn test_non_annotations() {
        assert_eq!(parse("// just a comment"), Ok(None));
        assert_eq!(parse("/* eslint-disable */"), Ok(None));
        assert_eq!(parse("// @errors are bad"), Ok(None));
        assert_eq!(parse("// see @error below"), Ok(None));
    }

    #[test]
    fn test_malformed_annotations() {
        assert_eq!(parse("// @error"), Err(AnnotationError::MissingCode));
        assert_eq!(
            parse("// @error a:b:c Msg"),
            Err(AnnotationError::InvalidHeader("a:b:c".to_string()))
        );
        assert_eq!(
            parse("// @error a Broken {slot"),
            Err(AnnotationError::UnterminatedSlot(7))
        );
        assert_eq!(parse("// @error a Empty {}"), Err(AnnotationError::EmptySlot(6)));
        assert_eq!(parse("// @error a Stray }"), Err(AnnotationError::UnmatchedBrace(6)));
    }
}
