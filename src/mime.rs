//! MIME decomposition
//!
//! Turns a raw RFC 2822 message into the flat list of content parts
//! carried by [`Mail`](crate::Mail). Only `multipart/*` bodies are
//! decomposed; nested multiparts are walked and flattened in document
//! order. A single-part body yields no parts, since its metadata is
//! already in the envelope.
//!
//! A malformed part never fails the message: it is left out of
//! [`Decomposition::parts`] and recorded in
//! [`Decomposition::skipped`] for the caller to log.

use crate::model::MailPart;
use mailparse::{MailHeaderMap, ParsedMail, parse_mail};
use thiserror::Error;

/// Why a part (or a whole literal) was left out.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MimeError {
    #[error("reading message headers: {0}")]
    Headers(String),

    #[error("multipart body has no boundary parameter")]
    MissingBoundary,

    #[error("part {index}: malformed header line {line:?}")]
    PartHeader { index: usize, line: String },

    #[error("part {index}: missing closing boundary")]
    Unterminated { index: usize },

    #[error("part {index}: {reason}")]
    PartBody { index: usize, reason: String },
}

/// Result of decomposing one or more raw message literals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decomposition {
    pub parts: Vec<MailPart>,
    pub skipped: Vec<MimeError>,
}

/// Decompose a raw message.
///
/// # Examples
///
/// ```
/// use mail_reader::decompose;
///
/// let raw = b"Content-Type: multipart/mixed; boundary=b\r\n\
///     \r\n\
///     --b\r\n\
///     Content-Type: text/plain\r\n\
///     \r\n\
///     Your code is 123456\r\n\
///     --b--\r\n";
///
/// let out = decompose(raw);
/// assert!(out.skipped.is_empty());
/// assert_eq!(out.parts[0].content, "Your code is 123456");
/// ```
#[must_use]
pub fn decompose(raw: &[u8]) -> Decomposition {
    let mut out = Decomposition::default();
    match parse_mail(raw) {
        Ok(mail) => walk(&mail, &mut out),
        Err(e) => out.skipped.push(MimeError::Headers(e.to_string())),
    }
    out
}

/// Decompose every literal of a message and merge the results in
/// order.
#[must_use]
pub fn decompose_all<'a, I>(literals: I) -> Decomposition
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut merged = Decomposition::default();
    for raw in literals {
        let Decomposition { parts, skipped } = decompose(raw);
        merged.parts.extend(parts);
        merged.skipped.extend(skipped);
    }
    merged
}

fn walk(mail: &ParsedMail<'_>, out: &mut Decomposition) {
    if !mail.ctype.mimetype.starts_with("multipart/") {
        return;
    }

    let Some(boundary) = mail.ctype.params.get("boundary").filter(|b| !b.is_empty()) else {
        out.skipped.push(MimeError::MissingBoundary);
        return;
    };

    // mailparse runs an unclosed last part to the end of the literal.
    let unterminated = if has_closing_delimiter(mail.raw_bytes, boundary) {
        None
    } else {
        mail.subparts.len().checked_sub(1)
    };

    for (index, part) in mail.subparts.iter().enumerate() {
        if Some(index) == unterminated {
            out.skipped.push(MimeError::Unterminated { index });
        } else {
            decode_part(index, part, out);
        }
    }
}

fn decode_part(index: usize, part: &ParsedMail<'_>, out: &mut Decomposition) {
    if let Some(line) = malformed_header_line(part.raw_bytes) {
        out.skipped.push(MimeError::PartHeader { index, line });
        return;
    }

    if part.ctype.mimetype.starts_with("multipart/") {
        walk(part, out);
        return;
    }

    match part.get_body() {
        Ok(content) => out.parts.push(MailPart {
            content_type: part.headers.get_first_value("Content-Type").unwrap_or_default(),
            content,
        }),
        Err(e) => out.skipped.push(MimeError::PartBody {
            index,
            reason: e.to_string(),
        }),
    }
}

fn has_closing_delimiter(raw: &[u8], boundary: &str) -> bool {
    let closing = format!("--{boundary}--");
    raw.split(|&b| b == b'\n')
        .any(|line| trim_line_end(line) == closing.as_bytes())
}

/// The first line of a part's header block that is neither a
/// `name: value` field nor a continuation of one.
fn malformed_header_line(part: &[u8]) -> Option<String> {
    for (i, raw_line) in part.split(|&b| b == b'\n').enumerate() {
        let line = String::from_utf8_lossy(trim_line_end(raw_line));
        if line.is_empty() {
            return None;
        }
        if line.starts_with([' ', '\t']) {
            if i == 0 {
                return Some(line.into_owned());
            }
            continue;
        }
        match line.find(':') {
            Some(colon) if colon > 0 && !line[..colon].contains(char::is_whitespace) => {}
            _ => return Some(line.into_owned()),
        }
    }
    None
}

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\r' | b'\n' | b' ' | b'\t') {
        end -= 1;
    }
    &line[..end]
}
