//! Splits the text of a drop file into key, headers and body.
//!
//! The format is three optional-looking sections separated by literal
//! markers:
//!
//! ```text
//! my-key
//! --key
//! trace-id:abc123
//! source:billing
//! --header
//! {"the": "body"}
//! ```
//!
//! Only the first `--key` and the first `--header` after it split the
//! content. Marker text found later is body text and is kept verbatim.
//! Markers are matched as substrings, not whole lines.

use tracing::debug;

use crate::contract::Header;

pub const KEY_BOUNDARY: &str = "--key";
pub const HEADER_BOUNDARY: &str = "--header";

/// The pieces of one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedParts {
    /// `None` when there was no key marker, or the key trimmed to empty.
    pub key: Option<String>,
    /// `None` when there was no header marker or no non-blank header line.
    pub headers: Option<Vec<Header>>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentError {
    /// A header line did not contain exactly one `:`.
    MalformedHeader { line: String },
}

impl std::fmt::Display for ContentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentError::MalformedHeader { line } => write!(
                f,
                "malformed header - expected 'key:value' format, got: '{line}'"
            ),
        }
    }
}

impl std::error::Error for ContentError {}

/// Parse raw file content. `Ok(None)` means there is nothing to publish.
pub fn parse(content: &str) -> Result<Option<ParsedParts>, ContentError> {
    if content.trim().is_empty() {
        return Ok(None);
    }

    let (key, remainder) = split_key(content);
    let (headers, body) = split_headers(remainder)?;

    debug!(
        has_key = key.is_some(),
        header_count = headers.as_ref().map_or(0, Vec::len),
        body_len = body.len(),
        "Parsed content"
    );

    Ok(Some(ParsedParts {
        key,
        headers,
        body: body.to_string(),
    }))
}

fn split_key(content: &str) -> (Option<String>, &str) {
    match content.split_once(KEY_BOUNDARY) {
        Some((key, rest)) => {
            let key = key.trim();
            let key = (!key.is_empty()).then(|| key.to_string());
            (key, rest.trim_start())
        }
        None => (None, content),
    }
}

fn split_headers(remainder: &str) -> Result<(Option<Vec<Header>>, &str), ContentError> {
    match remainder.split_once(HEADER_BOUNDARY) {
        Some((block, body)) => Ok((parse_header_block(block)?, body.trim_start())),
        None => Ok((None, remainder)),
    }
}

/// Each non-blank line is `name:value`.
fn parse_header_block(block: &str) -> Result<Option<Vec<Header>>, ContentError> {
    let mut headers = Vec::new();

    for line in block.split('\n') {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(value), None) => {
                headers.push(Header::new(name, value.trim_end()));
            }
            _ => {
                return Err(ContentError::MalformedHeader {
                    line: line.to_string(),
                })
            }
        }
    }

    Ok((!headers.is_empty()).then_some(headers))
}
