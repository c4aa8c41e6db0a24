//! Normalization of captured process output.

use crate::error::FleetShellError;
use crate::Result;

/// Raw output as produced by a backend before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RawOutput {
    /// Nothing was captured.
    #[default]
    Absent,
    /// Undecoded bytes.
    Bytes(Vec<u8>),
    /// Already decoded text.
    Text(String),
    /// Ordered chunks; all elements must share one kind.
    Chunks(Vec<RawOutput>),
}

impl From<Vec<u8>> for RawOutput {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for RawOutput {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<String> for RawOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for RawOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<RawOutput>> for RawOutput {
    fn from(chunks: Vec<RawOutput>) -> Self {
        Self::Chunks(chunks)
    }
}

impl<T: Into<RawOutput>> From<Option<T>> for RawOutput {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Absent)
    }
}

/// Decode UTF-8, silently dropping byte sequences that are not valid.
pub fn decode_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// Merge and decode raw output into one trimmed string.
///
/// Byte chunks are concatenated before decoding so that a multi-byte
/// character split across two reads survives. Returns a type error when a
/// collection's elements are not all bytes or all text.
pub fn normalize(raw: impl Into<RawOutput>) -> Result<String> {
    match raw.into() {
        RawOutput::Absent => Ok(String::new()),
        RawOutput::Bytes(bytes) => Ok(decode_utf8(&bytes).trim().to_string()),
        RawOutput::Text(text) => Ok(text.trim().to_string()),
        RawOutput::Chunks(chunks) => normalize_chunks(chunks),
    }
}

fn normalize_chunks(chunks: Vec<RawOutput>) -> Result<String> {
    match chunks.first() {
        None => Ok(String::new()),
        Some(RawOutput::Bytes(_)) => {
            let mut joined = Vec::new();
            for (i, chunk) in chunks.into_iter().enumerate() {
                match chunk {
                    RawOutput::Bytes(bytes) => joined.extend_from_slice(&bytes),
                    other => return Err(mismatch(i, "bytes", &other)),
                }
            }
            Ok(decode_utf8(&joined).trim().to_string())
        }
        Some(RawOutput::Text(_)) => {
            let mut joined = String::new();
            for (i, chunk) in chunks.into_iter().enumerate() {
                match chunk {
                    RawOutput::Text(text) => joined.push_str(&text),
                    other => return Err(mismatch(i, "text", &other)),
                }
            }
            Ok(joined.trim().to_string())
        }
        Some(other) => Err(FleetShellError::Type(format!(
            "cannot normalize a collection starting with {}",
            kind(other)
        ))),
    }
}

fn mismatch(index: usize, expected: &str, found: &RawOutput) -> FleetShellError {
    FleetShellError::Type(format!(
        "element {index} is {}, expected {expected}",
        kind(found)
    ))
}

fn kind(raw: &RawOutput) -> &'static str {
    match raw {
        RawOutput::Absent => "an absent value",
        RawOutput::Bytes(_) => "bytes",
        RawOutput::Text(_) => "text",
        RawOutput::Chunks(_) => "a nested collection",
    }
}
