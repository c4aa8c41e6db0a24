//! Output processing.
//!
//! - [`normalize`] merges raw byte or string output into one trimmed string.
//! - [`TerminalSanitizer`] strips terminal control sequences from interactive
//!   remote shell output before it is normalized.
//!
//! # Example
//!
//! ```
//! use fleet_shell::output::{normalize, RawOutput};
//!
//! let chunks = vec![RawOutput::from(&b"hello "[..]), RawOutput::from(&b"world\n"[..])];
//! assert_eq!(normalize(chunks).unwrap(), "hello world");
//! ```

mod normalize;
mod sanitizer;

pub use normalize::{decode_utf8, normalize, RawOutput};
pub use sanitizer::TerminalSanitizer;
