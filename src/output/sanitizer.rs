//! Stripping of terminal control sequences from interactive shell output.

use vte::{Params, Parser, Perform};

/// Removes ANSI/VT escape sequences and carriage returns that a remote
/// pseudo-terminal interleaves with command output.
pub struct TerminalSanitizer;

impl TerminalSanitizer {
    /// Strip control sequences from raw bytes.
    ///
    /// Invalid UTF-8 is dropped rather than replaced. `\r\n` collapses to `\n`.
    pub fn strip(input: &[u8]) -> Vec<u8> {
        let mut extractor = PlainTextExtractor::new();
        let mut parser = Parser::new();

        parser.advance(&mut extractor, input);

        extractor.output
    }
}

/// VTE performer that keeps printable text, newlines and tabs.
struct PlainTextExtractor {
    output: Vec<u8>,
}

impl PlainTextExtractor {
    fn new() -> Self {
        Self { output: Vec::new() }
    }
}

impl Perform for PlainTextExtractor {
    fn print(&mut self, c: char) {
        if c == char::REPLACEMENT_CHARACTER {
            return;
        }
        let mut buf = [0u8; 4];
        let encoded = c.encode_utf8(&mut buf);
        self.output.extend_from_slice(encoded.as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x0A | 0x09 => self.output.push(byte),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(
        &mut self,
        _params: &Params,
        _intermediates: &[u8],
        _ignore: bool,
        _action: char,
    ) {
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text() {
        assert_eq!(TerminalSanitizer::strip(b"hello world"), b"hello world");
    }

    #[test]
    fn test_strip_color_codes() {
        assert_eq!(TerminalSanitizer::strip(b"\x1b[31mred\x1b[0m"), b"red");
    }

    #[test]
    fn test_crlf_collapses() {
        assert_eq!(TerminalSanitizer::strip(b"line1\r\nline2\r\n"), b"line1\nline2\n");
    }

    #[test]
    fn test_osc_title() {
        let input = b"\x1b]0;user@db01: ~\x07[user@db01 ~]$ ";
        assert_eq!(TerminalSanitizer::strip(input), b"[user@db01 ~]$ ");
    }

    #[test]
    fn test_bracketed_paste_toggles_removed() {
        let input = b"\x1b[?2004hecho hi\r\n\x1b[?2004lhi\r\n";
        assert_eq!(TerminalSanitizer::strip(input), b"echo hi\nhi\n");
    }

    #[test]
    fn test_preserve_tabs() {
        assert_eq!(TerminalSanitizer::strip(b"col1\tcol2"), b"col1\tcol2");
    }

    #[test]
    fn test_only_escape_codes() {
        assert!(TerminalSanitizer::strip(b"\x1b[31m\x1b[0m\x1b[2J").is_empty());
    }
}
