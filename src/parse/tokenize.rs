//! Shell-style lexing: words, separator glyphs and standalone escapes.

use std::ops::Range;

use super::types::Separator;
use crate::error::FleetShellError;
use crate::Result;

/// One lexical unit of a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A word with its quoting and escapes still in place.
    Word(String),
    /// An unquoted separator glyph standing on its own.
    Separator(Separator),
    /// A lone backslash in front of a separator glyph or at end of line.
    Backslash,
}

/// Split a command line into tokens, honoring single quotes, double quotes
/// and backslash escapes.
///
/// Separator glyphs outside quotes always cut the current word. A backslash
/// that starts a word and is followed by a free-standing glyph (`echo \| x`)
/// is emitted as [`Token::Backslash`] so the splitter can decide whether the
/// glyph is a cut point; anywhere else a backslash stays inside the word.
pub fn lex(line: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = line.chars().collect();
    let len = chars.len();
    let mut tokens = Vec::new();
    let mut buf = String::new();
    let mut started = false;
    let mut i = 0;

    while i < len {
        let c = chars[i];

        if c.is_whitespace() {
            flush(&mut tokens, &mut buf, &mut started);
            i += 1;
            continue;
        }

        // An unquoted `#` at the start of a word comments out the rest.
        if c == '#' && !started {
            break;
        }

        if c == '\'' {
            started = true;
            buf.push(c);
            i += 1;
            loop {
                let Some(&ic) = chars.get(i) else {
                    return Err(unterminated('\'', line));
                };
                buf.push(ic);
                i += 1;
                if ic == '\'' {
                    break;
                }
            }
            continue;
        }

        if c == '"' {
            started = true;
            buf.push(c);
            i += 1;
            loop {
                let Some(&ic) = chars.get(i) else {
                    return Err(unterminated('"', line));
                };
                buf.push(ic);
                i += 1;
                if ic == '\\' {
                    if let Some(&next) = chars.get(i) {
                        buf.push(next);
                        i += 1;
                    }
                    continue;
                }
                if ic == '"' {
                    break;
                }
            }
            continue;
        }

        if c == '\\' {
            match chars.get(i + 1) {
                None => {
                    flush(&mut tokens, &mut buf, &mut started);
                    tokens.push(Token::Backslash);
                    i += 1;
                }
                Some(_) if !started && free_standing_glyph(&chars, i + 1).is_some() => {
                    tokens.push(Token::Backslash);
                    i += 1;
                }
                Some(&next) => {
                    started = true;
                    buf.push(c);
                    buf.push(next);
                    i += 2;
                }
            }
            continue;
        }

        if let Some((sep, width)) = glyph_at(&chars, i) {
            flush(&mut tokens, &mut buf, &mut started);
            tokens.push(Token::Separator(sep));
            i += width;
            continue;
        }

        started = true;
        buf.push(c);
        i += 1;
    }

    flush(&mut tokens, &mut buf, &mut started);
    Ok(tokens)
}

/// Plain POSIX word splitting with quote removal, no separator handling.
pub fn split_words(line: &str) -> Result<Vec<String>> {
    shlex::split(line).ok_or_else(|| FleetShellError::Parse(format!("cannot split `{line}`")))
}

/// A word after quote removal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    pub text: String,
    /// Unescaped `$NAME` / `${NAME}` references outside single quotes, in
    /// order of appearance.
    pub references: Vec<Reference>,
}

/// A variable reference and the byte range it occupies in [`Word::text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub name: String,
    pub span: Range<usize>,
}

/// Remove quoting and escapes from a single raw word produced by [`lex`],
/// recording where each substitutable reference ends up.
///
/// Single quotes keep everything literal. Inside double quotes a backslash
/// only escapes `$`, `` ` ``, `"`, `\\` and newline.
pub fn unquote(raw: &str) -> Result<Word> {
    let chars: Vec<char> = raw.chars().collect();
    let mut word = Word::default();
    let mut quote: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match (quote, c) {
            (Some('\''), '\'') | (Some('"'), '"') => quote = None,
            (Some('\''), _) => word.text.push(c),
            (None, '\'') | (None, '"') => quote = Some(c),
            (None, '\\') => match chars.get(i) {
                Some(&next) => {
                    word.text.push(next);
                    i += 1;
                }
                None => word.text.push('\\'),
            },
            (Some(_), '\\') => match chars.get(i) {
                Some(&next) if matches!(next, '$' | '`' | '"' | '\\' | '\n') => {
                    word.text.push(next);
                    i += 1;
                }
                _ => word.text.push('\\'),
            },
            (_, '$') => {
                let start = word.text.len();
                word.text.push('$');
                if let Some((name, next)) = reference_at(&chars, i) {
                    chars[i..next].iter().for_each(|&ch| word.text.push(ch));
                    i = next;
                    word.references.push(Reference {
                        name,
                        span: start..word.text.len(),
                    });
                }
            }
            _ => word.text.push(c),
        }
    }

    match quote {
        Some(q) => Err(unterminated(q, raw)),
        None => Ok(word),
    }
}

/// Parse a reference name starting right after a `$` at `i`. Returns the
/// name and the index just past the reference.
fn reference_at(chars: &[char], i: usize) -> Option<(String, usize)> {
    let braced = chars.get(i) == Some(&'{');
    let start = if braced { i + 1 } else { i };
    let mut end = start;
    while end < chars.len() && is_name_char(chars[end], end == start) {
        end += 1;
    }
    if end == start {
        return None;
    }
    let name = chars[start..end].iter().collect();
    if !braced {
        return Some((name, end));
    }
    (chars.get(end) == Some(&'}')).then_some((name, end + 1))
}

fn is_name_char(c: char, first: bool) -> bool {
    c == '_' || c.is_ascii_alphabetic() || (!first && c.is_ascii_digit())
}

fn flush(tokens: &mut Vec<Token>, buf: &mut String, started: &mut bool) {
    if *started {
        tokens.push(Token::Word(std::mem::take(buf)));
        *started = false;
    }
}

fn glyph_at(chars: &[char], i: usize) -> Option<(Separator, usize)> {
    match (chars.get(i), chars.get(i + 1)) {
        (Some('|'), Some('|')) => Some((Separator::Or, 2)),
        (Some('&'), Some('&')) => Some((Separator::And, 2)),
        (Some('|'), _) => Some((Separator::Pipe, 1)),
        (Some(';'), _) => Some((Separator::Semi, 1)),
        _ => None,
    }
}

/// A glyph at `i` that is followed by whitespace or end of line.
fn free_standing_glyph(chars: &[char], i: usize) -> Option<Separator> {
    let (sep, width) = glyph_at(chars, i)?;
    match chars.get(i + width) {
        None => Some(sep),
        Some(c) if c.is_whitespace() => Some(sep),
        Some(_) => None,
    }
}

fn unterminated(quote: char, line: &str) -> FleetShellError {
    FleetShellError::Parse(format!("no closing quotation ({quote}) in `{line}`"))
}
