//! Splitting a command line into pipeline stages.

use super::tokenize::{lex, split_words, unquote, Token, Word};
use super::types::{Command, Pipeline, PipelineStage, Separator};
use crate::error::FleetShellError;
use crate::Result;

/// A token after escape resolution.
enum Item {
    /// Raw word, quoting still in place.
    Word(String),
    /// Text taken verbatim, never unquoted.
    Literal(String),
    /// Unescaped separator: a cut point.
    Cut(Separator),
}

/// Split a command line at `|`, `||`, `&&` and `;` into a [`Pipeline`].
///
/// A stage reads the previous stage's output only when the separator right
/// before it is `|`. A trailing separator is ignored and consecutive
/// separators collapse. `&&` and `||` do not short-circuit.
///
/// A line made of nothing but one separator has no cut points once the
/// trailing one is dropped, so it is word-split as a single stage.
pub fn split_pipeline(line: &str) -> Result<Pipeline> {
    let mut items = resolve_escapes(lex(line)?);

    if matches!(items.last(), Some(Item::Cut(_))) {
        items.pop();
    }
    if items.is_empty() {
        return single_stage(line);
    }

    let mut stages = Vec::new();
    let mut group = Command::default();
    let mut preceding: Option<Separator> = None;

    for item in items {
        match item {
            Item::Word(raw) => group.push(unquote(&raw)?),
            Item::Literal(text) => group.push(Word {
                text,
                references: Vec::new(),
            }),
            Item::Cut(sep) => {
                close_group(&mut stages, &mut group, preceding);
                preceding = Some(sep);
            }
        }
    }
    close_group(&mut stages, &mut group, preceding);

    if stages.is_empty() {
        return Err(FleetShellError::Parse(format!("no command in `{line}`")));
    }

    Ok(Pipeline { stages })
}

fn single_stage(line: &str) -> Result<Pipeline> {
    let command = Command::new(split_words(line)?);
    if command.is_empty() {
        return Err(FleetShellError::Parse(format!("no command in `{line}`")));
    }
    Ok(Pipeline {
        stages: vec![PipelineStage {
            command,
            reads_previous: false,
        }],
    })
}

/// Drop standalone backslashes, turning the glyph each one escapes into a
/// literal word. Escapes left over at end of line are restored verbatim.
fn resolve_escapes(tokens: Vec<Token>) -> Vec<Item> {
    let mut items = Vec::with_capacity(tokens.len());
    let mut escapes = 0usize;

    for token in tokens {
        match token {
            Token::Backslash => escapes += 1,
            Token::Separator(sep) if escapes > 0 => {
                items.push(Item::Literal(sep.as_str().to_string()));
                escapes -= 1;
            }
            Token::Separator(sep) => items.push(Item::Cut(sep)),
            Token::Word(raw) => items.push(Item::Word(raw)),
        }
    }

    items.extend((0..escapes).map(|_| Item::Literal("\\".to_string())));
    items
}

fn close_group(stages: &mut Vec<PipelineStage>, group: &mut Command, preceding: Option<Separator>) {
    if group.is_empty() {
        return;
    }
    let reads_previous = !stages.is_empty() && preceding == Some(Separator::Pipe);
    stages.push(PipelineStage {
        command: std::mem::take(group),
        reads_previous,
    });
}
