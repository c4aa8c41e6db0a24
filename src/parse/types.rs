//! Types produced by the pipeline splitter and consumed by the executors.

use std::collections::HashMap;

use super::tokenize::{Reference, Word};

/// Glyph separating consecutive stages of a command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `|`: next stage reads this stage's output
    Pipe,
    /// `||`
    Or,
    /// `&&`
    And,
    /// `;`
    Semi,
}

impl Separator {
    /// The separator's shell syntax.
    pub fn as_str(&self) -> &'static str {
        match self {
            Separator::Pipe => "|",
            Separator::Or => "||",
            Separator::And => "&&",
            Separator::Semi => ";",
        }
    }
}

/// A program or builtin name followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Command {
    args: Vec<String>,
    /// Substitutable references of each word, parallel to `args`.
    references: Vec<Vec<Reference>>,
}

impl Command {
    /// Build a command from already unquoted words with no variable references.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let references = vec![Vec::new(); args.len()];
        Self { args, references }
    }

    pub(crate) fn push(&mut self, word: Word) {
        self.args.push(word.text);
        self.references.push(word.references);
    }

    /// All words, program first.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The program or builtin name.
    pub fn program(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Substitute the first unescaped `$NAME` reference whose name is in
    /// `env`. Only the first qualifying word is touched.
    pub fn expand_first(&self, env: &HashMap<String, String>) -> Command {
        let mut expanded = self.clone();
        let found = self.references.iter().enumerate().find_map(|(i, refs)| {
            refs.iter()
                .find_map(|r| env.get(&r.name).map(|value| (i, r, value)))
        });
        if let Some((i, reference, value)) = found {
            expanded.args[i].replace_range(reference.span.clone(), value);
            expanded.references[i].clear();
        }
        expanded
    }
}

/// One runnable command within a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStage {
    pub command: Command,
    /// Input is chained from the previous stage's output.
    pub reads_previous: bool,
}

impl PipelineStage {
    pub fn args(&self) -> &[String] {
        self.command.args()
    }
}

/// Ordered stages derived from one command line. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pipeline {
    pub stages: Vec<PipelineStage>,
}

impl Pipeline {
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineStage> {
        self.stages.iter()
    }
}
