//! Shell-style command line parsing.
//!
//! - [`tokenize`] lexes a line into words, separator glyphs and escapes.
//! - [`pipeline`] walks the tokens and builds a [`Pipeline`] of stages.

pub mod pipeline;
pub mod tokenize;
pub mod types;

pub use pipeline::split_pipeline;
pub use tokenize::{lex, split_words, Token};
pub use types::{Command, Pipeline, PipelineStage, Separator};
