//! Error taxonomy shared by every compile stage. Block resolvers report a
//! lightweight `BlockError` that the orchestrator lifts into `CompileError`
//! once it knows which block (kind and ordinal) produced it, so authors see
//! diagnostics such as `CONSTANT block #2: MIN conflicts with VALUE`.
//!
//! Types:
//!
//! - `CompileError` is the single failure outcome returned to callers.
//! - `BlockKind` and `BlockRef` name the offending block.
//! - `BlockError` classifies resolver failures as structural or semantic.
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to read effect source {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("effect source is empty")]
    EmptySource,

    #[error("unterminated block comment")]
    UnterminatedComment,

    #[error("malformed effect header: {0}")]
    MalformedHeader(String),

    #[error("effect declares no PASS block")]
    MissingPassBlock,

    #[error("line {line}: directive marker is not followed by a keyword")]
    MalformedDirective { line: usize },

    #[error("{block}: {message}")]
    Syntax { block: BlockRef, message: String },

    #[error("{block}: {message}")]
    Semantic { block: BlockRef, message: String },

    #[error("duplicate identifier '{0}'")]
    DuplicateIdentifier(String),

    #[error("failed to compile Pass{pass}: {message}")]
    ShaderCompile { pass: usize, message: String },
}

impl CompileError {
    /// Header failures are reported before any block is resolved, letting
    /// callers reject a file that is not an effect at all.
    pub fn is_malformed_header(&self) -> bool {
        matches!(self, Self::MalformedHeader(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Header,
    Constant,
    Texture,
    Sampler,
    Common,
    Pass,
}

impl BlockKind {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Header => "HEADER",
            Self::Constant => "CONSTANT",
            Self::Texture => "TEXTURE",
            Self::Sampler => "SAMPLER",
            Self::Common => "COMMON",
            Self::Pass => "PASS",
        }
    }

    /// Maps an upper-cased directive keyword to the block it opens.
    pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "CONSTANT" => Some(Self::Constant),
            "TEXTURE" => Some(Self::Texture),
            "SAMPLER" => Some(Self::Sampler),
            "COMMON" => Some(Self::Common),
            "PASS" => Some(Self::Pass),
            _ => None,
        }
    }
}

/// Identifies a block by kind and 1-based ordinal within that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    pub kind: BlockKind,
    pub ordinal: usize,
}

impl BlockRef {
    pub fn new(kind: BlockKind, ordinal: usize) -> Self {
        Self { kind, ordinal }
    }

    pub fn header() -> Self {
        Self::new(BlockKind::Header, 1)
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            BlockKind::Header => f.write_str("HEADER block"),
            kind => write!(f, "{} block #{}", kind.keyword(), self.ordinal),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BlockError {
    /// Missing, duplicate, conflicting or malformed option or code token.
    Syntax(String),
    /// Well-formed input that violates a declaration rule.
    Semantic(String),
}

impl BlockError {
    pub(crate) fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax(message.into())
    }

    pub(crate) fn semantic(message: impl Into<String>) -> Self {
        Self::Semantic(message.into())
    }

    pub(crate) fn in_block(self, block: BlockRef) -> CompileError {
        match self {
            Self::Syntax(message) => CompileError::Syntax { block, message },
            Self::Semantic(message) => CompileError::Semantic { block, message },
        }
    }
}

pub(crate) type BlockResult<T> = Result<T, BlockError>;
