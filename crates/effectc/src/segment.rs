//! Splits stripped effect source into top-level blocks.
//!
//! Functions:
//!
//! - `check_magic` verifies the `//!MAGPIE EFFECT` tag and returns the text
//!   following it on the same line.
//! - `segment` scans line starts for block directives and groups the
//!   resulting spans by kind, in source order.
use crate::error::{BlockKind, CompileError};
use crate::scanner::{Blanks, Cursor, Token};
use crate::strip::META_MARKER;

/// Block spans borrowed from the stripped source. Each non-header span starts
/// at its own directive line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Blocks<'a> {
    pub header: &'a str,
    pub constants: Vec<&'a str>,
    pub textures: Vec<&'a str>,
    pub samplers: Vec<&'a str>,
    pub commons: Vec<&'a str>,
    pub passes: Vec<&'a str>,
}

impl<'a> Blocks<'a> {
    fn push(&mut self, kind: BlockKind, span: &'a str) {
        match kind {
            BlockKind::Header => self.header = span,
            BlockKind::Constant => self.constants.push(span),
            BlockKind::Texture => self.textures.push(span),
            BlockKind::Sampler => self.samplers.push(span),
            BlockKind::Common => self.commons.push(span),
            BlockKind::Pass => self.passes.push(span),
        }
    }
}

/// Checks the magic tag that must open every effect and returns the rest of
/// the source, starting at the end of the tag line.
pub fn check_magic(source: &str) -> Result<&str, CompileError> {
    let mut cursor = Cursor::new(source);
    if !cursor.eat(META_MARKER, Blanks::AcrossLines) {
        return Err(CompileError::MalformedHeader(
            "source does not start with a directive".into(),
        ));
    }
    if !cursor.eat("MAGPIE", Blanks::Inline) || !cursor.eat("EFFECT", Blanks::Inline) {
        return Err(CompileError::MalformedHeader(
            "expected //!MAGPIE EFFECT".into(),
        ));
    }
    if !cursor.at_line_end() || cursor.rest().is_empty() {
        return Err(CompileError::MalformedHeader(
            "unexpected content after //!MAGPIE EFFECT".into(),
        ));
    }
    Ok(cursor.rest())
}

/// Partitions `body` into the implicit header block and the directive blocks
/// that follow it. `first_line` is the 1-based line number of `body`'s first
/// line, used for diagnostics.
pub fn segment(body: &str, first_line: usize) -> Result<Blocks<'_>, CompileError> {
    let mut blocks = Blocks::default();
    let mut current = BlockKind::Header;
    let mut block_start = 0;
    let mut line_start = 0;

    for (index, line) in body.split_inclusive('\n').enumerate() {
        if let Some(kind) = block_directive(line, first_line + index)? {
            blocks.push(current, &body[block_start..line_start]);
            current = kind;
            block_start = line_start;
        }
        line_start += line.len();
    }
    blocks.push(current, &body[block_start..]);

    if blocks.passes.is_empty() {
        return Err(CompileError::MissingPassBlock);
    }
    Ok(blocks)
}

fn block_directive(line: &str, line_number: usize) -> Result<Option<BlockKind>, CompileError> {
    let mut cursor = Cursor::new(line);
    if !cursor.eat(META_MARKER, Blanks::Inline) {
        return Ok(None);
    }
    match cursor.identifier(Blanks::Inline) {
        Token::Ident(keyword) => Ok(BlockKind::from_keyword(&keyword.to_ascii_uppercase())),
        _ => Err(CompileError::MalformedDirective { line: line_number }),
    }
}
