//! Per-block grammars. Each resolver consumes one block span produced by
//! `segment` and merges what it declares into the shared
//! `EffectDescriptor`; the orchestrator runs them in a fixed order and tags
//! their errors with the block they came from.
mod common;
mod constant;
mod header;
mod pass;
mod sampler;
mod texture;

pub(crate) use common::resolve_common;
pub(crate) use constant::resolve_constant;
pub(crate) use header::{resolve_header, EFFECT_VERSION};
pub(crate) use pass::{order_passes, resolve_pass};
pub(crate) use sampler::resolve_sampler;
pub(crate) use texture::resolve_texture;

use crate::error::{BlockError, BlockResult};
use crate::scanner::{Blanks, Cursor, Token};
use crate::strip::META_MARKER;

/// Consumes the `//!KEYWORD` line that opens a block. The keyword itself is
/// matched case-insensitively, mirroring block segmentation.
fn open_block(cursor: &mut Cursor<'_>, keyword: &str) -> BlockResult<()> {
    if !cursor.eat(META_MARKER, Blanks::AcrossLines) {
        return Err(BlockError::syntax(format!("expected //!{keyword}")));
    }
    match cursor.identifier(Blanks::Inline) {
        Token::Ident(token) if token.eq_ignore_ascii_case(keyword) => Ok(()),
        _ => Err(BlockError::syntax(format!("expected //!{keyword}"))),
    }
}

fn expect_line_end(cursor: &mut Cursor<'_>, context: &str) -> BlockResult<()> {
    if cursor.at_line_end() {
        Ok(())
    } else {
        Err(BlockError::syntax(format!("unexpected content after {context}")))
    }
}

fn expect_block_end(cursor: &mut Cursor<'_>) -> BlockResult<()> {
    if cursor.at_end() {
        Ok(())
    } else {
        Err(BlockError::syntax("unexpected content after declaration"))
    }
}

/// Consumes a literal code token such as `Texture2D` or `;`.
fn expect_token(cursor: &mut Cursor<'_>, token: &str) -> BlockResult<()> {
    if cursor.eat(token, Blanks::AcrossLines) {
        Ok(())
    } else {
        Err(BlockError::syntax(format!("expected '{token}'")))
    }
}

fn expect_identifier<'a>(cursor: &mut Cursor<'a>, what: &str) -> BlockResult<&'a str> {
    match cursor.identifier(Blanks::AcrossLines) {
        Token::Ident(name) => Ok(name),
        _ => Err(BlockError::syntax(format!("expected {what}"))),
    }
}

fn line_value<'a>(cursor: &mut Cursor<'a>, option: &str) -> BlockResult<&'a str> {
    cursor
        .line()
        .ok_or_else(|| BlockError::syntax(format!("option {option} requires a value")))
}

fn expression_value(cursor: &mut Cursor<'_>, option: &str) -> BlockResult<String> {
    cursor
        .expression()
        .ok_or_else(|| BlockError::syntax(format!("option {option} requires an expression")))
}
