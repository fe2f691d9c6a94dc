use crate::descriptor::{EffectDescriptor, SizeExpr};
use crate::error::{BlockError, BlockRef, BlockResult, CompileError};
use crate::options::{next_option, BlockOption, OptionSet};
use crate::scanner::{Blanks, Cursor};
use crate::strip::META_MARKER;

use super::{expect_line_end, expression_value};

/// Effect language version this compiler accepts.
pub(crate) const EFFECT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderOption {
    Version,
    OutputWidth,
    OutputHeight,
}

impl BlockOption for HeaderOption {
    const ALL: &'static [Self] = &[Self::Version, Self::OutputWidth, Self::OutputHeight];

    fn keyword(self) -> &'static str {
        match self {
            Self::Version => "VERSION",
            Self::OutputWidth => "OUTPUT_WIDTH",
            Self::OutputHeight => "OUTPUT_HEIGHT",
        }
    }
}

/// Resolves the implicit header block. A version other than
/// [`EFFECT_VERSION`] is reported as a malformed header.
pub(crate) fn resolve_header(block: &str, desc: &mut EffectDescriptor) -> Result<(), CompileError> {
    let (version, output_size) =
        parse_header(block).map_err(|err| err.in_block(BlockRef::header()))?;
    if version != EFFECT_VERSION {
        return Err(CompileError::MalformedHeader(format!(
            "unsupported effect version {version}; expected {EFFECT_VERSION}"
        )));
    }
    desc.output_size = output_size;
    Ok(())
}

fn parse_header(block: &str) -> BlockResult<(u32, Option<SizeExpr>)> {
    let mut cursor = Cursor::new(block);
    let mut options = OptionSet::new();
    let mut version = 0;
    let mut width = None;
    let mut height = None;

    while cursor.eat(META_MARKER, Blanks::AcrossLines) {
        let option: HeaderOption = next_option(&mut cursor)?;
        options.insert(option)?;
        match option {
            HeaderOption::Version => {
                version = cursor
                    .number()
                    .ok_or_else(|| BlockError::syntax("VERSION requires an integer"))?;
                expect_line_end(&mut cursor, "VERSION")?;
            }
            HeaderOption::OutputWidth => {
                width = Some(expression_value(&mut cursor, option.keyword())?);
            }
            HeaderOption::OutputHeight => {
                height = Some(expression_value(&mut cursor, option.keyword())?);
            }
        }
    }

    if !cursor.at_end() {
        return Err(BlockError::syntax("header may only contain directives"));
    }
    options.require(HeaderOption::Version)?;
    options.both_or_neither(HeaderOption::OutputWidth, HeaderOption::OutputHeight)?;

    let output_size = width
        .zip(height)
        .map(|(width, height)| SizeExpr { width, height });
    Ok((version, output_size))
}
