use std::collections::HashMap;

use crate::descriptor::{BlockSize, EffectDescriptor, Pass, MAX_PASS_OUTPUTS};
use crate::error::{BlockError, BlockKind, BlockRef, BlockResult, CompileError};
use crate::options::{next_option, BlockOption, OptionSet};
use crate::scanner::{parse_number, Blanks, Cursor};
use crate::strip::META_MARKER;

use super::{expect_line_end, expression_value, open_block};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassOption {
    In,
    Out,
    BlockSize,
    NumThreads,
}

impl BlockOption for PassOption {
    const ALL: &'static [Self] = &[Self::In, Self::Out, Self::BlockSize, Self::NumThreads];

    fn keyword(self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::BlockSize => "BLOCK_SIZE",
            Self::NumThreads => "NUM_THREADS",
        }
    }
}

/// Reads the `//!PASS n` line of every block and returns the block bodies
/// sorted by pass number. Numbers must form exactly `1..=N`.
pub(crate) fn order_passes<'a>(blocks: &[&'a str]) -> Result<Vec<&'a str>, CompileError> {
    let mut numbered = Vec::with_capacity(blocks.len());
    for (index, block) in blocks.iter().enumerate() {
        let source_ref = BlockRef::new(BlockKind::Pass, index + 1);
        let (number, body) = pass_number(block).map_err(|err| err.in_block(source_ref))?;
        numbered.push((number, index, body));
    }

    numbered.sort_by_key(|(number, _, _)| *number);

    let mut ordered = Vec::with_capacity(numbered.len());
    for (expected, (number, index, body)) in (1..).zip(numbered) {
        if number != expected {
            let message = if number != 0 && number < expected {
                format!("pass number {number} is used more than once")
            } else {
                format!("pass numbers must be contiguous; expected {expected}, found {number}")
            };
            return Err(BlockError::semantic(message)
                .in_block(BlockRef::new(BlockKind::Pass, index + 1)));
        }
        ordered.push(body);
    }
    Ok(ordered)
}

fn pass_number(block: &str) -> BlockResult<(u32, &str)> {
    let mut cursor = Cursor::new(block);
    open_block(&mut cursor, "PASS")?;
    let number = cursor
        .number()
        .ok_or_else(|| BlockError::syntax("PASS requires a pass number"))?;
    expect_line_end(&mut cursor, "the pass number")?;
    Ok((number, cursor.rest()))
}

/// Bindings and dispatch shape of one pass, plus the code that follows its
/// options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PassOptions<'a> {
    pub pass: Pass,
    pub body: &'a str,
}

/// Resolves the options of one ordered pass body. `writes_output` marks the
/// effect's final pass, which writes the reserved output instead of
/// declared textures.
pub(crate) fn resolve_pass<'a>(
    body: &'a str,
    desc: &EffectDescriptor,
    writes_output: bool,
) -> BlockResult<PassOptions<'a>> {
    let mut cursor = Cursor::new(body);
    let mut options = OptionSet::new();
    let mut pass = Pass::default();

    // Names still free to bind in this pass.
    let mut unbound: HashMap<&str, usize> = desc
        .textures
        .iter()
        .enumerate()
        .map(|(index, texture)| (texture.name.as_str(), index))
        .collect();

    while cursor.eat(META_MARKER, Blanks::AcrossLines) {
        let option: PassOption = next_option(&mut cursor)?;
        options.insert(option)?;
        let expr = expression_value(&mut cursor, option.keyword())?;
        match option {
            PassOption::In => pass.inputs = bind_textures(&expr, &mut unbound)?,
            PassOption::Out => {
                if expr.split(',').count() > MAX_PASS_OUTPUTS {
                    return Err(BlockError::semantic(format!(
                        "a pass may write at most {MAX_PASS_OUTPUTS} textures"
                    )));
                }
                pass.outputs = bind_textures(&expr, &mut unbound)?;
            }
            PassOption::BlockSize => {
                let [x, y] = dimensions::<2>(&expr, "BLOCK_SIZE")?;
                pass.block_size = BlockSize { x, y };
            }
            PassOption::NumThreads => pass.num_threads = dimensions::<3>(&expr, "NUM_THREADS")?,
        }
    }

    options.require(PassOption::NumThreads)?;
    options.require(PassOption::BlockSize)?;

    match (writes_output, pass.outputs.is_empty()) {
        (true, false) => {
            return Err(BlockError::semantic(
                "the final pass writes the effect output and may not declare OUT",
            ))
        }
        (false, true) => {
            return Err(BlockError::semantic(
                "every pass except the final one must declare OUT",
            ))
        }
        _ => {}
    }

    Ok(PassOptions {
        pass,
        body: cursor.rest(),
    })
}

fn bind_textures(list: &str, unbound: &mut HashMap<&str, usize>) -> BlockResult<Vec<usize>> {
    list.split(',')
        .map(|name| {
            unbound.remove(name).ok_or_else(|| {
                BlockError::semantic(format!(
                    "texture '{name}' is undeclared or already bound in this pass"
                ))
            })
        })
        .collect()
}

fn dimensions<const N: usize>(expr: &str, option: &str) -> BlockResult<[u32; N]> {
    let invalid = || BlockError::syntax(format!("{option} expects {N} positive integers"));
    let parts: Vec<&str> = expr.split(',').collect();
    if parts.len() != N {
        return Err(invalid());
    }

    let mut values = [0; N];
    for (slot, part) in values.iter_mut().zip(parts) {
        *slot = parse_number::<u32>(part)
            .filter(|value| *value > 0)
            .ok_or_else(invalid)?;
    }
    Ok(values)
}
