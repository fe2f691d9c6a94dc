use crate::descriptor::{EffectDescriptor, Sampler, SamplerAddress, SamplerFilter};
use crate::error::{BlockError, BlockResult};
use crate::options::{next_option, BlockOption, OptionSet};
use crate::scanner::{Blanks, Cursor};
use crate::strip::META_MARKER;

use super::{
    expect_block_end, expect_identifier, expect_line_end, expect_token, line_value, open_block,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SamplerOption {
    Filter,
    Address,
}

impl BlockOption for SamplerOption {
    const ALL: &'static [Self] = &[Self::Filter, Self::Address];

    fn keyword(self) -> &'static str {
        match self {
            Self::Filter => "FILTER",
            Self::Address => "ADDRESS",
        }
    }
}

pub(crate) fn resolve_sampler(block: &str, desc: &mut EffectDescriptor) -> BlockResult<()> {
    let mut cursor = Cursor::new(block);
    open_block(&mut cursor, "SAMPLER")?;
    expect_line_end(&mut cursor, "//!SAMPLER")?;

    let mut options = OptionSet::new();
    let mut filter = SamplerFilter::Linear;
    let mut address = SamplerAddress::default();

    while cursor.eat(META_MARKER, Blanks::AcrossLines) {
        let option: SamplerOption = next_option(&mut cursor)?;
        options.insert(option)?;
        let value = line_value(&mut cursor, option.keyword())?.to_ascii_uppercase();
        match (option, value.as_str()) {
            (SamplerOption::Filter, "LINEAR") => filter = SamplerFilter::Linear,
            (SamplerOption::Filter, "POINT") => filter = SamplerFilter::Point,
            (SamplerOption::Address, "CLAMP") => address = SamplerAddress::Clamp,
            (SamplerOption::Address, "WRAP") => address = SamplerAddress::Wrap,
            (option, other) => {
                return Err(BlockError::syntax(format!(
                    "invalid {} value '{other}'",
                    option.keyword()
                )))
            }
        }
    }

    options.require(SamplerOption::Filter)?;

    expect_token(&mut cursor, "SamplerState")?;
    let name = expect_identifier(&mut cursor, "sampler name")?.to_string();
    expect_token(&mut cursor, ";")?;
    expect_block_end(&mut cursor)?;

    desc.samplers.push(Sampler {
        name,
        filter,
        address,
    });
    Ok(())
}
