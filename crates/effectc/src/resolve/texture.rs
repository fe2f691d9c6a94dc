use crate::descriptor::{
    EffectDescriptor, IntermediateTexture, SizeExpr, TextureFormat, TextureSource, INPUT_TEXTURE,
};
use crate::error::{BlockError, BlockResult};
use crate::options::{next_option, BlockOption, OptionSet};
use crate::scanner::{Blanks, Cursor};
use crate::strip::META_MARKER;

use super::{
    expect_block_end, expect_identifier, expect_line_end, expect_token, expression_value,
    line_value, open_block,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextureOption {
    Source,
    Format,
    Width,
    Height,
}

impl BlockOption for TextureOption {
    const ALL: &'static [Self] = &[Self::Source, Self::Format, Self::Width, Self::Height];

    fn keyword(self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Format => "FORMAT",
            Self::Width => "WIDTH",
            Self::Height => "HEIGHT",
        }
    }

    fn conflicts(self) -> &'static [Self] {
        match self {
            Self::Source => &[Self::Format, Self::Width, Self::Height],
            _ => &[],
        }
    }
}

/// Resolves one TEXTURE block. Redeclaring `INPUT` adds nothing, since the
/// input texture is always present, and may not set a format or size.
pub(crate) fn resolve_texture(block: &str, desc: &mut EffectDescriptor) -> BlockResult<()> {
    let mut cursor = Cursor::new(block);
    open_block(&mut cursor, "TEXTURE")?;
    expect_line_end(&mut cursor, "//!TEXTURE")?;

    let mut options = OptionSet::new();
    let mut source = None;
    let mut format = None;
    let mut width = None;
    let mut height = None;

    while cursor.eat(META_MARKER, Blanks::AcrossLines) {
        let option: TextureOption = next_option(&mut cursor)?;
        options.insert(option)?;
        match option {
            TextureOption::Source => source = Some(line_value(&mut cursor, "SOURCE")?),
            TextureOption::Format => {
                let name = line_value(&mut cursor, "FORMAT")?;
                let parsed = TextureFormat::from_name(name).ok_or_else(|| {
                    BlockError::syntax(format!("unknown texture format '{name}'"))
                })?;
                format = Some(parsed);
            }
            TextureOption::Width => width = Some(expression_value(&mut cursor, "WIDTH")?),
            TextureOption::Height => height = Some(expression_value(&mut cursor, "HEIGHT")?),
        }
    }

    options.both_or_neither(TextureOption::Width, TextureOption::Height)?;

    expect_token(&mut cursor, "Texture2D")?;
    let name = expect_identifier(&mut cursor, "texture name")?;
    expect_token(&mut cursor, ";")?;
    expect_block_end(&mut cursor)?;

    if name == INPUT_TEXTURE {
        let shaped = [TextureOption::Format, TextureOption::Width, TextureOption::Height]
            .into_iter()
            .any(|option| options.contains(option));
        if shaped {
            return Err(BlockError::syntax(
                "INPUT texture may not set FORMAT, WIDTH or HEIGHT",
            ));
        }
        return Ok(());
    }

    options.exactly_one(TextureOption::Source, TextureOption::Format)?;

    let source = match (source, format) {
        (Some(path), _) => TextureSource::File {
            path: path.to_string(),
        },
        (None, Some(format)) => TextureSource::Format { format },
        (None, None) => return Err(BlockError::syntax("texture needs SOURCE or FORMAT")),
    };
    desc.textures.push(IntermediateTexture {
        name: name.to_string(),
        source,
        size: width
            .zip(height)
            .map(|(width, height)| SizeExpr { width, height }),
    });
    Ok(())
}
