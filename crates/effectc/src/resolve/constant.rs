use crate::descriptor::{Constant, ConstantKind, ConstantValue, EffectDescriptor, ValueConstant};
use crate::error::{BlockError, BlockResult};
use crate::options::{next_option, BlockOption, OptionSet};
use crate::scanner::{parse_number, Blanks, Cursor, Numeric};
use crate::strip::META_MARKER;

use super::{
    expect_block_end, expect_identifier, expect_line_end, expect_token, expression_value,
    line_value, open_block,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConstantOption {
    Value,
    Default,
    Label,
    Min,
    Max,
    Dynamic,
}

impl BlockOption for ConstantOption {
    const ALL: &'static [Self] = &[
        Self::Value,
        Self::Default,
        Self::Label,
        Self::Min,
        Self::Max,
        Self::Dynamic,
    ];

    fn keyword(self) -> &'static str {
        match self {
            Self::Value => "VALUE",
            Self::Default => "DEFAULT",
            Self::Label => "LABEL",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Dynamic => "DYNAMIC",
        }
    }

    fn conflicts(self) -> &'static [Self] {
        match self {
            Self::Value => &[Self::Default, Self::Label, Self::Min, Self::Max],
            Self::Dynamic => &[Self::Default, Self::Label, Self::Min, Self::Max],
            _ => &[],
        }
    }
}

/// Raw option values, kept as text until the declared type is known.
#[derive(Debug, Default)]
struct ConstantOptions<'a> {
    value: Option<String>,
    default: Option<&'a str>,
    label: Option<&'a str>,
    min: Option<&'a str>,
    max: Option<&'a str>,
}

pub(crate) fn resolve_constant(block: &str, desc: &mut EffectDescriptor) -> BlockResult<()> {
    let mut cursor = Cursor::new(block);
    open_block(&mut cursor, "CONSTANT")?;
    expect_line_end(&mut cursor, "//!CONSTANT")?;

    let mut options = OptionSet::new();
    let mut raw = ConstantOptions::default();

    while cursor.eat(META_MARKER, Blanks::AcrossLines) {
        let option: ConstantOption = next_option(&mut cursor)?;
        options.insert(option)?;
        match option {
            ConstantOption::Value => raw.value = Some(expression_value(&mut cursor, "VALUE")?),
            ConstantOption::Default => raw.default = Some(line_value(&mut cursor, "DEFAULT")?),
            ConstantOption::Label => raw.label = Some(line_value(&mut cursor, "LABEL")?),
            ConstantOption::Min => raw.min = Some(line_value(&mut cursor, "MIN")?),
            ConstantOption::Max => raw.max = Some(line_value(&mut cursor, "MAX")?),
            ConstantOption::Dynamic => expect_line_end(&mut cursor, "DYNAMIC")?,
        }
    }

    options.requires(ConstantOption::Dynamic, ConstantOption::Value)?;
    options.exactly_one(ConstantOption::Value, ConstantOption::Default)?;

    let kind = match expect_identifier(&mut cursor, "'float' or 'int'")? {
        "float" => ConstantKind::Float,
        "int" => ConstantKind::Int,
        other => {
            return Err(BlockError::syntax(format!(
                "constant type must be 'float' or 'int', found '{other}'"
            )))
        }
    };
    let name = expect_identifier(&mut cursor, "constant name")?.to_string();
    expect_token(&mut cursor, ";")?;
    expect_block_end(&mut cursor)?;

    if let Some(expr) = raw.value {
        let constant = ValueConstant { name, kind, expr };
        if options.contains(ConstantOption::Dynamic) {
            desc.dynamic_value_constants.push(constant);
        } else {
            desc.value_constants.push(constant);
        }
        return Ok(());
    }

    let (default, min, max) = match kind {
        ConstantKind::Float => typed_range::<f32>(&raw, ConstantValue::Float)?,
        ConstantKind::Int => typed_range::<i32>(&raw, ConstantValue::Int)?,
    };
    desc.constants.push(Constant {
        name,
        kind,
        default,
        min,
        max,
        label: raw.label.map(str::to_string),
    });
    Ok(())
}

type Range = (
    Option<ConstantValue>,
    Option<ConstantValue>,
    Option<ConstantValue>,
);

/// Parses DEFAULT/MIN/MAX as `T` and enforces `min <= default <= max`.
fn typed_range<T: Numeric>(
    raw: &ConstantOptions<'_>,
    wrap: fn(T) -> ConstantValue,
) -> BlockResult<Range> {
    let parse = |text: Option<&str>, option: &str| -> BlockResult<Option<ConstantValue>> {
        text.map(|text| {
            parse_number::<T>(text)
                .map(wrap)
                .ok_or_else(|| BlockError::syntax(format!("invalid {option} value '{text}'")))
        })
        .transpose()
    };

    let default = parse(raw.default, "DEFAULT")?;
    let min = parse(raw.min, "MIN")?;
    let max = parse(raw.max, "MAX")?;

    if let (Some(default), Some(min)) = (default, min) {
        if min.exceeds(default) {
            return Err(BlockError::semantic("DEFAULT is below MIN"));
        }
    }
    if let (Some(default), Some(max)) = (default, max) {
        if default.exceeds(max) {
            return Err(BlockError::semantic("DEFAULT is above MAX"));
        }
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min.exceeds(max) {
            return Err(BlockError::semantic("MIN is above MAX"));
        }
    }
    Ok((default, min, max))
}
