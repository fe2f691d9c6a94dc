//! The compiled artifact handed to the rendering layer and persisted by
//! effect caches. Every type here derives serde so a cached descriptor can be
//! restored field-for-field.
//!
//! Types:
//!
//! - `EffectDescriptor` aggregates output size, constants, textures, samplers
//!   and passes in declaration order.
//! - `Constant` / `ValueConstant` describe compile-time tunables and
//!   expression-backed values (static or per-frame).
//! - `IntermediateTexture`, `TextureSource` and `TextureFormat` describe the
//!   image resources an effect declares; index 0 is always `INPUT`.
//! - `Sampler`, `Pass`, `BlockSize` and `Bytecode` cover the remaining
//!   per-pass binding metadata.
use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Name of the reserved texture holding the effect's input image.
pub const INPUT_TEXTURE: &str = "INPUT";

/// Maximum number of textures a single pass may write.
pub const MAX_PASS_OUTPUTS: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectDescriptor {
    #[serde(default)]
    pub output_size: Option<SizeExpr>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub value_constants: Vec<ValueConstant>,
    #[serde(default)]
    pub dynamic_value_constants: Vec<ValueConstant>,
    #[serde(default)]
    pub textures: Vec<IntermediateTexture>,
    #[serde(default)]
    pub samplers: Vec<Sampler>,
    #[serde(default)]
    pub passes: Vec<Pass>,
}

impl EffectDescriptor {
    /// Returns the first identifier declared twice across constants,
    /// value constants, textures and samplers.
    pub fn find_duplicate_identifier(&self) -> Option<&str> {
        let mut names = HashSet::new();
        self.constants
            .iter()
            .map(|c| c.name.as_str())
            .chain(self.value_constants.iter().map(|c| c.name.as_str()))
            .chain(self.dynamic_value_constants.iter().map(|c| c.name.as_str()))
            .chain(self.textures.iter().map(|t| t.name.as_str()))
            .chain(self.samplers.iter().map(|s| s.name.as_str()))
            .find(|name| !names.insert(*name))
    }
}

/// Width/height expression pair, kept verbatim for the runtime to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeExpr {
    pub width: String,
    pub height: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstantKind {
    Int,
    Float,
}

impl ConstantKind {
    pub fn hlsl_type(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::Float => "float",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ConstantValue {
    Int(i32),
    Float(f32),
}

impl ConstantValue {
    fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => f64::from(value),
            Self::Float(value) => f64::from(value),
        }
    }

    pub(crate) fn exceeds(self, other: Self) -> bool {
        self.as_f64() > other.as_f64()
    }
}

/// A tunable whose default and bounds are known at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub kind: ConstantKind,
    #[serde(default)]
    pub default: Option<ConstantValue>,
    #[serde(default)]
    pub min: Option<ConstantValue>,
    #[serde(default)]
    pub max: Option<ConstantValue>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A constant computed from an expression, either once per compile or every
/// frame when it lives in `dynamic_value_constants`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueConstant {
    pub name: String,
    pub kind: ConstantKind,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntermediateTexture {
    pub name: String,
    pub source: TextureSource,
    #[serde(default)]
    pub size: Option<SizeExpr>,
}

impl IntermediateTexture {
    pub fn input() -> Self {
        Self {
            name: INPUT_TEXTURE.to_string(),
            source: TextureSource::Input,
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TextureSource {
    /// The reserved `INPUT` image supplied by the previous effect.
    Input,
    /// A GPU texture allocated with the given format.
    Format { format: TextureFormat },
    /// An image loaded from a file relative to the effect.
    File { path: String },
}

macro_rules! texture_formats {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum TextureFormat {
            $(#[serde(rename = $name)] $variant,)+
        }

        impl TextureFormat {
            pub const ALL: &'static [TextureFormat] = &[$(TextureFormat::$variant,)+];

            pub fn name(self) -> &'static str {
                match self {
                    $(TextureFormat::$variant => $name,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(TextureFormat::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

texture_formats! {
    R8Unorm => "R8_UNORM",
    R16Unorm => "R16_UNORM",
    R16Float => "R16_FLOAT",
    R8G8Unorm => "R8G8_UNORM",
    B5G6R5Unorm => "B5G6R5_UNORM",
    R16G16Unorm => "R16G16_UNORM",
    R16G16Float => "R16G16_FLOAT",
    R8G8B8A8Unorm => "R8G8B8A8_UNORM",
    B8G8R8A8Unorm => "B8G8R8A8_UNORM",
    R10G10B10A2Unorm => "R10G10B10A2_UNORM",
    R32Float => "R32_FLOAT",
    R11G11B10Float => "R11G11B10_FLOAT",
    R32G32Float => "R32G32_FLOAT",
    R16G16B16A16Unorm => "R16G16B16A16_UNORM",
    R16G16B16A16Float => "R16G16B16A16_FLOAT",
    R32G32B32A32Float => "R32G32B32A32_FLOAT",
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerFilter {
    Linear,
    Point,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerAddress {
    #[default]
    Clamp,
    Wrap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sampler {
    pub name: String,
    pub filter: SamplerFilter,
    #[serde(default)]
    pub address: SamplerAddress,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSize {
    pub x: u32,
    pub y: u32,
}

/// Opaque compiled program produced by a [`crate::ShaderBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bytecode(Vec<u8>);

impl Bytecode {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pass {
    /// Indices into [`EffectDescriptor::textures`], bound at `t0..`.
    #[serde(default)]
    pub inputs: Vec<usize>,
    /// Indices into [`EffectDescriptor::textures`], bound at `u0..`. Empty
    /// for the pass that writes the effect's output.
    #[serde(default)]
    pub outputs: Vec<usize>,
    pub block_size: BlockSize,
    pub num_threads: [u32; 3],
    #[serde(default)]
    pub bytecode: Option<Bytecode>,
}
