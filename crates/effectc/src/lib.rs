//! Compiler for MagpieFX effect sources.
//!
//! An effect is HLSL annotated with `//!` directives. The crate turns one
//! effect file into an `EffectDescriptor`: declared constants, textures and
//! samplers plus one compiled compute shader per pass. The flow is:
//!
//! ```text
//!   source ──▶ strip_comments ──▶ cache lookup ──hit──▶ descriptor
//!                                     │ miss
//!                                     ▼
//!   check_magic ──▶ segment ──▶ HEADER / CONSTANT / TEXTURE / SAMPLER / COMMON
//!                                     │
//!                                     ▼
//!   order_passes ──▶ resolve_pass + codegen ──▶ ShaderBackend (parallel)
//!                                     │
//!                                     ▼
//!                          cache save ──▶ descriptor
//! ```
//!
//! Parsing and generation are single-threaded; only the backend compile of
//! the generated passes fans out to worker threads. Shader compilation,
//! include lookup, hashing and caching are collaborators behind traits so
//! embedders can plug in a native HLSL compiler or their own cache store.
mod codegen;
mod compiler;
mod options;
mod resolve;
mod workers;

pub mod backend;
pub mod cache;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod scanner;
pub mod segment;
pub mod strip;

pub use backend::{
    DirectoryIncludes, IncludeResolver, NoIncludes, PreprocessBackend, ShaderBackend,
};
pub use cache::{DirectoryCache, EffectCache, MemoryCache, CACHE_FORMAT_VERSION};
pub use codegen::ENTRY_POINT;
pub use compiler::{generate, CompileFlags, EffectCompiler, GeneratedEffect};
pub use descriptor::{
    BlockSize, Bytecode, Constant, ConstantKind, ConstantValue, EffectDescriptor,
    IntermediateTexture, Pass, Sampler, SamplerAddress, SamplerFilter, SizeExpr, TextureFormat,
    TextureSource, ValueConstant, INPUT_TEXTURE, MAX_PASS_OUTPUTS,
};
pub use error::{BlockKind, BlockRef, CompileError};
pub use hash::{ContentHasher, Xxh3Hasher};

/// Effect language version accepted by this compiler.
pub const EFFECT_VERSION: u32 = resolve::EFFECT_VERSION;
