//! Compile orchestration: source text in, `EffectDescriptor` with per-pass
//! bytecode out.
//!
//! Types:
//!
//! - `EffectCompiler` owns the collaborators (backend, includes, cache,
//!   hasher) and the worker budget.
//! - `CompileFlags` selects terminal-effect code generation.
//! - `GeneratedEffect` is the front-end result before bytecode exists.
//!
//! Functions:
//!
//! - `generate` runs parsing and code generation only.
//! - `EffectCompiler::compile_file` / `compile_source` add the cache lookup,
//!   the parallel shader compile and the cache write.
use std::fs;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use crate::backend::{IncludeResolver, NoIncludes, ShaderBackend};
use crate::cache::EffectCache;
use crate::codegen::{pass_source, resource_prologue, PassPosition};
use crate::descriptor::{EffectDescriptor, IntermediateTexture};
use crate::error::{BlockKind, BlockRef, CompileError};
use crate::hash::{ContentHasher, Xxh3Hasher};
use crate::resolve::{
    order_passes, resolve_common, resolve_constant, resolve_header, resolve_pass,
    resolve_sampler, resolve_texture,
};
use crate::segment::{check_magic, segment};
use crate::strip::strip_comments;
use crate::workers::{compile_all, CompileJob};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileFlags {
    /// The effect is the last in its chain: its final pass composites the
    /// cursor and honours the viewport offset.
    pub terminal_effect: bool,
}

impl CompileFlags {
    pub fn terminal() -> Self {
        Self {
            terminal_effect: true,
        }
    }
}

/// Descriptor plus the generated HLSL of every pass, in pass order.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEffect {
    pub descriptor: EffectDescriptor,
    pub sources: Vec<String>,
}

/// Parses `source` and generates every pass without compiling it.
pub fn generate(source: &str, flags: CompileFlags) -> Result<GeneratedEffect, CompileError> {
    let stripped = prepare(source)?;
    build(&stripped, flags)
}

pub struct EffectCompiler {
    backend: Arc<dyn ShaderBackend>,
    includes: Arc<dyn IncludeResolver>,
    cache: Option<Arc<dyn EffectCache>>,
    hasher: Arc<dyn ContentHasher>,
    workers: usize,
}

impl EffectCompiler {
    pub fn new(backend: Arc<dyn ShaderBackend>) -> Self {
        Self {
            backend,
            includes: Arc::new(NoIncludes),
            cache: None,
            hasher: Arc::new(Xxh3Hasher),
            workers: 0,
        }
    }

    pub fn with_includes(mut self, includes: Arc<dyn IncludeResolver>) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn EffectCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_hasher(mut self, hasher: Arc<dyn ContentHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Caps the compile worker threads. Zero uses the available parallelism.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Reads and compiles the effect at `path`, using the path as its cache
    /// identity.
    pub fn compile_file(
        &self,
        path: &Path,
        flags: CompileFlags,
    ) -> Result<EffectDescriptor, CompileError> {
        let source = fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.compile_source(&path.to_string_lossy(), &source, flags)
    }

    pub fn compile_source(
        &self,
        identity: &str,
        source: &str,
        flags: CompileFlags,
    ) -> Result<EffectDescriptor, CompileError> {
        let stripped = prepare(source)?;
        let digest = self.cache_digest(&stripped, flags);

        if let Some(cache) = &self.cache {
            if let Some(descriptor) = cache.load(identity, &digest) {
                debug!(identity, digest = %digest, "effect cache hit");
                return Ok(descriptor);
            }
            debug!(identity, digest = %digest, "effect cache miss");
        }

        let GeneratedEffect {
            mut descriptor,
            sources,
        } = build(&stripped, flags)?;

        let jobs: Vec<CompileJob<'_>> = sources
            .iter()
            .enumerate()
            .map(|(index, source)| CompileJob {
                label: format!("Pass{}", index + 1),
                source,
            })
            .collect();
        let results = compile_all(
            &jobs,
            self.backend.as_ref(),
            self.includes.as_ref(),
            self.worker_count(),
        );

        let mut failure = None;
        for (index, (pass, result)) in descriptor.passes.iter_mut().zip(results).enumerate() {
            match result {
                Ok(bytecode) => pass.bytecode = Some(bytecode),
                Err(message) => {
                    error!(identity, pass = index + 1, %message, "pass failed to compile");
                    if failure.is_none() {
                        failure = Some(CompileError::ShaderCompile {
                            pass: index + 1,
                            message,
                        });
                    }
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        if let Some(cache) = &self.cache {
            cache.save(identity, &digest, &descriptor);
        }
        info!(identity, passes = descriptor.passes.len(), "compiled effect");
        Ok(descriptor)
    }

    /// Generated code depends on the terminal flag, so it is part of the key.
    fn cache_digest(&self, stripped: &str, flags: CompileFlags) -> String {
        let digest = self.hasher.digest(stripped.as_bytes());
        if flags.terminal_effect {
            format!("{digest}-t")
        } else {
            digest
        }
    }

    fn worker_count(&self) -> usize {
        if self.workers > 0 {
            return self.workers;
        }
        thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    }
}

fn prepare(source: &str) -> Result<String, CompileError> {
    if source.is_empty() {
        return Err(CompileError::EmptySource);
    }
    let stripped = strip_comments(source)?;
    if stripped.trim().is_empty() {
        return Err(CompileError::EmptySource);
    }
    Ok(stripped)
}

fn build(stripped: &str, flags: CompileFlags) -> Result<GeneratedEffect, CompileError> {
    let body = check_magic(stripped)?;
    let consumed = &stripped[..stripped.len() - body.len()];
    let blocks = segment(body, consumed.matches('\n').count() + 1)?;

    let mut desc = EffectDescriptor::default();
    resolve_header(blocks.header, &mut desc)?;

    for (index, block) in blocks.constants.iter().enumerate() {
        resolve_constant(block, &mut desc)
            .map_err(|err| err.in_block(BlockRef::new(BlockKind::Constant, index + 1)))?;
    }

    desc.textures.push(IntermediateTexture::input());
    for (index, block) in blocks.textures.iter().enumerate() {
        resolve_texture(block, &mut desc)
            .map_err(|err| err.in_block(BlockRef::new(BlockKind::Texture, index + 1)))?;
    }

    for (index, block) in blocks.samplers.iter().enumerate() {
        resolve_sampler(block, &mut desc)
            .map_err(|err| err.in_block(BlockRef::new(BlockKind::Sampler, index + 1)))?;
    }

    if let Some(name) = desc.find_duplicate_identifier() {
        return Err(CompileError::DuplicateIdentifier(name.to_string()));
    }

    let mut common = String::new();
    for (index, block) in blocks.commons.iter().enumerate() {
        resolve_common(block, &mut common)
            .map_err(|err| err.in_block(BlockRef::new(BlockKind::Common, index + 1)))?;
    }

    let ordered = order_passes(&blocks.passes)?;
    let prologue = resource_prologue(&desc, flags.terminal_effect);
    let last = ordered.len() - 1;
    let mut sources = Vec::with_capacity(ordered.len());

    for (index, body) in ordered.into_iter().enumerate() {
        let position = PassPosition {
            number: index + 1,
            last_pass: index == last,
            terminal_effect: flags.terminal_effect,
        };
        let resolved = resolve_pass(body, &desc, position.last_pass)
            .map_err(|err| err.in_block(BlockRef::new(BlockKind::Pass, position.number)))?;
        sources.push(pass_source(
            &desc,
            &resolved.pass,
            resolved.body,
            position,
            &prologue,
            &common,
        ));
        desc.passes.push(resolved.pass);
    }

    Ok(GeneratedEffect {
        descriptor: desc,
        sources,
    })
}
