//! Collaborators that turn generated HLSL into bytecode.
//!
//! Types:
//!
//! - `ShaderBackend` compiles one pass. Implementations must be shareable
//!   across the compile workers.
//! - `IncludeResolver` maps `#include` names to file content; the stock
//!   `DirectoryIncludes` reads them relative to a root and `NoIncludes`
//!   refuses every request.
//! - `PreprocessBackend` expands includes itself and returns the expanded
//!   text as the blob. It suits validation and tests on hosts without a
//!   native HLSL compiler.
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::descriptor::Bytecode;

pub trait ShaderBackend: Send + Sync {
    /// Compiles `source`, exporting `entry`. `label` names the pass in
    /// diagnostics. Failures carry the compiler's message.
    fn compile(
        &self,
        source: &str,
        entry: &str,
        label: &str,
        includes: &dyn IncludeResolver,
    ) -> Result<Bytecode, String>;
}

pub trait IncludeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoIncludes;

impl IncludeResolver for NoIncludes {
    fn resolve(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Serves includes from files under `root`. Names that are absolute or climb
/// out of the root are refused.
#[derive(Debug, Clone)]
pub struct DirectoryIncludes {
    root: PathBuf,
}

impl DirectoryIncludes {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IncludeResolver for DirectoryIncludes {
    fn resolve(&self, name: &str) -> Option<String> {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        let path = self.root.join(relative);
        match fs::read_to_string(&path) {
            Ok(content) => Some(content),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "include not readable");
                None
            }
        }
    }
}

const MAX_INCLUDE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, Default)]
pub struct PreprocessBackend;

impl ShaderBackend for PreprocessBackend {
    fn compile(
        &self,
        source: &str,
        entry: &str,
        label: &str,
        includes: &dyn IncludeResolver,
    ) -> Result<Bytecode, String> {
        let mut expanded = String::with_capacity(source.len());
        expand_includes(source, includes, 0, &mut expanded)
            .map_err(|message| format!("{label}: {message}"))?;
        if !expanded.contains(&format!("void {entry}(")) {
            return Err(format!("{label}: entry point '{entry}' not found"));
        }
        Ok(Bytecode::new(expanded.into_bytes()))
    }
}

fn expand_includes(
    source: &str,
    includes: &dyn IncludeResolver,
    depth: usize,
    out: &mut String,
) -> Result<(), String> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(format!("includes nested deeper than {MAX_INCLUDE_DEPTH} levels"));
    }

    for line in source.split_inclusive('\n') {
        let Some(name) = include_target(line)? else {
            out.push_str(line);
            continue;
        };
        let content = includes
            .resolve(name)
            .ok_or_else(|| format!("cannot open include file '{name}'"))?;
        expand_includes(&content, includes, depth + 1, out)?;
        if !out.ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(())
}

/// Returns the quoted name of an `#include` line, `None` for other lines.
fn include_target(line: &str) -> Result<Option<&str>, String> {
    let Some(rest) = line.trim_start().strip_prefix('#') else {
        return Ok(None);
    };
    let Some(rest) = rest.trim_start().strip_prefix("include") else {
        return Ok(None);
    };
    let rest = rest.trim();
    rest.strip_prefix('"')
        .and_then(|quoted| quoted.strip_suffix('"'))
        .filter(|name| !name.is_empty() && !name.contains('"'))
        .map(Some)
        .ok_or_else(|| format!("malformed include directive '{}'", line.trim_end()))
}
