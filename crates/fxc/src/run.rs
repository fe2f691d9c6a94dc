use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use effectc::{
    generate, CompileFlags, DirectoryCache, DirectoryIncludes, EffectCompiler, EffectDescriptor,
    PreprocessBackend, TextureSource,
};
use fxconfig::FxConfig;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::cli::{CacheAction, CheckArgs, Cli, Command, CompileArgs, GlobalArgs};
use crate::paths::AppPaths;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Effective settings after layering CLI flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub effects_dir: PathBuf,
    /// `None` when caching is disabled.
    pub cache_dir: Option<PathBuf>,
    pub workers: usize,
    pub terminal_effect: bool,
}

impl Settings {
    pub fn resolve(args: &GlobalArgs, config: &FxConfig, paths: &AppPaths) -> Self {
        let compiler = &config.compiler;
        let cache_dir = args
            .cache_dir
            .clone()
            .or_else(|| compiler.cache_dir.clone())
            .unwrap_or_else(|| paths.effect_cache_dir());
        let caching = !(args.no_cache || compiler.disable_cache);

        Self {
            effects_dir: args
                .effects_dir
                .clone()
                .unwrap_or_else(|| compiler.effects_dir.clone()),
            cache_dir: caching.then_some(cache_dir),
            workers: args.workers.unwrap_or(compiler.workers),
            terminal_effect: compiler.terminal_effect && !args.not_terminal,
        }
    }

    fn flags(&self) -> CompileFlags {
        CompileFlags {
            terminal_effect: self.terminal_effect,
        }
    }

    fn compiler(&self) -> EffectCompiler {
        let mut compiler = EffectCompiler::new(Arc::new(PreprocessBackend))
            .with_includes(Arc::new(DirectoryIncludes::new(&self.effects_dir)))
            .with_workers(self.workers);
        if let Some(dir) = &self.cache_dir {
            compiler = compiler.with_cache(Arc::new(DirectoryCache::new(dir)));
        }
        compiler
    }
}

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config_path = cli
        .global
        .config
        .clone()
        .unwrap_or_else(|| paths.config_file());
    let config = FxConfig::load(&config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    debug!(
        config = %config_path.display(),
        config_dir = %paths.config_dir().display(),
        cache_root = %paths.cache_dir().display(),
        "loaded fxc configuration"
    );

    let settings = Settings::resolve(&cli.global, &config, &paths);
    match cli.command {
        Command::Compile(args) => run_compile(&settings, &args),
        Command::Check(args) => run_check(&settings, &args),
        Command::Cache(cache) => run_cache(&settings, &paths, cache.action),
    }
}

fn read_effect(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read effect {}", path.display()))
}

fn run_compile(settings: &Settings, args: &CompileArgs) -> Result<()> {
    let source = read_effect(&args.file)?;
    let identity = fs::canonicalize(&args.file).unwrap_or_else(|_| args.file.clone());

    // Emit even when a pass later fails to compile.
    if let Some(dir) = &args.emit_dir {
        let generated = generate(&source, settings.flags())
            .with_context(|| format!("failed to generate {}", args.file.display()))?;
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (index, hlsl) in generated.sources.iter().enumerate() {
            let path = dir.join(format!("Pass{}.hlsl", index + 1));
            fs::write(&path, hlsl)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        info!(dir = %dir.display(), passes = generated.sources.len(), "wrote generated passes");
    }

    let descriptor = settings
        .compiler()
        .compile_source(&identity.to_string_lossy(), &source, settings.flags())
        .with_context(|| format!("failed to compile {}", args.file.display()))?;

    if args.json {
        let json = serde_json::to_string_pretty(&descriptor)
            .context("failed to serialise descriptor")?;
        println!("{json}");
    } else {
        print_summary(&args.file, &descriptor);
    }
    Ok(())
}

fn run_check(settings: &Settings, args: &CheckArgs) -> Result<()> {
    let source = read_effect(&args.file)?;
    let generated = generate(&source, settings.flags())
        .with_context(|| format!("{} is not a valid effect", args.file.display()))?;
    println!(
        "{}: ok ({} passes)",
        args.file.display(),
        generated.descriptor.passes.len()
    );
    Ok(())
}

fn run_cache(settings: &Settings, paths: &AppPaths, action: CacheAction) -> Result<()> {
    let dir = settings
        .cache_dir
        .clone()
        .unwrap_or_else(|| paths.effect_cache_dir());
    match action {
        CacheAction::Where => println!("{}", dir.display()),
        CacheAction::Clear => {
            let removed = DirectoryCache::new(&dir)
                .clear()
                .with_context(|| format!("failed to clear cache {}", dir.display()))?;
            println!("Removed {removed} cached effect(s) from {}", dir.display());
        }
    }
    Ok(())
}

fn print_summary(file: &Path, desc: &EffectDescriptor) {
    println!(
        "Compiled {}: {} passes, {} textures, {} constants",
        file.display(),
        desc.passes.len(),
        desc.textures.len(),
        desc.constants.len() + desc.value_constants.len() + desc.dynamic_value_constants.len()
    );

    for texture in &desc.textures {
        let origin = match &texture.source {
            TextureSource::Input => "input".to_string(),
            TextureSource::Format { format } => format.name().to_string(),
            TextureSource::File { path } => format!("file {path}"),
        };
        println!("  texture  {:<20} {origin}", texture.name);
    }

    let names = |indices: &[usize]| {
        indices
            .iter()
            .map(|&index| desc.textures.get(index).map_or("?", |texture| texture.name.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    };
    for (index, pass) in desc.passes.iter().enumerate() {
        let outputs = if pass.outputs.is_empty() {
            "<output>".to_string()
        } else {
            names(&pass.outputs)
        };
        let [tx, ty, tz] = pass.num_threads;
        println!(
            "  Pass{:<3}  in=[{}] out=[{outputs}] block={}x{} threads={tx},{ty},{tz} bytes={}",
            index + 1,
            names(&pass.inputs),
            pass.block_size.x,
            pass.block_size.y,
            pass.bytecode.as_ref().map_or(0, |blob| blob.len()),
        );
    }
}
