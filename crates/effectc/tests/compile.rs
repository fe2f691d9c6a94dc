use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use effectc::{
    generate, BlockKind, Bytecode, CompileError, CompileFlags, ConstantKind, ConstantValue,
    DirectoryCache, DirectoryIncludes, EffectCache, EffectCompiler, IncludeResolver,
    MemoryCache, PreprocessBackend, SamplerFilter, ShaderBackend, SizeExpr, TextureFormat,
    TextureSource, ValueConstant,
};
use tempfile::TempDir;

const BLUR: &str = r#"//!MAGPIE EFFECT
//!VERSION 1
//!OUTPUT_WIDTH INPUT_WIDTH * 2
//!OUTPUT_HEIGHT INPUT_HEIGHT * 2

// Tunables exposed to the user.
//!CONSTANT
//!DEFAULT 0.5
//!LABEL Strength
//!MIN 0
//!MAX 1
float strength;

//!CONSTANT
//!VALUE 1.0 / INPUT_WIDTH
float texelWidth;

//!CONSTANT
//!VALUE FRAME_COUNT
//!DYNAMIC
int frame;

//!TEXTURE
Texture2D INPUT;

//!TEXTURE
//!FORMAT R16G16B16A16_FLOAT
Texture2D blurred;

//!SAMPLER
//!FILTER LINEAR
SamplerState sam;

//!COMMON
float3 Fetch(Texture2D tex, uint2 pos) { return tex[pos].rgb; }

/* The final pass reads the blurred copy. */
//!PASS 2
//!IN blurred
//!BLOCK_SIZE 16,16
//!NUM_THREADS 64,1,1
void Pass2(uint2 blockStart, uint3 threadId) {
    uint2 pos = blockStart + threadId.xy;
    WriteToOutput(pos, Fetch(blurred, pos) * strength);
}

//!PASS 1
//!IN INPUT
//!OUT blurred
//!BLOCK_SIZE 8,8
//!NUM_THREADS 8,8,1
void Pass1(uint2 blockStart, uint3 threadId) {
    uint2 pos = blockStart + threadId.xy;
    blurred[pos] = float4(Fetch(INPUT, pos), 1);
}
"#;

/// Echoes the generated source back as bytecode and records each call.
#[derive(Default)]
struct RecordingBackend {
    labels: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ShaderBackend for RecordingBackend {
    fn compile(
        &self,
        source: &str,
        entry: &str,
        label: &str,
        _includes: &dyn IncludeResolver,
    ) -> Result<Bytecode, String> {
        assert_eq!(entry, "__M");
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels.lock().unwrap().push(label.to_string());
        Ok(Bytecode::new(source.as_bytes().to_vec()))
    }
}

/// Rejects one pass by label.
struct RejectingBackend(&'static str);

impl ShaderBackend for RejectingBackend {
    fn compile(
        &self,
        source: &str,
        _entry: &str,
        label: &str,
        _includes: &dyn IncludeResolver,
    ) -> Result<Bytecode, String> {
        if label == self.0 {
            Err("error X3000: syntax error".to_string())
        } else {
            Ok(Bytecode::new(source.as_bytes().to_vec()))
        }
    }
}

fn compiler() -> EffectCompiler {
    EffectCompiler::new(Arc::new(PreprocessBackend))
}

#[test]
fn compiles_multi_pass_effect() {
    let desc = compiler()
        .compile_source("blur.hlsl", BLUR, CompileFlags::terminal())
        .unwrap();

    assert_eq!(
        desc.output_size,
        Some(SizeExpr {
            width: "INPUT_WIDTH*2".into(),
            height: "INPUT_HEIGHT*2".into(),
        })
    );

    assert_eq!(desc.constants.len(), 1);
    assert_eq!(desc.constants[0].default, Some(ConstantValue::Float(0.5)));
    assert_eq!(desc.constants[0].label.as_deref(), Some("Strength"));
    assert_eq!(
        desc.value_constants,
        vec![ValueConstant {
            name: "texelWidth".into(),
            kind: ConstantKind::Float,
            expr: "1.0/INPUT_WIDTH".into(),
        }]
    );
    assert_eq!(desc.dynamic_value_constants[0].name, "frame");
    assert_eq!(desc.dynamic_value_constants[0].kind, ConstantKind::Int);

    assert_eq!(desc.textures.len(), 2);
    assert_eq!(desc.textures[0].source, TextureSource::Input);
    assert_eq!(
        desc.textures[1].source,
        TextureSource::Format {
            format: TextureFormat::R16G16B16A16Float
        }
    );
    assert_eq!(desc.samplers[0].filter, SamplerFilter::Linear);

    assert_eq!(desc.passes.len(), 2);
    assert_eq!(desc.passes[0].inputs, vec![0]);
    assert_eq!(desc.passes[0].outputs, vec![1]);
    assert_eq!(desc.passes[0].num_threads, [8, 8, 1]);
    assert_eq!(desc.passes[1].inputs, vec![1]);
    assert!(desc.passes[1].outputs.is_empty());
    assert!(desc.passes.iter().all(|pass| pass.bytecode.is_some()));
}

#[test]
fn generated_sources_follow_binding_contract() {
    let generated = generate(BLUR, CompileFlags::terminal()).unwrap();
    let [first, last] = generated.sources.as_slice() else {
        panic!("expected two passes");
    };

    let prologue = "cbuffer __C:register(b0){uint4 __off;uint __vx;uint __vy;float strength;float texelWidth;};\
cbuffer __D:register(b1){int4 __cr;float2 __cp;uint __ct;int frame;};\
SamplerState sam:register(s0);\n";

    assert!(first.starts_with(&format!(
        "Texture2D INPUT:register(t0);RWTexture2D<float4> blurred:register(u0);{prologue}"
    )));
    assert!(first.ends_with("{Pass1(gid.xy*uint2(8,8),tid);}"));

    assert!(last.starts_with(&format!(
        "Texture2D blurred:register(t0);Texture2D __CURSOR:register(t1);RWTexture2D<float4> __OUTPUT:register(u0);{prologue}"
    )));
    assert!(last.contains("__WriteToOutput(pos,color)"));
    assert!(last.contains("float3 Fetch(Texture2D tex, uint2 pos)"));
    assert!(last.ends_with(
        "[numthreads(64,1,1)]\nvoid __M(uint3 tid:SV_GroupThreadID,uint3 gid:SV_GroupID){Pass2(gid.xy*uint2(16,16)+__off.xy,tid);}"
    ));
    assert!(!last.contains("The final pass reads"));
}

#[test]
fn inner_effect_writes_output_directly() {
    let generated = generate(BLUR, CompileFlags::default()).unwrap();
    let last = &generated.sources[1];
    assert!(!last.contains("__CURSOR"));
    assert!(!last.contains("__off"));
    assert!(last.contains("#define WriteToOutput(pos,color) __OUTPUT[pos]=float4(color, 1)\n"));
    assert!(last.starts_with(
        "Texture2D blurred:register(t0);RWTexture2D<float4> __OUTPUT:register(u0);cbuffer __C:register(b0){float strength;float texelWidth;};"
    ));
}

#[test]
fn single_pass_effect() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n\n//!PASS 1\n//!NUM_THREADS 8,8,1\n//!BLOCK_SIZE 16,16\nvoid Pass1(uint2 blockStart, uint3 threadId) {}\n";
    let desc = compiler()
        .compile_source("single.hlsl", source, CompileFlags::terminal())
        .unwrap();
    assert_eq!(desc.passes.len(), 1);
    assert!(desc.passes[0].inputs.is_empty());
    assert!(desc.passes[0].outputs.is_empty());
    assert_eq!(desc.passes[0].block_size.x, 16);
}

#[test]
fn value_constant_without_range() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n//!CONSTANT\n//!VALUE a+b\nfloat k;\n//!PASS 1\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\nvoid Pass1(uint2 b, uint3 t) {}\n";
    let desc = generate(source, CompileFlags::default()).unwrap().descriptor;
    assert!(desc.constants.is_empty());
    assert_eq!(desc.value_constants.len(), 1);
    assert_eq!(desc.value_constants[0].name, "k");
    assert_eq!(desc.value_constants[0].expr, "a+b");
}

#[test]
fn duplicate_texture_names_are_rejected_globally() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n\
//!TEXTURE\n//!FORMAT R8_UNORM\nTexture2D tex;\n\
//!TEXTURE\n//!FORMAT R16_FLOAT\nTexture2D tex;\n\
//!PASS 1\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\n";
    let err = generate(source, CompileFlags::default()).unwrap_err();
    assert!(matches!(err, CompileError::DuplicateIdentifier(ref name) if name == "tex"));
}

#[test]
fn constant_may_not_shadow_input() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n\
//!CONSTANT\n//!DEFAULT 1\nint INPUT;\n\
//!PASS 1\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\n";
    let err = generate(source, CompileFlags::default()).unwrap_err();
    assert!(matches!(err, CompileError::DuplicateIdentifier(ref name) if name == "INPUT"));
}

#[test]
fn diagnostics_name_block_and_ordinal() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n\
//!CONSTANT\n//!DEFAULT 1\nint a;\n\
//!CONSTANT\n//!VALUE 2\n//!MIN 0\nint b;\n\
//!PASS 1\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\n";
    let err = generate(source, CompileFlags::default()).unwrap_err();
    match &err {
        CompileError::Syntax { block, .. } => {
            assert_eq!(block.kind, BlockKind::Constant);
            assert_eq!(block.ordinal, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().starts_with("CONSTANT block #2: "));
}

#[test]
fn missing_pass_block() {
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n//!COMMON\nfloat x;\n";
    assert!(matches!(
        generate(source, CompileFlags::default()),
        Err(CompileError::MissingPassBlock)
    ));
}

#[test]
fn shader_failure_reports_pass_and_skips_cache() {
    let cache = Arc::new(MemoryCache::new());
    let compiler = EffectCompiler::new(Arc::new(RejectingBackend("Pass2")))
        .with_cache(cache.clone())
        .with_workers(2);

    let err = compiler
        .compile_source("blur.hlsl", BLUR, CompileFlags::terminal())
        .unwrap_err();
    match err {
        CompileError::ShaderCompile { pass, message } => {
            assert_eq!(pass, 2);
            assert!(message.contains("X3000"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(cache.is_empty());
}

#[test]
fn every_pass_reaches_the_backend_once() {
    let backend = Arc::new(RecordingBackend::default());
    let source = BLUR
        .replace("//!PASS 2", "//!PASS 4")
        .replace("void Pass2", "void Pass4")
        .replace("Pass2(", "Pass4(");
    let extra = "//!PASS 2\n//!IN INPUT\n//!OUT blurred\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\nvoid Pass2(uint2 b, uint3 t) {}\n\
//!PASS 3\n//!IN INPUT\n//!OUT blurred\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\nvoid Pass3(uint2 b, uint3 t) {}\n";
    let source = format!("{source}{extra}");

    let desc = EffectCompiler::new(backend.clone())
        .with_workers(3)
        .compile_source("four.hlsl", &source, CompileFlags::terminal())
        .unwrap();

    assert_eq!(desc.passes.len(), 4);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
    let mut labels = backend.labels.lock().unwrap().clone();
    labels.sort();
    assert_eq!(labels, ["Pass1", "Pass2", "Pass3", "Pass4"]);
    for (index, pass) in desc.passes.iter().enumerate() {
        let blob = pass.bytecode.as_ref().unwrap();
        let text = String::from_utf8(blob.as_bytes().to_vec()).unwrap();
        assert!(text.contains(&format!("{{Pass{}(gid.xy*uint2", index + 1)));
    }
}

#[test]
fn cache_hit_skips_backend() {
    let backend = Arc::new(RecordingBackend::default());
    let cache = Arc::new(MemoryCache::new());
    let compiler = EffectCompiler::new(backend.clone()).with_cache(cache.clone());

    let fresh = compiler
        .compile_source("blur.hlsl", BLUR, CompileFlags::terminal())
        .unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.len(), 1);

    let cached = compiler
        .compile_source("blur.hlsl", BLUR, CompileFlags::terminal())
        .unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    assert_eq!(cached, fresh);

    // Comment edits do not change the stripped text.
    let commented = BLUR.replace("// Tunables exposed to the user.", "// Renamed comment.");
    compiler
        .compile_source("blur.hlsl", &commented, CompileFlags::terminal())
        .unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 2);

    // The terminal flag changes generated code and therefore the key.
    compiler
        .compile_source("blur.hlsl", BLUR, CompileFlags::default())
        .unwrap();
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn directory_cache_survives_reload() {
    let dir = TempDir::new().unwrap();
    let effect = dir.path().join("blur.hlsl");
    fs::write(&effect, BLUR).unwrap();

    let cache = Arc::new(DirectoryCache::new(dir.path().join("cache")));
    let fresh = compiler()
        .with_cache(cache.clone())
        .compile_file(&effect, CompileFlags::terminal())
        .unwrap();

    let reopened: Arc<dyn EffectCache> = Arc::new(DirectoryCache::new(dir.path().join("cache")));
    let backend = Arc::new(RecordingBackend::default());
    let cached = EffectCompiler::new(backend.clone())
        .with_cache(reopened)
        .compile_file(&effect, CompileFlags::terminal())
        .unwrap();

    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    assert_eq!(cached, fresh);
}

#[test]
fn unreadable_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = compiler()
        .compile_file(&dir.path().join("missing.hlsl"), CompileFlags::default())
        .unwrap_err();
    assert!(matches!(err, CompileError::Io { .. }));
}

#[test]
fn pass_code_can_include_files() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("color.hlsli"), "float3 Tint(float3 c) { return c; }\n").unwrap();
    let source = "//!MAGPIE EFFECT\n//!VERSION 1\n//!COMMON\n#include \"color.hlsli\"\n//!PASS 1\n//!BLOCK_SIZE 8,8\n//!NUM_THREADS 8,8,1\nvoid Pass1(uint2 b, uint3 t) {}\n";

    let desc = compiler()
        .with_includes(Arc::new(DirectoryIncludes::new(dir.path())))
        .compile_source("include.hlsl", source, CompileFlags::terminal())
        .unwrap();
    let blob = desc.passes[0].bytecode.as_ref().unwrap();
    let text = String::from_utf8(blob.as_bytes().to_vec()).unwrap();
    assert!(text.contains("float3 Tint(float3 c)"));
    assert!(!text.contains("#include"));

    let err = compiler()
        .compile_source("include.hlsl", source, CompileFlags::terminal())
        .unwrap_err();
    assert!(matches!(err, CompileError::ShaderCompile { pass: 1, .. }));
}
