//! Synthesizes the final HLSL compute shader for each pass.
//!
//! Generated names form a contract with the runtime that binds resources:
//!
//! ```text
//!   t0..tN-1   declared IN textures        u0..  declared OUT textures
//!   tN         __CURSOR (terminal pass)    u0    __OUTPUT (final pass)
//!   b0         cbuffer __C  static constants (+ __off, __vx, __vy)
//!   b1         cbuffer __D  per-frame constants (+ __cr, __cp, __ct)
//!   s0..       samplers in declaration order
//!   __M        entry point, calls PassN(blockStart, tid)
//! ```
//!
//! The reserved cbuffer fields appear in every pass of a terminal effect
//! because the buffers are shared by all of its passes.
use crate::descriptor::{EffectDescriptor, Pass};

/// Entry point every generated pass exports.
pub const ENTRY_POINT: &str = "__M";

/// Composites the cursor over the output of the terminal pass. `__ct` selects
/// alpha blending (0), XOR masking (1) or monochrome inversion (2).
const CURSOR_WRITER: &str = r"void __WriteToOutput(uint2 pos,float3 color){
pos+=__off.zw;
if((int)pos.x>=__cr.x&&(int)pos.y>=__cr.y&&(int)pos.x<__cr.z&&(int)pos.y<__cr.w){
float4 mask=__CURSOR.SampleLevel(sam,(pos-__cr.xy+0.5f)*__cp,0);
if(__ct==0){color=color*mask.a+mask.rgb;}
else if(__ct==1){if(mask.a<0.5f){color=mask.rgb;}else{color=(uint3(round(color*255))^uint3(mask.rgb*255))/255.0f;}}
else{if(mask.x>0.5f){if(mask.y>0.5f){color=1-color;}}else{if(mask.y>0.5f){color=float3(1,1,1);}else{color=float3(0,0,0);}}}
}
__OUTPUT[pos]=float4(color,1);
}
#define WriteToOutput(pos,color) if(pos.x<__vx&&pos.y<__vy)__WriteToOutput(pos,color)
";

const DIRECT_WRITER: &str = "#define WriteToOutput(pos,color) __OUTPUT[pos]=float4(color, 1)\n";

/// Where a pass sits in the effect chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PassPosition {
    /// 1-based pass number, used for the `PassN` function name.
    pub number: usize,
    pub last_pass: bool,
    pub terminal_effect: bool,
}

impl PassPosition {
    fn is_terminal(self) -> bool {
        self.last_pass && self.terminal_effect
    }
}

/// Constant buffers and samplers shared by every pass of one effect.
pub(crate) fn resource_prologue(desc: &EffectDescriptor, terminal_effect: bool) -> String {
    let mut hlsl = String::new();

    if !desc.constants.is_empty() || !desc.value_constants.is_empty() || terminal_effect {
        hlsl.push_str("cbuffer __C:register(b0){");
        if terminal_effect {
            hlsl.push_str("uint4 __off;uint __vx;uint __vy;");
        }
        for constant in &desc.constants {
            hlsl.push_str(&format!("{} {};", constant.kind.hlsl_type(), constant.name));
        }
        for constant in &desc.value_constants {
            hlsl.push_str(&format!("{} {};", constant.kind.hlsl_type(), constant.name));
        }
        hlsl.push_str("};");
    }

    if !desc.dynamic_value_constants.is_empty() || terminal_effect {
        hlsl.push_str("cbuffer __D:register(b1){");
        if terminal_effect {
            hlsl.push_str("int4 __cr;float2 __cp;uint __ct;");
        }
        for constant in &desc.dynamic_value_constants {
            hlsl.push_str(&format!("{} {};", constant.kind.hlsl_type(), constant.name));
        }
        hlsl.push_str("};");
    }

    for (slot, sampler) in desc.samplers.iter().enumerate() {
        hlsl.push_str(&format!("SamplerState {}:register(s{slot});", sampler.name));
    }

    hlsl.push('\n');
    hlsl
}

pub(crate) fn pass_source(
    desc: &EffectDescriptor,
    pass: &Pass,
    body: &str,
    position: PassPosition,
    prologue: &str,
    common: &str,
) -> String {
    let mut hlsl = String::new();
    let texture_name = |index: usize| desc.textures[index].name.as_str();

    for (slot, &input) in pass.inputs.iter().enumerate() {
        hlsl.push_str(&format!("Texture2D {}:register(t{slot});", texture_name(input)));
    }
    if position.is_terminal() {
        hlsl.push_str(&format!(
            "Texture2D __CURSOR:register(t{});",
            pass.inputs.len()
        ));
    }

    if position.last_pass {
        hlsl.push_str("RWTexture2D<float4> __OUTPUT:register(u0);");
    } else {
        for (slot, &output) in pass.outputs.iter().enumerate() {
            hlsl.push_str(&format!(
                "RWTexture2D<float4> {}:register(u{slot});",
                texture_name(output)
            ));
        }
    }

    hlsl.push_str(prologue);

    if position.last_pass {
        hlsl.push_str(if position.terminal_effect {
            CURSOR_WRITER
        } else {
            DIRECT_WRITER
        });
    }

    hlsl.push_str(common);
    hlsl.push_str(body);
    if !hlsl.ends_with('\n') {
        hlsl.push('\n');
    }

    let [tx, ty, tz] = pass.num_threads;
    let offset = if position.is_terminal() { "+__off.xy" } else { "" };
    hlsl.push_str(&format!(
        "[numthreads({tx},{ty},{tz})]\nvoid {ENTRY_POINT}(uint3 tid:SV_GroupThreadID,uint3 gid:SV_GroupID){{Pass{}(gid.xy*uint2({},{}){offset},tid);}}",
        position.number, pass.block_size.x, pass.block_size.y
    ));
    hlsl
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{
        BlockSize, Constant, ConstantKind, IntermediateTexture, Sampler, SamplerAddress,
        SamplerFilter, TextureFormat, TextureSource, ValueConstant,
    };

    fn sample_desc() -> EffectDescriptor {
        EffectDescriptor {
            constants: vec![Constant {
                name: "strength".into(),
                kind: ConstantKind::Float,
                default: None,
                min: None,
                max: None,
                label: None,
            }],
            dynamic_value_constants: vec![ValueConstant {
                name: "frame".into(),
                kind: ConstantKind::Int,
                expr: "FRAME".into(),
            }],
            textures: vec![
                IntermediateTexture::input(),
                IntermediateTexture {
                    name: "tmp".into(),
                    source: TextureSource::Format {
                        format: TextureFormat::R16G16B16A16Float,
                    },
                    size: None,
                },
            ],
            samplers: vec![Sampler {
                name: "sam".into(),
                filter: SamplerFilter::Point,
                address: SamplerAddress::Clamp,
            }],
            ..Default::default()
        }
    }

    fn pass(inputs: Vec<usize>, outputs: Vec<usize>) -> Pass {
        Pass {
            inputs,
            outputs,
            block_size: BlockSize { x: 16, y: 8 },
            num_threads: [64, 1, 1],
            bytecode: None,
        }
    }

    #[test]
    fn prologue_lists_buffers_and_samplers() {
        let desc = sample_desc();
        assert_eq!(
            resource_prologue(&desc, false),
            "cbuffer __C:register(b0){float strength;};cbuffer __D:register(b1){int frame;};SamplerState sam:register(s0);\n"
        );
        let terminal = resource_prologue(&desc, true);
        assert!(terminal.starts_with("cbuffer __C:register(b0){uint4 __off;uint __vx;uint __vy;float strength;};"));
        assert!(terminal.contains("cbuffer __D:register(b1){int4 __cr;float2 __cp;uint __ct;int frame;};"));
    }

    #[test]
    fn prologue_is_empty_without_resources() {
        assert_eq!(resource_prologue(&EffectDescriptor::default(), false), "\n");
    }

    #[test]
    fn intermediate_pass_binds_declared_outputs() {
        let desc = sample_desc();
        let position = PassPosition {
            number: 1,
            last_pass: false,
            terminal_effect: true,
        };
        let hlsl = pass_source(&desc, &pass(vec![0], vec![1]), "void Pass1(uint2 p, uint3 t) {}", position, "\n", "");
        assert!(hlsl.starts_with("Texture2D INPUT:register(t0);RWTexture2D<float4> tmp:register(u0);"));
        assert!(!hlsl.contains("__CURSOR"));
        assert!(!hlsl.contains("WriteToOutput"));
        assert!(hlsl.ends_with(
            "[numthreads(64,1,1)]\nvoid __M(uint3 tid:SV_GroupThreadID,uint3 gid:SV_GroupID){Pass1(gid.xy*uint2(16,8),tid);}"
        ));
    }

    #[test]
    fn terminal_pass_composites_cursor() {
        let desc = sample_desc();
        let position = PassPosition {
            number: 2,
            last_pass: true,
            terminal_effect: true,
        };
        let hlsl = pass_source(&desc, &pass(vec![1], vec![]), "void Pass2(uint2 p, uint3 t) {}\n", position, "\n", "#define K 1\n");
        assert!(hlsl.starts_with(
            "Texture2D tmp:register(t0);Texture2D __CURSOR:register(t1);RWTexture2D<float4> __OUTPUT:register(u0);"
        ));
        assert!(hlsl.contains("void __WriteToOutput(uint2 pos,float3 color)"));
        assert!(hlsl.contains("#define WriteToOutput(pos,color) if(pos.x<__vx&&pos.y<__vy)"));
        assert!(hlsl.contains("#define K 1\nvoid Pass2"));
        assert!(hlsl.ends_with("{Pass2(gid.xy*uint2(16,8)+__off.xy,tid);}"));
    }

    #[test]
    fn final_pass_of_inner_effect_writes_directly() {
        let desc = sample_desc();
        let position = PassPosition {
            number: 1,
            last_pass: true,
            terminal_effect: false,
        };
        let hlsl = pass_source(&desc, &pass(vec![0], vec![]), "", position, "\n", "");
        assert!(hlsl.contains("RWTexture2D<float4> __OUTPUT:register(u0);"));
        assert!(hlsl.contains(DIRECT_WRITER));
        assert!(!hlsl.contains("__CURSOR"));
        assert!(hlsl.ends_with("{Pass1(gid.xy*uint2(16,8),tid);}"));
    }
}
