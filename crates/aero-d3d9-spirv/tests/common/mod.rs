//! Shared helpers for `aero-d3d9-spirv` integration tests.
#![allow(dead_code)]

pub mod eval;

use aero_d3d9_spirv::{
    compile, CompileOptions, CompiledShader, Comparison, DclInfo, DefValue, Instruction,
    LinkerSlotTable, ModuleInfo, Opcode, Operand, RegisterType, Semantic, ShaderStage,
    ShaderVersion, SrcModifier, Swizzle, SwizzleComponent, TextureType, Usage, WriteMask,
};

pub fn vs(major: u8, minor: u8) -> ModuleInfo {
    ModuleInfo::new(ShaderVersion::new(ShaderStage::Vertex, major, minor))
}

pub fn ps(major: u8, minor: u8) -> ModuleInfo {
    ModuleInfo::new(ShaderVersion::new(ShaderStage::Pixel, major, minor))
}

pub fn reg(ty: RegisterType, num: u32) -> Operand {
    Operand::new(ty, num)
}

pub fn r(num: u32) -> Operand {
    reg(RegisterType::Temp, num)
}

pub fn c(num: u32) -> Operand {
    reg(RegisterType::Const, num)
}

pub fn i(num: u32) -> Operand {
    reg(RegisterType::ConstInt, num)
}

pub fn b(num: u32) -> Operand {
    reg(RegisterType::ConstBool, num)
}

pub fn v(num: u32) -> Operand {
    reg(RegisterType::Input, num)
}

pub fn o(num: u32) -> Operand {
    reg(RegisterType::Output, num)
}

pub fn oc(num: u32) -> Operand {
    reg(RegisterType::ColorOut, num)
}

pub fn s(num: u32) -> Operand {
    reg(RegisterType::Sampler, num)
}

pub fn masked(operand: Operand, mask: u8) -> Operand {
    operand.with_mask(WriteMask(mask))
}

pub fn replicate(operand: Operand, component: SwizzleComponent) -> Operand {
    operand.with_swizzle(Swizzle::replicate(component))
}

pub fn negated(operand: Operand) -> Operand {
    operand.with_modifier(SrcModifier::Negate)
}

pub fn op(opcode: Opcode, dst: Operand, src: &[Operand]) -> Instruction {
    src.iter()
        .fold(Instruction::new(opcode).with_dst(dst), |inst, &s| inst.with_src(s))
}

pub fn op_src(opcode: Opcode, src: &[Operand]) -> Instruction {
    src.iter()
        .fold(Instruction::new(opcode), |inst, &s| inst.with_src(s))
}

pub fn def(num: u32, value: [f32; 4]) -> Instruction {
    Instruction::new(Opcode::Def)
        .with_dst(c(num))
        .with_def(DefValue::Float(value))
}

pub fn defi(num: u32, value: [i32; 4]) -> Instruction {
    Instruction::new(Opcode::DefI)
        .with_dst(i(num))
        .with_def(DefValue::Int(value))
}

pub fn defb(num: u32, value: bool) -> Instruction {
    Instruction::new(Opcode::DefB)
        .with_dst(b(num))
        .with_def(DefValue::Bool(value))
}

pub fn dcl(dst: Operand, usage: Usage, usage_index: u32) -> Instruction {
    Instruction::new(Opcode::Dcl)
        .with_dst(dst)
        .with_dcl(DclInfo::Semantic(Semantic::new(usage, usage_index)))
}

pub fn dcl_sampler(num: u32, ty: TextureType) -> Instruction {
    Instruction::new(Opcode::Dcl)
        .with_dst(s(num))
        .with_dcl(DclInfo::Sampler(ty))
}

pub fn ifc(comparison: Comparison, a: Operand, b: Operand) -> Instruction {
    op_src(Opcode::Ifc, &[a, b]).with_comparison(comparison)
}

pub fn breakc(comparison: Comparison, a: Operand, b: Operand) -> Instruction {
    op_src(Opcode::BreakC, &[a, b]).with_comparison(comparison)
}

pub fn bare(opcode: Opcode) -> Instruction {
    Instruction::new(opcode)
}

pub fn compile_with(
    info: ModuleInfo,
    options: CompileOptions,
    program: &[Instruction],
) -> CompiledShader {
    let linker = LinkerSlotTable::new();
    compile(info, options, &linker, program).expect("shader must compile")
}

pub fn compile_ok(info: ModuleInfo, program: &[Instruction]) -> CompiledShader {
    compile_with(info, CompileOptions::default(), program)
}

/// Sends `tracing` output to the test harness' captured stdout.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
