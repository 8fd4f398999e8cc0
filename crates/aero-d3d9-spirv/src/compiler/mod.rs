//! Instruction-at-a-time SM1-SM3 to SPIR-V compiler.
//!
//! The compiler emits the program body into a private function (`vs_main` / `ps_main`) as
//! instructions arrive. [`Compiler::finalize`] then wraps it in the real entry point, which copies
//! interface variables into the internal register arrays, calls the body, copies outputs back out
//! and runs the fixed-function tail (clip distances, alpha test, deferred discard, depth clamp).

mod alu;
mod control_flow;
mod finalize;
mod operands;
mod registers;
mod texture;

use rspirv::spirv::{self, Word};
use tracing::{debug, warn};

use crate::analysis::{self, AnalysisInfo};
use crate::error::{CompileError, CompileWarning};
use crate::instruction::{Instruction, Opcode, Operand};
use crate::linker::LinkerSlotTable;
use crate::options::CompileOptions;
use crate::signature::{InterfaceSignature, InterfaceSlots, ResourceBinding};
use crate::spirv::SpirvModule;
use crate::types::{ModuleInfo, ShaderStage};

use control_flow::ControlFlowBlock;
use registers::{RegisterFile, Sampler};

/// Name of the single entry point of every compiled module.
pub const ENTRY_POINT_NAME: &str = "main";

/// Output of a finished compilation.
#[derive(Debug, Clone)]
pub struct CompiledShader {
    pub stage: ShaderStage,
    pub entry_point: &'static str,
    /// Assembled SPIR-V binary.
    pub words: Vec<u32>,
    /// Descriptors referenced by the module, in first-declaration order.
    pub resource_bindings: Vec<ResourceBinding>,
    pub input_signature: InterfaceSignature,
    pub output_signature: InterfaceSignature,
    pub interface_slots: InterfaceSlots,
    pub warnings: Vec<CompileWarning>,
}

pub struct Compiler<'a> {
    info: ModuleInfo,
    options: CompileOptions,
    analysis: AnalysisInfo,
    linker: &'a LinkerSlotTable,
    module: SpirvModule,
    entry_point_id: Word,
    body_function_id: Word,
    entry_interfaces: Vec<Word>,
    resource_bindings: Vec<ResourceBinding>,
    isgn: InterfaceSignature,
    osgn: InterfaceSignature,
    interface_slots: InterfaceSlots,
    /// Register numbers (not slots) already present in `isgn` / `osgn`.
    explicit_inputs: u32,
    explicit_outputs: u32,
    regs: RegisterFile,
    samplers: Vec<Option<Sampler>>,
    blocks: Vec<ControlFlowBlock>,
    warnings: Vec<CompileWarning>,
    /// Opcode of the instruction being emitted, for diagnostics.
    opcode: Opcode,
}

impl<'a> Compiler<'a> {
    /// Sets up the module and opens the body function.
    ///
    /// `analysis` must describe the whole instruction stream that will be fed to
    /// [`Self::process_instruction`].
    pub fn new(
        info: ModuleInfo,
        options: CompileOptions,
        analysis: AnalysisInfo,
        linker: &'a LinkerSlotTable,
    ) -> Result<Self, CompileError> {
        let mut module = SpirvModule::new(options.debug_names);
        if let Some(file_name) = &options.file_name {
            module.set_source_file(file_name);
        }

        let entry_point_id = module.id();
        let body_function_id = module.id();

        let mut compiler = Self {
            info,
            options,
            analysis,
            linker,
            module,
            entry_point_id,
            body_function_id,
            entry_interfaces: Vec::new(),
            resource_bindings: Vec::new(),
            isgn: InterfaceSignature::new(),
            osgn: InterfaceSignature::new(),
            interface_slots: InterfaceSlots::default(),
            explicit_inputs: 0,
            explicit_outputs: 0,
            regs: RegisterFile::default(),
            samplers: vec![None; crate::shader_limits::MAX_SAMPLERS as usize],
            blocks: Vec::new(),
            warnings: Vec::new(),
            opcode: Opcode::Nop,
        };
        compiler.emit_init()?;
        Ok(compiler)
    }

    fn emit_init(&mut self) -> Result<(), CompileError> {
        self.module.capability(spirv::Capability::Shader);
        self.module.capability(spirv::Capability::ImageQuery);

        self.emit_dcl_constant_buffer();
        self.emit_dcl_interface_arrays();

        match self.info.stage() {
            ShaderStage::Vertex => {
                self.module.capability(spirv::Capability::ClipDistance);
                self.module.capability(spirv::Capability::DrawParameters);
                self.module.extension("SPV_KHR_shader_draw_parameters");
            }
            ShaderStage::Pixel => {
                self.module.capability(spirv::Capability::DerivativeControl);
                self.module.execution_mode(
                    self.entry_point_id,
                    spirv::ExecutionMode::OriginUpperLeft,
                    [],
                );
            }
        }

        let name = match self.info.stage() {
            ShaderStage::Vertex => "vs_main",
            ShaderStage::Pixel => "ps_main",
        };
        let void = self.module.void_type();
        let fn_type = self.module.void_function_type();
        self.module.begin_function(
            void,
            Some(self.body_function_id),
            spirv::FunctionControl::NONE,
            fn_type,
        )?;
        self.module.set_name(self.body_function_id, name);
        self.module.begin_block(None)?;

        if self.info.stage() == ShaderStage::Pixel && self.analysis.defers_kill() {
            self.emit_dcl_kill_state()?;
        }
        Ok(())
    }

    /// Emits one instruction into the body function.
    pub fn process_instruction(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        self.opcode = inst.opcode;

        match inst.opcode {
            Opcode::Nop | Opcode::Comment | Opcode::End => Ok(()),

            Opcode::Dcl => self.emit_dcl(inst),

            Opcode::Def | Opcode::DefI | Opcode::DefB => self.emit_def(inst),

            Opcode::Mov | Opcode::Mova => self.emit_mov(inst),

            Opcode::Add
            | Opcode::Sub
            | Opcode::Mad
            | Opcode::Mul
            | Opcode::Rcp
            | Opcode::Rsq
            | Opcode::Dp3
            | Opcode::Dp4
            | Opcode::Slt
            | Opcode::Sge
            | Opcode::Min
            | Opcode::Max
            | Opcode::Exp
            | Opcode::ExpP
            | Opcode::Pow
            | Opcode::Abs
            | Opcode::Nrm
            | Opcode::SinCos
            | Opcode::Lit
            | Opcode::Dst
            | Opcode::Log
            | Opcode::LogP
            | Opcode::Lrp
            | Opcode::Frc
            | Opcode::Cmp
            | Opcode::Cnd
            | Opcode::Dp2Add
            | Opcode::DsX
            | Opcode::DsY => self.emit_vector_alu(inst),

            Opcode::Loop => self.emit_control_flow_loop(inst),
            Opcode::Rep => self.emit_control_flow_rep(inst),
            Opcode::EndLoop | Opcode::EndRep => self.emit_control_flow_end_loop(),
            Opcode::Break => self.emit_control_flow_break(),
            Opcode::BreakC => self.emit_control_flow_break_c(inst),
            Opcode::If | Opcode::Ifc => self.emit_control_flow_if(inst),
            Opcode::Else => self.emit_control_flow_else(),
            Opcode::EndIf => self.emit_control_flow_end_if(),

            Opcode::TexCoord => self.emit_tex_coord(inst),
            Opcode::Tex | Opcode::TexLdl | Opcode::TexLdd => self.emit_texture_sample(inst),
            Opcode::TexKill => self.emit_texture_kill(inst),

            opcode => {
                self.warn(CompileWarning::UnsupportedOpcode { opcode });
                Ok(())
            }
        }
    }

    /// Closes the body, emits the entry point and assembles the module.
    pub fn finalize(mut self) -> Result<CompiledShader, CompileError> {
        if !self.blocks.is_empty() {
            return Err(CompileError::UnterminatedControlFlow {
                open: self.blocks.len(),
            });
        }

        self.module.ret()?;
        self.module.end_function()?;

        match self.info.stage() {
            ShaderStage::Vertex => self.emit_vs_finalize()?,
            ShaderStage::Pixel => self.emit_ps_finalize()?,
        }

        let entry_point_id = self.entry_point_id;
        let interfaces = std::mem::take(&mut self.entry_interfaces);
        self.module.entry_point(
            self.info.stage().execution_model(),
            entry_point_id,
            ENTRY_POINT_NAME,
            interfaces,
        );
        self.module.set_name(entry_point_id, ENTRY_POINT_NAME);

        debug!(
            shader = %self.info.version,
            inputs = self.isgn.len(),
            outputs = self.osgn.len(),
            bindings = self.resource_bindings.len(),
            warnings = self.warnings.len(),
            "compiled shader"
        );

        Ok(CompiledShader {
            stage: self.info.stage(),
            entry_point: ENTRY_POINT_NAME,
            words: self.module.finish(),
            resource_bindings: self.resource_bindings,
            input_signature: self.isgn,
            output_signature: self.osgn,
            interface_slots: self.interface_slots,
            warnings: self.warnings,
        })
    }

    fn warn(&mut self, warning: CompileWarning) {
        warn!(shader = %self.info.version, "{warning}");
        self.warnings.push(warning);
    }

    fn dst_operand<'i>(&self, inst: &'i Instruction) -> Result<&'i Operand, CompileError> {
        inst.dst.as_ref().ok_or(CompileError::MissingOperand {
            opcode: inst.opcode,
            operand: "destination",
        })
    }

    fn src_operand<'i>(
        &self,
        inst: &'i Instruction,
        index: usize,
    ) -> Result<&'i Operand, CompileError> {
        const NAMES: [&str; 4] = ["src0", "src1", "src2", "src3"];
        inst.src.get(index).ok_or(CompileError::MissingOperand {
            opcode: inst.opcode,
            operand: NAMES.get(index).copied().unwrap_or("source"),
        })
    }
}

/// Compiles a complete instruction stream.
pub fn compile(
    info: ModuleInfo,
    options: CompileOptions,
    linker: &LinkerSlotTable,
    instructions: &[Instruction],
) -> Result<CompiledShader, CompileError> {
    let analysis = analysis::analyze(instructions);
    let mut compiler = Compiler::new(info, options, analysis, linker)?;
    for inst in instructions {
        compiler.process_instruction(inst)?;
    }
    compiler.finalize()
}
