//! Register storage: the constant buffer, the internal `v`/`o` arrays, lazily created private
//! registers and the interface signature bookkeeping behind `dcl`.

use std::collections::HashMap;

use rspirv::spirv::{self, Word};
use tracing::debug;

use super::Compiler;
use crate::binding_model::{self, BindingType, ConstantBufferSlot, DESCRIPTOR_SET};
use crate::error::{CompileError, CompileWarning};
use crate::instruction::{
    DclInfo, DefValue, Instruction, MiscType, Opcode, Operand, RasterizerOut, RegisterId, RegisterType,
    RelativeAddress, Semantic, Swizzle, TextureType, Usage, WriteMask,
};
use crate::shader_limits::{
    MAX_BOOL_CONSTANTS, MAX_FLOAT_CONSTANTS, MAX_INTERFACE_REGS, MAX_INT_CONSTANTS,
    MAX_RENDER_TARGETS, MAX_SAMPLERS, MAX_TEMP_REGS, MAX_TEXTURE_REGS,
};
use crate::signature::{ImageViewType, InterfaceElement, ResourceBinding};
use crate::spirv::{ScalarType, VectorType};
use crate::types::ShaderStage;

/// Typed pointer to register storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RegisterPointer {
    pub id: Word,
    pub ty: VectorType,
}

/// Typed SSA value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct RegisterValue {
    pub id: Word,
    pub ty: VectorType,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Sampler {
    pub var: Word,
    pub sampled_image_type: Word,
    pub texture_type: TextureType,
}

impl Sampler {
    /// Number of coordinate components the image dimension consumes.
    pub fn coordinate_count(&self) -> u32 {
        match self.texture_type {
            TextureType::Texture2D => 2,
            TextureType::TextureCube | TextureType::Texture3D => 3,
        }
    }
}

/// Registers created on first reference.
#[derive(Debug, Default)]
pub(super) struct RegisterFile {
    pub cbuffer: Word,
    pub v_array: Word,
    pub o_array: Word,
    pub temps: HashMap<u32, RegisterPointer>,
    /// SM1.0-1.3 pixel shader `t#` scratch registers.
    pub textures: HashMap<u32, RegisterPointer>,
    pub float_defs: HashMap<u32, RegisterPointer>,
    pub int_defs: HashMap<u32, RegisterPointer>,
    pub bool_defs: HashMap<u32, RegisterPointer>,
    /// Scratch variables holding the constant-buffer bit behind `b#`, keyed by register number;
    /// `None` is shared by every relative read.
    pub bool_reads: HashMap<Option<u32>, RegisterPointer>,
    pub addr: Option<RegisterPointer>,
    pub loop_counter: Option<RegisterPointer>,
    pub o_pos: Option<RegisterPointer>,
    pub o_fog: Option<RegisterPointer>,
    pub o_psize: Option<RegisterPointer>,
    pub o_depth: Option<RegisterPointer>,
    pub v_pos: Option<RegisterPointer>,
    pub v_face: Option<RegisterPointer>,
    /// `FrontFacing` input behind `vFace`.
    pub front_facing: Option<Word>,
    pub kill_state: Option<Word>,
    pub invocation_mask: Option<Word>,
}

/// Outputs that map onto builtins instead of a linker slot.
pub(super) fn builtin_output(semantic: Semantic) -> Option<spirv::BuiltIn> {
    match (semantic.usage, semantic.usage_index) {
        (Usage::Position, 0) => Some(spirv::BuiltIn::Position),
        (Usage::PointSize, 0) => Some(spirv::BuiltIn::PointSize),
        _ => None,
    }
}

impl Compiler<'_> {
    pub(super) fn emit_dcl_constant_buffer(&mut self) {
        let float4 = self.module.vector_type(VectorType::float(4));
        let int4 = self.module.vector_type(VectorType::sint(4));
        let uint = self.module.scalar_type(ScalarType::Uint32);

        let float_array = self.module.array_type(float4, MAX_FLOAT_CONSTANTS);
        let int_array = self.module.array_type(int4, MAX_INT_CONSTANTS);
        self.module.decorate_array_stride(float_array, 16);
        self.module.decorate_array_stride(int_array, 16);

        let struct_type = self.module.type_struct([float_array, int_array, uint]);
        self.module.decorate_block(struct_type);
        self.module
            .member_decorate_offset(struct_type, 0, binding_model::FLOAT_CONSTANTS_OFFSET);
        self.module
            .member_decorate_offset(struct_type, 1, binding_model::INT_CONSTANTS_OFFSET);
        self.module
            .member_decorate_offset(struct_type, 2, binding_model::BOOL_CONSTANTS_OFFSET);
        self.module.set_name(struct_type, "cbuffer_t");
        self.module.set_member_name(struct_type, 0, "f");
        self.module.set_member_name(struct_type, 1, "i");
        self.module.set_member_name(struct_type, 2, "b");

        let ptr_type = self
            .module
            .pointer_type(struct_type, spirv::StorageClass::Uniform);
        let var = self
            .module
            .new_var(ptr_type, spirv::StorageClass::Uniform, None);
        self.module.set_name(var, "c");

        let slot = binding_model::constant_buffer_slot(
            self.info.stage(),
            ConstantBufferSlot::Constants,
        );
        self.module.decorate_binding(var, DESCRIPTOR_SET, slot);
        self.resource_bindings
            .push(ResourceBinding::uniform_buffer(slot));
        self.regs.cbuffer = var;
    }

    pub(super) fn emit_dcl_interface_arrays(&mut self) {
        let float4 = self.module.vector_type(VectorType::float(4));

        let v_type = self.module.array_type(float4, MAX_INTERFACE_REGS);
        let v_ptr = self.module.pointer_type(v_type, spirv::StorageClass::Private);
        let v_init = self.module.const_null(v_type);
        self.regs.v_array = self
            .module
            .new_var(v_ptr, spirv::StorageClass::Private, Some(v_init));
        self.module.set_name(self.regs.v_array, "v");

        let o_count = match self.info.stage() {
            ShaderStage::Vertex => MAX_INTERFACE_REGS,
            ShaderStage::Pixel => MAX_RENDER_TARGETS,
        };
        let o_type = self.module.array_type(float4, o_count);
        let o_ptr = self.module.pointer_type(o_type, spirv::StorageClass::Private);
        let o_init = self.module.const_null(o_type);
        self.regs.o_array = self
            .module
            .new_var(o_ptr, spirv::StorageClass::Private, Some(o_init));
        self.module.set_name(self.regs.o_array, "o");
    }

    /// Kill flag plus, with subgroup support, the mask of lanes that entered the shader.
    pub(super) fn emit_dcl_kill_state(&mut self) -> Result<(), CompileError> {
        let bool_type = self.module.bool_type();
        let ptr_type = self
            .module
            .pointer_type(bool_type, spirv::StorageClass::Private);
        let init = self.module.const_bool(false);
        let kill_state = self
            .module
            .new_var(ptr_type, spirv::StorageClass::Private, Some(init));
        self.module.set_name(kill_state, "ps_kill");
        self.regs.kill_state = Some(kill_state);

        if self.options.use_subgroup_ops_for_early_discard {
            self.module.capability(spirv::Capability::GroupNonUniform);
            self.module
                .capability(spirv::Capability::GroupNonUniformBallot);

            let uint4 = self.module.vector_type(VectorType::uint(4));
            let ptr_type = self.module.pointer_type(uint4, spirv::StorageClass::Private);
            let mask = self
                .module
                .new_var(ptr_type, spirv::StorageClass::Private, None);
            self.module.set_name(mask, "invocation_mask");

            let all_lanes = self.module.const_bool(true);
            let ballot = self.emit_ballot(all_lanes)?;
            self.module.store(mask, ballot, None, [])?;
            self.regs.invocation_mask = Some(mask);
        }
        Ok(())
    }

    pub(super) fn emit_ballot(&mut self, predicate: Word) -> Result<Word, CompileError> {
        let uint4 = self.module.vector_type(VectorType::uint(4));
        let scope = self.module.const_u32(spirv::Scope::Subgroup as u32);
        Ok(self
            .module
            .group_non_uniform_ballot(uint4, None, scope, predicate)?)
    }

    fn new_private_register(
        &mut self,
        ty: VectorType,
        name: &str,
        init: Option<Word>,
    ) -> RegisterPointer {
        let type_id = self.module.vector_type(ty);
        let ptr_type = self.module.pointer_type(type_id, spirv::StorageClass::Private);
        let id = self
            .module
            .new_var(ptr_type, spirv::StorageClass::Private, init);
        self.module.set_name(id, name);
        RegisterPointer { id, ty }
    }

    /// Creates a builtin interface variable and lists it on the entry point.
    ///
    /// Outputs take a zero `init` so that a program which never writes them still stores a
    /// defined value; inputs must pass `None`.
    fn new_builtin_variable(
        &mut self,
        ty: VectorType,
        storage: spirv::StorageClass,
        builtin: spirv::BuiltIn,
        name: &str,
        init: Option<Word>,
    ) -> RegisterPointer {
        let type_id = self.module.vector_type(ty);
        let ptr_type = self.module.pointer_type(type_id, storage);
        let id = self.module.new_var(ptr_type, storage, init);
        self.module.decorate_builtin(id, builtin);
        self.module.set_name(id, name);
        self.entry_interfaces.push(id);
        RegisterPointer { id, ty }
    }

    pub(super) fn output_position(&mut self) -> RegisterPointer {
        if let Some(ptr) = self.regs.o_pos {
            return ptr;
        }
        let zero = self.module.const_vec4_f32([0.0; 4]);
        let ptr = self.new_builtin_variable(
            VectorType::float(4),
            spirv::StorageClass::Output,
            spirv::BuiltIn::Position,
            "oPos",
            Some(zero),
        );
        self.regs.o_pos = Some(ptr);
        ptr
    }

    pub(super) fn output_point_size(&mut self) -> RegisterPointer {
        if let Some(ptr) = self.regs.o_psize {
            return ptr;
        }
        let zero = self.module.const_f32(0.0);
        let ptr = self.new_builtin_variable(
            VectorType::float(1),
            spirv::StorageClass::Output,
            spirv::BuiltIn::PointSize,
            "oPSize",
            Some(zero),
        );
        self.regs.o_psize = Some(ptr);
        ptr
    }

    fn output_depth(&mut self) -> RegisterPointer {
        if let Some(ptr) = self.regs.o_depth {
            return ptr;
        }
        let zero = self.module.const_f32(0.0);
        let ptr = self.new_builtin_variable(
            VectorType::float(1),
            spirv::StorageClass::Output,
            spirv::BuiltIn::FragDepth,
            "oDepth",
            Some(zero),
        );
        self.module.execution_mode(
            self.entry_point_id,
            spirv::ExecutionMode::DepthReplacing,
            [],
        );
        self.regs.o_depth = Some(ptr);
        ptr
    }

    fn input_face(&mut self) -> RegisterPointer {
        if let Some(ptr) = self.regs.v_face {
            return ptr;
        }
        let front_facing = self.new_builtin_variable(
            VectorType::boolean(1),
            spirv::StorageClass::Input,
            spirv::BuiltIn::FrontFacing,
            "FrontFacing",
            None,
        );
        let ptr = self.new_private_register(VectorType::float(4), "vFace", None);
        self.regs.front_facing = Some(front_facing.id);
        self.regs.v_face = Some(ptr);
        ptr
    }

    /// `base` plus the relative register component, as a signed index.
    fn emit_array_index(
        &mut self,
        base: u32,
        relative: Option<RelativeAddress>,
    ) -> Result<Word, CompileError> {
        let base_id = self.module.const_i32(base as i32);
        let Some(relative) = relative else {
            return Ok(base_id);
        };

        let operand = Operand::new(relative.reg.ty, relative.reg.num)
            .with_swizzle(Swizzle::replicate(relative.component));
        let offset = self.emit_register_load(&operand, WriteMask::X)?;
        let offset = self.emit_convert(offset, ScalarType::Sint32)?;

        let int_type = self.module.scalar_type(ScalarType::Sint32);
        Ok(self.module.i_add(int_type, None, base_id, offset.id)?)
    }

    fn emit_array_element(
        &mut self,
        array: Word,
        storage: spirv::StorageClass,
        ty: VectorType,
        indices: &[Word],
    ) -> Result<RegisterPointer, CompileError> {
        let type_id = self.module.vector_type(ty);
        let ptr_type = self.module.pointer_type(type_id, storage);
        let id = self
            .module
            .access_chain(ptr_type, None, array, indices.iter().copied())?;
        Ok(RegisterPointer { id, ty })
    }

    fn emit_input_pointer(
        &mut self,
        num: u32,
        relative: Option<RelativeAddress>,
    ) -> Result<Option<RegisterPointer>, CompileError> {
        if relative.is_none() && num >= MAX_INTERFACE_REGS {
            return Ok(None);
        }
        let index = self.emit_array_index(num, relative)?;
        let v_array = self.regs.v_array;
        self.emit_array_element(
            v_array,
            spirv::StorageClass::Private,
            VectorType::float(4),
            &[index],
        )
        .map(Some)
    }

    fn emit_output_pointer(
        &mut self,
        num: u32,
        relative: Option<RelativeAddress>,
    ) -> Result<Option<RegisterPointer>, CompileError> {
        let limit = match self.info.stage() {
            ShaderStage::Vertex => MAX_INTERFACE_REGS,
            ShaderStage::Pixel => MAX_RENDER_TARGETS,
        };
        if relative.is_none() && num >= limit {
            return Ok(None);
        }
        let index = self.emit_array_index(num, relative)?;
        let o_array = self.regs.o_array;
        self.emit_array_element(
            o_array,
            spirv::StorageClass::Private,
            VectorType::float(4),
            &[index],
        )
        .map(Some)
    }

    /// Declares `v{reg_number}` on first use when no `dcl` did.
    fn emit_implicit_input(&mut self, reg_number: u32, semantic: Semantic) -> Result<(), CompileError> {
        if reg_number < MAX_INTERFACE_REGS && self.explicit_inputs & (1 << reg_number) == 0 {
            self.emit_dcl_interface(true, reg_number, semantic, WriteMask::all(), false)?;
        }
        Ok(())
    }

    fn emit_implicit_output(&mut self, reg_number: u32, semantic: Semantic) -> Result<(), CompileError> {
        if reg_number < MAX_INTERFACE_REGS && self.explicit_outputs & (1 << reg_number) == 0 {
            self.emit_dcl_interface(false, reg_number, semantic, WriteMask::all(), false)?;
        }
        Ok(())
    }

    /// Resolves the storage an operand refers to, creating it on first reference.
    ///
    /// `None` means the register has no storage in this stage (samplers, labels, predicates,
    /// out-of-range indices).
    pub(super) fn emit_operand_pointer(
        &mut self,
        operand: &Operand,
    ) -> Result<Option<RegisterPointer>, CompileError> {
        self.emit_register_pointer(operand.reg, operand.relative)
    }

    pub(super) fn emit_register_pointer(
        &mut self,
        reg: RegisterId,
        relative: Option<RelativeAddress>,
    ) -> Result<Option<RegisterPointer>, CompileError> {
        let version = self.info.version;
        let num = reg.num;

        match reg.ty {
            RegisterType::Temp => {
                if num >= MAX_TEMP_REGS {
                    return Ok(None);
                }
                if let Some(&ptr) = self.regs.temps.get(&num) {
                    return Ok(Some(ptr));
                }
                let zero = self.module.const_vec4_f32([0.0; 4]);
                let ptr =
                    self.new_private_register(VectorType::float(4), &format!("r{num}"), Some(zero));
                self.regs.temps.insert(num, ptr);
                Ok(Some(ptr))
            }

            RegisterType::Input => {
                if num >= MAX_INTERFACE_REGS {
                    return Ok(None);
                }
                self.emit_implicit_input(num, Semantic::new(Usage::Color, num))?;
                self.emit_input_pointer(num, relative)
            }

            RegisterType::PixelTexcoord | RegisterType::Texture if version.is_pixel() => {
                if num >= MAX_TEXTURE_REGS {
                    return Ok(None);
                }
                if reg.ty == RegisterType::PixelTexcoord || version.has_sm2_texture_addressing() {
                    // Texture coordinates live after the two color inputs.
                    let reg_number = num + 2;
                    self.emit_implicit_input(reg_number, Semantic::new(Usage::Texcoord, num))?;
                    return self.emit_input_pointer(reg_number, None);
                }
                if let Some(&ptr) = self.regs.textures.get(&num) {
                    return Ok(Some(ptr));
                }
                let zero = self.module.const_vec4_f32([0.0; 4]);
                let ptr =
                    self.new_private_register(VectorType::float(4), &format!("t{num}"), Some(zero));
                self.regs.textures.insert(num, ptr);
                Ok(Some(ptr))
            }

            RegisterType::Addr | RegisterType::Texture => {
                if version.is_pixel() {
                    return Ok(None);
                }
                if let Some(ptr) = self.regs.addr {
                    return Ok(Some(ptr));
                }
                let zero = self.module.const_vec4_i32([0; 4]);
                let ptr = self.new_private_register(VectorType::sint(4), "a0", Some(zero));
                self.regs.addr = Some(ptr);
                Ok(Some(ptr))
            }

            RegisterType::Const => {
                if relative.is_none() {
                    if num >= MAX_FLOAT_CONSTANTS {
                        return Ok(None);
                    }
                    if let Some(&ptr) = self.regs.float_defs.get(&num) {
                        return Ok(Some(ptr));
                    }
                }
                let member = self.module.const_i32(0);
                let index = self.emit_array_index(num, relative)?;
                let cbuffer = self.regs.cbuffer;
                self.emit_array_element(
                    cbuffer,
                    spirv::StorageClass::Uniform,
                    VectorType::float(4),
                    &[member, index],
                )
                .map(Some)
            }

            RegisterType::ConstInt => {
                if relative.is_none() {
                    if num >= MAX_INT_CONSTANTS {
                        return Ok(None);
                    }
                    if let Some(&ptr) = self.regs.int_defs.get(&num) {
                        return Ok(Some(ptr));
                    }
                }
                let member = self.module.const_i32(1);
                let index = self.emit_array_index(num, relative)?;
                let cbuffer = self.regs.cbuffer;
                self.emit_array_element(
                    cbuffer,
                    spirv::StorageClass::Uniform,
                    VectorType::sint(4),
                    &[member, index],
                )
                .map(Some)
            }

            RegisterType::ConstBool => {
                if relative.is_none() {
                    if num >= MAX_BOOL_CONSTANTS {
                        return Ok(None);
                    }
                    if let Some(&ptr) = self.regs.bool_defs.get(&num) {
                        return Ok(Some(ptr));
                    }
                }
                self.emit_bool_constant(num, relative).map(Some)
            }

            RegisterType::RasterizerOut => match num {
                n if n == RasterizerOut::Position as u32 => Ok(Some(self.output_position())),
                n if n == RasterizerOut::Fog as u32 => {
                    if let Some(ptr) = self.regs.o_fog {
                        return Ok(Some(ptr));
                    }
                    let zero = self.module.const_vec4_f32([0.0; 4]);
                    let ptr = self.new_private_register(VectorType::float(4), "oFog", Some(zero));
                    self.regs.o_fog = Some(ptr);
                    Ok(Some(ptr))
                }
                n if n == RasterizerOut::PointSize as u32 => Ok(Some(self.output_point_size())),
                _ => Ok(None),
            },

            RegisterType::ColorOut | RegisterType::AttributeOut => {
                self.emit_implicit_output(num, Semantic::new(Usage::Color, num))?;
                self.emit_output_pointer(num, None)
            }

            RegisterType::Output => {
                if version.is_vertex() && !version.is_sm3() {
                    // oT# sits after oD0 and oD1.
                    let reg_number = num + 2;
                    self.emit_implicit_output(reg_number, Semantic::new(Usage::Texcoord, num))?;
                    return self.emit_output_pointer(reg_number, None);
                }
                let relative = if version.is_sm3() { relative } else { None };
                self.emit_output_pointer(num, relative)
            }

            RegisterType::DepthOut => Ok(Some(self.output_depth())),

            RegisterType::Loop => {
                if let Some(ptr) = self.regs.loop_counter {
                    return Ok(Some(ptr));
                }
                let zero = self.module.const_i32(0);
                let ptr = self.new_private_register(VectorType::sint(1), "aL", Some(zero));
                self.regs.loop_counter = Some(ptr);
                Ok(Some(ptr))
            }

            RegisterType::MiscType => match num {
                n if n == MiscType::Position as u32 => {
                    if let Some(ptr) = self.regs.v_pos {
                        return Ok(Some(ptr));
                    }
                    let ptr = self.new_builtin_variable(
                        VectorType::float(4),
                        spirv::StorageClass::Input,
                        spirv::BuiltIn::FragCoord,
                        "vPos",
                        None,
                    );
                    self.regs.v_pos = Some(ptr);
                    Ok(Some(ptr))
                }
                n if n == MiscType::Face as u32 => Ok(Some(self.input_face())),
                _ => Ok(None),
            },

            RegisterType::Sampler
            | RegisterType::Label
            | RegisterType::Predicate
            | RegisterType::PixelTexcoord => Ok(None),
        }
    }

    /// Extracts bit `index` of the packed boolean constants into a fresh private variable.
    fn emit_bool_constant(
        &mut self,
        num: u32,
        relative: Option<RelativeAddress>,
    ) -> Result<RegisterPointer, CompileError> {
        let uint = self.module.scalar_type(ScalarType::Uint32);
        let bool_type = self.module.bool_type();

        let member = self.module.const_i32(2);
        let cbuffer = self.regs.cbuffer;
        let bits_ptr = self.emit_array_element(
            cbuffer,
            spirv::StorageClass::Uniform,
            VectorType::uint(1),
            &[member],
        )?;
        let bits = self.module.load(uint, None, bits_ptr.id, None, [])?;

        let index = self.emit_array_index(num, relative)?;
        let count = self.module.const_u32(1);
        let bit = self
            .module
            .bit_field_u_extract(uint, None, bits, index, count)?;
        let zero = self.module.const_u32(0);
        let value = self.module.i_not_equal(bool_type, None, bit, zero)?;

        let key = relative.is_none().then_some(num);
        let ptr = match self.regs.bool_reads.get(&key) {
            Some(&ptr) => ptr,
            None => {
                let name = match key {
                    Some(num) => format!("b{num}"),
                    None => "b_indexed".to_owned(),
                };
                let ptr = self.new_private_register(VectorType::boolean(1), &name, None);
                self.regs.bool_reads.insert(key, ptr);
                ptr
            }
        };
        self.module.store(ptr.id, value, None, [])?;
        Ok(ptr)
    }

    pub(super) fn emit_dcl(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let dst = *self.dst_operand(inst)?;
        let version = self.info.version;

        if dst.reg.ty == RegisterType::Sampler {
            let texture_type = match inst.dcl {
                Some(DclInfo::Sampler(ty)) => ty,
                _ => TextureType::Texture2D,
            };
            return self.emit_dcl_sampler(dst.reg.num, texture_type);
        }

        let semantic = match inst.dcl {
            Some(DclInfo::Semantic(semantic)) => Some(semantic),
            _ => None,
        };

        match dst.reg.ty {
            RegisterType::Input => {
                let semantic = if version.is_pixel() && !version.is_sm3() {
                    Semantic::new(Usage::Color, dst.reg.num)
                } else {
                    semantic.ok_or(CompileError::MissingOperand {
                        opcode: inst.opcode,
                        operand: "semantic",
                    })?
                };
                self.emit_dcl_interface(true, dst.reg.num, semantic, dst.mask, dst.centroid)
            }
            RegisterType::Texture if version.is_pixel() => {
                // ps_2_x `dcl t#`: the coordinate register behind v{n+2}.
                let semantic = Semantic::new(Usage::Texcoord, dst.reg.num);
                self.emit_dcl_interface(true, dst.reg.num + 2, semantic, dst.mask, dst.centroid)
            }
            RegisterType::Output => {
                let semantic = semantic.ok_or(CompileError::MissingOperand {
                    opcode: inst.opcode,
                    operand: "semantic",
                })?;
                self.emit_dcl_interface(false, dst.reg.num, semantic, dst.mask, dst.centroid)
            }
            // `dcl vPos` / `dcl vFace` and the like need no bookkeeping.
            _ => Ok(()),
        }
    }

    /// Records an interface element and assigns its location.
    pub(super) fn emit_dcl_interface(
        &mut self,
        input: bool,
        reg_number: u32,
        semantic: Semantic,
        mask: WriteMask,
        centroid: bool,
    ) -> Result<(), CompileError> {
        let stage = self.info.stage();
        let reg = RegisterId::new(
            match (input, stage) {
                (true, _) => RegisterType::Input,
                (false, ShaderStage::Vertex) => RegisterType::Output,
                (false, ShaderStage::Pixel) => RegisterType::ColorOut,
            },
            reg_number,
        );

        let limit = match (input, stage) {
            (false, ShaderStage::Pixel) => MAX_RENDER_TARGETS,
            _ => MAX_INTERFACE_REGS,
        };
        if reg_number >= limit {
            self.warn(CompileWarning::UnresolvedRegister {
                opcode: self.opcode,
                reg,
            });
            return Ok(());
        }

        let explicit = if input {
            self.explicit_inputs
        } else {
            self.explicit_outputs
        };
        if explicit & (1 << reg_number) != 0 {
            self.warn(CompileWarning::DuplicateDeclaration { reg });
            return Ok(());
        }

        let builtin = !input && builtin_output(semantic).is_some();
        let slot = match (stage, input) {
            (ShaderStage::Vertex, true) => self.isgn.len() as u32,
            (ShaderStage::Pixel, false) => reg_number,
            _ if builtin => 0,
            _ => self.linker.slot_for(semantic)?,
        };

        let element = InterfaceElement {
            slot,
            reg_number,
            semantic,
            mask,
            centroid,
        };
        debug!(%semantic, slot, reg_number, input, "declared interface register");

        if input {
            self.isgn.push(element);
            self.explicit_inputs |= 1 << reg_number;
        } else {
            self.osgn.push(element);
            self.explicit_outputs |= 1 << reg_number;
        }

        if !builtin && slot < u32::BITS {
            if input {
                self.interface_slots.input_slots |= 1 << slot;
            } else {
                self.interface_slots.output_slots |= 1 << slot;
            }
        }
        Ok(())
    }

    pub(super) fn emit_dcl_sampler(
        &mut self,
        index: u32,
        texture_type: TextureType,
    ) -> Result<(), CompileError> {
        let Some(entry) = self.samplers.get(index as usize) else {
            self.warn(CompileWarning::UnresolvedRegister {
                opcode: self.opcode,
                reg: RegisterId::new(RegisterType::Sampler, index),
            });
            return Ok(());
        };
        if entry.is_some() {
            self.warn(CompileWarning::DuplicateDeclaration {
                reg: RegisterId::new(RegisterType::Sampler, index),
            });
            return Ok(());
        }

        let (dim, view) = match texture_type {
            TextureType::Texture2D => (spirv::Dim::Dim2D, ImageViewType::D2),
            TextureType::TextureCube => (spirv::Dim::DimCube, ImageViewType::Cube),
            TextureType::Texture3D => (spirv::Dim::Dim3D, ImageViewType::D3),
        };

        let float = self.module.scalar_type(ScalarType::Float32);
        let image_type = self.module.type_image(
            float,
            dim,
            0,
            0,
            0,
            1,
            spirv::ImageFormat::Unknown,
            None,
        );
        let sampled_image_type = self.module.type_sampled_image(image_type);
        let ptr_type = self
            .module
            .pointer_type(sampled_image_type, spirv::StorageClass::UniformConstant);
        let var = self
            .module
            .new_var(ptr_type, spirv::StorageClass::UniformConstant, None);
        self.module.set_name(var, &format!("s{index}"));

        let slot = binding_model::resource_slot(self.info.stage(), BindingType::Image, index);
        self.module.decorate_binding(var, DESCRIPTOR_SET, slot);
        self.resource_bindings.push(ResourceBinding::sampler(slot, view));

        self.samplers[index as usize] = Some(Sampler {
            var,
            sampled_image_type,
            texture_type,
        });
        Ok(())
    }

    /// Looks up sampler `index`, declaring it as 2D when the program never did.
    pub(super) fn sampler(&mut self, index: u32) -> Result<Option<Sampler>, CompileError> {
        if index >= MAX_SAMPLERS {
            return Ok(None);
        }
        if self.samplers[index as usize].is_none() {
            self.warn(CompileWarning::ImplicitSampler { index });
            self.emit_dcl_sampler(index, TextureType::Texture2D)?;
        }
        Ok(self.samplers[index as usize])
    }

    pub(super) fn emit_def(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let dst = *self.dst_operand(inst)?;
        let num = dst.reg.num;

        let (ty, init, limit, prefix) = match (inst.opcode, inst.def) {
            (Opcode::Def, Some(DefValue::Float(value))) => (
                VectorType::float(4),
                self.module.const_vec4_f32(value),
                MAX_FLOAT_CONSTANTS,
                "cF",
            ),
            (Opcode::DefI, Some(DefValue::Int(value))) => (
                VectorType::sint(4),
                self.module.const_vec4_i32(value),
                MAX_INT_CONSTANTS,
                "cI",
            ),
            (Opcode::DefB, Some(DefValue::Bool(value))) => (
                VectorType::boolean(1),
                self.module.const_bool(value),
                MAX_BOOL_CONSTANTS,
                "cB",
            ),
            (opcode, None) => {
                return Err(CompileError::MissingOperand {
                    opcode,
                    operand: "immediate",
                })
            }
            (opcode, Some(_)) => {
                return Err(CompileError::structural(
                    opcode,
                    "immediate payload does not match the definition kind",
                ))
            }
        };

        if num >= limit {
            self.warn(CompileWarning::UnresolvedRegister {
                opcode: inst.opcode,
                reg: dst.reg,
            });
            return Ok(());
        }

        let ptr = self.new_private_register(ty, &format!("{prefix}{num}_def"), Some(init));
        let defs = match inst.opcode {
            Opcode::Def => &mut self.regs.float_defs,
            Opcode::DefI => &mut self.regs.int_defs,
            _ => &mut self.regs.bool_defs,
        };
        defs.insert(num, ptr);
        Ok(())
    }
}
