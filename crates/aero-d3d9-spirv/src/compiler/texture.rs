use rspirv::dr::Operand as SpirvOperand;
use rspirv::spirv::{self, Word};

use super::registers::RegisterValue;
use super::Compiler;
use crate::error::{CompileError, CompileWarning};
use crate::instruction::{Instruction, Opcode, Operand, RegisterId, RegisterType, WriteMask};
use crate::spirv::{ScalarType, VectorType};
use crate::types::ShaderStage;

impl Compiler<'_> {
    /// The interpolated coordinate bound to `t{num}` in ps_1_x.
    fn pixel_texcoord(num: u32) -> Operand {
        Operand::new(RegisterType::PixelTexcoord, num)
    }

    pub(super) fn emit_tex_coord(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let dst = *self.dst_operand(inst)?;
        let Some(ptr) = self.emit_operand_pointer(&dst)? else {
            self.warn_unresolved(dst.reg);
            return Ok(());
        };
        let mask = Self::dst_write_mask(ptr, &dst);
        let value = self.emit_register_load(&Self::pixel_texcoord(dst.reg.num), mask)?;
        self.emit_dst_store(ptr, value, &dst)
    }

    pub(super) fn emit_texture_sample(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let dst = *self.dst_operand(inst)?;
        let version = self.info.version;

        let (coordinate, sampler_index) = if version.major >= 2 {
            let coord = *self.src_operand(inst, 0)?;
            let sampler = self.src_operand(inst, 1)?.reg.num;
            (self.emit_register_load(&coord, WriteMask::all())?, sampler)
        } else if version.has_sm2_texture_addressing() {
            let coord = *self.src_operand(inst, 0)?;
            (self.emit_register_load(&coord, WriteMask::all())?, dst.reg.num)
        } else {
            let coord = Self::pixel_texcoord(dst.reg.num);
            (self.emit_register_load(&coord, WriteMask::all())?, dst.reg.num)
        };
        let coordinate = self.emit_to_float(coordinate)?;

        let Some(sampler) = self.sampler(sampler_index)? else {
            self.warn_unresolved(RegisterId::new(RegisterType::Sampler, sampler_index));
            return Ok(());
        };
        let Some(ptr) = self.emit_operand_pointer(&dst)? else {
            self.warn_unresolved(dst.reg);
            return Ok(());
        };

        let sampled_image = self
            .module
            .load(sampler.sampled_image_type, None, sampler.var, None, [])?;
        let vec4 = self.module.vector_type(VectorType::float(4));
        let float = self.module.scalar_type(ScalarType::Float32);

        let explicit = if inst.opcode == Opcode::TexLdd {
            let grad_mask = match sampler.coordinate_count() {
                2 => WriteMask::XY,
                _ => WriteMask::XYZ,
            };
            let ddx = *self.src_operand(inst, 2)?;
            let ddy = *self.src_operand(inst, 3)?;
            let ddx = self.emit_register_load(&ddx, grad_mask)?;
            let ddy = self.emit_register_load(&ddy, grad_mask)?;
            let ddx = self.emit_to_float(ddx)?;
            let ddy = self.emit_to_float(ddy)?;
            Some((
                spirv::ImageOperands::GRAD,
                vec![SpirvOperand::IdRef(ddx.id), SpirvOperand::IdRef(ddy.id)],
            ))
        } else if inst.opcode == Opcode::TexLdl {
            let lod = self
                .module
                .composite_extract(float, None, coordinate.id, [3])?;
            Some((spirv::ImageOperands::LOD, vec![SpirvOperand::IdRef(lod)]))
        } else if self.info.stage() == ShaderStage::Vertex {
            // No derivatives in vertex shaders.
            let lod = self.module.const_f32(0.0);
            Some((spirv::ImageOperands::LOD, vec![SpirvOperand::IdRef(lod)]))
        } else {
            None
        };

        let sampled = match explicit {
            Some((operands, params)) => self.module.image_sample_explicit_lod(
                vec4,
                None,
                sampled_image,
                coordinate.id,
                operands,
                params,
            )?,
            None => self.module.image_sample_implicit_lod(
                vec4,
                None,
                sampled_image,
                coordinate.id,
                None,
                [],
            )?,
        };

        let mask = Self::dst_write_mask(ptr, &dst);
        let value = self.emit_register_swizzle(
            RegisterValue {
                id: sampled,
                ty: VectorType::float(4),
            },
            crate::instruction::Swizzle::identity(),
            mask,
        )?;
        self.emit_dst_store(ptr, value, &dst)
    }

    pub(super) fn emit_texture_kill(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        if self.info.stage() != ShaderStage::Pixel {
            self.warn(CompileWarning::UnsupportedOpcode {
                opcode: inst.opcode,
            });
            return Ok(());
        }

        let dst = *self.dst_operand(inst)?;
        let operand = if self.info.version.has_sm2_texture_addressing() {
            dst
        } else {
            Self::pixel_texcoord(dst.reg.num)
        };
        let value = self.emit_register_load(&operand, WriteMask::XYZ)?;
        let value = self.emit_to_float(value)?;

        let count = value.ty.ccount;
        let bool_vec = self.module.vector_type(VectorType::boolean(count));
        let bool_type = self.module.bool_type();
        let zero = self.module.const_f32_replicant(0.0, count);
        let negative = self
            .module
            .f_ord_less_than(bool_vec, None, value.id, zero)?;
        let kill = if count > 1 {
            self.module.any(bool_type, None, negative)?
        } else {
            negative
        };

        let Some(kill_state) = self.regs.kill_state else {
            return self.emit_conditional_kill(kill);
        };

        let previous = self.module.load(bool_type, None, kill_state, None, [])?;
        let killed = self.module.logical_or(bool_type, None, previous, kill)?;
        self.module.store(kill_state, killed, None, [])?;

        if let Some(invocation_mask) = self.regs.invocation_mask {
            // Discard early once every lane that entered the shader wants to.
            let ballot = self.emit_ballot(killed)?;
            let uint4 = self.module.vector_type(VectorType::uint(4));
            let entered = self.module.load(uint4, None, invocation_mask, None, [])?;
            let bool4 = self.module.vector_type(VectorType::boolean(4));
            let same = self.module.i_equal(bool4, None, ballot, entered)?;
            let all_killed = self.module.all(bool_type, None, same)?;
            self.emit_conditional_kill(all_killed)?;
        }
        Ok(())
    }

    /// `if (condition) discard;`
    pub(super) fn emit_conditional_kill(&mut self, condition: Word) -> Result<(), CompileError> {
        let label_if = self.module.id();
        let label_end = self.module.id();
        self.module
            .selection_merge(label_end, spirv::SelectionControl::NONE)?;
        self.module
            .branch_conditional(condition, label_if, label_end, [])?;
        self.module.label(label_if)?;
        self.module.kill()?;
        self.module.label(label_end)?;
        Ok(())
    }
}
