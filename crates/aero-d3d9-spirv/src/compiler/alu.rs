use rspirv::spirv::{self, Word};

use super::registers::RegisterValue;
use super::Compiler;
use crate::error::{CompileError, CompileWarning};
use crate::instruction::{Instruction, Opcode, WriteMask};
use crate::spirv::{ScalarType, VectorType};
use crate::types::ShaderStage;

/// Exponent clamp applied by `lit`.
const LIT_POWER_LIMIT: f32 = 127.9961;

impl Compiler<'_> {
    pub(super) fn emit_mov(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let dst = *self.dst_operand(inst)?;
        let Some(ptr) = self.emit_operand_pointer(&dst)? else {
            self.warn_unresolved(dst.reg);
            return Ok(());
        };
        let mask = Self::dst_write_mask(ptr, &dst);
        let src = *self.src_operand(inst, 0)?;

        // `mov` into `a0` converts just like `mova`; the store handles it.
        let value = self.emit_register_load(&src, mask)?;
        self.emit_dst_store(ptr, value, &dst)
    }

    /// Loads source `index` as floats covering `mask`.
    fn emit_float_src(
        &mut self,
        inst: &Instruction,
        index: usize,
        mask: WriteMask,
    ) -> Result<Word, CompileError> {
        let operand = *self.src_operand(inst, index)?;
        let value = self.emit_register_load(&operand, mask)?;
        Ok(self.emit_to_float(value)?.id)
    }

    fn emit_extract_float(&mut self, vector: Word, component: u32) -> Result<Word, CompileError> {
        let float = self.module.scalar_type(ScalarType::Float32);
        Ok(self
            .module
            .composite_extract(float, None, vector, [component])?)
    }

    /// Builds the result from per-component scalars, keeping those `mask` enables.
    fn emit_compose_masked(
        &mut self,
        components: [Word; 4],
        mask: WriteMask,
    ) -> Result<RegisterValue, CompileError> {
        let picked: Vec<Word> = mask.components().map(|i| components[i as usize]).collect();
        let ty = VectorType::float(picked.len() as u32);
        if let [single] = picked[..] {
            return Ok(RegisterValue { id: single, ty });
        }
        let type_id = self.module.vector_type(ty);
        let id = self.module.composite_construct(type_id, None, picked)?;
        Ok(RegisterValue { id, ty })
    }

    pub(super) fn emit_vector_alu(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        // Derivatives only exist in the fragment execution model.
        if matches!(inst.opcode, Opcode::DsX | Opcode::DsY)
            && self.info.stage() != ShaderStage::Pixel
        {
            self.warn(CompileWarning::UnsupportedOpcode { opcode: inst.opcode });
            return Ok(());
        }

        let dst = *self.dst_operand(inst)?;
        let Some(ptr) = self.emit_operand_pointer(&dst)? else {
            self.warn_unresolved(dst.reg);
            return Ok(());
        };

        let mut mask = Self::dst_write_mask(ptr, &dst);
        if mask.pop_count() == 0 {
            return Ok(());
        }
        let count = mask.pop_count();
        let ty = VectorType::float(count);
        let type_id = self.module.vector_type(ty);
        let float = self.module.scalar_type(ScalarType::Float32);
        let scalar = VectorType::float(1);

        let value = |id: Word| RegisterValue { id, ty };

        let result = match inst.opcode {
            Opcode::Add => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                value(self.module.f_add(type_id, None, a, b)?)
            }
            Opcode::Sub => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                value(self.module.f_sub(type_id, None, a, b)?)
            }
            Opcode::Mul => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                value(self.module.f_mul(type_id, None, a, b)?)
            }
            Opcode::Mad => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                let c = self.emit_float_src(inst, 2, mask)?;
                value(self.module.glsl(type_id, spirv::GLOp::Fma, &[a, b, c])?)
            }
            Opcode::Rcp => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let one = self.module.const_f32_replicant(1.0, count);
                let id = self.module.f_div(type_id, None, one, a)?;
                self.emit_clamp_to_finite(value(id))?
            }
            Opcode::Rsq => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let id = self.module.glsl(type_id, spirv::GLOp::InverseSqrt, &[a])?;
                self.emit_clamp_to_finite(value(id))?
            }
            Opcode::Dp3 | Opcode::Dp4 => {
                let width = if inst.opcode == Opcode::Dp3 {
                    WriteMask::XYZ
                } else {
                    WriteMask::XYZW
                };
                let a = self.emit_float_src(inst, 0, width)?;
                let b = self.emit_float_src(inst, 1, width)?;
                RegisterValue {
                    id: self.module.dot(float, None, a, b)?,
                    ty: scalar,
                }
            }
            Opcode::Slt | Opcode::Sge => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                let bool_type = self.module.vector_type(VectorType::boolean(count));
                let cond = if inst.opcode == Opcode::Slt {
                    self.module.f_ord_less_than(bool_type, None, a, b)?
                } else {
                    self.module.f_ord_greater_than_equal(bool_type, None, a, b)?
                };
                let one = self.module.const_f32_replicant(1.0, count);
                let zero = self.module.const_f32_replicant(0.0, count);
                value(self.module.select(type_id, None, cond, one, zero)?)
            }
            Opcode::Min | Opcode::Max => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                let op = if inst.opcode == Opcode::Min {
                    spirv::GLOp::FMin
                } else {
                    spirv::GLOp::FMax
                };
                value(self.module.glsl(type_id, op, &[a, b])?)
            }
            Opcode::Exp | Opcode::ExpP => {
                let a = self.emit_float_src(inst, 0, mask)?;
                value(self.module.glsl(type_id, spirv::GLOp::Exp2, &[a])?)
            }
            Opcode::Pow => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let b = self.emit_float_src(inst, 1, mask)?;
                value(self.module.glsl(type_id, spirv::GLOp::Pow, &[a, b])?)
            }
            Opcode::Abs => {
                let a = self.emit_float_src(inst, 0, mask)?;
                value(self.module.glsl(type_id, spirv::GLOp::FAbs, &[a])?)
            }
            Opcode::Frc => {
                let a = self.emit_float_src(inst, 0, mask)?;
                value(self.module.glsl(type_id, spirv::GLOp::Fract, &[a])?)
            }
            Opcode::Log | Opcode::LogP => {
                let a = self.emit_float_src(inst, 0, mask)?;
                let abs = self.module.glsl(type_id, spirv::GLOp::FAbs, &[a])?;
                let id = self.module.glsl(type_id, spirv::GLOp::Log2, &[abs])?;
                self.emit_clamp_to_finite(value(id))?
            }
            Opcode::Nrm => {
                let vec3 = self.emit_float_src(inst, 0, WriteMask::XYZ)?;
                let length_sq = self.module.dot(float, None, vec3, vec3)?;
                let inv = self
                    .module
                    .glsl(float, spirv::GLOp::InverseSqrt, &[length_sq])?;
                let inv = self.emit_clamp_to_finite(RegisterValue {
                    id: inv,
                    ty: scalar,
                })?;
                let a = self.emit_float_src(inst, 0, mask)?;
                let id = if count == 1 {
                    self.module.f_mul(type_id, None, a, inv.id)?
                } else {
                    self.module.vector_times_scalar(type_id, None, a, inv.id)?
                };
                value(id)
            }
            Opcode::SinCos => {
                // Only .x (cos) and .y (sin) are defined; .z and .w are left untouched.
                mask = WriteMask(mask.0 & WriteMask::XY.0);
                if mask.pop_count() == 0 {
                    return Ok(());
                }
                let a = self.emit_float_src(inst, 0, WriteMask::X)?;
                let cos = self.module.glsl(float, spirv::GLOp::Cos, &[a])?;
                let sin = self.module.glsl(float, spirv::GLOp::Sin, &[a])?;
                let zero = self.module.const_f32(0.0);
                self.emit_compose_masked([cos, sin, zero, zero], mask)?
            }
            Opcode::Lit => {
                let src = self.emit_float_src(inst, 0, WriteMask::XYZW)?;
                let x = self.emit_extract_float(src, 0)?;
                let y = self.emit_extract_float(src, 1)?;
                let w = self.emit_extract_float(src, 3)?;

                let zero = self.module.const_f32(0.0);
                let one = self.module.const_f32(1.0);
                let bool_type = self.module.bool_type();

                let diffuse = self.module.glsl(float, spirv::GLOp::FMax, &[x, zero])?;

                let lo = self.module.const_f32(-LIT_POWER_LIMIT);
                let hi = self.module.const_f32(LIT_POWER_LIMIT);
                let power = self.module.glsl(float, spirv::GLOp::FClamp, &[w, lo, hi])?;
                let specular = self.module.glsl(float, spirv::GLOp::Pow, &[y, power])?;
                let x_test = self
                    .module
                    .f_ord_greater_than_equal(bool_type, None, x, zero)?;
                let y_test = self
                    .module
                    .f_ord_greater_than_equal(bool_type, None, y, zero)?;
                let z_test = self.module.logical_and(bool_type, None, x_test, y_test)?;
                let specular = self.module.select(float, None, z_test, specular, zero)?;

                self.emit_compose_masked([one, diffuse, specular, one], mask)?
            }
            Opcode::Dst => {
                let a = self.emit_float_src(inst, 0, WriteMask::XYZW)?;
                let b = self.emit_float_src(inst, 1, WriteMask::XYZW)?;
                let ay = self.emit_extract_float(a, 1)?;
                let by = self.emit_extract_float(b, 1)?;
                let az = self.emit_extract_float(a, 2)?;
                let bw = self.emit_extract_float(b, 3)?;
                let y = self.module.f_mul(float, None, ay, by)?;
                let one = self.module.const_f32(1.0);
                self.emit_compose_masked([one, y, az, bw], mask)?
            }
            Opcode::Lrp => {
                let t = self.emit_float_src(inst, 0, mask)?;
                let a = self.emit_float_src(inst, 1, mask)?;
                let b = self.emit_float_src(inst, 2, mask)?;
                let diff = self.module.f_sub(type_id, None, a, b)?;
                value(self.module.glsl(type_id, spirv::GLOp::Fma, &[t, diff, b])?)
            }
            Opcode::Cmp | Opcode::Cnd => {
                let cond_src = self.emit_float_src(inst, 0, mask)?;
                let a = self.emit_float_src(inst, 1, mask)?;
                let b = self.emit_float_src(inst, 2, mask)?;
                let bool_type = self.module.vector_type(VectorType::boolean(count));
                let cond = if inst.opcode == Opcode::Cmp {
                    let zero = self.module.const_f32_replicant(0.0, count);
                    self.module
                        .f_ord_greater_than_equal(bool_type, None, cond_src, zero)?
                } else {
                    let half = self.module.const_f32_replicant(0.5, count);
                    self.module
                        .f_ord_greater_than(bool_type, None, cond_src, half)?
                };
                value(self.module.select(type_id, None, cond, a, b)?)
            }
            Opcode::Dp2Add => {
                let a = self.emit_float_src(inst, 0, WriteMask::XY)?;
                let b = self.emit_float_src(inst, 1, WriteMask::XY)?;
                let c = self.emit_float_src(inst, 2, WriteMask::X)?;
                let dot = self.module.dot(float, None, a, b)?;
                RegisterValue {
                    id: self.module.f_add(float, None, dot, c)?,
                    ty: scalar,
                }
            }
            Opcode::DsX => {
                let a = self.emit_float_src(inst, 0, mask)?;
                value(self.module.d_pdx(type_id, None, a)?)
            }
            Opcode::DsY => {
                let a = self.emit_float_src(inst, 0, mask)?;
                value(self.module.d_pdy(type_id, None, a)?)
            }
            opcode => {
                return Err(CompileError::structural(
                    opcode,
                    "not a vector ALU instruction",
                ))
            }
        };

        self.emit_dst_store_masked(ptr, result, mask, dst.saturate)
    }
}
