//! Source operand loads (swizzle and modifiers) and masked destination stores.

use rspirv::spirv::{self, Word};

use super::registers::{RegisterPointer, RegisterValue};
use super::Compiler;
use crate::error::{CompileError, CompileWarning};
use crate::instruction::{Comparison, Operand, RegisterId, SrcModifier, Swizzle, WriteMask};
use crate::spirv::{ScalarType, VectorType};

/// Largest finite `f32`, the clamp range for `rcp`, `rsq`, `log` and `nrm`.
const FLT_MAX: f32 = f32::MAX;

impl Compiler<'_> {
    pub(super) fn warn_unresolved(&mut self, reg: RegisterId) {
        self.warn(CompileWarning::UnresolvedRegister {
            opcode: self.opcode,
            reg,
        });
    }

    /// Components a destination store writes. Scalar registers only ever take `.x`.
    pub(super) fn dst_write_mask(ptr: RegisterPointer, dst: &Operand) -> WriteMask {
        if ptr.ty.ccount == 1 {
            WriteMask::X
        } else {
            dst.mask
        }
    }

    pub(super) fn emit_value_load(
        &mut self,
        ptr: RegisterPointer,
    ) -> Result<RegisterValue, CompileError> {
        let type_id = self.module.vector_type(ptr.ty);
        let id = self.module.load(type_id, None, ptr.id, None, [])?;
        Ok(RegisterValue { id, ty: ptr.ty })
    }

    /// Loads a source operand, swizzled down to the components `mask` selects, with its source
    /// modifier applied. Unresolvable registers read as zero.
    pub(super) fn emit_register_load(
        &mut self,
        operand: &Operand,
        mask: WriteMask,
    ) -> Result<RegisterValue, CompileError> {
        let mask = if mask.pop_count() == 0 {
            WriteMask::X
        } else {
            mask
        };

        let Some(ptr) = self.emit_operand_pointer(operand)? else {
            self.warn_unresolved(operand.reg);
            return Ok(self.zero_value(VectorType::float(mask.pop_count())));
        };
        let raw = self.emit_value_load(ptr)?;

        let value = match operand.modifier {
            SrcModifier::Dz | SrcModifier::Dw if raw.ty.ctype == ScalarType::Float32 => {
                let full = self.emit_register_swizzle(raw, operand.swizzle, WriteMask::all())?;
                let divisor = if operand.modifier == SrcModifier::Dz { 2 } else { 3 };
                let projected = self.emit_project(full, divisor)?;
                self.emit_register_swizzle(projected, Swizzle::identity(), mask)?
            }
            _ => self.emit_register_swizzle(raw, operand.swizzle, mask)?,
        };
        self.emit_src_modifiers(value, operand.modifier)
    }

    fn zero_value(&mut self, ty: VectorType) -> RegisterValue {
        RegisterValue {
            id: self.module.const_zero(ty),
            ty,
        }
    }

    /// Picks the swizzled components at the positions `mask` enables.
    pub(super) fn emit_register_swizzle(
        &mut self,
        value: RegisterValue,
        swizzle: Swizzle,
        mask: WriteMask,
    ) -> Result<RegisterValue, CompileError> {
        let count = mask.pop_count();
        if value.ty.ccount == 1 {
            return self.emit_register_extend(value, count);
        }

        let indices: Vec<u32> = mask
            .components()
            .map(|i| swizzle.get(i).index().min(value.ty.ccount - 1))
            .collect();
        let is_identity = count == value.ty.ccount
            && indices.iter().enumerate().all(|(i, &c)| c == i as u32);
        if is_identity {
            return Ok(value);
        }

        let ty = value.ty.with_count(count);
        let type_id = self.module.vector_type(ty);
        let id = if count == 1 {
            self.module
                .composite_extract(type_id, None, value.id, [indices[0]])?
        } else {
            self.module
                .vector_shuffle(type_id, None, value.id, value.id, indices)?
        };
        Ok(RegisterValue { id, ty })
    }

    /// Splats a scalar across `count` components.
    pub(super) fn emit_register_extend(
        &mut self,
        value: RegisterValue,
        count: u32,
    ) -> Result<RegisterValue, CompileError> {
        if value.ty.ccount == count || count <= 1 {
            return Ok(value);
        }
        let ty = value.ty.with_count(count);
        let type_id = self.module.vector_type(ty);
        let id = self
            .module
            .composite_construct(type_id, None, vec![value.id; count as usize])?;
        Ok(RegisterValue { id, ty })
    }

    pub(super) fn emit_register_extract(
        &mut self,
        value: RegisterValue,
        component: u32,
    ) -> Result<RegisterValue, CompileError> {
        if value.ty.ccount == 1 {
            return Ok(value);
        }
        let ty = value.ty.with_count(1);
        let type_id = self.module.vector_type(ty);
        let id = self
            .module
            .composite_extract(type_id, None, value.id, [component])?;
        Ok(RegisterValue { id, ty })
    }

    /// `value / value[component]`, as used by the `_dz` / `_dw` modifiers.
    fn emit_project(
        &mut self,
        value: RegisterValue,
        component: u32,
    ) -> Result<RegisterValue, CompileError> {
        let divisor = self.emit_register_swizzle(
            value,
            Swizzle::replicate(crate::instruction::SwizzleComponent::from_index(component)),
            WriteMask::all(),
        )?;
        let type_id = self.module.vector_type(value.ty);
        let id = self.module.f_div(type_id, None, value.id, divisor.id)?;
        Ok(RegisterValue { id, ty: value.ty })
    }

    fn emit_src_modifiers(
        &mut self,
        value: RegisterValue,
        modifier: SrcModifier,
    ) -> Result<RegisterValue, CompileError> {
        let type_id = self.module.vector_type(value.ty);
        let count = value.ty.ccount;
        let mut id = value.id;

        match value.ty.ctype {
            ScalarType::Float32 => {
                if matches!(modifier, SrcModifier::Bias | SrcModifier::BiasNegate) {
                    let half = self.module.const_f32_replicant(0.5, count);
                    id = self.module.f_sub(type_id, None, id, half)?;
                }
                if matches!(modifier, SrcModifier::Sign | SrcModifier::SignNegate) {
                    // _bx2: 2x - 1
                    let two = self.module.const_f32_replicant(2.0, count);
                    let one = self.module.const_f32_replicant(1.0, count);
                    id = self.module.f_mul(type_id, None, id, two)?;
                    id = self.module.f_sub(type_id, None, id, one)?;
                }
                if modifier == SrcModifier::Comp {
                    let one = self.module.const_f32_replicant(1.0, count);
                    id = self.module.f_sub(type_id, None, one, id)?;
                }
                if matches!(modifier, SrcModifier::X2 | SrcModifier::X2Negate) {
                    let two = self.module.const_f32_replicant(2.0, count);
                    id = self.module.f_mul(type_id, None, id, two)?;
                }
                if matches!(modifier, SrcModifier::Abs | SrcModifier::AbsNegate) {
                    id = self.module.glsl(type_id, spirv::GLOp::FAbs, &[id])?;
                }
                if is_negating(modifier) {
                    id = self.module.f_negate(type_id, None, id)?;
                }
            }
            ScalarType::Sint32 => {
                if matches!(modifier, SrcModifier::Abs | SrcModifier::AbsNegate) {
                    id = self.module.glsl(type_id, spirv::GLOp::SAbs, &[id])?;
                }
                if modifier == SrcModifier::Not {
                    id = self.module.not(type_id, None, id)?;
                }
                if is_negating(modifier) {
                    id = self.module.s_negate(type_id, None, id)?;
                }
            }
            ScalarType::Bool => {
                if modifier == SrcModifier::Not {
                    id = self.module.logical_not(type_id, None, id)?;
                }
            }
            ScalarType::Uint32 => {}
        }

        Ok(RegisterValue { id, ty: value.ty })
    }

    /// Converts between register component types with D3D9 `mov` semantics (float to int
    /// truncates).
    pub(super) fn emit_convert(
        &mut self,
        value: RegisterValue,
        ctype: ScalarType,
    ) -> Result<RegisterValue, CompileError> {
        if value.ty.ctype == ctype {
            return Ok(value);
        }
        let ty = VectorType::new(ctype, value.ty.ccount);
        let type_id = self.module.vector_type(ty);
        let count = value.ty.ccount;

        let id = match (value.ty.ctype, ctype) {
            (ScalarType::Float32, ScalarType::Sint32) => {
                self.module.convert_f_to_s(type_id, None, value.id)?
            }
            (ScalarType::Float32, ScalarType::Uint32) => {
                self.module.convert_f_to_u(type_id, None, value.id)?
            }
            (ScalarType::Sint32, ScalarType::Float32) => {
                self.module.convert_s_to_f(type_id, None, value.id)?
            }
            (ScalarType::Uint32, ScalarType::Float32) => {
                self.module.convert_u_to_f(type_id, None, value.id)?
            }
            (ScalarType::Sint32, ScalarType::Uint32) | (ScalarType::Uint32, ScalarType::Sint32) => {
                self.module.bitcast(type_id, None, value.id)?
            }
            (ScalarType::Bool, _) => {
                let (one, zero) = match ctype {
                    ScalarType::Float32 => (
                        self.module.const_f32_replicant(1.0, count),
                        self.module.const_f32_replicant(0.0, count),
                    ),
                    _ => {
                        let int_ty = VectorType::new(ctype, count);
                        let zero = self.module.const_zero(int_ty);
                        let one = self.const_int_replicant(ctype, 1, count);
                        (one, zero)
                    }
                };
                self.module.select(type_id, None, value.id, one, zero)?
            }
            (ScalarType::Float32, _) => {
                let zero = self.module.const_zero(value.ty);
                self.module.f_ord_not_equal(type_id, None, value.id, zero)?
            }
            _ => {
                let zero = self.module.const_zero(value.ty);
                self.module.i_not_equal(type_id, None, value.id, zero)?
            }
        };
        Ok(RegisterValue { id, ty })
    }

    fn const_int_replicant(&mut self, ctype: ScalarType, value: u32, count: u32) -> Word {
        let scalar = match ctype {
            ScalarType::Uint32 => self.module.const_u32(value),
            _ => self.module.const_i32(value as i32),
        };
        if count == 1 {
            return scalar;
        }
        let type_id = self.module.vector_type(VectorType::new(ctype, count));
        self.module
            .constant_composite(type_id, vec![scalar; count as usize])
    }

    pub(super) fn emit_to_float(
        &mut self,
        value: RegisterValue,
    ) -> Result<RegisterValue, CompileError> {
        self.emit_convert(value, ScalarType::Float32)
    }

    pub(super) fn emit_saturate(
        &mut self,
        value: RegisterValue,
    ) -> Result<RegisterValue, CompileError> {
        let count = value.ty.ccount;
        let type_id = self.module.vector_type(value.ty);
        let zero = self.module.const_f32_replicant(0.0, count);
        let one = self.module.const_f32_replicant(1.0, count);
        let id = self
            .module
            .glsl(type_id, spirv::GLOp::FClamp, &[value.id, zero, one])?;
        Ok(RegisterValue { id, ty: value.ty })
    }

    /// Clamps infinities produced by `rcp`/`rsq`/`log`/`nrm` to the largest finite values.
    pub(super) fn emit_clamp_to_finite(
        &mut self,
        value: RegisterValue,
    ) -> Result<RegisterValue, CompileError> {
        let count = value.ty.ccount;
        let type_id = self.module.vector_type(value.ty);
        let lo = self.module.const_f32_replicant(-FLT_MAX, count);
        let hi = self.module.const_f32_replicant(FLT_MAX, count);
        let id = self
            .module
            .glsl(type_id, spirv::GLOp::FClamp, &[value.id, lo, hi])?;
        Ok(RegisterValue { id, ty: value.ty })
    }

    /// Evaluates an `ifc`/`breakc` comparison on two float values of equal width.
    pub(super) fn emit_comparison(
        &mut self,
        comparison: Comparison,
        a: RegisterValue,
        b: RegisterValue,
    ) -> Result<Word, CompileError> {
        let a = self.emit_to_float(a)?;
        let b = self.emit_to_float(b)?;
        let bool_type = self.module.vector_type(VectorType::boolean(a.ty.ccount));

        let id = match comparison {
            Comparison::Never => self.module.const_bool(false),
            Comparison::Always => self.module.const_bool(true),
            Comparison::GreaterThan => self
                .module
                .f_ord_greater_than(bool_type, None, a.id, b.id)?,
            Comparison::Equal => self.module.f_ord_equal(bool_type, None, a.id, b.id)?,
            Comparison::GreaterEqual => self
                .module
                .f_ord_greater_than_equal(bool_type, None, a.id, b.id)?,
            Comparison::LessThan => self.module.f_ord_less_than(bool_type, None, a.id, b.id)?,
            Comparison::NotEqual => self
                .module
                .f_ord_not_equal(bool_type, None, a.id, b.id)?,
            Comparison::LessEqual => self
                .module
                .f_ord_less_than_equal(bool_type, None, a.id, b.id)?,
        };
        Ok(id)
    }

    /// Writes `value` into the components of `ptr` enabled by `mask`.
    ///
    /// A scalar value is splatted first; partial writes merge with the current contents.
    pub(super) fn emit_value_store(
        &mut self,
        ptr: RegisterPointer,
        value: RegisterValue,
        mask: WriteMask,
    ) -> Result<(), CompileError> {
        let value = self.emit_convert(value, ptr.ty.ctype)?;

        if ptr.ty.ccount == 1 {
            let value = self.emit_register_extract(value, 0)?;
            self.module.store(ptr.id, value.id, None, [])?;
            return Ok(());
        }

        let count = mask.pop_count();
        if count == 0 {
            return Ok(());
        }
        let value = self.emit_register_extend(value, count)?;

        if count == ptr.ty.ccount {
            self.module.store(ptr.id, value.id, None, [])?;
            return Ok(());
        }

        let current = self.emit_value_load(ptr)?;
        let type_id = self.module.vector_type(ptr.ty);
        let merged = if value.ty.ccount == 1 {
            let component = mask.first_set().unwrap_or(0);
            self.module
                .composite_insert(type_id, None, value.id, current.id, [component])?
        } else {
            let mut next = 0;
            let components: Vec<u32> = (0..ptr.ty.ccount)
                .map(|i| {
                    if mask.contains(i) && next < value.ty.ccount {
                        next += 1;
                        ptr.ty.ccount + next - 1
                    } else {
                        i
                    }
                })
                .collect();
            self.module
                .vector_shuffle(type_id, None, current.id, value.id, components)?
        };
        self.module.store(ptr.id, merged, None, [])?;
        Ok(())
    }

    /// Store for an instruction destination: saturate if requested, then masked write.
    pub(super) fn emit_dst_store(
        &mut self,
        ptr: RegisterPointer,
        value: RegisterValue,
        dst: &Operand,
    ) -> Result<(), CompileError> {
        let mask = Self::dst_write_mask(ptr, dst);
        self.emit_dst_store_masked(ptr, value, mask, dst.saturate)
    }

    pub(super) fn emit_dst_store_masked(
        &mut self,
        ptr: RegisterPointer,
        value: RegisterValue,
        mask: WriteMask,
        saturate: bool,
    ) -> Result<(), CompileError> {
        let value = if saturate && value.ty.ctype == ScalarType::Float32 {
            self.emit_saturate(value)?
        } else {
            value
        };
        self.emit_value_store(ptr, value, mask)
    }
}

fn is_negating(modifier: SrcModifier) -> bool {
    matches!(
        modifier,
        SrcModifier::Negate
            | SrcModifier::BiasNegate
            | SrcModifier::SignNegate
            | SrcModifier::X2Negate
            | SrcModifier::AbsNegate
    )
}
