//! Entry point wrapper and the fixed-function work around the program body.

use rspirv::dr::Operand as SpirvOperand;
use rspirv::spirv::{self, Word};

use super::registers::{builtin_output, RegisterPointer};
use super::Compiler;
use crate::binding_model::{
    self, AlphaFunc, ConstantBufferSlot, DESCRIPTOR_SET, SPEC_ID_ALPHA_FUNC, SPEC_ID_ALPHA_TEST,
};
use crate::error::{CompileError, CompileWarning};
use crate::instruction::Swizzle;
use crate::signature::{InterfaceElement, ResourceBinding};
use crate::spirv::{ScalarType, VectorType};
use crate::types::ShaderStage;

impl Compiler<'_> {
    pub(super) fn emit_vs_finalize(&mut self) -> Result<(), CompileError> {
        self.emit_main_function_begin()?;
        self.emit_input_setup()?;
        self.emit_body_call()?;
        self.emit_output_setup()?;
        self.emit_vs_clipping()?;
        self.emit_main_function_end()
    }

    pub(super) fn emit_ps_finalize(&mut self) -> Result<(), CompileError> {
        self.emit_main_function_begin()?;
        self.emit_input_setup()?;
        self.emit_body_call()?;

        if let Some(kill_state) = self.regs.kill_state {
            let bool_type = self.module.bool_type();
            let killed = self.module.load(bool_type, None, kill_state, None, [])?;
            self.emit_conditional_kill(killed)?;
        }

        self.emit_output_setup()?;
        self.emit_ps_alpha_test()?;
        self.emit_output_depth_clamp()?;
        self.emit_main_function_end()
    }

    fn emit_main_function_begin(&mut self) -> Result<(), CompileError> {
        let void = self.module.void_type();
        let fn_type = self.module.void_function_type();
        self.module.begin_function(
            void,
            Some(self.entry_point_id),
            spirv::FunctionControl::NONE,
            fn_type,
        )?;
        self.module.begin_block(None)?;
        Ok(())
    }

    fn emit_main_function_end(&mut self) -> Result<(), CompileError> {
        self.module.ret()?;
        self.module.end_function()?;
        Ok(())
    }

    fn emit_body_call(&mut self) -> Result<(), CompileError> {
        let void = self.module.void_type();
        let body = self.body_function_id;
        self.module.function_call(void, None, body, [])?;
        Ok(())
    }

    fn interface_array_element(
        &mut self,
        array: Word,
        reg_number: u32,
    ) -> Result<RegisterPointer, CompileError> {
        let ty = VectorType::float(4);
        let type_id = self.module.vector_type(ty);
        let ptr_type = self
            .module
            .pointer_type(type_id, spirv::StorageClass::Private);
        let index = self.module.const_i32(reg_number as i32);
        let id = self.module.access_chain(ptr_type, None, array, [index])?;
        Ok(RegisterPointer { id, ty })
    }

    /// Copies `src` into `dst`, limited to the components `element` declares.
    fn emit_interface_copy(
        &mut self,
        src: RegisterPointer,
        dst: RegisterPointer,
        element: &InterfaceElement,
    ) -> Result<(), CompileError> {
        let value = self.emit_value_load(src)?;
        let value = self.emit_register_swizzle(value, Swizzle::identity(), element.mask)?;
        self.emit_value_store(dst, value, element.mask)
    }

    fn emit_input_setup(&mut self) -> Result<(), CompileError> {
        let float4 = self.module.vector_type(VectorType::float(4));
        let ptr_type = self.module.pointer_type(float4, spirv::StorageClass::Input);

        let elements = self.isgn.elements().to_vec();
        for element in &elements {
            let var = self
                .module
                .new_var(ptr_type, spirv::StorageClass::Input, None);
            self.module.decorate_location(var, element.slot);
            self.module.set_name(var, &format!("in_{}", element.semantic));
            if element.centroid {
                self.module.decorate(var, spirv::Decoration::Centroid, []);
            }
            self.entry_interfaces.push(var);

            let input = RegisterPointer {
                id: var,
                ty: VectorType::float(4),
            };
            let v_array = self.regs.v_array;
            let reg = self.interface_array_element(v_array, element.reg_number)?;
            self.emit_interface_copy(input, reg, element)?;
        }

        if let (Some(front_facing), Some(v_face)) = (self.regs.front_facing, self.regs.v_face) {
            let bool_type = self.module.bool_type();
            let is_front = self.module.load(bool_type, None, front_facing, None, [])?;
            let front = self.module.const_f32_replicant(1.0, 4);
            let back = self.module.const_f32_replicant(-1.0, 4);
            let face = self.module.select(float4, None, is_front, front, back)?;
            self.module.store(v_face.id, face, None, [])?;
        }
        Ok(())
    }

    fn emit_output_setup(&mut self) -> Result<(), CompileError> {
        let float4 = self.module.vector_type(VectorType::float(4));
        let ptr_type = self.module.pointer_type(float4, spirv::StorageClass::Output);
        let is_pixel = self.info.stage() == ShaderStage::Pixel;

        let elements = self.osgn.elements().to_vec();
        for element in &elements {
            let output = match builtin_output(element.semantic) {
                Some(spirv::BuiltIn::PointSize) => self.output_point_size(),
                Some(_) => self.output_position(),
                None => {
                    let zero = self.module.const_vec4_f32([0.0; 4]);
                    let var = self
                        .module
                        .new_var(ptr_type, spirv::StorageClass::Output, Some(zero));
                    self.module.decorate_location(var, element.slot);
                    if is_pixel {
                        self.module.decorate(
                            var,
                            spirv::Decoration::Index,
                            [SpirvOperand::LiteralBit32(0)],
                        );
                    }
                    self.module.set_name(var, &format!("out_{}", element.semantic));
                    self.entry_interfaces.push(var);
                    RegisterPointer {
                        id: var,
                        ty: VectorType::float(4),
                    }
                }
            };

            let o_array = self.regs.o_array;
            let reg = self.interface_array_element(o_array, element.reg_number)?;
            self.emit_interface_copy(reg, output, element)?;
        }
        Ok(())
    }

    /// `gl_ClipDistance[i] = dot(oPos, clip_planes[i])` for every enabled plane.
    fn emit_vs_clipping(&mut self) -> Result<(), CompileError> {
        let plane_count = self.options.effective_clip_plane_count();
        if plane_count == 0 {
            return Ok(());
        }

        let float = self.module.scalar_type(ScalarType::Float32);
        let float4 = self.module.vector_type(VectorType::float(4));

        let plane_array = self.module.array_type(float4, plane_count);
        self.module.decorate_array_stride(plane_array, 16);
        let plane_struct = self.module.type_struct([plane_array]);
        self.module.decorate_block(plane_struct);
        self.module.member_decorate_offset(plane_struct, 0, 0);
        self.module.set_name(plane_struct, "clip_info_t");
        self.module.set_member_name(plane_struct, 0, "clip_planes");

        let block_ptr = self
            .module
            .pointer_type(plane_struct, spirv::StorageClass::Uniform);
        let block = self
            .module
            .new_var(block_ptr, spirv::StorageClass::Uniform, None);
        self.module.set_name(block, "clip_info");
        let slot =
            binding_model::constant_buffer_slot(ShaderStage::Vertex, ConstantBufferSlot::ClipPlanes);
        self.module.decorate_binding(block, DESCRIPTOR_SET, slot);
        self.resource_bindings
            .push(ResourceBinding::uniform_buffer(slot));

        let dist_array = self.module.array_type(float, plane_count);
        let dist_ptr = self
            .module
            .pointer_type(dist_array, spirv::StorageClass::Output);
        let clip_dist = self
            .module
            .new_var(dist_ptr, spirv::StorageClass::Output, None);
        self.module
            .decorate_builtin(clip_dist, spirv::BuiltIn::ClipDistance);
        self.module.set_name(clip_dist, "clip_dist");
        self.entry_interfaces.push(clip_dist);

        let Some(position) = self.regs.o_pos else {
            self.warn(CompileWarning::MissingPosition);
            return Ok(());
        };
        let position = self.module.load(float4, None, position.id, None, [])?;

        let plane_ptr = self
            .module
            .pointer_type(float4, spirv::StorageClass::Uniform);
        let dist_elem_ptr = self
            .module
            .pointer_type(float, spirv::StorageClass::Output);
        let member = self.module.const_i32(0);
        for i in 0..plane_count {
            let index = self.module.const_i32(i as i32);
            let plane_elem = self
                .module
                .access_chain(plane_ptr, None, block, [member, index])?;
            let plane = self.module.load(float4, None, plane_elem, None, [])?;
            let dist = self.module.dot(float, None, position, plane)?;
            let dist_elem = self
                .module
                .access_chain(dist_elem_ptr, None, clip_dist, [index])?;
            self.module.store(dist_elem, dist, None, [])?;
        }
        Ok(())
    }

    /// Fixed-function alpha test, driven by specialization constants so one module serves every
    /// alpha state.
    fn emit_ps_alpha_test(&mut self) -> Result<(), CompileError> {
        let bool_type = self.module.bool_type();
        let float = self.module.scalar_type(ScalarType::Float32);
        let uint = self.module.scalar_type(ScalarType::Uint32);

        let rs_struct = self.module.type_struct([float]);
        self.module.decorate_block(rs_struct);
        self.module.member_decorate_offset(rs_struct, 0, 0);
        self.module.set_name(rs_struct, "render_state_t");
        self.module.set_member_name(rs_struct, 0, "alpha_ref");
        let rs_ptr = self
            .module
            .pointer_type(rs_struct, spirv::StorageClass::Uniform);
        let rs_block = self
            .module
            .new_var(rs_ptr, spirv::StorageClass::Uniform, None);
        self.module.set_name(rs_block, "render_state");
        let slot =
            binding_model::constant_buffer_slot(ShaderStage::Pixel, ConstantBufferSlot::RenderState);
        self.module.decorate_binding(rs_block, DESCRIPTOR_SET, slot);
        self.resource_bindings
            .push(ResourceBinding::uniform_buffer(slot));

        let alpha_test = self.module.spec_constant_false(bool_type);
        self.module.set_name(alpha_test, "alpha_test");
        self.module.decorate_spec_id(alpha_test, SPEC_ID_ALPHA_TEST);
        let alpha_func = self
            .module
            .spec_constant_bit32(uint, AlphaFunc::Always as u32);
        self.module.set_name(alpha_func, "alpha_func");
        self.module.decorate_spec_id(alpha_func, SPEC_ID_ALPHA_FUNC);

        // Only shaders that declare oC0 have an alpha to test.
        if self.explicit_outputs & 1 == 0 {
            return Ok(());
        }

        let case_labels: Vec<(AlphaFunc, Word)> = AlphaFunc::ALL
            .iter()
            .map(|&func| (func, self.module.id()))
            .collect();
        let label_begin = self.module.id();
        let label_test = self.module.id();
        let label_discard = self.module.id();
        let label_keep = self.module.id();
        let label_skip = self.module.id();

        self.module
            .selection_merge(label_skip, spirv::SelectionControl::NONE)?;
        self.module
            .branch_conditional(alpha_test, label_begin, label_skip, [])?;
        self.module.label(label_begin)?;

        let o_array = self.regs.o_array;
        let color0 = self.interface_array_element(o_array, 0)?;
        let color0 = self.emit_value_load(color0)?;
        let alpha = self
            .module
            .composite_extract(float, None, color0.id, [3])?;

        let float_ptr = self.module.pointer_type(float, spirv::StorageClass::Uniform);
        let member = self.module.const_i32(0);
        let alpha_ref_ptr = self
            .module
            .access_chain(float_ptr, None, rs_block, [member])?;
        let alpha_ref = self.module.load(float, None, alpha_ref_ptr, None, [])?;

        let default_label = case_labels
            .iter()
            .find(|(func, _)| *func == AlphaFunc::Always)
            .map_or(label_test, |&(_, label)| label);
        self.module
            .selection_merge(label_test, spirv::SelectionControl::NONE)?;
        self.module.switch(
            alpha_func,
            default_label,
            case_labels
                .iter()
                .map(|&(func, label)| (SpirvOperand::LiteralBit32(func as u32), label))
                .collect::<Vec<_>>(),
        )?;

        let mut passed = Vec::with_capacity(case_labels.len());
        for &(func, label) in &case_labels {
            self.module.label(label)?;
            let result = match func {
                AlphaFunc::Never => self.module.const_bool(false),
                AlphaFunc::Less => self
                    .module
                    .f_ord_less_than(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::Equal => self.module.f_ord_equal(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::LessEqual => self
                    .module
                    .f_ord_less_than_equal(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::Greater => self
                    .module
                    .f_ord_greater_than(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::NotEqual => self
                    .module
                    .f_ord_not_equal(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::GreaterEqual => self
                    .module
                    .f_ord_greater_than_equal(bool_type, None, alpha, alpha_ref)?,
                AlphaFunc::Always => self.module.const_bool(true),
            };
            passed.push((result, label));
            self.module.branch(label_test)?;
        }

        self.module.label(label_test)?;
        let result = self.module.phi(bool_type, None, passed)?;
        let discard = self.module.logical_not(bool_type, None, result)?;
        self.module
            .selection_merge(label_keep, spirv::SelectionControl::NONE)?;
        self.module
            .branch_conditional(discard, label_discard, label_keep, [])?;
        self.module.label(label_discard)?;
        self.module.kill()?;
        self.module.label(label_keep)?;
        self.module.branch(label_skip)?;
        self.module.label(label_skip)?;
        Ok(())
    }

    /// Clamps `oDepth` to [0, 1].
    fn emit_output_depth_clamp(&mut self) -> Result<(), CompileError> {
        let Some(depth) = self.regs.o_depth else {
            return Ok(());
        };
        let value = self.emit_value_load(depth)?;
        let value = self.emit_saturate(value)?;
        self.module.store(depth.id, value.id, None, [])?;
        Ok(())
    }
}
