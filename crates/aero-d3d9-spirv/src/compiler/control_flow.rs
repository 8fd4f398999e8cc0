//! Structured control flow: `if`/`ifc`/`else`/`endif`, `loop`/`rep`/`endloop`/`endrep`,
//! `break` and `breakc`.
//!
//! Every D3D9 loop becomes one SPIR-V loop driven by a hidden down-counter. An `if` header cannot
//! be written until the matching `endif` reveals whether an `else` exists, so its block is left
//! open and patched through an [`InsertToken`].

use rspirv::spirv::{self, Word};

use super::registers::RegisterPointer;
use super::Compiler;
use crate::error::CompileError;
use crate::instruction::{Instruction, Opcode, Operand, WriteMask};
use crate::shader_limits::MAX_CONTROL_FLOW_NESTING;
use crate::spirv::{InsertToken, ScalarType, VectorType};

#[derive(Debug, Clone, Copy)]
pub(super) enum ControlFlowBlock {
    If {
        condition: Word,
        label_if: Word,
        label_else: Option<Word>,
        label_end: Word,
        header: InsertToken,
    },
    Loop {
        label_header: Word,
        label_continue: Word,
        label_break: Word,
        /// `aL` increment, `loop` only.
        stride: Option<Word>,
        /// `aL` value to restore after the loop, `loop` only.
        counter_backup: Option<Word>,
    },
}

impl Compiler<'_> {
    fn push_block(&mut self, block: ControlFlowBlock) -> Result<(), CompileError> {
        if self.blocks.len() >= MAX_CONTROL_FLOW_NESTING {
            return Err(CompileError::ControlFlowNesting {
                opcode: self.opcode,
                max: MAX_CONTROL_FLOW_NESTING,
            });
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Innermost enclosing loop's break label.
    fn innermost_loop_break(&self) -> Option<Word> {
        self.blocks.iter().rev().find_map(|block| match *block {
            ControlFlowBlock::Loop { label_break, .. } => Some(label_break),
            ControlFlowBlock::If { .. } => None,
        })
    }

    fn loop_counter(&mut self) -> Result<RegisterPointer, CompileError> {
        let reg = crate::instruction::RegisterId::new(crate::instruction::RegisterType::Loop, 0);
        self.emit_register_pointer(reg, None)?
            .ok_or_else(|| CompileError::structural(self.opcode, "loop counter unavailable"))
    }

    fn emit_int_load(
        &mut self,
        operand: &Operand,
        mask: WriteMask,
    ) -> Result<Word, CompileError> {
        let value = self.emit_register_load(operand, mask)?;
        Ok(self.emit_convert(value, ScalarType::Sint32)?.id)
    }

    /// Opens a loop running `iterations` times.
    ///
    /// For `loop`, `init_and_stride` carries the `aL` start value and increment.
    fn emit_control_flow_generic_loop(
        &mut self,
        iterations: Word,
        init_and_stride: Option<(Word, Word)>,
    ) -> Result<(), CompileError> {
        let int_type = self.module.scalar_type(ScalarType::Sint32);

        let mut stride = None;
        let mut counter_backup = None;
        if let Some((init, step)) = init_and_stride {
            let counter = self.loop_counter()?;
            counter_backup = Some(self.module.load(int_type, None, counter.id, None, [])?);
            self.module.store(counter.id, init, None, [])?;
            stride = Some(step);
        }

        let int_ptr = self
            .module
            .pointer_type(int_type, spirv::StorageClass::Private);
        let iterator = self
            .module
            .new_var(int_ptr, spirv::StorageClass::Private, None);
        self.module.set_name(iterator, "iter");
        self.module.store(iterator, iterations, None, [])?;

        let label_header = self.module.id();
        let label_begin = self.module.id();
        let label_continue = self.module.id();
        let label_break = self.module.id();
        let label_exit = self.module.id();
        let label_body = self.module.id();

        self.module.branch(label_header)?;
        self.module.label(label_header)?;
        self.module.loop_merge(
            label_break,
            label_continue,
            spirv::LoopControl::NONE,
            [],
        )?;
        self.module.branch(label_begin)?;

        self.module.label(label_begin)?;
        let remaining = self.module.load(int_type, None, iterator, None, [])?;
        let bool_type = self.module.bool_type();
        let zero = self.module.const_i32(0);
        let done = self.module.i_equal(bool_type, None, remaining, zero)?;
        self.module
            .selection_merge(label_body, spirv::SelectionControl::NONE)?;
        self.module
            .branch_conditional(done, label_exit, label_body, [])?;

        self.module.label(label_exit)?;
        self.module.branch(label_break)?;

        self.module.label(label_body)?;
        let one = self.module.const_i32(1);
        let next = self.module.i_sub(int_type, None, remaining, one)?;
        self.module.store(iterator, next, None, [])?;

        self.push_block(ControlFlowBlock::Loop {
            label_header,
            label_continue,
            label_break,
            stride,
            counter_backup,
        })
    }

    pub(super) fn emit_control_flow_loop(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        // loop aL, i#: i#.x iterations starting at i#.y, stepping by i#.z.
        let src = *self.src_operand(inst, 1)?;
        let int_type = self.module.scalar_type(ScalarType::Sint32);
        let params = self.emit_int_load(&src, WriteMask::XYZ)?;
        let iterations = self.module.composite_extract(int_type, None, params, [0])?;
        let init = self.module.composite_extract(int_type, None, params, [1])?;
        let stride = self.module.composite_extract(int_type, None, params, [2])?;
        self.emit_control_flow_generic_loop(iterations, Some((init, stride)))
    }

    pub(super) fn emit_control_flow_rep(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let src = *self.src_operand(inst, 0)?;
        let iterations = self.emit_int_load(&src, WriteMask::X)?;
        self.emit_control_flow_generic_loop(iterations, None)
    }

    pub(super) fn emit_control_flow_end_loop(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::Loop {
            label_header,
            label_continue,
            label_break,
            stride,
            counter_backup,
        }) = self.blocks.last().copied()
        else {
            return Err(CompileError::structural(
                self.opcode,
                "loop end without matching loop",
            ));
        };
        self.blocks.pop();

        if let Some(stride) = stride {
            let counter = self.loop_counter()?;
            let int_type = self.module.scalar_type(ScalarType::Sint32);
            let current = self.module.load(int_type, None, counter.id, None, [])?;
            let next = self.module.i_add(int_type, None, current, stride)?;
            self.module.store(counter.id, next, None, [])?;
        }

        self.module.branch(label_continue)?;
        self.module.label(label_continue)?;
        self.module.branch(label_header)?;
        self.module.label(label_break)?;

        if let Some(backup) = counter_backup {
            let counter = self.loop_counter()?;
            self.module.store(counter.id, backup, None, [])?;
        }
        Ok(())
    }

    pub(super) fn emit_control_flow_break(&mut self) -> Result<(), CompileError> {
        let Some(label_break) = self.innermost_loop_break() else {
            return Err(CompileError::structural(self.opcode, "break outside of a loop"));
        };
        self.module.branch(label_break)?;
        let label = self.module.id();
        self.module.label(label)?;
        Ok(())
    }

    pub(super) fn emit_control_flow_break_c(
        &mut self,
        inst: &Instruction,
    ) -> Result<(), CompileError> {
        let Some(label_break) = self.innermost_loop_break() else {
            return Err(CompileError::structural(self.opcode, "breakc outside of a loop"));
        };
        let condition = self.emit_compare_condition(inst)?;

        let label_taken = self.module.id();
        let label_merge = self.module.id();
        self.module
            .selection_merge(label_merge, spirv::SelectionControl::NONE)?;
        self.module
            .branch_conditional(condition, label_taken, label_merge, [])?;
        self.module.label(label_taken)?;
        self.module.branch(label_break)?;
        self.module.label(label_merge)?;
        Ok(())
    }

    /// `src0.x <cmp> src1.x` for `ifc`/`breakc`.
    fn emit_compare_condition(&mut self, inst: &Instruction) -> Result<Word, CompileError> {
        let comparison = inst.comparison.ok_or(CompileError::MissingOperand {
            opcode: inst.opcode,
            operand: "comparison",
        })?;
        let a = *self.src_operand(inst, 0)?;
        let b = *self.src_operand(inst, 1)?;
        let a = self.emit_register_load(&a, WriteMask::X)?;
        let b = self.emit_register_load(&b, WriteMask::X)?;
        self.emit_comparison(comparison, a, b)
    }

    pub(super) fn emit_control_flow_if(&mut self, inst: &Instruction) -> Result<(), CompileError> {
        let condition = if inst.opcode == Opcode::Ifc {
            self.emit_compare_condition(inst)?
        } else {
            let src = *self.src_operand(inst, 0)?;
            let value = self.emit_register_load(&src, WriteMask::X)?;
            let value = self.emit_convert(value, ScalarType::Bool)?;
            debug_assert_eq!(value.ty, VectorType::boolean(1));
            value.id
        };

        let label_if = self.module.id();
        let label_end = self.module.id();
        let header = self.module.insertion_token()?.ok_or_else(|| {
            CompileError::structural(self.opcode, "no open block to branch from")
        })?;
        self.module.label(label_if)?;

        self.push_block(ControlFlowBlock::If {
            condition,
            label_if,
            label_else: None,
            label_end,
            header,
        })
    }

    pub(super) fn emit_control_flow_else(&mut self) -> Result<(), CompileError> {
        let opcode = self.opcode;
        let label_else = self.module.id();
        let Some(ControlFlowBlock::If {
            label_else: slot @ None,
            label_end,
            ..
        }) = self.blocks.last_mut()
        else {
            return Err(CompileError::structural(opcode, "else without matching if"));
        };
        *slot = Some(label_else);
        let label_end = *label_end;

        self.module.branch(label_end)?;
        self.module.label(label_else)?;
        Ok(())
    }

    pub(super) fn emit_control_flow_end_if(&mut self) -> Result<(), CompileError> {
        let Some(ControlFlowBlock::If {
            condition,
            label_if,
            label_else,
            label_end,
            header,
        }) = self.blocks.last().copied()
        else {
            return Err(CompileError::structural(
                self.opcode,
                "endif without matching if",
            ));
        };
        self.blocks.pop();

        self.module.branch(label_end)?;

        self.module.begin_insertion(header)?;
        self.module
            .selection_merge(label_end, spirv::SelectionControl::NONE)?;
        self.module.branch_conditional(
            condition,
            label_if,
            label_else.unwrap_or(label_end),
            [],
        )?;

        self.module.label(label_end)?;
        Ok(())
    }
}
