use crate::instruction::{Instruction, Opcode};

/// Whole-program facts the compiler needs before emitting the first instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalysisInfo {
    /// The program contains `texkill`.
    pub uses_kill: bool,
    /// The program computes screen-space derivatives, explicitly or through implicit-LOD
    /// sampling.
    pub uses_derivatives: bool,
}

impl AnalysisInfo {
    /// Discarding inside a program that also takes derivatives would leave helper lanes without
    /// valid data, so kills are recorded and flushed at the end instead.
    pub fn defers_kill(&self) -> bool {
        self.uses_kill && self.uses_derivatives
    }
}

pub fn analyze<'a>(instructions: impl IntoIterator<Item = &'a Instruction>) -> AnalysisInfo {
    let mut info = AnalysisInfo::default();
    for inst in instructions {
        match inst.opcode {
            Opcode::TexKill => info.uses_kill = true,
            Opcode::DsX
            | Opcode::DsY
            | Opcode::Tex
            | Opcode::TexBem
            | Opcode::TexBemL
            | Opcode::TexReg2Ar
            | Opcode::TexReg2Gb
            | Opcode::TexM3x2Tex
            | Opcode::TexM3x3Tex
            | Opcode::TexM3x3Spec
            | Opcode::TexM3x3VSpec
            | Opcode::TexReg2Rgb
            | Opcode::TexDp3Tex => info.uses_derivatives = true,
            _ => {}
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::{Operand, RegisterType};

    #[test]
    fn kill_alone_is_not_deferred() {
        let program = [Instruction::new(Opcode::TexKill).with_dst(Operand::new(RegisterType::Temp, 0))];
        let info = analyze(&program);
        assert!(info.uses_kill);
        assert!(!info.uses_derivatives);
        assert!(!info.defers_kill());
    }

    #[test]
    fn implicit_lod_sampling_counts_as_derivative_use() {
        let program = [
            Instruction::new(Opcode::Tex),
            Instruction::new(Opcode::TexKill),
        ];
        assert!(analyze(&program).defers_kill());

        let explicit = [
            Instruction::new(Opcode::TexLdl),
            Instruction::new(Opcode::TexKill),
        ];
        assert!(!analyze(&explicit).defers_kill());
    }
}
