use thiserror::Error;

use crate::instruction::{Opcode, RegisterId};
use crate::linker::LinkerError;

/// Fatal compilation errors. Any of these aborts the compilation it was raised in; the shared
/// linker table is never left half-updated.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Malformed block structure or an instruction record that cannot be emitted.
    #[error("{opcode}: {message}")]
    Structural { opcode: Opcode, message: String },

    #[error("{opcode}: missing {operand} operand")]
    MissingOperand { opcode: Opcode, operand: &'static str },

    #[error("{opcode}: control flow nesting exceeds maximum {max}")]
    ControlFlowNesting { opcode: Opcode, max: usize },

    #[error("{open} control flow block(s) still open at end of program")]
    UnterminatedControlFlow { open: usize },

    #[error(transparent)]
    Linker(#[from] LinkerError),

    #[error("SPIR-V builder error: {0:?}")]
    Builder(rspirv::dr::Error),
}

impl CompileError {
    pub(crate) fn structural(opcode: Opcode, message: impl Into<String>) -> Self {
        Self::Structural {
            opcode,
            message: message.into(),
        }
    }
}

impl From<rspirv::dr::Error> for CompileError {
    fn from(err: rspirv::dr::Error) -> Self {
        Self::Builder(err)
    }
}

/// Conditions the compiler recovers from. Each one is also logged through `tracing`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileWarning {
    /// No emission routine exists; the instruction was skipped.
    UnsupportedOpcode { opcode: Opcode },
    /// The operand does not map to any register in this stage; reads yield zero and writes are
    /// dropped.
    UnresolvedRegister { opcode: Opcode, reg: RegisterId },
    /// A sampler was used without `dcl` and was declared as 2D.
    ImplicitSampler { index: u32 },
    /// A second `dcl` for an interface register that is already in the signature.
    DuplicateDeclaration { reg: RegisterId },
    /// Clip distances requested but the vertex shader never wrote a position.
    MissingPosition,
}

impl std::fmt::Display for CompileWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnsupportedOpcode { opcode } => write!(f, "unsupported opcode {opcode}"),
            Self::UnresolvedRegister { opcode, reg } => {
                write!(f, "{opcode}: register {reg} does not resolve in this stage")
            }
            Self::ImplicitSampler { index } => write!(f, "adding implicit 2D sampler s{index}"),
            Self::DuplicateDeclaration { reg } => write!(f, "{reg} declared more than once"),
            Self::MissingPosition => f.write_str("shader without position output"),
        }
    }
}
