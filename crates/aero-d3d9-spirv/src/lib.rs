//! D3D9 shader model 1-3 to SPIR-V compiler.
//!
//! Decoded vertex and pixel shader instructions are lowered one at a time into a SPIR-V module
//! suitable for a Vulkan-style backend. Vertex outputs and pixel inputs are located through a
//! shared [`LinkerSlotTable`] so shaders compiled independently still link.

pub mod analysis;
pub mod binding_model;
pub mod compiler;
pub mod error;
pub mod instruction;
pub mod linker;
pub mod options;
pub mod shader_limits;
pub mod signature;
mod spirv;
pub mod types;

pub use analysis::{analyze, AnalysisInfo};
pub use compiler::{compile, CompiledShader, Compiler, ENTRY_POINT_NAME};
pub use error::{CompileError, CompileWarning};
pub use instruction::{
    Comparison, DclInfo, DefValue, Instruction, Opcode, Operand, RegisterId, RegisterType,
    Semantic, SrcModifier, Swizzle, SwizzleComponent, TextureType, Usage, WriteMask,
};
pub use linker::{LinkerError, LinkerSlotTable};
pub use options::CompileOptions;
pub use signature::{
    AccessFlags, DescriptorKind, ImageViewType, InterfaceElement, InterfaceSignature,
    InterfaceSlots, ResourceBinding,
};
pub use types::{ModuleInfo, ShaderStage, ShaderVersion};
