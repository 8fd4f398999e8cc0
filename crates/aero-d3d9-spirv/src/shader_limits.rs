//! Register file sizes and other fixed limits of the SM1-SM3 programming model.
//!
//! Register indices in the incoming instruction stream come from untrusted bytecode. Anything
//! outside these bounds resolves to no register at all rather than growing a register file.

/// Number of `r#` temporaries (SM3 exposes 32).
pub const MAX_TEMP_REGS: u32 = 32;

/// Number of `t#` registers that SM1.0-1.3 pixel shaders treat as private scratch.
pub const MAX_TEXTURE_REGS: u32 = 8;

/// Float constant registers (`c#`) in the constant buffer.
pub const MAX_FLOAT_CONSTANTS: u32 = 256;

/// Integer constant registers (`i#`) in the constant buffer.
pub const MAX_INT_CONSTANTS: u32 = 16;

/// Boolean constant registers (`b#`), packed as bits of one `u32`.
pub const MAX_BOOL_CONSTANTS: u32 = 16;

/// Interface registers per stage. Input and output slot masks are `u32`s, so this must stay
/// below 32.
pub const MAX_INTERFACE_REGS: u32 = 16;

/// Simultaneous render targets a pixel shader can write (`oC0`..`oC3`).
pub const MAX_RENDER_TARGETS: u32 = 4;

/// User clip planes supported by the fixed-function clipper.
pub const MAX_CLIP_PLANES: u32 = 6;

/// Sampler registers (`s#`) per stage.
pub const MAX_SAMPLERS: u32 = 16;

/// Capacity of a [`crate::LinkerSlotTable`].
pub const LINKER_SLOT_CAPACITY: usize = 32;

/// Maximum nesting depth of `if`/`loop`/`rep` blocks.
///
/// SM3 allows 24 levels of static+dynamic nesting in total; anything deeper is rejected before it
/// can blow up the block stack.
pub const MAX_CONTROL_FLOW_NESTING: usize = 64;
