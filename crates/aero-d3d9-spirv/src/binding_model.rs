//! Descriptor binding layout shared by compiled vertex and pixel shaders.
//!
//! Everything lives in descriptor set 0. Each stage owns a disjoint binding range of
//! `CONSTANT_BUFFERS_PER_STAGE + MAX_SAMPLERS` entries:
//! - `[base, base + CONSTANT_BUFFERS_PER_STAGE)`: uniform blocks (see [`ConstantBufferSlot`])
//! - `[base + CONSTANT_BUFFERS_PER_STAGE, base + STAGE_BINDING_STRIDE)`: `s#` combined
//!   image/samplers
//!
//! with `base = STAGE_BINDING_STRIDE * stage.index()`.

use crate::shader_limits::MAX_SAMPLERS;
use crate::types::ShaderStage;

/// Descriptor set every resource is bound in.
pub const DESCRIPTOR_SET: u32 = 0;

/// Uniform blocks reserved per stage.
pub const CONSTANT_BUFFERS_PER_STAGE: u32 = 2;

/// Number of bindings reserved per stage.
pub const STAGE_BINDING_STRIDE: u32 = CONSTANT_BUFFERS_PER_STAGE + MAX_SAMPLERS;

/// Uniform blocks within a stage's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstantBufferSlot {
    /// `{ vec4 f[256]; ivec4 i[16]; uint b; }`, both stages.
    Constants,
    /// `{ vec4 clip_planes[N]; }`, vertex shaders.
    ClipPlanes,
    /// `{ float alpha_ref; }`, pixel shaders.
    RenderState,
}

impl ConstantBufferSlot {
    pub fn index(&self) -> u32 {
        match self {
            Self::Constants => 0,
            Self::ClipPlanes | Self::RenderState => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    ConstantBuffer,
    Image,
}

/// Binding number of resource `index` of kind `ty` for `stage`.
pub fn resource_slot(stage: ShaderStage, ty: BindingType, index: u32) -> u32 {
    let base = STAGE_BINDING_STRIDE * stage.index();
    match ty {
        BindingType::ConstantBuffer => base + index,
        BindingType::Image => base + CONSTANT_BUFFERS_PER_STAGE + index,
    }
}

pub fn constant_buffer_slot(stage: ShaderStage, buffer: ConstantBufferSlot) -> u32 {
    resource_slot(stage, BindingType::ConstantBuffer, buffer.index())
}

pub fn sampler_slot(stage: ShaderStage, sampler: u32) -> u32 {
    resource_slot(stage, BindingType::Image, sampler)
}

/// Byte offsets within the constant buffer block.
pub const FLOAT_CONSTANTS_OFFSET: u32 = 0;
pub const INT_CONSTANTS_OFFSET: u32 = 256 * 16;
pub const BOOL_CONSTANTS_OFFSET: u32 = INT_CONSTANTS_OFFSET + 16 * 16;

/// `SpecId` of the boolean alpha-test enable.
pub const SPEC_ID_ALPHA_TEST: u32 = 0;
/// `SpecId` of the alpha compare function, using [`AlphaFunc`] numbering.
pub const SPEC_ID_ALPHA_FUNC: u32 = 1;

/// Alpha compare functions as fed to the `alpha_func` specialization constant.
///
/// This follows the backend's compare-op numbering, not the `ifc`/`breakc` comparison codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaFunc {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterEqual = 6,
    Always = 7,
}

impl AlphaFunc {
    pub const ALL: [AlphaFunc; 8] = [
        Self::Never,
        Self::Less,
        Self::Equal,
        Self::LessEqual,
        Self::Greater,
        Self::NotEqual,
        Self::GreaterEqual,
        Self::Always,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_ranges_do_not_overlap() {
        let vs_last = sampler_slot(ShaderStage::Vertex, MAX_SAMPLERS - 1);
        let ps_first = constant_buffer_slot(ShaderStage::Pixel, ConstantBufferSlot::Constants);
        assert!(vs_last < ps_first);
        assert_eq!(ps_first, STAGE_BINDING_STRIDE);
    }

    #[test]
    fn samplers_follow_constant_buffers() {
        assert_eq!(sampler_slot(ShaderStage::Vertex, 0), 2);
        assert_eq!(sampler_slot(ShaderStage::Pixel, 3), STAGE_BINDING_STRIDE + 5);
        assert_eq!(
            constant_buffer_slot(ShaderStage::Pixel, ConstantBufferSlot::RenderState),
            STAGE_BINDING_STRIDE + 1
        );
    }
}
