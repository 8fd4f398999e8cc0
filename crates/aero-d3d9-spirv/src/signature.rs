use bitflags::bitflags;

use crate::instruction::{Semantic, WriteMask};
use crate::shader_limits::MAX_INTERFACE_REGS;

/// One declared (or implicitly referenced) interface register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceElement {
    /// Location of the interface variable.
    pub slot: u32,
    /// Index into the internal `v`/`o` register array.
    pub reg_number: u32,
    pub semantic: Semantic,
    pub mask: WriteMask,
    pub centroid: bool,
}

/// Ordered input or output signature. Register numbers are unique within one signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSignature {
    elements: Vec<InterfaceElement>,
}

impl InterfaceSignature {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn elements(&self) -> &[InterfaceElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn contains_register(&self, reg_number: u32) -> bool {
        self.elements.iter().any(|e| e.reg_number == reg_number)
    }

    pub fn find_semantic(&self, semantic: Semantic) -> Option<&InterfaceElement> {
        self.elements.iter().find(|e| e.semantic == semantic)
    }

    pub(crate) fn push(&mut self, element: InterfaceElement) {
        debug_assert!(!self.contains_register(element.reg_number));
        debug_assert!(element.reg_number < MAX_INTERFACE_REGS);
        self.elements.push(element);
    }
}

/// Bitmasks of interface locations in use, builtins excluded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterfaceSlots {
    pub input_slots: u32,
    pub output_slots: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorKind {
    UniformBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageViewType {
    /// Not an image.
    None,
    D2,
    Cube,
    D3,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const UNIFORM_READ = 1 << 0;
        const SHADER_READ = 1 << 1;
    }
}

/// A descriptor the compiled module expects, in first-declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBinding {
    pub slot: u32,
    pub kind: DescriptorKind,
    pub access: AccessFlags,
    pub view: ImageViewType,
}

impl ResourceBinding {
    pub fn uniform_buffer(slot: u32) -> Self {
        Self {
            slot,
            kind: DescriptorKind::UniformBuffer,
            access: AccessFlags::UNIFORM_READ,
            view: ImageViewType::None,
        }
    }

    pub fn sampler(slot: u32, view: ImageViewType) -> Self {
        Self {
            slot,
            kind: DescriptorKind::CombinedImageSampler,
            access: AccessFlags::SHADER_READ,
            view,
        }
    }
}
