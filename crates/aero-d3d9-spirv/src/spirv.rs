//! Thin layer over `rspirv`'s builder: cached types and constants, debug names, and the deferred
//! insertion points used to patch structured `if` headers.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use rspirv::binary::Assemble;
use rspirv::dr::{Builder, Operand};
use rspirv::spirv::{self, Word};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum ScalarType {
    Float32,
    Sint32,
    Uint32,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct VectorType {
    pub ctype: ScalarType,
    pub ccount: u32,
}

impl VectorType {
    pub const fn new(ctype: ScalarType, ccount: u32) -> Self {
        Self { ctype, ccount }
    }

    pub const fn float(ccount: u32) -> Self {
        Self::new(ScalarType::Float32, ccount)
    }

    pub const fn sint(ccount: u32) -> Self {
        Self::new(ScalarType::Sint32, ccount)
    }

    pub const fn uint(ccount: u32) -> Self {
        Self::new(ScalarType::Uint32, ccount)
    }

    pub const fn boolean(ccount: u32) -> Self {
        Self::new(ScalarType::Bool, ccount)
    }

    pub fn with_count(self, ccount: u32) -> Self {
        Self { ccount, ..self }
    }
}

/// Position of a block whose terminator has not been written yet.
///
/// Recorded when a structured block opens and handed back to
/// [`SpirvModule::begin_insertion`] exactly once, when the block closes and its header branch
/// can finally be decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InsertToken(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ConstKey {
    Scalar(ScalarType, u32),
    Composite(VectorType, [u32; 4]),
}

pub(crate) struct SpirvModule {
    builder: Builder,
    glsl: Word,
    debug_names: bool,
    types: HashMap<VectorType, Word>,
    pointers: HashMap<(Word, spirv::StorageClass), Word>,
    constants: HashMap<ConstKey, Word>,
    void_type: Option<Word>,
    void_fn_type: Option<Word>,
}

impl SpirvModule {
    pub fn new(debug_names: bool) -> Self {
        let mut builder = Builder::new();
        builder.set_version(1, 3);
        builder.memory_model(spirv::AddressingModel::Logical, spirv::MemoryModel::GLSL450);
        let glsl = builder.ext_inst_import("GLSL.std.450");

        Self {
            builder,
            glsl,
            debug_names,
            types: HashMap::new(),
            pointers: HashMap::new(),
            constants: HashMap::new(),
            void_type: None,
            void_fn_type: None,
        }
    }

    pub fn finish(self) -> Vec<u32> {
        self.builder.module().assemble()
    }

    pub fn set_source_file(&mut self, file_name: &str) {
        let file = self.builder.string(file_name);
        self.builder
            .source(spirv::SourceLanguage::Unknown, 0, Some(file), None::<String>);
    }

    // Types.

    pub fn void_type(&mut self) -> Word {
        match self.void_type {
            Some(id) => id,
            None => {
                let id = self.builder.type_void();
                self.void_type = Some(id);
                id
            }
        }
    }

    pub fn void_function_type(&mut self) -> Word {
        match self.void_fn_type {
            Some(id) => id,
            None => {
                let void = self.void_type();
                let id = self.builder.type_function(void, []);
                self.void_fn_type = Some(id);
                id
            }
        }
    }

    pub fn bool_type(&mut self) -> Word {
        self.vector_type(VectorType::boolean(1))
    }

    pub fn scalar_type(&mut self, ctype: ScalarType) -> Word {
        self.vector_type(VectorType::new(ctype, 1))
    }

    pub fn vector_type(&mut self, ty: VectorType) -> Word {
        if let Some(&id) = self.types.get(&ty) {
            return id;
        }

        let id = if ty.ccount > 1 {
            let scalar = self.scalar_type(ty.ctype);
            self.builder.type_vector(scalar, ty.ccount)
        } else {
            match ty.ctype {
                ScalarType::Float32 => self.builder.type_float(32),
                ScalarType::Sint32 => self.builder.type_int(32, 1),
                ScalarType::Uint32 => self.builder.type_int(32, 0),
                ScalarType::Bool => self.builder.type_bool(),
            }
        };
        self.types.insert(ty, id);
        id
    }

    pub fn pointer_type(&mut self, pointee: Word, storage: spirv::StorageClass) -> Word {
        if let Some(&id) = self.pointers.get(&(pointee, storage)) {
            return id;
        }
        let id = self.builder.type_pointer(None, storage, pointee);
        self.pointers.insert((pointee, storage), id);
        id
    }

    pub fn array_type(&mut self, element: Word, length: u32) -> Word {
        let length = self.const_u32(length);
        self.builder.type_array(element, length)
    }

    // Constants.

    fn scalar_constant(&mut self, ctype: ScalarType, bits: u32) -> Word {
        let key = ConstKey::Scalar(ctype, bits);
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let ty = self.scalar_type(ctype);
        let id = match ctype {
            ScalarType::Bool if bits != 0 => self.builder.constant_true(ty),
            ScalarType::Bool => self.builder.constant_false(ty),
            _ => self.builder.constant_bit32(ty, bits),
        };
        self.constants.insert(key, id);
        id
    }

    fn composite_constant(&mut self, ty: VectorType, bits: [u32; 4]) -> Word {
        if ty.ccount == 1 {
            return self.scalar_constant(ty.ctype, bits[0]);
        }
        let key = ConstKey::Composite(ty, bits);
        if let Some(&id) = self.constants.get(&key) {
            return id;
        }
        let components: Vec<Word> = bits[..ty.ccount as usize]
            .iter()
            .map(|&b| self.scalar_constant(ty.ctype, b))
            .collect();
        let type_id = self.vector_type(ty);
        let id = self.builder.constant_composite(type_id, components);
        self.constants.insert(key, id);
        id
    }

    pub fn const_f32(&mut self, value: f32) -> Word {
        self.scalar_constant(ScalarType::Float32, value.to_bits())
    }

    pub fn const_i32(&mut self, value: i32) -> Word {
        self.scalar_constant(ScalarType::Sint32, value as u32)
    }

    pub fn const_u32(&mut self, value: u32) -> Word {
        self.scalar_constant(ScalarType::Uint32, value)
    }

    pub fn const_bool(&mut self, value: bool) -> Word {
        self.scalar_constant(ScalarType::Bool, u32::from(value))
    }

    pub fn const_vec4_f32(&mut self, value: [f32; 4]) -> Word {
        self.composite_constant(VectorType::float(4), value.map(f32::to_bits))
    }

    pub fn const_vec4_i32(&mut self, value: [i32; 4]) -> Word {
        self.composite_constant(VectorType::sint(4), value.map(|v| v as u32))
    }

    /// `value` splatted across `count` float components (a plain scalar when `count == 1`).
    pub fn const_f32_replicant(&mut self, value: f32, count: u32) -> Word {
        self.composite_constant(VectorType::float(count), [value.to_bits(); 4])
    }

    /// A zero value of any register type.
    pub fn const_zero(&mut self, ty: VectorType) -> Word {
        self.composite_constant(ty, [0; 4])
    }

    /// `OpConstantNull` of an aggregate type.
    pub fn const_null(&mut self, type_id: Word) -> Word {
        self.builder.constant_null(type_id)
    }

    // Extended instructions.

    pub fn glsl(
        &mut self,
        result_type: Word,
        op: spirv::GLOp,
        args: &[Word],
    ) -> Result<Word, rspirv::dr::Error> {
        let glsl = self.glsl;
        self.builder.ext_inst(
            result_type,
            None,
            glsl,
            op as u32,
            args.iter().map(|&id| Operand::IdRef(id)).collect::<Vec<_>>(),
        )
    }

    // Variables and decorations.

    pub fn new_var(&mut self, pointer_type: Word, storage: spirv::StorageClass, init: Option<Word>) -> Word {
        self.builder.variable(pointer_type, None, storage, init)
    }

    pub fn set_name(&mut self, id: Word, name: &str) {
        if self.debug_names {
            self.builder.name(id, name);
        }
    }

    pub fn set_member_name(&mut self, id: Word, member: u32, name: &str) {
        if self.debug_names {
            self.builder.member_name(id, member, name);
        }
    }

    pub fn decorate_location(&mut self, id: Word, location: u32) {
        self.builder.decorate(
            id,
            spirv::Decoration::Location,
            [Operand::LiteralBit32(location)],
        );
    }

    pub fn decorate_builtin(&mut self, id: Word, builtin: spirv::BuiltIn) {
        self.builder
            .decorate(id, spirv::Decoration::BuiltIn, [Operand::BuiltIn(builtin)]);
    }

    pub fn decorate_binding(&mut self, id: Word, set: u32, binding: u32) {
        self.builder.decorate(
            id,
            spirv::Decoration::DescriptorSet,
            [Operand::LiteralBit32(set)],
        );
        self.builder
            .decorate(id, spirv::Decoration::Binding, [Operand::LiteralBit32(binding)]);
    }

    pub fn decorate_spec_id(&mut self, id: Word, spec_id: u32) {
        self.builder
            .decorate(id, spirv::Decoration::SpecId, [Operand::LiteralBit32(spec_id)]);
    }

    pub fn decorate_block(&mut self, struct_type: Word) {
        self.builder.decorate(struct_type, spirv::Decoration::Block, []);
    }

    pub fn decorate_array_stride(&mut self, array_type: Word, stride: u32) {
        self.builder.decorate(
            array_type,
            spirv::Decoration::ArrayStride,
            [Operand::LiteralBit32(stride)],
        );
    }

    pub fn member_decorate_offset(&mut self, struct_type: Word, member: u32, offset: u32) {
        self.builder.member_decorate(
            struct_type,
            member,
            spirv::Decoration::Offset,
            [Operand::LiteralBit32(offset)],
        );
    }

    // Blocks.

    /// Starts a new block labelled `label`.
    pub fn label(&mut self, label: Word) -> Result<(), rspirv::dr::Error> {
        self.builder.begin_block(Some(label))?;
        Ok(())
    }

    /// Detaches the current block without terminating it and returns a token for it.
    ///
    /// The caller must start another block right away and must eventually pass the token to
    /// [`Self::begin_insertion`] to write the missing terminator.
    pub fn insertion_token(&mut self) -> Result<Option<InsertToken>, rspirv::dr::Error> {
        let Some(index) = self.builder.selected_block() else {
            return Ok(None);
        };
        self.builder.select_block(None)?;
        Ok(Some(InsertToken(index)))
    }

    /// Reopens the block behind `token`. Whatever is emitted next is appended to that block; the
    /// first terminator closes it again.
    pub fn begin_insertion(&mut self, token: InsertToken) -> Result<(), rspirv::dr::Error> {
        self.builder.select_block(Some(token.0))
    }
}

impl Deref for SpirvModule {
    type Target = Builder;

    fn deref(&self) -> &Builder {
        &self.builder
    }
}

impl DerefMut for SpirvModule {
    fn deref_mut(&mut self) -> &mut Builder {
        &mut self.builder
    }
}
