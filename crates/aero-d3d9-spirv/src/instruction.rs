//! Decoded SM1-SM3 instruction records.
//!
//! Token-stream parsing happens upstream; the compiler consumes these already-decoded records one
//! at a time.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Nop,
    Mov,
    Add,
    Sub,
    Mad,
    Mul,
    Rcp,
    Rsq,
    Dp3,
    Dp4,
    Min,
    Max,
    Slt,
    Sge,
    Exp,
    Log,
    Lit,
    Dst,
    Lrp,
    Frc,
    M4x4,
    M4x3,
    M3x4,
    M3x3,
    M3x2,
    Call,
    CallNz,
    Loop,
    Ret,
    EndLoop,
    Label,
    Dcl,
    Pow,
    Crs,
    Sgn,
    Abs,
    Nrm,
    SinCos,
    Rep,
    EndRep,
    If,
    Ifc,
    Else,
    EndIf,
    Break,
    BreakC,
    Mova,
    DefB,
    DefI,
    /// SM1.x `texcoord`: copies the raw interpolated texture coordinate into `t#`.
    TexCoord,
    TexKill,
    /// `tex` / `texld` / `texldp` / `texldb`.
    Tex,
    TexBem,
    TexBemL,
    TexReg2Ar,
    TexReg2Gb,
    TexM3x2Pad,
    TexM3x2Tex,
    TexM3x3Pad,
    TexM3x3Tex,
    TexM3x3Spec,
    TexM3x3VSpec,
    ExpP,
    LogP,
    /// `cnd`: per-component select `dst = (src0 > 0.5) ? src1 : src2`.
    Cnd,
    Def,
    TexReg2Rgb,
    TexDp3Tex,
    TexM3x2Depth,
    TexDp3,
    TexM3x3,
    TexDepth,
    /// `cmp`: per-component select `dst = (src0 >= 0) ? src1 : src2`.
    Cmp,
    Bem,
    /// `dp2add`: `dot(src0.xy, src1.xy) + src2.x`, replicated to all components.
    Dp2Add,
    DsX,
    DsY,
    TexLdd,
    SetP,
    TexLdl,
    BreakP,
    Phase,
    Comment,
    End,
    Unknown(u16),
}

impl Opcode {
    /// Maps a raw `D3DSHADER_INSTRUCTION_OPCODE_TYPE` value.
    pub fn from_raw(op: u16) -> Self {
        match op {
            0 => Self::Nop,
            1 => Self::Mov,
            2 => Self::Add,
            3 => Self::Sub,
            4 => Self::Mad,
            5 => Self::Mul,
            6 => Self::Rcp,
            7 => Self::Rsq,
            8 => Self::Dp3,
            9 => Self::Dp4,
            10 => Self::Min,
            11 => Self::Max,
            12 => Self::Slt,
            13 => Self::Sge,
            14 => Self::Exp,
            15 => Self::Log,
            16 => Self::Lit,
            17 => Self::Dst,
            18 => Self::Lrp,
            19 => Self::Frc,
            20 => Self::M4x4,
            21 => Self::M4x3,
            22 => Self::M3x4,
            23 => Self::M3x3,
            24 => Self::M3x2,
            25 => Self::Call,
            26 => Self::CallNz,
            27 => Self::Loop,
            28 => Self::Ret,
            29 => Self::EndLoop,
            30 => Self::Label,
            31 => Self::Dcl,
            32 => Self::Pow,
            33 => Self::Crs,
            34 => Self::Sgn,
            35 => Self::Abs,
            36 => Self::Nrm,
            37 => Self::SinCos,
            38 => Self::Rep,
            39 => Self::EndRep,
            40 => Self::If,
            41 => Self::Ifc,
            42 => Self::Else,
            43 => Self::EndIf,
            44 => Self::Break,
            45 => Self::BreakC,
            46 => Self::Mova,
            47 => Self::DefB,
            48 => Self::DefI,
            64 => Self::TexCoord,
            65 => Self::TexKill,
            66 => Self::Tex,
            67 => Self::TexBem,
            68 => Self::TexBemL,
            69 => Self::TexReg2Ar,
            70 => Self::TexReg2Gb,
            71 => Self::TexM3x2Pad,
            72 => Self::TexM3x2Tex,
            73 => Self::TexM3x3Pad,
            74 => Self::TexM3x3Tex,
            76 => Self::TexM3x3Spec,
            77 => Self::TexM3x3VSpec,
            78 => Self::ExpP,
            79 => Self::LogP,
            80 => Self::Cnd,
            81 => Self::Def,
            82 => Self::TexReg2Rgb,
            83 => Self::TexDp3Tex,
            84 => Self::TexM3x2Depth,
            85 => Self::TexDp3,
            86 => Self::TexM3x3,
            87 => Self::TexDepth,
            88 => Self::Cmp,
            89 => Self::Bem,
            90 => Self::Dp2Add,
            91 => Self::DsX,
            92 => Self::DsY,
            93 => Self::TexLdd,
            94 => Self::SetP,
            95 => Self::TexLdl,
            96 => Self::BreakP,
            0xFFFD => Self::Phase,
            0xFFFE => Self::Comment,
            0xFFFF => Self::End,
            other => Self::Unknown(other),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::Mov => "mov",
            Self::Add => "add",
            Self::Sub => "sub",
            Self::Mad => "mad",
            Self::Mul => "mul",
            Self::Rcp => "rcp",
            Self::Rsq => "rsq",
            Self::Dp3 => "dp3",
            Self::Dp4 => "dp4",
            Self::Min => "min",
            Self::Max => "max",
            Self::Slt => "slt",
            Self::Sge => "sge",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Lit => "lit",
            Self::Dst => "dst",
            Self::Lrp => "lrp",
            Self::Frc => "frc",
            Self::M4x4 => "m4x4",
            Self::M4x3 => "m4x3",
            Self::M3x4 => "m3x4",
            Self::M3x3 => "m3x3",
            Self::M3x2 => "m3x2",
            Self::Call => "call",
            Self::CallNz => "callnz",
            Self::Loop => "loop",
            Self::Ret => "ret",
            Self::EndLoop => "endloop",
            Self::Label => "label",
            Self::Dcl => "dcl",
            Self::Pow => "pow",
            Self::Crs => "crs",
            Self::Sgn => "sgn",
            Self::Abs => "abs",
            Self::Nrm => "nrm",
            Self::SinCos => "sincos",
            Self::Rep => "rep",
            Self::EndRep => "endrep",
            Self::If => "if",
            Self::Ifc => "ifc",
            Self::Else => "else",
            Self::EndIf => "endif",
            Self::Break => "break",
            Self::BreakC => "breakc",
            Self::Mova => "mova",
            Self::DefB => "defb",
            Self::DefI => "defi",
            Self::TexCoord => "texcoord",
            Self::TexKill => "texkill",
            Self::Tex => "tex",
            Self::TexBem => "texbem",
            Self::TexBemL => "texbeml",
            Self::TexReg2Ar => "texreg2ar",
            Self::TexReg2Gb => "texreg2gb",
            Self::TexM3x2Pad => "texm3x2pad",
            Self::TexM3x2Tex => "texm3x2tex",
            Self::TexM3x3Pad => "texm3x3pad",
            Self::TexM3x3Tex => "texm3x3tex",
            Self::TexM3x3Spec => "texm3x3spec",
            Self::TexM3x3VSpec => "texm3x3vspec",
            Self::ExpP => "expp",
            Self::LogP => "logp",
            Self::Cnd => "cnd",
            Self::Def => "def",
            Self::TexReg2Rgb => "texreg2rgb",
            Self::TexDp3Tex => "texdp3tex",
            Self::TexM3x2Depth => "texm3x2depth",
            Self::TexDp3 => "texdp3",
            Self::TexM3x3 => "texm3x3",
            Self::TexDepth => "texdepth",
            Self::Cmp => "cmp",
            Self::Bem => "bem",
            Self::Dp2Add => "dp2add",
            Self::DsX => "dsx",
            Self::DsY => "dsy",
            Self::TexLdd => "texldd",
            Self::SetP => "setp",
            Self::TexLdl => "texldl",
            Self::BreakP => "breakp",
            Self::Phase => "phase",
            Self::Comment => "comment",
            Self::End => "end",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown(raw) => write!(f, "unknown({raw})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterType {
    Temp,
    Input,
    Const,
    /// `a0`. Vertex shaders only.
    Addr,
    /// `t#`. In vertex shaders this register type aliases the address register.
    Texture,
    /// `oPos`, `oFog`, `oPts`; see [`RasterizerOut`].
    RasterizerOut,
    /// `oD#`.
    AttributeOut,
    /// `oT#` before SM3, generic `o#` in vs_3_0.
    Output,
    ConstInt,
    ColorOut,
    DepthOut,
    Sampler,
    ConstBool,
    Loop,
    Label,
    Predicate,
    /// `vPos` / `vFace`; see [`MiscType`].
    MiscType,
    /// The interpolated coordinate behind `t#` in SM1.x pixel shaders.
    PixelTexcoord,
}

impl RegisterType {
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Temp => "r",
            Self::Input => "v",
            Self::Const => "c",
            Self::Addr => "a",
            Self::Texture => "t",
            Self::RasterizerOut => "oRast",
            Self::AttributeOut => "oD",
            Self::Output => "o",
            Self::ConstInt => "i",
            Self::ColorOut => "oC",
            Self::DepthOut => "oDepth",
            Self::Sampler => "s",
            Self::ConstBool => "b",
            Self::Loop => "aL",
            Self::Label => "l",
            Self::Predicate => "p",
            Self::MiscType => "misc",
            Self::PixelTexcoord => "tc",
        }
    }
}

/// Register numbers within [`RegisterType::RasterizerOut`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterizerOut {
    Position = 0,
    Fog = 1,
    PointSize = 2,
}

/// Register numbers within [`RegisterType::MiscType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscType {
    Position = 0,
    Face = 1,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterId {
    pub ty: RegisterType,
    pub num: u32,
}

impl RegisterId {
    pub fn new(ty: RegisterType, num: u32) -> Self {
        Self { ty, num }
    }
}

impl std::fmt::Display for RegisterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.ty.short_name(), self.num)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwizzleComponent {
    X,
    Y,
    Z,
    W,
}

impl SwizzleComponent {
    pub fn index(&self) -> u32 {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
            Self::W => 3,
        }
    }

    pub fn from_index(index: u32) -> Self {
        match index & 3 {
            0 => Self::X,
            1 => Self::Y,
            2 => Self::Z,
            _ => Self::W,
        }
    }
}

/// Destination write mask, bit `i` enables component `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteMask(pub u8);

impl WriteMask {
    pub const X: Self = Self(0x1);
    pub const XY: Self = Self(0x3);
    pub const XYZ: Self = Self(0x7);
    pub const XYZW: Self = Self(0xF);

    pub fn all() -> Self {
        Self::XYZW
    }

    pub fn new(x: bool, y: bool, z: bool, w: bool) -> Self {
        Self(u8::from(x) | u8::from(y) << 1 | u8::from(z) << 2 | u8::from(w) << 3)
    }

    pub fn contains(&self, component: u32) -> bool {
        component < 4 && (self.0 & (1 << component)) != 0
    }

    pub fn pop_count(&self) -> u32 {
        (self.0 & 0xF).count_ones()
    }

    pub fn first_set(&self) -> Option<u32> {
        (0..4).find(|&i| self.contains(i))
    }

    /// Enabled component indices in ascending order.
    pub fn components(&self) -> impl Iterator<Item = u32> + '_ {
        (0..4).filter(move |&i| self.contains(i))
    }
}

impl Default for WriteMask {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Swizzle(pub [SwizzleComponent; 4]);

impl Swizzle {
    pub fn identity() -> Self {
        Self([
            SwizzleComponent::X,
            SwizzleComponent::Y,
            SwizzleComponent::Z,
            SwizzleComponent::W,
        ])
    }

    pub fn replicate(component: SwizzleComponent) -> Self {
        Self([component; 4])
    }

    pub fn get(&self, index: u32) -> SwizzleComponent {
        self.0[(index & 3) as usize]
    }
}

impl Default for Swizzle {
    fn default() -> Self {
        Self::identity()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SrcModifier {
    #[default]
    None,
    Negate,
    Bias,
    BiasNegate,
    Sign,
    SignNegate,
    /// `1 - r`
    Comp,
    X2,
    X2Negate,
    /// `r / r.z`
    Dz,
    /// `r / r.w`
    Dw,
    Abs,
    AbsNegate,
    Not,
    Unknown(u8),
}

impl SrcModifier {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::Negate,
            2 => Self::Bias,
            3 => Self::BiasNegate,
            4 => Self::Sign,
            5 => Self::SignNegate,
            6 => Self::Comp,
            7 => Self::X2,
            8 => Self::X2Negate,
            9 => Self::Dz,
            10 => Self::Dw,
            11 => Self::Abs,
            12 => Self::AbsNegate,
            13 => Self::Not,
            other => Self::Unknown(other),
        }
    }
}

/// Comparison codes of `ifc`/`breakc`, in bytecode order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Never,
    GreaterThan,
    Equal,
    GreaterEqual,
    LessThan,
    NotEqual,
    LessEqual,
    Always,
}

impl Comparison {
    pub fn from_raw(raw: u8) -> Self {
        match raw & 7 {
            0 => Self::Never,
            1 => Self::GreaterThan,
            2 => Self::Equal,
            3 => Self::GreaterEqual,
            4 => Self::LessThan,
            5 => Self::NotEqual,
            6 => Self::LessEqual,
            _ => Self::Always,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Usage {
    Position,
    BlendWeight,
    BlendIndices,
    Normal,
    PointSize,
    Texcoord,
    Tangent,
    Binormal,
    TessFactor,
    PositionT,
    Color,
    Fog,
    Depth,
    Sample,
}

impl Usage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::BlendWeight => "blendweight",
            Self::BlendIndices => "blendindices",
            Self::Normal => "normal",
            Self::PointSize => "psize",
            Self::Texcoord => "texcoord",
            Self::Tangent => "tangent",
            Self::Binormal => "binormal",
            Self::TessFactor => "tessfactor",
            Self::PositionT => "positiont",
            Self::Color => "color",
            Self::Fog => "fog",
            Self::Depth => "depth",
            Self::Sample => "sample",
        }
    }
}

/// Usage plus usage index, the key interface slots are linked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semantic {
    pub usage: Usage,
    pub usage_index: u32,
}

impl Semantic {
    pub fn new(usage: Usage, usage_index: u32) -> Self {
        Self { usage, usage_index }
    }
}

impl std::fmt::Display for Semantic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.usage.name(), self.usage_index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureType {
    #[default]
    Texture2D,
    TextureCube,
    Texture3D,
}

/// Payload of a `dcl` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DclInfo {
    /// Input/output register declaration (`dcl_texcoord0 v1`, ...).
    Semantic(Semantic),
    /// Sampler declaration (`dcl_2d s0`, `dcl_cube s1`, ...).
    Sampler(TextureType),
}

/// Immediate payload of `def`/`defi`/`defb`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefValue {
    Float([f32; 4]),
    Int([i32; 4]),
    Bool(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelativeAddress {
    pub reg: RegisterId,
    pub component: SwizzleComponent,
}

/// A source or destination operand.
///
/// Destination-only fields (`mask`, `saturate`, `centroid`) and source-only fields (`swizzle`,
/// `modifier`) live side by side; each is ignored in the other role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operand {
    pub reg: RegisterId,
    pub relative: Option<RelativeAddress>,
    pub mask: WriteMask,
    pub swizzle: Swizzle,
    pub modifier: SrcModifier,
    pub saturate: bool,
    pub centroid: bool,
}

impl Operand {
    pub fn new(ty: RegisterType, num: u32) -> Self {
        Self {
            reg: RegisterId::new(ty, num),
            relative: None,
            mask: WriteMask::all(),
            swizzle: Swizzle::identity(),
            modifier: SrcModifier::None,
            saturate: false,
            centroid: false,
        }
    }

    pub fn with_mask(mut self, mask: WriteMask) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_swizzle(mut self, swizzle: Swizzle) -> Self {
        self.swizzle = swizzle;
        self
    }

    pub fn with_modifier(mut self, modifier: SrcModifier) -> Self {
        self.modifier = modifier;
        self
    }

    pub fn with_relative(mut self, reg: RegisterId, component: SwizzleComponent) -> Self {
        self.relative = Some(RelativeAddress { reg, component });
        self
    }

    pub fn saturated(mut self) -> Self {
        self.saturate = true;
        self
    }

    pub fn centroid(mut self) -> Self {
        self.centroid = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub dst: Option<Operand>,
    pub src: Vec<Operand>,
    /// Comparison code of `ifc`/`breakc`.
    pub comparison: Option<Comparison>,
    pub def: Option<DefValue>,
    pub dcl: Option<DclInfo>,
}

impl Instruction {
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode,
            dst: None,
            src: Vec::new(),
            comparison: None,
            def: None,
            dcl: None,
        }
    }

    pub fn with_dst(mut self, dst: Operand) -> Self {
        self.dst = Some(dst);
        self
    }

    pub fn with_src(mut self, src: Operand) -> Self {
        self.src.push(src);
        self
    }

    pub fn with_comparison(mut self, comparison: Comparison) -> Self {
        self.comparison = Some(comparison);
        self
    }

    pub fn with_def(mut self, def: DefValue) -> Self {
        self.def = Some(def);
        self
    }

    pub fn with_dcl(mut self, dcl: DclInfo) -> Self {
        self.dcl = Some(dcl);
        self
    }
}
