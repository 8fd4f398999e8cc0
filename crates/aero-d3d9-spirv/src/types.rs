use rspirv::spirv;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    pub fn execution_model(&self) -> spirv::ExecutionModel {
        match self {
            Self::Vertex => spirv::ExecutionModel::Vertex,
            Self::Pixel => spirv::ExecutionModel::Fragment,
        }
    }

    /// Index used when laying out per-stage resource bindings.
    pub fn index(&self) -> u32 {
        match self {
            Self::Vertex => 0,
            Self::Pixel => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderVersion {
    pub stage: ShaderStage,
    pub major: u8,
    pub minor: u8,
}

impl ShaderVersion {
    pub fn new(stage: ShaderStage, major: u8, minor: u8) -> Self {
        Self {
            stage,
            major,
            minor,
        }
    }

    pub fn is_sm1(&self) -> bool {
        self.major == 1
    }

    pub fn is_sm2(&self) -> bool {
        self.major == 2
    }

    pub fn is_sm3(&self) -> bool {
        self.major == 3
    }

    pub fn is_vertex(&self) -> bool {
        self.stage == ShaderStage::Vertex
    }

    pub fn is_pixel(&self) -> bool {
        self.stage == ShaderStage::Pixel
    }

    /// ps_1_4 samples from arbitrary registers like SM2 does, while ps_1_0..ps_1_3 bind
    /// each texture register to its own coordinate set.
    pub fn has_sm2_texture_addressing(&self) -> bool {
        self.major >= 2 || (self.major == 1 && self.minor == 4)
    }
}

impl std::fmt::Display for ShaderVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.stage {
            ShaderStage::Vertex => "vs",
            ShaderStage::Pixel => "ps",
        };
        write!(f, "{prefix}_{}_{}", self.major, self.minor)
    }
}

/// Module descriptor handed to the compiler alongside the instruction stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleInfo {
    pub version: ShaderVersion,
}

impl ModuleInfo {
    pub fn new(version: ShaderVersion) -> Self {
        Self { version }
    }

    pub fn stage(&self) -> ShaderStage {
        self.version.stage
    }
}
