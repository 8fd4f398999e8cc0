use crate::shader_limits::MAX_CLIP_PLANES;

/// Options that affect the emitted SPIR-V.
///
/// Any shader cache keyed on compiled output must include these, since toggling them changes the
/// generated module.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompileOptions {
    /// Batch deferred `texkill` discards with a subgroup ballot.
    ///
    /// When a pixel shader both discards and takes derivatives, the discard is deferred to the end
    /// of the shader so helper lanes keep producing correct derivatives. With this enabled the
    /// shader still discards early, but only once every active lane of the subgroup has asked to.
    pub use_subgroup_ops_for_early_discard: bool,
    /// Number of user clip planes evaluated by vertex shaders. Clamped to [`MAX_CLIP_PLANES`];
    /// zero disables clip distance output entirely.
    pub clip_plane_count: u32,
    /// Emit `OpName`/`OpMemberName` for registers, interface variables and uniform blocks.
    pub debug_names: bool,
    /// Source file name recorded in the module (`OpSource`) so captures can identify the shader.
    pub file_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            use_subgroup_ops_for_early_discard: false,
            clip_plane_count: MAX_CLIP_PLANES,
            debug_names: true,
            file_name: None,
        }
    }
}

impl CompileOptions {
    pub fn effective_clip_plane_count(&self) -> u32 {
        self.clip_plane_count.min(MAX_CLIP_PLANES)
    }
}
