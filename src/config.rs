//! Target configuration for a single compilation.

/// Calling convention / platform the code generator and emitter target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    /// System V AMD64 ABI (Linux, most Unix).
    SystemV,
    /// Microsoft x64 calling convention (Windows).
    Microsoft,
}

impl Platform {
    /// Number of integer argument registers before arguments spill to the stack.
    pub fn register_arg_count(self) -> usize {
        match self {
            Platform::SystemV => 6,
            Platform::Microsoft => 4,
        }
    }

    /// Whether the emitter should omit the Linux-only GNU-stack note.
    pub fn emits_gnu_stack_note(self) -> bool {
        matches!(self, Platform::SystemV)
    }

    /// Whether an external call needs the `@PLT` suffix.
    pub fn needs_plt_suffix(self) -> bool {
        matches!(self, Platform::SystemV)
    }
}

/// Per-compilation configuration assembled from CLI flags.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub platform: Platform,
    pub keep_asm: bool,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            platform: Platform::SystemV,
            keep_asm: true,
        }
    }
}

impl TargetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_keep_asm(mut self, keep_asm: bool) -> Self {
        self.keep_asm = keep_asm;
        self
    }
}
