//! Resource limits for the virtual machine.

/// Default maximum number of active call frames.
pub const DEFAULT_MAX_FRAMES: usize = 10_000;

/// Default maximum operand stack depth.
pub const DEFAULT_MAX_STACK: usize = 1_000_000;

/// Limits enforced while a program runs.
///
/// Exceeding either limit halts the program with a stack overflow instead
/// of growing without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Maximum number of active call frames
    pub max_frames: usize,
    /// Maximum number of values on the operand stack
    pub max_stack: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            max_stack: DEFAULT_MAX_STACK,
        }
    }
}

impl VmConfig {
    /// Creates a configuration with the default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the call frame limit.
    pub fn with_max_frames(mut self, max_frames: usize) -> Self {
        self.max_frames = max_frames;
        self
    }

    /// Sets the operand stack limit.
    pub fn with_max_stack(mut self, max_stack: usize) -> Self {
        self.max_stack = max_stack;
        self
    }
}
