//! Call frames.

/// The VM's record of one active function invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Id of the function being executed
    pub function: u32,
    /// Where execution resumes in the caller
    pub return_ip: usize,
    /// Index of slot 0 in the locals region
    pub base: usize,
    /// Operand stack depth when the frame was entered
    pub stack_mark: usize,
}
