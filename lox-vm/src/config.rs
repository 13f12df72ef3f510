use serde::Deserialize;

/// Debug switches of the virtual machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Print the stack and every instruction before executing it.
    pub trace_execution: bool,
    /// Disassemble each chunk after a successful compilation.
    pub print_code: bool,
}
