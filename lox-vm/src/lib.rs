mod chunk;
mod compiler;
mod config;
mod object;
mod value;
mod vm;

pub use chunk::{Chunk, OpCode};
pub use compiler::compile;
pub use config::VmConfig;
pub use object::{Function, FunctionType, Object};
pub use value::Value;
pub use vm::{Vm, VmError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression() {
        let mut vm = Vm::with_writers(Vec::new(), Vec::new());
        vm.interpret("var result = 1 + 2 * 3;").unwrap();
        assert_eq!(vm.global("result"), Some(Value::Number(7.0)));
    }
}
