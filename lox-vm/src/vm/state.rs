use std::{borrow::Cow, collections::HashMap, hash::BuildHasherDefault, io::Write, rc::Rc};

use ahash::AHasher;

use crate::{
    OpCode, Value, VmConfig,
    object::{Function, Object},
};

use super::VmError;

type Table = HashMap<Rc<str>, Value, BuildHasherDefault<AHasher>>;

static NUMBER_OPERATOR_ERROR: &str = "Operands must be numbers.";

macro_rules! binary_op {
    ($self:expr, $op:tt) => {{
        let (a, b) = $self.number_operands()?;
        $self.push_stack((a $op b).into());
    }};
}

#[derive(Debug)]
struct CallFrame {
    function: Rc<Function>,
    ip: usize,
    // slot_start field points into the VM’s value stack
    // at the first slot that this function can use
    slot_start: usize,
}

impl CallFrame {
    fn read_byte(&mut self) -> u8 {
        let byte = self.function.chunk.code[self.ip];
        self.ip += 1;
        byte
    }

    fn read_short(&mut self) -> u16 {
        let short = self.function.chunk.read_short(self.ip);
        self.ip += 2;
        short
    }

    fn read_constant(&mut self) -> Value {
        let byte = self.read_byte();
        self.function.chunk.read_constant(byte).clone()
    }
}

#[derive(Debug, Default)]
pub struct State {
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    pub(super) globals: Table,
}

impl State {
    pub fn new() -> Self {
        State::default()
    }

    /// Push `function` into slot 0 of a new frame.
    pub fn call_function(&mut self, function: Rc<Function>) {
        let slot_start = self.stack.len();
        self.push_stack(Value::from(function.clone()));
        self.frames.push(CallFrame {
            function,
            ip: 0,
            slot_start,
        });
    }

    /// Execute until the outermost frame returns, yielding its return value.
    pub fn run<W: Write>(&mut self, config: &VmConfig, out: &mut W) -> Result<Value, VmError> {
        loop {
            if config.trace_execution {
                self.trace(out)?;
            }
            if let Some(value) = self.dispatch_next(out)? {
                return Ok(value);
            }
        }
    }

    pub fn reset_stack(&mut self) {
        self.stack.clear();
        self.frames.clear();
    }

    fn runtime_error(&mut self, message: Cow<'static, str>) -> VmError {
        let mut error_message = String::from(message);
        for frame in self.frames.iter().rev() {
            let function = &frame.function;
            error_message.push_str(&format!(
                "\n[line {}] in ",
                function.chunk.line(frame.ip - 1)
            ));
            match &function.name {
                Some(name) => error_message.push_str(&format!("{name}()")),
                None => error_message.push_str("script"),
            }
        }
        tracing::debug!(error = %error_message, "runtime error");
        VmError::RuntimeError(error_message)
    }

    fn current_frame(&mut self) -> &mut CallFrame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    fn read_string(&mut self) -> Result<Rc<str>, VmError> {
        let constant = self.current_frame().read_constant();
        match constant.as_string() {
            Some(name) => Ok(name.clone()),
            None => Err(self.runtime_error("Expect a string constant.".into())),
        }
    }

    // Dispatch the next opcode, return the result once the outermost frame returns.
    fn dispatch_next<W: Write>(&mut self, out: &mut W) -> Result<Option<Value>, VmError> {
        let byte = self.current_frame().read_byte();
        let Ok(code) = OpCode::try_from(byte) else {
            return Err(self.runtime_error(format!("Unknown opcode {byte}.").into()));
        };
        tracing::trace!(opcode = ?code, stack_depth = self.stack.len(), "dispatch");

        match code {
            OpCode::Constant => {
                let constant = self.current_frame().read_constant();
                self.push_stack(constant);
            }
            OpCode::Nil => self.push_stack(Value::Nil),
            OpCode::True => self.push_stack(Value::Boolean(true)),
            OpCode::False => self.push_stack(Value::Boolean(false)),
            OpCode::Pop => {
                self.pop_stack();
            }
            OpCode::GetLocal => {
                let slot = self.current_frame().read_byte() as usize;
                let index = self.current_frame().slot_start + slot;
                let value = self.stack[index].clone();
                self.push_stack(value);
            }
            OpCode::SetLocal => {
                let slot = self.current_frame().read_byte() as usize;
                let index = self.current_frame().slot_start + slot;
                // Assignment is an expression, leave the value on the stack.
                self.stack[index] = self.peek(0).clone();
            }
            OpCode::GetGlobal => {
                let name = self.read_string()?;
                match self.globals.get(&name).cloned() {
                    Some(value) => self.push_stack(value),
                    None => {
                        return Err(
                            self.runtime_error(format!("Undefined variable '{name}'.").into())
                        );
                    }
                }
            }
            OpCode::DefineGlobal => {
                let name = self.read_string()?;
                let value = self.peek(0).clone();
                self.globals.insert(name, value);
                self.pop_stack();
            }
            OpCode::SetGlobal => {
                let name = self.read_string()?;
                let value = self.peek(0).clone();
                match self.globals.get_mut(&name) {
                    Some(slot) => *slot = value,
                    None => {
                        return Err(
                            self.runtime_error(format!("Undefined variable '{name}'.").into())
                        );
                    }
                }
            }
            OpCode::Equal => {
                let b = self.pop_stack();
                let a = self.pop_stack();
                self.push_stack(a.equals(&b).into());
            }
            OpCode::Greater => binary_op!(self, >),
            OpCode::Less => binary_op!(self, <),
            OpCode::Add => match (self.peek(1), self.peek(0)) {
                (Value::Number(_), Value::Number(_)) => binary_op!(self, +),
                (Value::Object(Object::String(_)), Value::Object(Object::String(_))) => {
                    let b = self.pop_stack();
                    let a = self.pop_stack();
                    let s: Rc<str> = Rc::from(format!("{a}{b}"));
                    self.push_stack(s.into());
                }
                _ => {
                    return Err(
                        self.runtime_error("Operands must be two numbers or two strings.".into())
                    );
                }
            },
            OpCode::Subtract => binary_op!(self, -),
            OpCode::Multiply => binary_op!(self, *),
            OpCode::Divide => binary_op!(self, /),
            OpCode::Not => {
                let v = self.pop_stack().is_falsy();
                self.push_stack(v.into());
            }
            OpCode::Negate => match self.peek(0).as_number() {
                Some(v) => {
                    self.pop_stack();
                    self.push_stack((-v).into());
                }
                None => return Err(self.runtime_error("Operand must be a number.".into())),
            },
            OpCode::Print => {
                let value = self.pop_stack();
                writeln!(out, "{value}")?;
            }
            OpCode::Jump => {
                let offset = self.current_frame().read_short();
                self.current_frame().ip += offset as usize;
            }
            OpCode::JumpIfFalse => {
                let offset = self.current_frame().read_short();
                // The condition stays on the stack, the compiler emits the pop.
                if self.peek(0).is_falsy() {
                    self.current_frame().ip += offset as usize;
                }
            }
            OpCode::Loop => {
                let offset = self.current_frame().read_short();
                self.current_frame().ip -= offset as usize;
            }
            OpCode::Return => {
                let return_value = self.pop_stack();
                // Must pop the frame from vec when returning
                let frame = self.frames.pop();
                let slot_start = frame.map_or(0, |frame| frame.slot_start);
                self.stack.truncate(slot_start);
                if self.frames.is_empty() {
                    return Ok(Some(return_value));
                }
                self.push_stack(return_value);
            }
        }
        Ok(None)
    }

    // Pop both operands when they are numbers, otherwise leave the stack untouched.
    fn number_operands(&mut self) -> Result<(f64, f64), VmError> {
        match (self.peek(1).as_number(), self.peek(0).as_number()) {
            (Some(a), Some(b)) => {
                self.stack.truncate(self.stack.len() - 2);
                Ok((a, b))
            }
            _ => Err(self.runtime_error(NUMBER_OPERATOR_ERROR.into())),
        }
    }

    #[inline(always)]
    pub fn push_stack(&mut self, value: Value) {
        self.stack.push(value);
    }

    #[inline(always)]
    pub fn pop_stack(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    #[inline(always)]
    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }

    fn trace<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        write!(out, "          ")?;
        for value in &self.stack {
            write!(out, "[ {value} ]")?;
        }
        writeln!(out)?;
        if let Some(frame) = self.frames.last() {
            frame.function.chunk.disassemble_instruction(frame.ip, out)?;
        }
        Ok(())
    }
}
