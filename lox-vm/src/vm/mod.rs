use std::{
    io::{self, Stderr, Stdout, Write},
    rc::Rc,
};

pub use state::State;
use thiserror::Error;

use crate::{Function, Value, VmConfig, compiler};

mod state;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("CompileError")]
    CompileError,
    #[error("RuntimeError: {0}")]
    RuntimeError(String),
    #[error("IoError: {0}")]
    Io(#[from] io::Error),
}

/// The virtual machine.
///
/// Program output goes to `out`, compile diagnostics and runtime error
/// reports go to `err`. Globals live as long as the VM, so a REPL can feed
/// it one line at a time.
pub struct Vm<O: Write = Stdout, E: Write = Stderr> {
    config: VmConfig,
    state: State,
    out: O,
    err: E,
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

impl Vm {
    pub fn new() -> Self {
        Vm::with_writers(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> Vm<O, E> {
    pub fn with_writers(out: O, err: E) -> Self {
        Vm {
            config: VmConfig::default(),
            state: State::new(),
            out,
            err,
        }
    }

    pub fn with_config(mut self, config: VmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn compile(&mut self, source: &str) -> Result<Rc<Function>, VmError> {
        let result = compiler::compile(source, &mut self.err);
        self.err.flush()?;
        let function = Rc::new(result?);
        if self.config.print_code {
            function.disassemble(&mut self.out)?;
        }
        Ok(function)
    }

    /// Run a compiled script. On failure the stack is reset so the VM stays usable.
    pub fn run(&mut self, function: Rc<Function>) -> Result<(), VmError> {
        let _span = tracing::debug_span!("run", function = %function).entered();

        self.state.call_function(function);
        let result = self.state.run(&self.config, &mut self.out);
        self.out.flush()?;

        match result {
            Ok(_) => Ok(()),
            Err(err) => {
                self.state.reset_stack();
                if let VmError::RuntimeError(report) = &err {
                    writeln!(self.err, "{report}")?;
                    self.err.flush()?;
                }
                Err(err)
            }
        }
    }

    pub fn interpret(&mut self, source: &str) -> Result<(), VmError> {
        let function = self.compile(source)?;
        self.run(function)
    }

    pub fn global(&self, name: &str) -> Option<Value> {
        self.state.globals.get(name).cloned()
    }

    pub fn globals(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.state
            .globals
            .iter()
            .map(|(name, value)| (name.as_ref(), value))
    }

    pub fn output(&self) -> &O {
        &self.out
    }

    pub fn error_output(&self) -> &E {
        &self.err
    }

    pub fn into_writers(self) -> (O, E) {
        (self.out, self.err)
    }
}
