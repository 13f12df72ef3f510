//! Heap objects.
//!
//! Objects are reference counted. Every [`Value`](crate::Value) holding an
//! object shares ownership of it, and the object is freed once the last
//! stack slot, constant or global referring to it is released. Functions only
//! reference their constants and never themselves, so no cycle can form.

use std::{fmt::Display, rc::Rc};

use crate::Chunk;

#[derive(Debug, Clone)]
pub enum Object {
    String(Rc<str>),
    Function(Rc<Function>),
}

impl Object {
    /// Identity comparison, two objects are equal only when they are the same allocation.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::String(a), Object::String(b)) => Rc::ptr_eq(a, b),
            (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Object::String(s) => write!(f, "{s}"),
            Object::Function(function) => write!(f, "{function}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionType {
    Function,
    Script,
}

#[derive(Debug, Default)]
pub struct Function {
    pub arity: u8,
    pub chunk: Chunk,
    pub name: Option<Rc<str>>,
}

impl Function {
    pub fn new(name: Option<&str>) -> Self {
        Function {
            arity: 0,
            chunk: Chunk::default(),
            name: name.map(Rc::from),
        }
    }

    /// Disassemble this function followed by every function in its constant pool.
    pub fn disassemble<W: std::io::Write>(&self, out: &mut W) -> std::io::Result<()> {
        match &self.name {
            Some(name) => self.chunk.disassemble(name, out)?,
            None => self.chunk.disassemble("<script>", out)?,
        }
        for constant in self.chunk.constants() {
            if let Some(function) = constant.as_function() {
                function.disassemble(out)?;
            }
        }
        Ok(())
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(name) = &self.name {
            write!(f, "<fn {name}>")
        } else {
            write!(f, "<script>")
        }
    }
}
