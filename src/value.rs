//! Opaque display values attached to actions and events.
//!
//! The tracer stores argument and result payloads for display only and never
//! interprets them. `Value` is a closed variant type covering the displayable
//! primitives and composites; `CallArgs` carries the positional and named
//! arguments of one recorded call.

use std::cell::RefCell;
use std::fmt;
use std::fmt::Write;
use std::rc::Rc;

use crate::utils::error::FlamegraphError;

/// A displayable, never-interpreted payload value.
///
/// `Shared` is the only variant able to alias another value, and therefore
/// the only way a payload can form a cycle. Formatting is cycle-safe; the
/// flamegraph exporter refuses cyclic payloads outright.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Shared(Rc<RefCell<Value>>),
}

impl Value {
    /// Wraps a value in a shared cell so it can be referenced from several
    /// payloads (or, pathologically, from itself).
    pub fn shared(value: Value) -> Rc<RefCell<Value>> {
        Rc::new(RefCell::new(value))
    }

    /// Formats the value the way a debugger would print it. A shared cell
    /// already on the formatting path prints `...` instead of recursing.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        let mut path = Vec::new();
        self.write_repr(&mut out, &mut path);
        out
    }

    fn write_repr(&self, out: &mut String, path: &mut Vec<*const RefCell<Value>>) {
        match self {
            Value::Unit => out.push_str("()"),
            Value::Bool(value) => {
                let _ = write!(out, "{value}");
            }
            Value::Int(value) => {
                let _ = write!(out, "{value}");
            }
            Value::Float(value) => {
                let _ = write!(out, "{value}");
            }
            Value::Str(value) => {
                let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
                let _ = write!(out, "'{escaped}'");
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out, path);
                }
                out.push(']');
            }
            Value::Map(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    let _ = write!(out, "'{key}': ");
                    value.write_repr(out, path);
                }
                out.push('}');
            }
            Value::Shared(cell) => {
                let ptr = Rc::as_ptr(cell);
                if path.contains(&ptr) {
                    out.push_str("...");
                } else {
                    path.push(ptr);
                    cell.borrow().write_repr(out, path);
                    path.pop();
                }
            }
        }
    }

    /// Checks that no shared cell is reachable from itself.
    ///
    /// # Errors
    /// `FlamegraphError::CircularReference` when a cycle is found.
    pub fn ensure_acyclic(&self) -> Result<(), FlamegraphError> {
        let mut path = Vec::new();
        self.check_cycles(&mut path)
    }

    fn check_cycles(&self, path: &mut Vec<*const RefCell<Value>>) -> Result<(), FlamegraphError> {
        match self {
            Value::List(items) => {
                for item in items {
                    item.check_cycles(path)?;
                }
                Ok(())
            }
            Value::Map(entries) => {
                for (_, value) in entries {
                    value.check_cycles(path)?;
                }
                Ok(())
            }
            Value::Shared(cell) => {
                let ptr = Rc::as_ptr(cell);
                if path.contains(&ptr) {
                    return Err(FlamegraphError::CircularReference);
                }
                path.push(ptr);
                cell.borrow().check_cycles(path)?;
                path.pop();
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr())
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Unit
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<Rc<RefCell<Value>>> for Value {
    fn from(cell: Rc<RefCell<Value>>) -> Self {
        Value::Shared(cell)
    }
}

/// Positional and named arguments recorded against one action or event.
///
/// Named arguments keep their insertion order for display.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Appends a named argument.
    pub fn named(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.push((key.into(), value.into()));
        self
    }

    /// Renders the call arguments as `(a, b, key=c)`.
    pub fn format(&self) -> String {
        let mut parts: Vec<String> = self.positional.iter().map(Value::repr).collect();
        parts.extend(
            self.named
                .iter()
                .map(|(key, value)| format!("{key}={}", value.repr())),
        );
        format!("({})", parts.join(", "))
    }

    pub(crate) fn ensure_acyclic(&self) -> Result<(), FlamegraphError> {
        for value in &self.positional {
            value.ensure_acyclic()?;
        }
        for (_, value) in &self.named {
            value.ensure_acyclic()?;
        }
        Ok(())
    }
}
