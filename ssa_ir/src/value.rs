use std::sync::Arc;
use vec1::Vec1;

/// A named variable with an SSA version.
///
/// Before SSA construction every variable has version 0. Afterwards each `(name, version)` pair is
/// defined by exactly one instruction. Variables are ordered by name, then version; this order is
/// used to break ties wherever an analysis needs a deterministic order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    name: Arc<str>,
    version: u32,
}

impl Variable {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_version(name, 0)
    }

    pub fn with_version(name: impl Into<Arc<str>>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.version {
            0 => write!(f, "{}", self.name),
            v => write!(f, "{}.{v}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Var(Variable),
    Int(i64),
    Float(f64),
    Undefined,
    /// The address `rbp - offset` of a slot in the stack frame.
    StackAddr(i64),
    /// The word at `rbp + offset`, an argument passed on the stack.
    Frame(i64),
    Composite(Vec1<Value>),
}

impl Value {
    pub fn as_var(&self) -> Option<&Variable> {
        match self {
            Value::Var(var) => Some(var),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns all variables in this value, looking inside composites.
    pub fn vars(&self) -> Vec<&Variable> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars<'a>(&'a self, vars: &mut Vec<&'a Variable>) {
        match self {
            Value::Var(var) => vars.push(var),
            Value::Composite(values) => values.iter().for_each(|v| v.collect_vars(vars)),
            _ => {}
        }
    }

    /// Replaces every variable for which `f` returns a value, looking inside composites.
    pub fn map_vars<F>(&self, f: &mut F) -> Value
    where
        F: FnMut(&Variable) -> Option<Value>,
    {
        match self {
            Value::Var(var) => f(var).unwrap_or_else(|| self.clone()),
            Value::Composite(values) => Value::Composite(values.mapped_ref(|v| v.map_vars(f))),
            _ => self.clone(),
        }
    }
}

impl From<Variable> for Value {
    fn from(value: Variable) -> Self {
        Value::Var(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Var(var) => var.fmt(f),
            Value::Int(i) => i.fmt(f),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Undefined => f.write_str("[undefined]"),
            Value::StackAddr(offset) => write!(f, "[rbp - {offset}]"),
            Value::Frame(offset) => write!(f, "qword [rbp + {offset}]"),
            Value::Composite(values) => {
                write!(f, "{{{}", values.first())?;
                for value in values.iter().skip(1) {
                    write!(f, ", {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Int64,
    Pointer(Box<Type>),
    /// An opaque aggregate of the given number of bytes.
    Blob(u32),
}

impl Type {
    pub fn pointer_to(self) -> Type {
        Type::Pointer(Box::new(self))
    }

    pub fn size(&self) -> u32 {
        match self {
            Type::Int64 | Type::Pointer(_) => 8,
            Type::Blob(size) => *size,
        }
    }

    /// The number of 8 byte words needed to hold a value of this type.
    pub fn words(&self) -> u32 {
        self.size().div_ceil(8)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self, Type::Pointer(_))
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int64 => f.write_str("i64"),
            Type::Pointer(inner) => write!(f, "{inner}*"),
            Type::Blob(size) => write!(f, "blob({size})"),
        }
    }
}
