use std::fmt;
use std::rc::Rc;

use gc::{unsafe_empty_trace, Finalize, Gc, GcCell, Trace};
use thiserror::Error;

use crate::environment::Environment;
use crate::reader::ReadError;

pub const TRUE: &str = "true";
pub const FALSE: &str = "false";
pub const OK: &str = "ok";

/// Symbols compare by name, never by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(Rc<str>);

impl Symbol {
    pub fn new(name: &str) -> Self {
        Symbol(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Symbol::new(value)
    }
}

impl From<Rc<str>> for Symbol {
    fn from(value: Rc<str>) -> Self {
        Symbol(value)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Finalize for Symbol {}
unsafe impl Trace for Symbol {
    unsafe_empty_trace!();
}

#[derive(Debug, Clone, PartialEq, Trace, Finalize)]
pub enum Object {
    Number(f64),
    String(#[unsafe_ignore_trace] Rc<str>),
    Symbol(Symbol),
    /// The empty list. `head`/`tail` of it are itself.
    Nil,
    Pair(Gc<GcCell<Pair>>),
    Closure(Gc<Closure>),
    Primitive(Primitive),
}

impl Object {
    pub fn number(value: f64) -> Object {
        Object::Number(value)
    }
    pub fn string(value: &str) -> Object {
        Object::String(value.into())
    }
    pub fn symbol(name: &str) -> Object {
        Object::Symbol(Symbol::new(name))
    }
    pub fn boolean(value: bool) -> Object {
        if value {
            Object::symbol(TRUE)
        } else {
            Object::symbol(FALSE)
        }
    }
    pub fn ok() -> Object {
        Object::symbol(OK)
    }
    pub fn cons(head: Object, tail: Object) -> Object {
        Object::Pair(Gc::new(GcCell::new(Pair { head, tail })))
    }
    pub fn list(elements: impl IntoIterator<Item = Object>) -> Object {
        let elements: Vec<Object> = elements.into_iter().collect();
        elements
            .into_iter()
            .rev()
            .fold(Object::Nil, |tail, head| Object::cons(head, tail))
    }
    pub fn closure(parameters: Object, body: Object, environment: Environment) -> Object {
        Object::Closure(Gc::new(Closure {
            parameters,
            body,
            environment,
        }))
    }
    pub fn primitive(name: &'static str, func: PrimitiveFn) -> Object {
        Object::Primitive(Primitive { name, func })
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Object::Nil)
    }

    /// Only the symbol `false` is falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Object::Symbol(symbol) if symbol.name() == FALSE)
    }

    pub fn is_symbol(&self, name: &str) -> bool {
        matches!(self, Object::Symbol(symbol) if symbol.name() == name)
    }

    pub fn head(&self) -> Result<Object, EvaluationError> {
        match self {
            Object::Nil => Ok(Object::Nil),
            Object::Pair(pair) => Ok(pair.borrow().head.clone()),
            _ => Err(EvaluationError::NotAList(self.clone())),
        }
    }

    pub fn tail(&self) -> Result<Object, EvaluationError> {
        match self {
            Object::Nil => Ok(Object::Nil),
            Object::Pair(pair) => Ok(pair.borrow().tail.clone()),
            _ => Err(EvaluationError::NotAList(self.clone())),
        }
    }

    pub fn set_head(&self, value: Object) -> Result<(), EvaluationError> {
        match self {
            Object::Nil => Err(EvaluationError::EmptyListMutation {
                operation: "set-car!",
            }),
            Object::Pair(pair) => {
                pair.borrow_mut().head = value;
                Ok(())
            }
            _ => Err(EvaluationError::NotAList(self.clone())),
        }
    }

    pub fn set_tail(&self, value: Object) -> Result<(), EvaluationError> {
        match self {
            Object::Nil => Err(EvaluationError::EmptyListMutation {
                operation: "set-cdr!",
            }),
            Object::Pair(pair) => {
                pair.borrow_mut().tail = value;
                Ok(())
            }
            _ => Err(EvaluationError::NotAList(self.clone())),
        }
    }

    /// Collects a proper list. Must not be called on cyclic data.
    pub fn to_vec(&self) -> Result<Vec<Object>, EvaluationError> {
        let mut elements = Vec::new();
        let mut current = self.clone();
        loop {
            let next = match &current {
                Object::Nil => return Ok(elements),
                Object::Pair(pair) => {
                    let pair = pair.borrow();
                    elements.push(pair.head.clone());
                    pair.tail.clone()
                }
                _ => return Err(EvaluationError::NotAList(self.clone())),
            };
            current = next;
        }
    }

    /// Identity as seen by `eq?`: atoms by value, everything else by reference.
    pub fn is_identical(&self, other: &Object) -> bool {
        match (self, other) {
            (Object::Number(left), Object::Number(right)) => left == right,
            (Object::String(left), Object::String(right)) => left == right,
            (Object::Symbol(left), Object::Symbol(right)) => left == right,
            (Object::Nil, Object::Nil) => true,
            (Object::Pair(left), Object::Pair(right)) => Gc::ptr_eq(left, right),
            (Object::Closure(left), Object::Closure(right)) => Gc::ptr_eq(left, right),
            (Object::Primitive(left), Object::Primitive(right)) => left.name == right.name,
            _ => false,
        }
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Object::Number(value) => write!(f, "{}", value),
            Object::String(value) => f.write_str(value),
            Object::Symbol(symbol) => write!(f, "{}", symbol),
            Object::Nil => f.write_str("()"),
            Object::Pair(_) => write_list(self, f),
            Object::Closure(closure) => {
                write!(f, "(lambda {} {})", closure.parameters, closure.body)
            }
            Object::Primitive(primitive) => write!(f, "<primitive:{}>", primitive.name),
        }
    }
}

fn write_list(list: &Object, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("(")?;
    let mut current = list.clone();
    let mut first = true;
    loop {
        let (head, tail) = match &current {
            Object::Pair(pair) => {
                let pair = pair.borrow();
                (pair.head.clone(), pair.tail.clone())
            }
            Object::Nil => break,
            other => {
                write!(f, " . {}", other)?;
                break;
            }
        };
        if !first {
            f.write_str(" ")?;
        }
        write!(f, "{}", head)?;
        first = false;
        current = tail;
    }
    f.write_str(")")
}

#[derive(Debug, PartialEq, Trace, Finalize)]
pub struct Pair {
    pub head: Object,
    pub tail: Object,
}

#[derive(Trace, Finalize)]
pub struct Closure {
    pub parameters: Object,
    pub body: Object,
    pub environment: Environment,
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        self.parameters == other.parameters
            && self.body == other.body
            && self.environment.ptr_eq(&other.environment)
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("parameters", &self.parameters.to_string())
            .field("body", &self.body.to_string())
            .finish_non_exhaustive()
    }
}

/// Primitives receive their evaluated arguments and the environment of the
/// call site.
pub type PrimitiveFn = fn(Vec<Object>, &Environment) -> Result<Object, EvaluationError>;

#[derive(Clone, Copy)]
pub struct Primitive {
    pub name: &'static str,
    pub func: PrimitiveFn,
}

impl PartialEq for Primitive {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.func as usize == other.func as usize
    }
}

impl fmt::Debug for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Primitive")
            .field("name", &self.name)
            .finish()
    }
}

impl Finalize for Primitive {}
unsafe impl Trace for Primitive {
    unsafe_empty_trace!();
}

#[derive(Debug, PartialEq, Error)]
pub enum EvaluationError {
    #[error("unbound variable: {0}")]
    UnboundVariable(Symbol),
    #[error("not a list: {0}")]
    NotAList(Object),
    #[error("cannot {operation} on the empty list")]
    EmptyListMutation { operation: &'static str },
    #[error("not applicable: {0}")]
    NotApplicable(Object),
    #[error("malformed {keyword} form: {form}")]
    MalformedSpecialForm { keyword: &'static str, form: Object },
    #[error("wrong number of arguments for {procedure}. Expected {expected}, got {actual}")]
    WrongArgumentCount {
        procedure: Object,
        expected: usize,
        actual: usize,
    },
    #[error("{name}: {message}")]
    BuiltinFunctionError {
        name: &'static str,
        message: Rc<str>,
    },
    #[error("{}", join_display(.0))]
    UserError(Vec<Object>),
    #[error(transparent)]
    ReadError(#[from] ReadError),
    #[error("i/o error: {0}")]
    Io(Rc<str>),
    #[error("end of input")]
    EndOfInput,
}

fn join_display(values: &[Object]) -> String {
    values
        .iter()
        .map(Object::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
