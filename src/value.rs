use crate::continuation::Continuation as ContinuationStack;
use crate::env::Env;
use crate::error::{Result, SchemeError};
use crate::symbol::Symbol;
use std::fmt;
use std::rc::Rc;

/// A built-in procedure's host implementation. `args` is the already
/// evaluated argument list (a proper Scheme list, `Value::Null` for none).
pub type BuiltinFn = fn(args: &Value) -> Result<Value>;

/// Distinguishes the two callables `apply()` peels before generic dispatch
/// (spec §4.6) from ordinary host-backed intrinsics.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IntrinsicTag {
    Normal,
    CallCc,
    Apply,
}

pub struct IntrinsicData {
    pub name: Symbol,
    /// Non-negative exact arity, or -1 for variadic.
    pub arity: i32,
    pub tag: IntrinsicTag,
    pub func: BuiltinFn,
}

pub struct ClosureData {
    /// Formal parameter list: a proper or improper list of symbols.
    pub params: Value,
    /// Non-empty list of body expressions.
    pub body: Value,
    pub env: Env,
}

pub struct PairData {
    pub car: Value,
    pub cdr: Value,
}

#[derive(Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(Rc<str>),
    Symbol(Symbol),
    Pair(Rc<PairData>),
    Closure(Rc<ClosureData>),
    Intrinsic(Rc<IntrinsicData>),
    Continuation(ContinuationStack),
    Void,
    Eof,
}

impl Value {
    pub fn symbol(name: &str) -> Value {
        Value::Symbol(crate::symbol::intern(name))
    }

    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Pair(Rc::new(PairData { car, cdr }))
    }

    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Boolean(false))
    }

    pub fn is_pair(&self) -> bool {
        matches!(self, Value::Pair(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_list(&self) -> bool {
        let mut cur = self;
        loop {
            match cur {
                Value::Null => return true,
                Value::Pair(p) => cur = &p.cdr,
                _ => return false,
            }
        }
    }

    pub fn car(&self) -> Result<Value> {
        match self {
            Value::Pair(p) => Ok(p.car.clone()),
            other => Err(SchemeError::Type {
                expected: "pair".to_string(),
                found: other.type_name(),
            }),
        }
    }

    pub fn cdr(&self) -> Result<Value> {
        match self {
            Value::Pair(p) => Ok(p.cdr.clone()),
            other => Err(SchemeError::Type {
                expected: "pair".to_string(),
                found: other.type_name(),
            }),
        }
    }

    pub fn cadr(&self) -> Result<Value> {
        self.cdr()?.car()
    }

    pub fn caddr(&self) -> Result<Value> {
        self.cdr()?.cdr()?.car()
    }

    /// Builds a proper list from a vector, terminated by `Null`.
    pub fn list(items: Vec<Value>) -> Value {
        Self::list_with_tail(items, Value::Null)
    }

    /// Builds a list from a vector with an arbitrary final `cdr`.
    pub fn list_with_tail(items: Vec<Value>, tail: Value) -> Value {
        let mut result = tail;
        for item in items.into_iter().rev() {
            result = Value::cons(item, result);
        }
        result
    }

    /// Collects a proper list into a vector. Fails with *improper-list* if
    /// the chain does not end in `Null`.
    pub fn to_vec(&self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        let mut cur = self.clone();
        loop {
            match cur {
                Value::Null => return Ok(out),
                Value::Pair(p) => {
                    out.push(p.car.clone());
                    cur = p.cdr.clone();
                }
                other => {
                    return Err(SchemeError::ImproperList {
                        found: other.type_name(),
                    });
                }
            }
        }
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.to_vec()?.len())
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::Pair(_) => "pair",
            Value::Closure(_) => "procedure",
            Value::Intrinsic(_) => "procedure",
            Value::Continuation(_) => "continuation",
            Value::Void => "void",
            Value::Eof => "eof",
        }
        .to_string()
    }

    /// Identity comparison (`eq?`).
    pub fn identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Void, Value::Void) => true,
            (Value::Eof, Value::Eof) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => Rc::ptr_eq(a, b),
            (Value::Pair(a), Value::Pair(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Intrinsic(a), Value::Intrinsic(b)) => Rc::ptr_eq(a, b),
            (Value::Continuation(a), Value::Continuation(b)) => a.same(b),
            _ => false,
        }
    }

    /// `eqv?`: identity, but numerically-equal numbers are equal across
    /// int/float.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                *a as f64 == *b
            }
            _ => self.identical(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::printer::write_string(self))
    }
}
