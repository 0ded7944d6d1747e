use crate::error::{Result, SchemeError};
use crate::symbol::Symbol;
use crate::value::Value;
use std::cell::RefCell;
use std::rc::Rc;

enum Kind {
    /// Delimits a function-activation scope so `define` inside a closure
    /// body extends this frame rather than an enclosing one (spec §3, the
    /// GLOSSARY's "frame marker").
    Marker,
    Binding(Symbol, RefCell<Value>),
}

struct Frame {
    kind: Kind,
    next: RefCell<Option<Env>>,
}

/// A lexical environment: a pointer into a singly linked chain of bindings
/// and frame markers (spec §3). Cloning an `Env` is a cheap `Rc` clone and
/// shares the chain, never copies it.
#[derive(Clone)]
pub struct Env(Rc<Frame>);

impl Env {
    /// A fresh frame marker with no parent — the seed of the global
    /// environment.
    pub fn root() -> Env {
        Env(Rc::new(Frame {
            kind: Kind::Marker,
            next: RefCell::new(None),
        }))
    }

    /// Prepends a frame marker atop `self` (used when entering a closure
    /// body, spec §4.6).
    pub fn push_marker(&self) -> Env {
        Env(Rc::new(Frame {
            kind: Kind::Marker,
            next: RefCell::new(Some(self.clone())),
        }))
    }

    /// Prepends a single binding atop `self`.
    pub fn extend(&self, sym: Symbol, value: Value) -> Env {
        Env(Rc::new(Frame {
            kind: Kind::Binding(sym, RefCell::new(value)),
            next: RefCell::new(Some(self.clone())),
        }))
    }

    /// Looks up `sym`'s bound value, walking the chain from `self` outward.
    pub fn lookup(&self, sym: &Symbol) -> Result<Value> {
        let mut cur = self.clone();
        loop {
            match &cur.0.kind {
                Kind::Binding(s, v) if s == sym => return Ok(v.borrow().clone()),
                _ => {}
            }
            let next = cur.0.next.borrow().clone();
            match next {
                Some(n) => cur = n,
                None => {
                    return Err(SchemeError::UnboundSymbol(sym.name().to_string()));
                }
            }
        }
    }

    /// Writes `value` into the existing binding for `sym`, searching up the
    /// chain. Fails with *unbound-symbol* if no such binding exists.
    pub fn set(&self, sym: &Symbol, value: Value) -> Result<()> {
        let mut cur = self.clone();
        loop {
            if let Kind::Binding(s, v) = &cur.0.kind {
                if s == sym {
                    *v.borrow_mut() = value;
                    return Ok(());
                }
            }
            let next = cur.0.next.borrow().clone();
            match next {
                Some(n) => cur = n,
                None => return Err(SchemeError::UnboundSymbol(sym.name().to_string())),
            }
        }
    }

    /// Resolves `sym` to its binding slot *now*, for `set!`'s spec §4.5
    /// early-resolution rule: the slot is fixed before the value form is
    /// evaluated, so a later `define` shadowing it does not retarget the
    /// write.
    pub fn resolve(&self, sym: &Symbol) -> Result<Binding> {
        let mut cur = self.clone();
        loop {
            if let Kind::Binding(s, _) = &cur.0.kind {
                if s == sym {
                    return Ok(Binding(cur.0));
                }
            }
            let next = cur.0.next.borrow().clone();
            match next {
                Some(n) => cur = n,
                None => return Err(SchemeError::UnboundSymbol(sym.name().to_string())),
            }
        }
    }

    /// Inserts a new binding immediately after the nearest enclosing frame
    /// marker reachable from `self` — top-level `define` inserts after the
    /// global frame's marker; a closure-body `define` inserts after the
    /// marker pushed when the closure was entered (spec §3, §4.5).
    pub fn define(&self, sym: Symbol, value: Value) {
        let mut cur = self.0.clone();
        loop {
            if matches!(cur.kind, Kind::Marker) {
                break;
            }
            let next = cur.next.borrow().clone().expect(
                "binding frame without a marker above it: environment chain is malformed",
            );
            cur = next.0;
        }
        let new_frame = Rc::new(Frame {
            kind: Kind::Binding(sym, RefCell::new(value)),
            next: RefCell::new(cur.next.borrow().clone()),
        });
        *cur.next.borrow_mut() = Some(Env(new_frame));
    }

    /// All symbols bound anywhere in the chain, for the `globals` builtin.
    pub fn all_symbols(&self) -> Vec<Symbol> {
        let mut out = Vec::new();
        let mut cur = Some(self.clone());
        while let Some(env) = cur {
            if let Kind::Binding(s, _) = &env.0.kind {
                out.push(s.clone());
            }
            cur = env.0.next.borrow().clone();
        }
        out
    }
}

/// A resolved binding slot, fixed at `set!` analysis time (spec §4.5).
#[derive(Clone)]
pub struct Binding(Rc<Frame>);

impl Binding {
    pub fn set(&self, value: Value) {
        if let Kind::Binding(_, v) = &self.0.kind {
            *v.borrow_mut() = value;
        }
    }
}

/// Binds `params` (a proper or improper list of symbols) to `args` (a
/// proper list of already-evaluated values) atop `base`, per spec §4.3.
pub fn bind_params(params: &Value, args: &Value, base: &Env) -> Result<Env> {
    let (fixed, has_rest) = arity_shape(params);
    let mut env = base.clone();
    let mut p = params.clone();
    let mut a = args.clone();
    loop {
        match &p {
            Value::Null => {
                return if a.is_null() {
                    Ok(env)
                } else {
                    Err(SchemeError::Arity {
                        expected: describe_arity(fixed, has_rest),
                        got: args.len().unwrap_or(fixed + 1),
                    })
                };
            }
            Value::Pair(pp) => match &a {
                Value::Null => {
                    return Err(SchemeError::Arity {
                        expected: describe_arity(fixed, has_rest),
                        got: args.len().unwrap_or(0),
                    });
                }
                Value::Pair(pa) => {
                    let sym = param_symbol(&pp.car)?;
                    env = env.extend(sym, pa.car.clone());
                    p = pp.cdr.clone();
                    a = pa.cdr.clone();
                }
                other => {
                    return Err(SchemeError::ImproperList {
                        found: other.type_name(),
                    });
                }
            },
            other => {
                let sym = param_symbol(other)?;
                env = env.extend(sym, a.clone());
                return Ok(env);
            }
        }
    }
}

fn param_symbol(v: &Value) -> Result<Symbol> {
    match v {
        Value::Symbol(s) => Ok(s.clone()),
        other => Err(SchemeError::Type {
            expected: "symbol".to_string(),
            found: other.type_name(),
        }),
    }
}

fn arity_shape(params: &Value) -> (usize, bool) {
    let mut count = 0;
    let mut cur = params.clone();
    loop {
        match cur {
            Value::Null => return (count, false),
            Value::Pair(p) => {
                count += 1;
                cur = p.cdr.clone();
            }
            _ => return (count, true),
        }
    }
}

fn describe_arity(fixed: usize, has_rest: bool) -> String {
    if has_rest {
        format!("at least {}", fixed)
    } else {
        format!("{}", fixed)
    }
}
