use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

/// An interned identifier. Two symbols with equal names are the identical
/// value; all comparisons are by pointer, never by string content.
///
/// Backed by `Arc` rather than `Rc` even though the evaluator is
/// single-threaded (spec §5): the interner itself lives in a `lazy_static`
/// `Mutex`, which requires its contents to be `Send`.
#[derive(Clone)]
pub struct Symbol(Arc<str>);

impl Symbol {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Symbol {}

impl Hash for Symbol {
    fn hash<H: Hasher>(&self, state: &mut H) {
        (Arc::as_ptr(&self.0) as *const () as usize).hash(state);
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Interner {
    names: HashMap<String, Arc<str>>,
}

impl Interner {
    fn new() -> Self {
        Interner {
            names: HashMap::new(),
        }
    }

    fn intern(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.names.get(name) {
            return Symbol(Arc::clone(existing));
        }
        let rc: Arc<str> = Arc::from(name);
        self.names.insert(name.to_string(), Arc::clone(&rc));
        Symbol(rc)
    }
}

lazy_static! {
    static ref INTERNER: Mutex<Interner> = Mutex::new(Interner::new());
}

/// Returns the unique `Symbol` for `name`, interning it on first use.
pub fn intern(name: &str) -> Symbol {
    INTERNER.lock().unwrap().intern(name)
}

lazy_static! {
    pub static ref QUOTE: Symbol = intern("quote");
    pub static ref IF: Symbol = intern("if");
    pub static ref BEGIN: Symbol = intern("begin");
    pub static ref LAMBDA: Symbol = intern("lambda");
    pub static ref DEFINE: Symbol = intern("define");
    pub static ref SET_BANG: Symbol = intern("set!");
    pub static ref APPLY: Symbol = intern("apply");
    pub static ref CALL_CC: Symbol = intern("call/cc");
    pub static ref COND: Symbol = intern("cond");
    pub static ref ELSE: Symbol = intern("else");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_identical_symbol() {
        let a = intern("foo");
        let b = intern("foo");
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.0, &b.0));
    }

    #[test]
    fn distinct_names_are_distinct_symbols() {
        let a = intern("foo");
        let b = intern("bar");
        assert_ne!(a, b);
    }

    #[test]
    fn pre_interned_forms_are_stable() {
        assert_eq!(*QUOTE, intern("quote"));
        assert_eq!(*CALL_CC, intern("call/cc"));
    }
}
