use crate::env::{Binding, Env};
use crate::symbol::Symbol;
use crate::value::Value;
use std::rc::Rc;

/// One pending operation (spec §3/§4.4). Named per-variant rather than a
/// generic `(op, datum)` tuple, since Rust enums give each opcode its own
/// typed payload for free.
#[derive(Clone)]
pub enum Frame {
    /// `(e2 [e3])`, the untaken branches of an `if`.
    Then(Value),
    /// Remaining `begin` forms still to evaluate.
    Begin(Value),
    /// Symbol a top-level/body `define` will bind once its value form
    /// finishes evaluating.
    Define(Symbol),
    /// Resolved slot a `set!` will write once its value form finishes.
    SetQ(Binding),
    /// Argument list of an application whose operator just finished
    /// evaluating.
    Apply(Value),
    /// Operator of an application whose arguments are being evaluated.
    ApplyFun(Value),
    /// Next not-yet-evaluated argument expression.
    EvalArg(Value),
    /// Accumulated (already cons'd) evaluated arguments, rightmost first.
    ConsArgs(Value),
    /// Environment to restore once the current activation yields a value.
    RestoreEnv(Env),
}

struct Node {
    frame: Frame,
    next: Option<Rc<Node>>,
}

/// The evaluator's pending-operation stack. Represented as a persistent
/// (cons-list-of-frames) stack so `reify` is an O(1) `Rc` clone and the
/// resulting snapshot is automatically immune to later mutation of the live
/// stack — pushing or popping never touches a `Node` once built (spec §3,
/// §4.4, §9).
#[derive(Clone)]
pub struct Continuation {
    top: Option<Rc<Node>>,
}

impl Continuation {
    pub fn new() -> Continuation {
        Continuation { top: None }
    }

    pub fn is_empty(&self) -> bool {
        self.top.is_none()
    }

    pub fn push(&mut self, frame: Frame) {
        self.top = Some(Rc::new(Node {
            frame,
            next: self.top.take(),
        }));
    }

    pub fn pop(&mut self) -> Option<Frame> {
        let node = self.top.take()?;
        self.top = node.next.clone();
        Some(node.frame.clone())
    }

    /// No-op when the topmost frame is already a `RestoreEnv` — the rule in
    /// spec §4.4 that makes tail calls not grow the stack.
    pub fn push_restore_env(&mut self, env: Env) {
        if let Some(node) = &self.top {
            if matches!(node.frame, Frame::RestoreEnv(_)) {
                return;
            }
        }
        self.push(Frame::RestoreEnv(env));
    }

    /// An immutable snapshot usable later to `restore` this exact pending
    /// state, however the live stack evolves after this call.
    pub fn reify(&self) -> Continuation {
        self.clone()
    }

    /// Replaces the live stack wholesale with a previously reified snapshot
    /// (continuation invocation, spec §4.6).
    pub fn restore(&mut self, snapshot: &Continuation) {
        self.top = snapshot.top.clone();
    }

    /// Identity comparison for `eq?`/`eqv?` over two reified continuations.
    pub fn same(&self, other: &Continuation) -> bool {
        match (&self.top, &other.top) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// A rendering of the pending frames, newest first, used as the
    /// pseudo stack trace §7 attaches to non-user errors.
    pub fn render_trace(&self) -> String {
        let mut lines = Vec::new();
        let mut cur = self.top.clone();
        while let Some(node) = cur {
            lines.push(format!("  {}", frame_label(&node.frame)));
            cur = node.next.clone();
        }
        if lines.is_empty() {
            "  <empty continuation>".to_string()
        } else {
            lines.join("\n")
        }
    }
}

impl Default for Continuation {
    fn default() -> Self {
        Continuation::new()
    }
}

fn frame_label(frame: &Frame) -> &'static str {
    match frame {
        Frame::Then(_) => "if",
        Frame::Begin(_) => "begin",
        Frame::Define(_) => "define",
        Frame::SetQ(_) => "set!",
        Frame::Apply(_) => "apply-args",
        Frame::ApplyFun(_) => "apply-fun",
        Frame::EvalArg(_) => "eval-arg",
        Frame::ConsArgs(_) => "cons-args",
        Frame::RestoreEnv(_) => "restore-env",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reify_is_immune_to_later_pushes() {
        let mut k = Continuation::new();
        k.push(Frame::Begin(Value::Null));
        let snapshot = k.reify();
        k.push(Frame::Begin(Value::Null));
        assert!(!snapshot.same(&k));

        let mut restored = Continuation::new();
        restored.restore(&snapshot);
        assert!(restored.same(&snapshot));
    }

    #[test]
    fn push_restore_env_collapses_consecutive_calls() {
        let mut k = Continuation::new();
        let env = Env::root();
        k.push_restore_env(env.clone());
        let after_first = k.reify();
        k.push_restore_env(env.clone());
        assert!(after_first.same(&k));
    }

    #[test]
    fn pop_from_empty_is_none() {
        let mut k = Continuation::new();
        assert!(k.pop().is_none());
    }
}
