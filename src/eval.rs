//! The trampolined evaluator (spec §4.4–§4.6): no Rust-level recursion ever
//! crosses a Scheme call boundary, so tail calls run in bounded stack space
//! and `call/cc` can reify the pending work as an ordinary value.
//!
//! Evaluation alternates between two half-steps. `analyze` takes one step
//! toward reducing an expression to a self-evaluating value, pushing a
//! [`Frame`] describing what remains to be done. `resume` takes one step
//! processing the frame on top of the pending continuation once a value is
//! in hand. The outer loop in [`eval`] just keeps calling whichever half is
//! due next until the continuation is empty.

use crate::continuation::{Continuation, Frame};
use crate::env::Env;
use crate::error::{Result, SchemeError};
use crate::symbol;
use crate::value::{ClosureData, IntrinsicTag, Value};
use std::rc::Rc;

enum Step {
    Analyze(Value),
    Resume(Value),
}

/// Evaluates `exp` in `env`, running the analyze/resume trampoline to
/// completion.
pub fn eval(exp: Value, env: Env) -> Result<Value> {
    let mut env = env;
    let mut k = Continuation::new();
    let mut step = Step::Analyze(exp);
    loop {
        step = match step {
            Step::Analyze(e) => {
                analyze(e, &env, &mut k).map_err(|err| err.with_trace(|| k.render_trace()))?
            }
            Step::Resume(v) => {
                if k.is_empty() {
                    return Ok(v);
                }
                resume(v, &mut env, &mut k).map_err(|err| err.with_trace(|| k.render_trace()))?
            }
        };
    }
}

/// Phase A: one reduction step. Self-evaluating values and variable
/// references resolve directly to `Resume`; special forms push whatever
/// continuation frame their remaining work needs and hand back the next
/// sub-expression to analyze; anything else is an application.
fn analyze(exp: Value, env: &Env, k: &mut Continuation) -> Result<Step> {
    match exp {
        Value::Symbol(sym) => Ok(Step::Resume(env.lookup(&sym)?)),
        Value::Pair(ref pair) => {
            if let Value::Symbol(ref head) = pair.car {
                if *head == *symbol::QUOTE {
                    return Ok(Step::Resume(pair.cdr.car()?));
                }
                if *head == *symbol::IF {
                    let rest = pair.cdr.to_vec()?;
                    if rest.len() != 2 && rest.len() != 3 {
                        return Err(SchemeError::Arity {
                            expected: "2 or 3".to_string(),
                            got: rest.len(),
                        });
                    }
                    let test = rest[0].clone();
                    k.push(Frame::Then(Value::list(rest[1..].to_vec())));
                    return Ok(Step::Analyze(test));
                }
                if *head == *symbol::BEGIN {
                    return begin_step(pair.cdr.clone(), k);
                }
                if *head == *symbol::LAMBDA {
                    let params = pair.cdr.car()?;
                    let body = pair.cdr.cdr()?;
                    if body.is_null() {
                        return Err(SchemeError::Arity {
                            expected: "a non-empty body".to_string(),
                            got: 0,
                        });
                    }
                    let closure = Value::Closure(Rc::new(ClosureData {
                        params,
                        body,
                        env: env.clone(),
                    }));
                    return Ok(Step::Resume(closure));
                }
                if *head == *symbol::DEFINE {
                    let (name, value_expr) = expand_define(pair.cdr.clone())?;
                    k.push(Frame::Define(name));
                    return Ok(Step::Analyze(value_expr));
                }
                if *head == *symbol::SET_BANG {
                    let items = pair.cdr.to_vec()?;
                    if items.len() != 2 {
                        return Err(SchemeError::Arity {
                            expected: "2".to_string(),
                            got: items.len(),
                        });
                    }
                    let name = expect_symbol(&items[0])?;
                    let binding = env.resolve(&name)?;
                    k.push(Frame::SetQ(binding));
                    return Ok(Step::Analyze(items[1].clone()));
                }
                if *head == *symbol::COND {
                    let rewritten = expand_cond(pair.cdr.clone())?;
                    return Ok(Step::Analyze(rewritten));
                }
            }
            k.push(Frame::Apply(pair.cdr.clone()));
            Ok(Step::Analyze(pair.car.clone()))
        }
        other => Ok(Step::Resume(other)),
    }
}

/// Shared by the `begin` special form and the `Begin` continuation frame:
/// if more than one form remains, park the rest and analyze the head.
fn begin_step(rest: Value, k: &mut Continuation) -> Result<Step> {
    match rest {
        Value::Null => Ok(Step::Resume(Value::Void)),
        Value::Pair(p) => {
            if !p.cdr.is_null() {
                k.push(Frame::Begin(p.cdr.clone()));
            }
            Ok(Step::Analyze(p.car.clone()))
        }
        other => Err(SchemeError::ImproperList {
            found: other.type_name(),
        }),
    }
}

fn expect_symbol(v: &Value) -> Result<crate::symbol::Symbol> {
    match v {
        Value::Symbol(s) => Ok(s.clone()),
        other => Err(SchemeError::Type {
            expected: "symbol".to_string(),
            found: other.type_name(),
        }),
    }
}

/// Splits a `define` form's tail into the bound symbol and its value
/// expression, desugaring the procedure shorthand `(define (name . params)
/// body...)` into `(define name (lambda params body...))` — spec.md's own
/// worked scenarios (factorial, the tail-call loop) use this form even
/// though §4.5's Phase A pseudocode only spells out the plain-symbol case.
fn expand_define(rest: Value) -> Result<(crate::symbol::Symbol, Value)> {
    let head = rest.car()?;
    match head {
        Value::Symbol(sym) => {
            let items = rest.to_vec()?;
            if items.len() != 2 {
                return Err(SchemeError::Arity {
                    expected: "2".to_string(),
                    got: items.len(),
                });
            }
            Ok((sym, items[1].clone()))
        }
        Value::Pair(sig) => {
            let name = expect_symbol(&sig.car)?;
            let params = sig.cdr.clone();
            let body = rest.cdr()?;
            if body.is_null() {
                return Err(SchemeError::Arity {
                    expected: "a non-empty body".to_string(),
                    got: 0,
                });
            }
            let lambda = Value::cons(
                Value::Symbol(symbol::LAMBDA.clone()),
                Value::cons(params, body),
            );
            Ok((name, lambda))
        }
        other => Err(SchemeError::Type {
            expected: "symbol or procedure signature".to_string(),
            found: other.type_name(),
        }),
    }
}

/// Rewrites `cond`'s clauses into nested `if`s, so the evaluator never
/// needs a dedicated continuation opcode for it. A clause with no body
/// (`(test)`) re-evaluates `test` as the result — the one place this
/// expansion differs from a hand-written opcode, which could hand back the
/// already-computed value instead.
fn expand_cond(clauses: Value) -> Result<Value> {
    let clauses = clauses.to_vec()?;
    let mut result = Value::Void;
    for clause in clauses.into_iter().rev() {
        let parts = clause.to_vec()?;
        let test = match parts.first() {
            Some(t) => t.clone(),
            None => {
                return Err(SchemeError::ReadError("cond: empty clause".to_string()));
            }
        };
        let body = &parts[1..];
        let body_expr = if body.is_empty() {
            test.clone()
        } else {
            let mut begin_form = vec![Value::Symbol(symbol::BEGIN.clone())];
            begin_form.extend(body.iter().cloned());
            Value::list(begin_form)
        };
        let is_else = matches!(&test, Value::Symbol(s) if *s == *symbol::ELSE);
        result = if is_else {
            body_expr
        } else {
            Value::list(vec![
                Value::Symbol(symbol::IF.clone()),
                test,
                body_expr,
                result,
            ])
        };
    }
    Ok(result)
}

/// Phase B: one step processing the frame on top of `k` now that `val` is
/// in hand.
fn resume(val: Value, env: &mut Env, k: &mut Continuation) -> Result<Step> {
    let frame = k
        .pop()
        .expect("resume called with an empty continuation");
    match frame {
        Frame::Then(alts) => {
            let alts = alts.to_vec()?;
            if val.is_truthy() {
                Ok(Step::Analyze(alts[0].clone()))
            } else if alts.len() == 2 {
                Ok(Step::Analyze(alts[1].clone()))
            } else {
                Ok(Step::Resume(Value::Void))
            }
        }
        Frame::Begin(rest) => begin_step(rest, k),
        Frame::Define(sym) => {
            env.define(sym, val);
            Ok(Step::Resume(Value::Void))
        }
        Frame::SetQ(binding) => {
            binding.set(val);
            Ok(Step::Resume(Value::Void))
        }
        Frame::Apply(args) => {
            let operator = val;
            if args.is_null() {
                let result = apply(operator, Value::Null, env, k)?;
                Ok(Step::Resume(result))
            } else {
                let mut items = args.to_vec()?;
                let last = items.pop().expect("non-null argument list is non-empty");
                k.push(Frame::ApplyFun(operator));
                for arg_expr in items {
                    k.push(Frame::EvalArg(arg_expr));
                }
                k.push(Frame::ConsArgs(Value::Null));
                Ok(Step::Analyze(last))
            }
        }
        Frame::ConsArgs(acc) => {
            let acc = Value::cons(val, acc);
            match k.pop() {
                Some(Frame::EvalArg(next_arg)) => {
                    k.push(Frame::ConsArgs(acc));
                    Ok(Step::Analyze(next_arg))
                }
                Some(Frame::ApplyFun(operator)) => {
                    let result = apply(operator, acc, env, k)?;
                    Ok(Step::Resume(result))
                }
                _ => Err(SchemeError::Internal(
                    "cons-args not followed by eval-arg or apply-fun".to_string(),
                )),
            }
        }
        Frame::ApplyFun(_) | Frame::EvalArg(_) => Err(SchemeError::Internal(
            "eval-arg/apply-fun frame popped out of order".to_string(),
        )),
        Frame::RestoreEnv(saved) => {
            *env = saved;
            Ok(Step::Resume(val))
        }
    }
}

/// Applies `op` to the already-evaluated `args` (spec §4.6). `call/cc` and
/// `apply` are peeled here, rewriting `op`/`args` and looping, before
/// generic dispatch over intrinsics, closures and continuations.
pub fn apply(mut op: Value, mut args: Value, env: &mut Env, k: &mut Continuation) -> Result<Value> {
    loop {
        match &op {
            Value::Intrinsic(data) if data.tag == IntrinsicTag::CallCc => {
                let got = args.len()?;
                if got != 1 {
                    return Err(SchemeError::Arity {
                        expected: "1".to_string(),
                        got,
                    });
                }
                k.push_restore_env(env.clone());
                let new_op = args.car()?;
                let reified = k.reify();
                op = new_op;
                args = Value::cons(Value::Continuation(reified), Value::Null);
                continue;
            }
            Value::Intrinsic(data) if data.tag == IntrinsicTag::Apply => {
                let got = args.len()?;
                if got != 2 {
                    return Err(SchemeError::Arity {
                        expected: "2".to_string(),
                        got,
                    });
                }
                let real_op = args.car()?;
                let real_args = args.cadr()?;
                op = real_op;
                args = real_args;
                continue;
            }
            _ => {}
        }
        return match op {
            Value::Intrinsic(data) => {
                if data.arity >= 0 {
                    let got = args.len()?;
                    if got != data.arity as usize {
                        return Err(SchemeError::Arity {
                            expected: data.arity.to_string(),
                            got,
                        });
                    }
                }
                (data.func)(&args)
            }
            Value::Closure(closure) => {
                k.push_restore_env(env.clone());
                k.push(Frame::Begin(closure.body.clone()));
                let bound = crate::env::bind_params(&closure.params, &args, &closure.env)?;
                *env = bound.push_marker();
                Ok(Value::Void)
            }
            Value::Continuation(snapshot) => {
                k.restore(&snapshot);
                args.car()
            }
            other => Err(SchemeError::NotCallable(crate::printer::write_string(&other))),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins;

    fn run(src: &str) -> Result<Value> {
        let env = builtins::global_env();
        let exprs = crate::parser::parse_all(src)?;
        let mut result = Value::Void;
        for expr in exprs {
            result = eval(expr, env.clone())?;
        }
        Ok(result)
    }

    #[test]
    fn evaluates_factorial() {
        let v = run("(define (fact n) (if (= n 0) 1 (* n (fact (- n 1))))) (fact 10)").unwrap();
        assert!(matches!(v, Value::Integer(3628800)));
    }

    #[test]
    fn lambda_with_dotted_params_is_variadic() {
        let v = run("((lambda args (length args)) 1 2 3)").unwrap();
        assert!(matches!(v, Value::Integer(3)));
    }

    #[test]
    fn tail_calls_run_in_bounded_stack_space() {
        let v = run(
            "(define (loop n acc) (if (= n 0) acc (loop (- n 1) (+ acc 1)))) (loop 200000 0)",
        )
        .unwrap();
        assert!(matches!(v, Value::Integer(200000)));
    }

    #[test]
    fn call_cc_captures_and_invokes_an_escape() {
        let v = run("(+ 1 (call/cc (lambda (k) (+ 10 (k 5)))))").unwrap();
        assert!(matches!(v, Value::Integer(6)));
    }

    #[test]
    fn call_cc_continuation_can_be_invoked_again_later() {
        let v = run(
            "(define saved #f) \
             (define count 0) \
             (+ 1 (call/cc (lambda (k) (set! saved k) 0))) \
             (set! count (+ count 1)) \
             count",
        )
        .unwrap();
        assert!(matches!(v, Value::Integer(1)));
    }

    #[test]
    fn set_bang_mutates_an_existing_binding() {
        let v = run("(define x 1) (set! x 2) x").unwrap();
        assert!(matches!(v, Value::Integer(2)));
    }

    #[test]
    fn set_bang_on_unbound_symbol_is_an_error() {
        let err = run("(set! nope 1)").unwrap_err();
        assert!(matches!(
            err,
            SchemeError::Traced(inner, _) if matches!(*inner, SchemeError::UnboundSymbol(_))
        ));
    }

    #[test]
    fn closure_called_with_wrong_arity_is_an_error() {
        let err = run("((lambda (a b) a) 1)").unwrap_err();
        assert!(
            matches!(err, SchemeError::Traced(inner, _) if matches!(*inner, SchemeError::Arity { .. }))
        );
    }

    #[test]
    fn eqv_treats_cross_type_equal_numbers_as_equivalent() {
        let v = run("(eqv? 1 1.0)").unwrap();
        assert!(matches!(v, Value::Boolean(true)));
    }

    #[test]
    fn eq_distinguishes_freshly_allocated_pairs() {
        let v = run("(eq? (cons 1 2) (cons 1 2))").unwrap();
        assert!(matches!(v, Value::Boolean(false)));
    }

    #[test]
    fn cond_falls_through_to_else() {
        let v = run("(cond (#f 1) (#f 2) (else 3))").unwrap();
        assert!(matches!(v, Value::Integer(3)));
    }

    #[test]
    fn apply_spreads_a_list_as_arguments() {
        let v = run("(apply + (list 3 4))").unwrap();
        assert!(matches!(v, Value::Integer(7)));
    }
}
