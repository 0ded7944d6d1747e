//! The initial global environment: the procedure table from spec.md §6 plus
//! the small supplements SPEC_FULL.md §4 adds on top of it.
//!
//! Every builtin has the signature `fn(args: &Value) -> Result<Value>` where
//! `args` is the already-evaluated argument list as an ordinary Scheme list
//! — `apply()` enforces arity before calling in, so a builtin only needs to
//! destructure.

use crate::env::Env;
use crate::error::{Result, SchemeError};
use crate::printer;
use crate::symbol;
use crate::value::{BuiltinFn, IntrinsicData, IntrinsicTag, Value};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    /// Lets `globals` see the live top-level environment without threading
    /// one through every `BuiltinFn`'s signature. Set once by `global_env`.
    /// `Env` is `Rc`-backed and not `Send`, so this is a `thread_local`
    /// rather than the `lazy_static` statics used for the symbol interner.
    static GLOBAL_ENV: RefCell<Option<Env>> = RefCell::new(None);
}

fn register(env: &Env, name: &str, arity: i32, tag: IntrinsicTag, func: BuiltinFn) {
    let sym = symbol::intern(name);
    let data = IntrinsicData {
        name: sym.clone(),
        arity,
        tag,
        func,
    };
    env.define(sym, Value::Intrinsic(Rc::new(data)));
}

/// Builds the global environment with every builtin bound, and remembers it
/// for `globals`.
pub fn global_env() -> Env {
    let env = Env::root();
    register(&env, "car", 1, IntrinsicTag::Normal, car);
    register(&env, "cdr", 1, IntrinsicTag::Normal, cdr);
    register(&env, "cons", 2, IntrinsicTag::Normal, cons);
    register(&env, "eq?", 2, IntrinsicTag::Normal, eq_p);
    register(&env, "eqv?", 2, IntrinsicTag::Normal, eqv_p);
    register(&env, "pair?", 1, IntrinsicTag::Normal, pair_p);
    register(&env, "null?", 1, IntrinsicTag::Normal, null_p);
    register(&env, "not", 1, IntrinsicTag::Normal, not);
    register(&env, "list", -1, IntrinsicTag::Normal, list);
    register(&env, "display", 1, IntrinsicTag::Normal, display);
    register(&env, "newline", 0, IntrinsicTag::Normal, newline);
    register(&env, "read", 0, IntrinsicTag::Normal, read);
    register(&env, "eof-object?", 1, IntrinsicTag::Normal, eof_object_p);
    register(&env, "symbol?", 1, IntrinsicTag::Normal, symbol_p);
    register(&env, "+", 2, IntrinsicTag::Normal, add);
    register(&env, "-", 2, IntrinsicTag::Normal, sub);
    register(&env, "*", 2, IntrinsicTag::Normal, mul);
    register(&env, "<", 2, IntrinsicTag::Normal, lt);
    register(&env, "=", 2, IntrinsicTag::Normal, num_eq);
    register(&env, "error", 2, IntrinsicTag::Normal, error);
    register(&env, "globals", 0, IntrinsicTag::Normal, globals);
    register(&env, "apply", 2, IntrinsicTag::Apply, unreachable);
    register(&env, "call/cc", 1, IntrinsicTag::CallCc, unreachable);

    // Supplements (SPEC_FULL.md §4): dropped-but-obvious siblings of the
    // spec'd numeric comparisons and list accessors.
    register(&env, ">", 2, IntrinsicTag::Normal, gt);
    register(&env, "<=", 2, IntrinsicTag::Normal, le);
    register(&env, ">=", 2, IntrinsicTag::Normal, ge);
    register(&env, "length", 1, IntrinsicTag::Normal, length);
    register(&env, "append", 2, IntrinsicTag::Normal, append);
    register(&env, "reverse", 1, IntrinsicTag::Normal, reverse);
    register(&env, "caar", 1, IntrinsicTag::Normal, caar);
    register(&env, "cadr", 1, IntrinsicTag::Normal, cadr);
    register(&env, "cddr", 1, IntrinsicTag::Normal, cddr);
    register(&env, "caddr", 1, IntrinsicTag::Normal, caddr);

    GLOBAL_ENV.with(|g| *g.borrow_mut() = Some(env.clone()));
    env
}

/// `call/cc` and `apply` are peeled by `eval::apply` before their host
/// function is ever reached; this only fires if that invariant is broken.
fn unreachable(_args: &Value) -> Result<Value> {
    Err(SchemeError::Internal(
        "call/cc or apply invoked without being peeled by apply()".to_string(),
    ))
}

fn car(args: &Value) -> Result<Value> {
    args.car()?.car()
}

fn cdr(args: &Value) -> Result<Value> {
    args.car()?.cdr()
}

fn cons(args: &Value) -> Result<Value> {
    Ok(Value::cons(args.car()?, args.cadr()?))
}

fn eq_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(args.car()?.identical(&args.cadr()?)))
}

fn eqv_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(args.car()?.equivalent(&args.cadr()?)))
}

fn pair_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(args.car()?.is_pair()))
}

fn null_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(args.car()?.is_null()))
}

fn not(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(!args.car()?.is_truthy()))
}

fn list(args: &Value) -> Result<Value> {
    Ok(args.clone())
}

fn display(args: &Value) -> Result<Value> {
    print!("{}", printer::display_string(&args.car()?));
    Ok(Value::Void)
}

fn newline(_args: &Value) -> Result<Value> {
    println!();
    Ok(Value::Void)
}

fn read(_args: &Value) -> Result<Value> {
    crate::parser::read_datum()
}

fn eof_object_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(matches!(args.car()?, Value::Eof)))
}

fn symbol_p(args: &Value) -> Result<Value> {
    Ok(Value::Boolean(matches!(args.car()?, Value::Symbol(_))))
}

fn as_number(v: &Value) -> Result<()> {
    match v {
        Value::Integer(_) | Value::Float(_) => Ok(()),
        other => Err(SchemeError::Type {
            expected: "number".to_string(),
            found: other.type_name(),
        }),
    }
}

fn arith2(args: &Value, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Result<Value> {
    let a = args.car()?;
    let b = args.cadr()?;
    as_number(&a)?;
    as_number(&b)?;
    match (&a, &b) {
        (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(int_op(*x, *y))),
        _ => Ok(Value::Float(float_op(as_f64(&a), as_f64(&b)))),
    }
}

fn cmp2(args: &Value, op: fn(f64, f64) -> bool) -> Result<Value> {
    let a = args.car()?;
    let b = args.cadr()?;
    as_number(&a)?;
    as_number(&b)?;
    Ok(Value::Boolean(op(as_f64(&a), as_f64(&b))))
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Integer(n) => *n as f64,
        Value::Float(f) => *f,
        _ => unreachable!("as_f64 called after as_number validated the type"),
    }
}

fn add(args: &Value) -> Result<Value> {
    arith2(args, |a, b| a + b, |a, b| a + b)
}

fn sub(args: &Value) -> Result<Value> {
    arith2(args, |a, b| a - b, |a, b| a - b)
}

fn mul(args: &Value) -> Result<Value> {
    arith2(args, |a, b| a * b, |a, b| a * b)
}

fn lt(args: &Value) -> Result<Value> {
    cmp2(args, |a, b| a < b)
}

fn gt(args: &Value) -> Result<Value> {
    cmp2(args, |a, b| a > b)
}

fn le(args: &Value) -> Result<Value> {
    cmp2(args, |a, b| a <= b)
}

fn ge(args: &Value) -> Result<Value> {
    cmp2(args, |a, b| a >= b)
}

fn num_eq(args: &Value) -> Result<Value> {
    cmp2(args, |a, b| a == b)
}

fn error(args: &Value) -> Result<Value> {
    let message = printer::display_string(&args.car()?);
    let irritant = printer::write_string(&args.cadr()?);
    Err(SchemeError::UserError { message, irritant })
}

fn globals(_args: &Value) -> Result<Value> {
    GLOBAL_ENV.with(|g| {
        let env = g
            .borrow()
            .clone()
            .expect("global_env must run before globals is callable");
        Ok(Value::list(
            env.all_symbols().into_iter().map(Value::Symbol).collect(),
        ))
    })
}

fn length(args: &Value) -> Result<Value> {
    Ok(Value::Integer(args.car()?.len()? as i64))
}

fn append(args: &Value) -> Result<Value> {
    let items = args.car()?.to_vec()?;
    Ok(Value::list_with_tail(items, args.cadr()?))
}

fn reverse(args: &Value) -> Result<Value> {
    let mut items = args.car()?.to_vec()?;
    items.reverse();
    Ok(Value::list(items))
}

fn caar(args: &Value) -> Result<Value> {
    args.car()?.car()?.car()
}

fn cadr(args: &Value) -> Result<Value> {
    args.car()?.cadr()
}

fn cddr(args: &Value) -> Result<Value> {
    args.car()?.cdr()?.cdr()
}

fn caddr(args: &Value) -> Result<Value> {
    args.car()?.caddr()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::eval;

    fn run(src: &str) -> Value {
        let env = global_env();
        let mut result = Value::Void;
        for expr in crate::parser::parse_all(src).unwrap() {
            result = eval(expr, env.clone()).unwrap();
        }
        result
    }

    #[test]
    fn arithmetic_promotes_to_float_on_mixed_types() {
        assert!(matches!(run("(+ 1 2.0)"), Value::Float(f) if f == 3.0));
        assert!(matches!(run("(+ 1 2)"), Value::Integer(3)));
    }

    #[test]
    fn list_accessors_compose() {
        assert!(matches!(run("(caddr (list 1 2 3))"), Value::Integer(3)));
    }

    #[test]
    fn append_preserves_an_improper_tail() {
        let v = run("(append (list 1 2) 3)");
        assert!(matches!(v.cdr().unwrap().cdr().unwrap(), Value::Integer(3)));
    }

    #[test]
    fn globals_includes_user_defines() {
        let v = run("(define my-var 1) (globals)");
        let names: Vec<String> = v
            .to_vec()
            .unwrap()
            .into_iter()
            .map(|s| match s {
                Value::Symbol(sym) => sym.name().to_string(),
                _ => panic!("globals must return symbols"),
            })
            .collect();
        assert!(names.contains(&"my-var".to_string()));
        assert!(names.contains(&"car".to_string()));
    }

    #[test]
    fn error_raises_a_user_error() {
        let env = global_env();
        let expr = crate::parser::parse_all("(error \"boom\" 42)")
            .unwrap()
            .into_iter()
            .next()
            .unwrap();
        let err = eval(expr, env).unwrap_err();
        assert!(matches!(err, SchemeError::UserError { .. }));
    }
}
