use crate::value::Value;

/// The printed form a reader can read back (`quote`d strings) — spec §6.
pub fn write_string(v: &Value) -> String {
    render(v, true)
}

/// The printed form `display` uses (raw, unquoted strings) — spec §6.
pub fn display_string(v: &Value) -> String {
    render(v, false)
}

fn render(v: &Value, quote_strings: bool) -> String {
    match v {
        Value::Null => "()".to_string(),
        Value::Boolean(true) => "#t".to_string(),
        Value::Boolean(false) => "#f".to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(f) => render_float(*f),
        Value::String(s) => {
            if quote_strings {
                format!("\"{}\"", s)
            } else {
                s.to_string()
            }
        }
        Value::Symbol(s) => s.name().to_string(),
        Value::Pair(_) => render_pair(v, quote_strings),
        Value::Closure(_) => "#<closure>".to_string(),
        Value::Intrinsic(data) => format!("#<intrinsic:{}>", data.name),
        Value::Continuation(_) => "#<continuation>".to_string(),
        Value::Void => "#<void>".to_string(),
        Value::Eof => "#<eof>".to_string(),
    }
}

fn render_float(f: f64) -> String {
    if f.fract() == 0.0 && f.is_finite() {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn render_pair(v: &Value, quote_strings: bool) -> String {
    let mut parts = Vec::new();
    let mut cur = v.clone();
    loop {
        match cur {
            Value::Pair(p) => {
                parts.push(render(&p.car, quote_strings));
                cur = p.cdr.clone();
            }
            Value::Null => break,
            other => {
                parts.push(".".to_string());
                parts.push(render(&other, quote_strings));
                break;
            }
        }
    }
    format!("({})", parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prints_null_and_booleans() {
        assert_eq!(write_string(&Value::Null), "()");
        assert_eq!(write_string(&Value::Boolean(true)), "#t");
        assert_eq!(write_string(&Value::Boolean(false)), "#f");
    }

    #[test]
    fn prints_improper_pair_with_dot() {
        let v = Value::cons(Value::Integer(1), Value::Integer(2));
        assert_eq!(write_string(&v), "(1 . 2)");
    }

    #[test]
    fn prints_proper_list() {
        let v = Value::list(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(write_string(&v), "(1 2 3)");
    }

    #[test]
    fn float_with_integral_value_prints_one_decimal() {
        assert_eq!(write_string(&Value::Float(123.0)), "123.0");
    }

    #[test]
    fn string_quoting_differs_between_write_and_display() {
        let v = Value::string("hi");
        assert_eq!(write_string(&v), "\"hi\"");
        assert_eq!(display_string(&v), "hi");
    }
}
