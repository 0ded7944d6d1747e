//! Tokenizer and recursive-descent reader (spec §4.2).
//!
//! The tokenizer works one line at a time: string literals are extracted
//! verbatim (no escape processing, no literal spanning a line — an
//! unterminated `"` is a read error rather than continuing onto the next
//! line), `;`-to-end-of-line comments are dropped, and the remaining text is
//! split on whitespace around `(`, `)` and `'`.

use crate::error::{Result, SchemeError};
use crate::symbol;
use crate::value::Value;
use lazy_static::lazy_static;
use std::io::{self, BufRead, Write};
use std::sync::Mutex;

#[derive(Clone, Debug)]
enum Token {
    LParen,
    RParen,
    Quote,
    Dot,
    Bool(bool),
    Str(String),
    Integer(i64),
    Float(f64),
    Symbol(String),
}

fn tokenize(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            '(' => {
                tokens.push(Token::LParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RParen);
                chars.next();
            }
            '\'' => {
                tokens.push(Token::Quote);
                chars.next();
            }
            ';' => break, // rest of the line is a comment
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' => {
                chars.next();
                let mut s = String::new();
                let mut closed = false;
                for next_c in chars.by_ref() {
                    if next_c == '"' {
                        closed = true;
                        break;
                    }
                    s.push(next_c);
                }
                if !closed {
                    return Err(SchemeError::ReadError(
                        "unterminated string literal".to_string(),
                    ));
                }
                tokens.push(Token::Str(s));
            }
            _ => {
                let mut atom = String::new();
                while let Some(&next_c) = chars.peek() {
                    if next_c.is_whitespace() || "()'\";".contains(next_c) {
                        break;
                    }
                    atom.push(next_c);
                    chars.next();
                }
                tokens.push(classify_atom(&atom)?);
            }
        }
    }
    Ok(tokens)
}

fn classify_atom(atom: &str) -> Result<Token> {
    match atom {
        "." => Ok(Token::Dot),
        "#t" => Ok(Token::Bool(true)),
        "#f" => Ok(Token::Bool(false)),
        _ if atom.starts_with('#') => Err(SchemeError::ReadError(format!(
            "invalid boolean literal: {}",
            atom
        ))),
        _ => {
            if let Ok(n) = atom.parse::<i64>() {
                Ok(Token::Integer(n))
            } else if let Ok(f) = atom.parse::<f64>() {
                Ok(Token::Float(f))
            } else {
                Ok(Token::Symbol(atom.to_string()))
            }
        }
    }
}

enum Parsed {
    Value(Value),
    /// Ran out of tokens before the expression was complete — not a
    /// syntax error, just a signal that more input is needed.
    NeedMore,
}

fn parse_expr(tokens: &[Token], pos: &mut usize) -> Result<Parsed> {
    let tok = match tokens.get(*pos) {
        Some(t) => t.clone(),
        None => return Ok(Parsed::NeedMore),
    };
    *pos += 1;
    match tok {
        Token::LParen => parse_list(tokens, pos),
        Token::RParen => Err(SchemeError::ReadError("unexpected ')'".to_string())),
        Token::Dot => Err(SchemeError::ReadError("unexpected '.'".to_string())),
        Token::Quote => match parse_expr(tokens, pos)? {
            Parsed::NeedMore => Ok(Parsed::NeedMore),
            Parsed::Value(v) => Ok(Parsed::Value(Value::list(vec![
                Value::Symbol(symbol::QUOTE.clone()),
                v,
            ]))),
        },
        Token::Bool(b) => Ok(Parsed::Value(Value::Boolean(b))),
        Token::Str(s) => Ok(Parsed::Value(Value::string(s))),
        Token::Integer(n) => Ok(Parsed::Value(Value::Integer(n))),
        Token::Float(f) => Ok(Parsed::Value(Value::Float(f))),
        Token::Symbol(s) => Ok(Parsed::Value(Value::symbol(&s))),
    }
}

fn parse_list(tokens: &[Token], pos: &mut usize) -> Result<Parsed> {
    let mut items = Vec::new();
    loop {
        match tokens.get(*pos) {
            None => return Ok(Parsed::NeedMore),
            Some(Token::RParen) => {
                *pos += 1;
                return Ok(Parsed::Value(Value::list(items)));
            }
            Some(Token::Dot) => {
                *pos += 1;
                let tail = match parse_expr(tokens, pos)? {
                    Parsed::NeedMore => return Ok(Parsed::NeedMore),
                    Parsed::Value(v) => v,
                };
                match tokens.get(*pos) {
                    None => return Ok(Parsed::NeedMore),
                    Some(Token::RParen) => {
                        *pos += 1;
                        return Ok(Parsed::Value(Value::list_with_tail(items, tail)));
                    }
                    Some(_) => {
                        return Err(SchemeError::ReadError(
                            "malformed dotted list: expected ')' after the tail".to_string(),
                        ));
                    }
                }
            }
            Some(_) => match parse_expr(tokens, pos)? {
                Parsed::NeedMore => return Ok(Parsed::NeedMore),
                Parsed::Value(v) => items.push(v),
            },
        }
    }
}

/// Accumulates tokens across feeds and parses one expression at a time,
/// letting the caller (REPL or file loader) decide whether to request more
/// input when a buffer ends mid-expression (spec §4.2).
pub struct Reader {
    tokens: Vec<Token>,
}

impl Reader {
    pub fn new() -> Self {
        Reader { tokens: Vec::new() }
    }

    pub fn feed_line(&mut self, line: &str) -> Result<()> {
        self.tokens.extend(tokenize(line)?);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Clears any half-read expression — used by the REPL after an error
    /// (spec §7).
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Parses one expression from the buffered tokens. `Ok(None)` means the
    /// buffered tokens don't yet form a complete expression.
    pub fn try_parse(&mut self) -> Result<Option<Value>> {
        if self.tokens.is_empty() {
            return Ok(None);
        }
        let mut pos = 0usize;
        match parse_expr(&self.tokens, &mut pos)? {
            Parsed::Value(v) => {
                self.tokens.drain(0..pos);
                Ok(Some(v))
            }
            Parsed::NeedMore => Ok(None),
        }
    }
}

impl Default for Reader {
    fn default() -> Self {
        Reader::new()
    }
}

/// Parses every top-level expression in `input` (a whole file's worth of
/// text). A trailing incomplete expression is a read error, since there is
/// no more text to feed.
pub fn parse_all(input: &str) -> Result<Vec<Value>> {
    let mut reader = Reader::new();
    for line in input.lines() {
        reader.feed_line(line)?;
    }
    let mut exprs = Vec::new();
    while !reader.is_empty() {
        match reader.try_parse()? {
            Some(v) => exprs.push(v),
            None => {
                return Err(SchemeError::ReadError(
                    "unexpected end of input".to_string(),
                ));
            }
        }
    }
    Ok(exprs)
}

lazy_static! {
    /// The standard-input token buffer the `read` builtin shares with the
    /// REPL (spec §5: "standard input token buffer (owned by the driver)").
    static ref STDIN_READER: Mutex<Reader> = Mutex::new(Reader::new());
}

/// Reads one expression from the driver's token stream, pulling more lines
/// from stdin as needed. Returns `Value::Eof` at end of input — the `read`
/// builtin's contract (spec §6).
pub fn read_datum() -> Result<Value> {
    let mut reader = STDIN_READER.lock().unwrap();
    loop {
        if let Some(v) = reader.try_parse()? {
            return Ok(v);
        }
        let mut line = String::new();
        io::stdout().flush().ok();
        let bytes = io::stdin().lock().read_line(&mut line).unwrap_or(0);
        if bytes == 0 {
            return Ok(Value::Eof);
        }
        reader.feed_line(&line)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(input: &str) -> Value {
        parse_all(input).unwrap().into_iter().next().unwrap()
    }

    #[test]
    fn parses_atoms() {
        assert!(matches!(parse_one("42"), Value::Integer(42)));
        assert!(matches!(parse_one("3.5"), Value::Float(f) if f == 3.5));
        assert!(matches!(parse_one("#t"), Value::Boolean(true)));
        assert!(matches!(parse_one("#f"), Value::Boolean(false)));
    }

    #[test]
    fn parses_quote_shorthand() {
        let v = parse_one("'foo");
        let items = v.to_vec().unwrap();
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Value::Symbol(s) if s.name() == "quote"));
    }

    #[test]
    fn parses_proper_and_dotted_lists() {
        let v = parse_one("(1 2 3)");
        assert_eq!(v.to_vec().unwrap().len(), 3);

        let v = parse_one("(1 . 2)");
        assert!(matches!(v.car().unwrap(), Value::Integer(1)));
        assert!(matches!(v.cdr().unwrap(), Value::Integer(2)));
    }

    #[test]
    fn rejects_garbage_after_dotted_tail() {
        let err = parse_all("(1 . 2 3)").unwrap_err();
        assert!(matches!(err, SchemeError::ReadError(_)));
    }

    #[test]
    fn strips_comments_and_extracts_strings() {
        let v = parse_one("\"hello ; not a comment\" ; but this is");
        assert!(matches!(v, Value::String(ref s) if &**s == "hello ; not a comment"));
    }

    #[test]
    fn unterminated_string_is_a_read_error() {
        let err = parse_all("\"oops").unwrap_err();
        assert!(matches!(err, SchemeError::ReadError(_)));
    }

    #[test]
    fn incomplete_expression_needs_more_input() {
        let mut reader = Reader::new();
        reader.feed_line("(+ 1").unwrap();
        assert!(reader.try_parse().unwrap().is_none());
        reader.feed_line(" 2)").unwrap();
        assert!(reader.try_parse().unwrap().is_some());
    }
}
