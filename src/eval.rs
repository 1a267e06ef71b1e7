//! Expression evaluator (C5)
//!
//! A precedence-climbing evaluator that walks the token-byte stream
//! directly — there is no separate expression AST. Grammar, low to high
//! precedence:
//!
//! ```text
//! expr     -> or_expr
//! or_expr  -> and_expr (OR and_expr)*
//! and_expr -> not_expr (AND not_expr)*
//! not_expr -> NOT not_expr | cmp
//! cmp      -> add [relop add]
//! add      -> mul ((+|-) mul)*
//! mul      -> unary ((*|/) unary)*
//! unary    -> (+|-) unary | pow
//! pow      -> primary [^ unary]
//! ```
//!
//! `unary` wrapping `pow` (rather than the reverse) is what makes
//! `-2^2` evaluate to `-4`: the minus applies to the whole exponentiation,
//! while the exponent itself may carry its own unary sign (`2^-2`).
//!
//! Side effects (variable/array access, builtin and user-function calls,
//! string allocation) are routed through the [`Host`] trait so this module
//! stays free of any dependency on the variable store, string heap, or
//! builtin registry — the interpreter wires the concrete types together.

use crate::error::{BasicError, Result};
use crate::strings::StringRef;
use crate::token::{self, is_digit, is_ident_continue, is_letter};
use crate::value::{VarName, Value};

/// Everything the evaluator needs from the surrounding interpreter.
pub trait Host {
    fn get_scalar(&self, name: VarName) -> Value;
    fn array_element(&mut self, name: VarName, indices: &[usize]) -> Result<Value>;
    fn read_string(&self, r: StringRef) -> &str;
    fn new_temp_string(&mut self, s: &str) -> Result<StringRef>;
    fn call_builtin(&mut self, token: u8, args: &[Value]) -> Result<Value>;
    fn call_user_function(&mut self, name: VarName, arg: Value) -> Result<Value>;
}

/// `true` for the one-byte tokens that are evaluator-visible function
/// calls (as opposed to statement keywords).
fn is_builtin_function(tok: u8) -> bool {
    matches!(
        tok,
        token::TOK_SGN
            | token::TOK_INT
            | token::TOK_ABS
            | token::TOK_USR
            | token::TOK_FRE
            | token::TOK_POS
            | token::TOK_SQR
            | token::TOK_RND
            | token::TOK_LOG
            | token::TOK_EXP
            | token::TOK_COS
            | token::TOK_SIN
            | token::TOK_TAN
            | token::TOK_ATN
            | token::TOK_PEEK
            | token::TOK_LEN
            | token::TOK_STRS
            | token::TOK_VAL
            | token::TOK_ASC
            | token::TOK_CHRS
            | token::TOK_LEFTS
            | token::TOK_RIGHTS
            | token::TOK_MIDS
    )
}

/// Evaluates expressions over `tokens[pos..]`, advancing `pos` as it goes.
pub struct Evaluator<'t, H: Host> {
    tokens: &'t [u8],
    pos: usize,
    host: &'t mut H,
}

impl<'t, H: Host> Evaluator<'t, H> {
    pub fn new(tokens: &'t [u8], pos: usize, host: &'t mut H) -> Self {
        Evaluator { tokens, pos, host }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    fn peek(&self) -> Option<u8> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.tokens.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> Result<()> {
        self.skip_spaces();
        if self.peek() == Some(c) {
            self.pos += 1;
            Ok(())
        } else {
            Err(BasicError::SyntaxError)
        }
    }

    /// Parse and evaluate one full expression starting at the current
    /// position. Leaves `position()` just past the last consumed byte.
    pub fn eval(&mut self) -> Result<Value> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Value> {
        let mut lhs = self.parse_and()?;
        loop {
            self.skip_spaces();
            if self.peek() == Some(token::TOK_OR) {
                self.pos += 1;
                let rhs = self.parse_and()?;
                lhs = bitwise(lhs, rhs, |a, b| a | b)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_and(&mut self) -> Result<Value> {
        let mut lhs = self.parse_not()?;
        loop {
            self.skip_spaces();
            if self.peek() == Some(token::TOK_AND) {
                self.pos += 1;
                let rhs = self.parse_not()?;
                lhs = bitwise(lhs, rhs, |a, b| a & b)?;
            } else {
                return Ok(lhs);
            }
        }
    }

    fn parse_not(&mut self) -> Result<Value> {
        self.skip_spaces();
        if self.peek() == Some(token::TOK_NOT) {
            self.pos += 1;
            let v = self.parse_not()?;
            let n = to_int32(as_number(v)?)?;
            return Ok(Value::Number(!n as f64));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Value> {
        let lhs = self.parse_add()?;
        self.skip_spaces();
        let op = self.match_relop();
        match op {
            Some(op) => {
                let rhs = self.parse_add()?;
                compare(lhs, rhs, op, self.host)
            }
            None => Ok(lhs),
        }
    }

    fn match_relop(&mut self) -> Option<RelOp> {
        match self.peek() {
            Some(b'=') => {
                self.pos += 1;
                Some(RelOp::Eq)
            }
            Some(b'<') => {
                self.pos += 1;
                match self.peek() {
                    Some(b'>') => {
                        self.pos += 1;
                        Some(RelOp::Ne)
                    }
                    Some(b'=') => {
                        self.pos += 1;
                        Some(RelOp::Le)
                    }
                    _ => Some(RelOp::Lt),
                }
            }
            Some(b'>') => {
                self.pos += 1;
                match self.peek() {
                    Some(b'=') => {
                        self.pos += 1;
                        Some(RelOp::Ge)
                    }
                    Some(b'<') => {
                        self.pos += 1;
                        Some(RelOp::Ne)
                    }
                    _ => Some(RelOp::Gt),
                }
            }
            _ => None,
        }
    }

    fn parse_add(&mut self) -> Result<Value> {
        let mut lhs = self.parse_mul()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'+') => {
                    self.pos += 1;
                    let rhs = self.parse_mul()?;
                    lhs = add(lhs, rhs, self.host)?;
                }
                Some(b'-') => {
                    self.pos += 1;
                    let rhs = self.parse_mul()?;
                    lhs = Value::Number(checked_sub(as_number(lhs)?, as_number(rhs)?)?);
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_mul(&mut self) -> Result<Value> {
        let mut lhs = self.parse_unary()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'*') => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    lhs = Value::Number(checked_mul(as_number(lhs)?, as_number(rhs)?)?);
                }
                Some(b'/') => {
                    self.pos += 1;
                    let rhs = self.parse_unary()?;
                    let divisor = as_number(rhs)?;
                    if divisor == 0.0 {
                        return Err(BasicError::DivisionByZero);
                    }
                    lhs = Value::Number(checked(as_number(lhs)? / divisor)?);
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn parse_unary(&mut self) -> Result<Value> {
        self.skip_spaces();
        match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                let v = self.parse_unary()?;
                Ok(Value::Number(checked(-as_number(v)?)?))
            }
            Some(b'+') => {
                self.pos += 1;
                self.parse_unary()
            }
            _ => self.parse_pow(),
        }
    }

    fn parse_pow(&mut self) -> Result<Value> {
        let base = self.parse_primary()?;
        self.skip_spaces();
        if self.peek() == Some(b'^') {
            self.pos += 1;
            let exp = self.parse_unary()?;
            let base = as_number(base)?;
            let exp = as_number(exp)?;
            if base < 0.0 && exp.fract() != 0.0 {
                return Err(BasicError::IllegalQuantity);
            }
            Ok(Value::Number(checked(base.powf(exp))?))
        } else {
            Ok(base)
        }
    }

    fn parse_primary(&mut self) -> Result<Value> {
        self.skip_spaces();
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let v = self.parse_or()?;
                self.expect(b')')?;
                Ok(v)
            }
            Some(b'"') => self.parse_string_literal(),
            Some(token::TOK_FN) => self.parse_user_function_call(),
            Some(c) if is_digit(c) || c == b'.' => self.parse_number(),
            Some(c) if is_token(c) && is_builtin_function(c) => self.parse_builtin_call(),
            Some(c) if is_letter(c) => self.parse_variable_or_array(),
            _ => Err(BasicError::SyntaxError),
        }
    }

    fn parse_string_literal(&mut self) -> Result<Value> {
        self.pos += 1; // opening quote
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'"' {
                break;
            }
            self.pos += 1;
        }
        let text = String::from_utf8_lossy(&self.tokens[start..self.pos]).into_owned();
        if self.peek() == Some(b'"') {
            self.pos += 1;
        }
        let r = self.host.new_temp_string(&text)?;
        Ok(Value::Str(r))
    }

    fn parse_number(&mut self) -> Result<Value> {
        let start = self.pos;
        while self.peek().map(is_digit).unwrap_or(false) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            while self.peek().map(is_digit).unwrap_or(false) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'E') | Some(b'e')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            while self.peek().map(is_digit).unwrap_or(false) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.tokens[start..self.pos]).map_err(|_| BasicError::SyntaxError)?;
        let n: f64 = text.parse().map_err(|_| BasicError::SyntaxError)?;
        checked(n).map(Value::Number)
    }

    /// Reads a variable name (letters/digits, optional `$`/`%` suffix).
    fn read_name(&mut self) -> String {
        let start = self.pos;
        while self.peek().map(is_ident_continue).unwrap_or(false) {
            self.pos += 1;
        }
        if matches!(self.peek(), Some(b'$') | Some(b'%')) {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.tokens[start..self.pos]).into_owned()
    }

    fn parse_variable_or_array(&mut self) -> Result<Value> {
        let name = VarName::parse(&self.read_name());
        self.skip_spaces();
        if self.peek() == Some(b'(') {
            let indices = self.parse_index_list()?;
            self.host.array_element(name, &indices)
        } else {
            Ok(self.host.get_scalar(name))
        }
    }

    /// Parses `(i1, i2, ...)`, evaluating each subscript and truncating to
    /// a non-negative `usize` (negative or fractional subscripts are
    /// `ERR_FC`, matching the classic dialect).
    fn parse_index_list(&mut self) -> Result<Vec<usize>> {
        self.expect(b'(')?;
        let mut indices = Vec::new();
        loop {
            let v = self.parse_or()?;
            let n = as_number(v)?;
            if n < 0.0 || n.fract() != 0.0 || n > i32::MAX as f64 {
                return Err(BasicError::IllegalQuantity);
            }
            indices.push(n as usize);
            self.skip_spaces();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(BasicError::SyntaxError),
            }
        }
        Ok(indices)
    }

    fn parse_arg_list(&mut self) -> Result<Vec<Value>> {
        self.expect(b'(')?;
        let mut args = Vec::new();
        self.skip_spaces();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.parse_or()?);
            self.skip_spaces();
            match self.peek() {
                Some(b',') => {
                    self.pos += 1;
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                _ => return Err(BasicError::SyntaxError),
            }
        }
        Ok(args)
    }

    fn parse_builtin_call(&mut self) -> Result<Value> {
        let tok = self.advance().expect("checked by caller");
        let args = self.parse_arg_list()?;
        self.host.call_builtin(tok, &args)
    }

    fn parse_user_function_call(&mut self) -> Result<Value> {
        self.pos += 1; // TOK_FN
        let name = VarName::parse(&self.read_name());
        self.expect(b'(')?;
        let arg = self.parse_or()?;
        self.expect(b')')?;
        self.host.call_user_function(name, arg)
    }
}

fn is_token(c: u8) -> bool {
    token::is_token(c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn as_number(v: Value) -> Result<f64> {
    match v {
        Value::Number(n) => Ok(n),
        Value::Integer(n) => Ok(n as f64),
        Value::Str(_) => Err(BasicError::TypeMismatch),
    }
}

fn to_int32(n: f64) -> Result<i32> {
    if !n.is_finite() || n.abs() >= 2147483648.0 {
        return Err(BasicError::IllegalQuantity);
    }
    Ok(n.round() as i32)
}

fn bitwise(lhs: Value, rhs: Value, op: impl Fn(i32, i32) -> i32) -> Result<Value> {
    let a = to_int32(as_number(lhs)?)?;
    let b = to_int32(as_number(rhs)?)?;
    Ok(Value::Number(op(a, b) as f64))
}

fn checked(n: f64) -> Result<f64> {
    if n.is_infinite() {
        Err(BasicError::Overflow)
    } else {
        Ok(n)
    }
}

fn checked_sub(a: f64, b: f64) -> Result<f64> {
    checked(a - b)
}

fn checked_mul(a: f64, b: f64) -> Result<f64> {
    checked(a * b)
}

/// `+`: numeric addition, or string concatenation when both sides are
/// strings. Mixing a string and a number is `ERR_TM`.
fn add<H: Host>(lhs: Value, rhs: Value, host: &mut H) -> Result<Value> {
    match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => {
            let mut s = String::with_capacity(a.len() + b.len());
            s.push_str(host.read_string(a));
            s.push_str(host.read_string(b));
            let r = host.new_temp_string(&s)?;
            Ok(Value::Str(r))
        }
        (Value::Str(_), _) | (_, Value::Str(_)) => Err(BasicError::TypeMismatch),
        _ => Ok(Value::Number(checked(as_number(lhs)? + as_number(rhs)?)?)),
    }
}

/// Relational comparison. Numbers compare numerically; strings compare by
/// unsigned-byte lexicographic order with a length tiebreaker (a shorter
/// string that is a strict prefix of a longer one sorts first). Result is
/// the classic truth value: `-1` for true, `0` for false.
fn compare<H: Host>(lhs: Value, rhs: Value, op: RelOp, host: &H) -> Result<Value> {
    let ordering = match (lhs, rhs) {
        (Value::Str(a), Value::Str(b)) => host.read_string(a).as_bytes().cmp(host.read_string(b).as_bytes()),
        (Value::Str(_), _) | (_, Value::Str(_)) => return Err(BasicError::TypeMismatch),
        _ => as_number(lhs)?.partial_cmp(&as_number(rhs)?).unwrap_or(std::cmp::Ordering::Equal),
    };
    let truth = match op {
        RelOp::Eq => ordering.is_eq(),
        RelOp::Ne => !ordering.is_eq(),
        RelOp::Lt => ordering.is_lt(),
        RelOp::Le => ordering.is_le(),
        RelOp::Gt => ordering.is_gt(),
        RelOp::Ge => ordering.is_ge(),
    };
    Ok(Value::Number(if truth { -1.0 } else { 0.0 }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::StringHeap;
    use std::collections::HashMap;

    /// A minimal in-memory [`Host`] for exercising the evaluator in
    /// isolation, independent of the real variable store.
    struct TestHost {
        scalars: HashMap<VarName, Value>,
        arrays: HashMap<VarName, Vec<Value>>,
        heap: StringHeap,
    }

    impl TestHost {
        fn new() -> Self {
            TestHost { scalars: HashMap::new(), arrays: HashMap::new(), heap: StringHeap::new(4096) }
        }
    }

    impl Host for TestHost {
        fn get_scalar(&self, name: VarName) -> Value {
            self.scalars.get(&name).copied().unwrap_or(Value::Number(0.0))
        }

        fn array_element(&mut self, name: VarName, indices: &[usize]) -> Result<Value> {
            let data = self.arrays.entry(name).or_insert_with(|| vec![Value::Number(0.0); 11]);
            let idx = indices.first().copied().unwrap_or(0);
            data.get(idx).copied().ok_or(BasicError::BadSubscript)
        }

        fn read_string(&self, r: StringRef) -> &str {
            self.heap.get(r)
        }

        fn new_temp_string(&mut self, s: &str) -> Result<StringRef> {
            self.heap.alloc_temporary(s)
        }

        fn call_builtin(&mut self, _token: u8, args: &[Value]) -> Result<Value> {
            Ok(args.first().copied().unwrap_or(Value::Number(0.0)))
        }

        fn call_user_function(&mut self, _name: VarName, arg: Value) -> Result<Value> {
            Ok(arg)
        }
    }

    fn eval_str(src: &str) -> Result<Value> {
        let mut host = TestHost::new();
        let bytes = src.as_bytes().to_vec();
        let mut ev = Evaluator::new(&bytes, 0, &mut host);
        ev.eval()
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval_str("2+3*4"), Ok(Value::Number(14.0)));
        assert_eq!(eval_str("(2+3)*4"), Ok(Value::Number(20.0)));
    }

    #[test]
    fn unary_minus_binds_looser_than_power() {
        assert_eq!(eval_str("-2^2"), Ok(Value::Number(-4.0)));
    }

    #[test]
    fn power_is_right_associative_with_unary_exponent() {
        assert_eq!(eval_str("2^-2"), Ok(Value::Number(0.25)));
    }

    #[test]
    fn comparison_yields_classic_truth_values() {
        assert_eq!(eval_str("3<5"), Ok(Value::Number(-1.0)));
        assert_eq!(eval_str("3>5"), Ok(Value::Number(0.0)));
    }

    #[test]
    fn and_or_not_are_bitwise_on_32_bit_ints() {
        assert_eq!(eval_str("6 AND 3"), Ok(Value::Number(2.0)));
        assert_eq!(eval_str("6 OR 1"), Ok(Value::Number(7.0)));
        assert_eq!(eval_str("NOT 0"), Ok(Value::Number(-1.0)));
    }

    #[test]
    fn division_by_zero_errors() {
        assert_eq!(eval_str("1/0"), Err(BasicError::DivisionByZero));
    }

    #[test]
    fn variable_reference_defaults_to_zero() {
        assert_eq!(eval_str("X+1"), Ok(Value::Number(1.0)));
    }

    #[test]
    fn string_concatenation_and_comparison() {
        let mut host = TestHost::new();
        let bytes = br#""AB"+"CD"="ABCD""#.to_vec();
        let mut ev = Evaluator::new(&bytes, 0, &mut host);
        assert_eq!(ev.eval(), Ok(Value::Number(-1.0)));
    }

    #[test]
    fn mixing_string_and_number_is_type_mismatch() {
        let mut host = TestHost::new();
        let bytes = br#"1+"A""#.to_vec();
        let mut ev = Evaluator::new(&bytes, 0, &mut host);
        assert_eq!(ev.eval(), Err(BasicError::TypeMismatch));
    }
}
