//! Statement dispatcher (C11)
//!
//! Maps each statement-leading token (or implicit `LET`) to its `stmt_*`
//! handler. A handler returns [`StmtResult::Continue`] when it consumed
//! tokens up to some offset within the *same* line buffer the driver
//! already holds, or [`StmtResult::Jump`] when it mutated `self.cursor`
//! directly (`GOTO`, `GOSUB`, `RETURN`, `NEXT` looping back, `RUN`, ...) —
//! the driver must then reload a fresh token buffer from the new cursor
//! rather than keep walking the old one.

use crate::builtins;
use crate::control::{Cursor, DataCursor, ForFrame, GosubFrame};
use crate::error::{BasicError, Result};
use crate::interpreter::{Interpreter, UserFunction};
use crate::io::{BreakSignal, LineSource, Output};
use crate::program;
use crate::token::{self, is_digit, is_letter};
use crate::tokenizer;
use crate::value::{VarName, Value};
use crate::variables;

/// What a statement handler did to the cursor.
pub enum StmtResult {
    /// Consumed tokens up to `pos` within the line buffer already in hand.
    Continue(usize),
    /// Mutated `self.cursor` directly; the driver must reload tokens.
    Jump,
}

/// An assignment target: a bare scalar or a subscripted array element.
enum LValue {
    Scalar(VarName),
    Array(VarName, Vec<usize>),
}

impl LValue {
    fn is_string(&self) -> bool {
        match self {
            LValue::Scalar(name) => name.is_string(),
            LValue::Array(name, _) => name.is_string(),
        }
    }
}

/// Advance `*pos` past any run of literal spaces.
pub fn skip_spaces(tokens: &[u8], pos: &mut usize) {
    while tokens.get(*pos) == Some(&b' ') {
        *pos += 1;
    }
}

/// Match either `tok_byte` (the tokenized form) or `word` spelled out
/// literally (case-insensitively), advancing past whichever matched.
fn match_keyword(tokens: &[u8], pos: &mut usize, tok_byte: u8, word: &str) -> bool {
    if tokens.get(*pos) == Some(&tok_byte) {
        *pos += 1;
        return true;
    }
    let word = word.as_bytes();
    if tokens.len() >= *pos + word.len() && tokens[*pos..*pos + word.len()].eq_ignore_ascii_case(word) {
        *pos += word.len();
        return true;
    }
    false
}

/// Scan forward from `start` to the next unquoted `:` or end of `tokens`.
fn find_eos_quote_aware(tokens: &[u8], start: usize) -> usize {
    let mut p = start;
    let mut in_string = false;
    while p < tokens.len() {
        match tokens[p] {
            b'"' => in_string = !in_string,
            b':' if !in_string => return p,
            _ => {}
        }
        p += 1;
    }
    p
}

/// Scan forward from `start` (within one line's tokens) for a `TOK_DATA`
/// byte, honoring quoted spans so a literal byte inside a string literal
/// is never mistaken for it.
fn find_data_token(tokens: &[u8], start: usize) -> Option<usize> {
    let mut p = start;
    let mut in_string = false;
    while p < tokens.len() {
        match tokens[p] {
            b'"' => in_string = !in_string,
            token::TOK_DATA if !in_string => return Some(p),
            _ => {}
        }
        p += 1;
    }
    None
}

/// Truncate a numeric line-number expression result to `u16`, matching
/// the original's `ERR_US` (not `ERR_FC`) for an out-of-range target.
fn numeric_to_line(n: f64) -> Result<u16> {
    if n.fract() != 0.0 || n < program::MIN_LINE_NUMBER as f64 || n > program::MAX_LINE_NUMBER as f64 {
        return Err(BasicError::UndefinedStatement);
    }
    Ok(n as u16)
}

/// Read a `DATA` string item starting at `*p`: quoted (stops at the
/// closing quote) or bare (stops at `,`/`:`/end of line, trailing spaces
/// trimmed).
fn read_data_string(tokens: &[u8], p: &mut usize) -> String {
    let mut s = String::new();
    if tokens.get(*p) == Some(&b'"') {
        *p += 1;
        while let Some(&c) = tokens.get(*p) {
            if c == b'"' || s.len() >= crate::strings::MAX_STRING_LEN {
                break;
            }
            s.push(c as char);
            *p += 1;
        }
        if tokens.get(*p) == Some(&b'"') {
            *p += 1;
        }
    } else {
        while let Some(&c) = tokens.get(*p) {
            if c == b',' || c == b':' || s.len() >= crate::strings::MAX_STRING_LEN {
                break;
            }
            s.push(c as char);
            *p += 1;
        }
        while s.ends_with(' ') {
            s.pop();
        }
    }
    s
}

/// Read a `DATA` numeric item starting at `*p`: leading spaces skipped,
/// then the longest run of `[0-9.eE+-]`.
fn read_data_numeric(tokens: &[u8], p: &mut usize) -> String {
    while tokens.get(*p) == Some(&b' ') {
        *p += 1;
    }
    let mut s = String::new();
    while let Some(&c) = tokens.get(*p) {
        if s.len() >= 63 {
            break;
        }
        if c.is_ascii_digit() || matches!(c, b'.' | b'-' | b'+' | b'E' | b'e') {
            s.push(c as char);
            *p += 1;
        } else {
            break;
        }
    }
    s
}

impl<O: Output, L: LineSource, Br: BreakSignal> Interpreter<O, L, Br> {
    /// Skip leading spaces, then route to the right handler: an
    /// end-of-statement is a no-op, a token byte dispatches by keyword, a
    /// leading `?` is `PRINT` shorthand, and a bare letter is an implicit
    /// `LET`.
    pub fn execute_statement(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        match tokens.get(p).copied() {
            None | Some(b':') => Ok(StmtResult::Continue(p)),
            Some(tok) if token::is_token(tok) => self.dispatch_token(tok, tokens, p + 1),
            Some(b'?') => self.stmt_print(tokens, p + 1),
            Some(c) if is_letter(c) => self.stmt_let(tokens, p),
            _ => Err(BasicError::SyntaxError),
        }
    }

    fn dispatch_token(&mut self, tok: u8, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        use token::*;
        log::debug!(
            "dispatch {} at line {:?}",
            token::token_name(tok).unwrap_or("?"),
            self.cursor.line
        );
        match tok {
            TOK_END => self.stmt_end(pos),
            TOK_FOR => self.stmt_for(tokens, pos),
            TOK_NEXT => self.stmt_next(tokens, pos),
            TOK_DATA => self.stmt_data(tokens, pos),
            TOK_INPUT => self.stmt_input(tokens, pos),
            TOK_DIM => self.stmt_dim(tokens, pos),
            TOK_READ => self.stmt_read(tokens, pos),
            TOK_LET => self.stmt_let(tokens, pos),
            TOK_GOTO => self.stmt_goto(tokens, pos),
            TOK_RUN => self.stmt_run(tokens, pos),
            TOK_IF => self.stmt_if(tokens, pos),
            TOK_RESTORE => self.stmt_restore(tokens, pos),
            TOK_GOSUB => self.stmt_gosub(tokens, pos),
            TOK_RETURN => self.stmt_return(),
            TOK_REM => self.stmt_rem(tokens, pos),
            TOK_STOP => self.stmt_stop(pos),
            TOK_ON => self.stmt_on(tokens, pos),
            TOK_NULL => self.stmt_null(tokens, pos),
            TOK_WAIT => self.stmt_wait(tokens, pos),
            TOK_LOAD | TOK_SAVE | TOK_VERIFY => Err(BasicError::SyntaxError),
            TOK_DEF => self.stmt_def(tokens, pos),
            TOK_POKE => self.stmt_poke(tokens, pos),
            TOK_PRINT => self.stmt_print(tokens, pos),
            TOK_CONT => self.stmt_cont(),
            TOK_LIST => self.stmt_list(tokens, pos),
            TOK_CLEAR => self.stmt_clear(pos),
            TOK_GET => self.stmt_get(tokens, pos),
            TOK_NEW => self.stmt_new(pos),
            _ => Err(BasicError::SyntaxError),
        }
    }

    // --- lvalue parsing ---------------------------------------------------

    fn parse_lvalue(&mut self, tokens: &[u8], pos: usize) -> Result<(LValue, usize)> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        let name_start = p;
        while tokens.get(p).map(|&c| token::is_ident_continue(c)).unwrap_or(false) {
            p += 1;
        }
        if p == name_start {
            return Err(BasicError::SyntaxError);
        }
        if matches!(tokens.get(p), Some(&b'$') | Some(&b'%')) {
            p += 1;
        }
        let name = VarName::parse(&String::from_utf8_lossy(&tokens[name_start..p]));

        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b'(') {
            return Ok((LValue::Scalar(name), p));
        }
        p += 1;

        let mut indices = Vec::new();
        loop {
            let (n, np) = self.eval_numeric(tokens, p)?;
            p = np;
            if n.fract() != 0.0 || n < 0.0 || n > i32::MAX as f64 {
                return Err(BasicError::IllegalQuantity);
            }
            indices.push(n as usize);
            skip_spaces(tokens, &mut p);
            match tokens.get(p) {
                Some(&b',') => {
                    if indices.len() >= variables::MAX_DIMS {
                        return Err(BasicError::BadSubscript);
                    }
                    p += 1;
                }
                Some(&b')') => {
                    p += 1;
                    break;
                }
                _ => return Err(BasicError::SyntaxError),
            }
        }
        Ok((LValue::Array(name, indices), p))
    }

    fn store_lvalue(&mut self, lvalue: LValue, value: Value) -> Result<()> {
        match lvalue {
            LValue::Scalar(name) => self.store_scalar(name, value),
            LValue::Array(name, indices) => self.store_array(name, &indices, value),
        }
    }

    // --- DATA cursor -------------------------------------------------------

    /// Position `self.data` at the next pending value, scanning forward
    /// through the program for `DATA` statements as needed. Never
    /// re-scans from the top once scanning has begun for this `READ` run
    /// (see [`crate::control::DataCursor`]): once the program is
    /// exhausted it stays `Exhausted` until an explicit `RESTORE`.
    fn position_data_cursor(&mut self) -> Result<Cursor> {
        loop {
            match self.data {
                DataCursor::Start => self.data = DataCursor::ScanFrom(None),
                DataCursor::Exhausted => return Err(BasicError::OutOfData),
                DataCursor::Pending(cur) => {
                    let line = cur.line.ok_or(BasicError::OutOfData)?;
                    let Some(tokens) = self.program.get(line).map(|b| b.to_vec()) else {
                        self.data = DataCursor::ScanFrom(self.program.next_after(line));
                        continue;
                    };
                    let mut p = cur.offset;
                    while matches!(tokens.get(p), Some(&b' ') | Some(&b',')) {
                        p += 1;
                    }
                    if p < tokens.len() && tokens[p] != b':' {
                        let found = Cursor::new(Some(line), p);
                        self.data = DataCursor::Pending(found);
                        return Ok(found);
                    }
                    self.data = DataCursor::ScanFrom(self.program.next_after(line));
                }
                DataCursor::ScanFrom(from) => {
                    let mut line = match from {
                        Some(l) => Some(l),
                        None => self.program.first_line(),
                    };
                    loop {
                        let Some(l) = line else {
                            self.data = DataCursor::Exhausted;
                            break;
                        };
                        let tokens = self.program.get(l).map(|b| b.to_vec()).unwrap_or_default();
                        if let Some(tpos) = find_data_token(&tokens, 0) {
                            self.data = DataCursor::Pending(Cursor::new(Some(l), tpos + 1));
                            break;
                        }
                        line = self.program.next_after(l);
                    }
                }
            }
        }
    }

    // --- Statement handlers --------------------------------------------

    fn stmt_end(&mut self, pos: usize) -> Result<StmtResult> {
        self.running = false;
        Ok(StmtResult::Continue(pos))
    }

    fn stmt_stop(&mut self, pos: usize) -> Result<StmtResult> {
        self.running = false;
        self.can_continue = true;
        self.cont_cursor = Some(Cursor::new(self.cursor.line, pos));
        self.terminal.print_newline(&mut self.output);
        let mut msg = String::from("BREAK");
        if let Some(n) = self.cursor.line {
            msg.push_str(&format!(" IN {}", n));
        }
        self.terminal.print_str(&mut self.output, &msg);
        self.terminal.print_newline(&mut self.output);
        Ok(StmtResult::Continue(pos))
    }

    fn stmt_cont(&mut self) -> Result<StmtResult> {
        match self.cont_cursor {
            Some(cur) if self.can_continue && cur.line.is_some() => {
                self.cursor = cur;
                self.running = true;
                Ok(StmtResult::Jump)
            }
            _ => Err(BasicError::CantContinue),
        }
    }

    fn stmt_rem(&self, tokens: &[u8], _pos: usize) -> Result<StmtResult> {
        Ok(StmtResult::Continue(tokens.len()))
    }

    fn stmt_let(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (lvalue, mut p) = self.parse_lvalue(tokens, pos)?;
        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b'=') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        let (value, np) = self.eval_expr(tokens, p)?;
        p = np;
        self.store_lvalue(lvalue, value)?;
        Ok(StmtResult::Continue(p))
    }

    fn stmt_print(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        let mut need_newline = false;
        loop {
            skip_spaces(tokens, &mut p);
            if token::is_end_of_statement(tokens.get(p).copied()) {
                break;
            }
            match tokens.get(p).copied() {
                Some(token::TOK_TAB) => {
                    p += 1;
                    if tokens.get(p) == Some(&b'(') {
                        p += 1;
                    }
                    let (n, np) = self.eval_numeric(tokens, p)?;
                    p = np;
                    if tokens.get(p) == Some(&b')') {
                        p += 1;
                    }
                    self.terminal.print_tab(&mut self.output, n.max(0.0) as usize);
                    need_newline = false;
                }
                Some(token::TOK_SPC) => {
                    p += 1;
                    if tokens.get(p) == Some(&b'(') {
                        p += 1;
                    }
                    let (n, np) = self.eval_numeric(tokens, p)?;
                    p = np;
                    if tokens.get(p) == Some(&b')') {
                        p += 1;
                    }
                    self.terminal.print_spc(&mut self.output, n.max(0.0) as usize);
                    need_newline = false;
                }
                Some(b';') => {
                    p += 1;
                    need_newline = false;
                }
                Some(b',') => {
                    p += 1;
                    self.terminal.zone_comma(&mut self.output);
                    need_newline = false;
                }
                _ => {
                    let (v, np) = self.eval_expr(tokens, p)?;
                    p = np;
                    match v {
                        Value::Str(r) => {
                            let s = self.strings.get(r).to_string();
                            self.terminal.print_str(&mut self.output, &s);
                        }
                        Value::Number(n) => self.terminal.print_number(&mut self.output, n),
                        Value::Integer(n) => self.terminal.print_number(&mut self.output, n as f64),
                    }
                    need_newline = true;
                }
            }
        }
        if need_newline {
            self.terminal.print_newline(&mut self.output);
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_input(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        let mut prompt = String::from("? ");
        if tokens.get(p) == Some(&b'"') {
            p += 1;
            let start = p;
            while tokens.get(p).map(|&c| c != b'"').unwrap_or(false) {
                p += 1;
            }
            prompt = String::from_utf8_lossy(&tokens[start..p]).into_owned();
            prompt = prompt.chars().take(254).collect();
            if tokens.get(p) == Some(&b'"') {
                p += 1;
            }
            skip_spaces(tokens, &mut p);
            match tokens.get(p) {
                Some(&b';') => {
                    p += 1;
                }
                Some(&b',') => {
                    p += 1;
                    prompt.push_str("? ");
                }
                _ => {}
            }
        }

        loop {
            skip_spaces(tokens, &mut p);
            let (lvalue, np) = self.parse_lvalue(tokens, p)?;
            p = np;
            let is_string = lvalue.is_string();

            self.terminal.print_str(&mut self.output, &prompt);
            let line = self.input.read_line().ok_or(BasicError::Break)?;

            let value = if is_string {
                Value::Str(self.strings.alloc_temporary(&line)?)
            } else {
                Value::Number(builtins::val(&line))
            };
            self.store_lvalue(lvalue, value)?;

            skip_spaces(tokens, &mut p);
            if tokens.get(p) == Some(&b',') {
                p += 1;
                prompt = String::from("?? ");
                continue;
            }
            break;
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_get(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (lvalue, p) = self.parse_lvalue(tokens, pos)?;
        let is_string = lvalue.is_string();
        let line = self.input.read_line();
        let value = if is_string {
            let ch = line.as_deref().and_then(|l| l.chars().next());
            let s = match ch {
                Some(c) if c != '\n' && c != '\r' => c.to_string(),
                _ => String::new(),
            };
            Value::Str(self.strings.alloc_temporary(&s)?)
        } else {
            let b = line.as_deref().and_then(|l| l.bytes().next()).unwrap_or(0);
            Value::Number(b as f64)
        };
        self.store_lvalue(lvalue, value)?;
        Ok(StmtResult::Continue(p))
    }

    fn stmt_dim(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        loop {
            skip_spaces(tokens, &mut p);
            let name_start = p;
            while tokens.get(p).map(|&c| token::is_ident_continue(c)).unwrap_or(false) {
                p += 1;
            }
            if p == name_start {
                return Err(BasicError::SyntaxError);
            }
            if matches!(tokens.get(p), Some(&b'$') | Some(&b'%')) {
                p += 1;
            }
            let name = VarName::parse(&String::from_utf8_lossy(&tokens[name_start..p]));
            skip_spaces(tokens, &mut p);
            if tokens.get(p) != Some(&b'(') {
                return Err(BasicError::SyntaxError);
            }
            p += 1;

            let mut dims = Vec::new();
            loop {
                let (n, np) = self.eval_numeric(tokens, p)?;
                p = np;
                if n.fract() != 0.0 || !(0.0..=variables::MAX_ARRAY_SIZE as f64).contains(&n) {
                    return Err(BasicError::IllegalQuantity);
                }
                dims.push(n as i64);
                skip_spaces(tokens, &mut p);
                match tokens.get(p) {
                    Some(&b',') => {
                        if dims.len() >= variables::MAX_DIMS {
                            return Err(BasicError::IllegalQuantity);
                        }
                        p += 1;
                    }
                    Some(&b')') => {
                        p += 1;
                        break;
                    }
                    _ => return Err(BasicError::SyntaxError),
                }
            }
            self.variables.dim_array(name, dims)?;

            skip_spaces(tokens, &mut p);
            if tokens.get(p) == Some(&b',') {
                p += 1;
                continue;
            }
            break;
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_read(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        loop {
            skip_spaces(tokens, &mut p);
            let (lvalue, np) = self.parse_lvalue(tokens, p)?;
            p = np;
            let is_string = lvalue.is_string();

            let data_cur = self.position_data_cursor()?;
            let dline = data_cur.line.expect("position_data_cursor always lands on a line");
            let dtokens = self.program.get(dline).map(|b| b.to_vec()).unwrap_or_default();
            let mut dp = data_cur.offset;

            let value = if is_string {
                let s = read_data_string(&dtokens, &mut dp);
                Value::Str(self.strings.alloc_temporary(&s)?)
            } else {
                let s = read_data_numeric(&dtokens, &mut dp);
                Value::Number(builtins::val(&s))
            };

            while dtokens.get(dp) == Some(&b' ') {
                dp += 1;
            }
            if dtokens.get(dp) == Some(&b',') {
                dp += 1;
            }
            self.data = DataCursor::Pending(Cursor::new(Some(dline), dp));

            self.store_lvalue(lvalue, value)?;

            skip_spaces(tokens, &mut p);
            if tokens.get(p) == Some(&b',') {
                p += 1;
                continue;
            }
            break;
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_data(&self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        Ok(StmtResult::Continue(find_eos_quote_aware(tokens, pos)))
    }

    fn stmt_restore(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        if p < tokens.len() && is_digit(tokens[p]) {
            let (n, np) = self.eval_numeric(tokens, p)?;
            p = np;
            let line = numeric_to_line(n)?;
            if !self.program.contains(line) {
                return Err(BasicError::UndefinedStatement);
            }
            self.data = DataCursor::ScanFrom(Some(line));
        } else {
            self.data = DataCursor::ScanFrom(None);
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_goto(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (n, _p) = self.eval_numeric(tokens, pos)?;
        let target = numeric_to_line(n)?;
        let resolved = self.program.find_or_next(target).ok_or(BasicError::UndefinedStatement)?;
        self.jump_to_line(resolved);
        Ok(StmtResult::Jump)
    }

    fn stmt_gosub(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (n, p) = self.eval_numeric(tokens, pos)?;
        let target = numeric_to_line(n)?;
        self.stack.push_gosub(GosubFrame { return_cursor: Cursor::new(self.cursor.line, p) })?;
        match self.program.find_or_next(target) {
            Some(resolved) => {
                self.jump_to_line(resolved);
                Ok(StmtResult::Jump)
            }
            None => {
                self.stack.pop();
                Err(BasicError::UndefinedStatement)
            }
        }
    }

    fn stmt_return(&mut self) -> Result<StmtResult> {
        let return_cursor = self.stack.pop_to_gosub()?;
        match return_cursor.line {
            None => {
                self.running = false;
                self.cursor = return_cursor;
            }
            Some(line) => {
                if self.program.contains(line) {
                    self.cursor = return_cursor;
                }
            }
        }
        Ok(StmtResult::Jump)
    }

    fn stmt_if(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (cond, mut p) = self.eval_expr(tokens, pos)?;
        let truthy = match cond {
            Value::Number(n) => n != 0.0,
            Value::Integer(n) => n != 0,
            Value::Str(r) => !self.strings.get(r).is_empty(),
        };
        skip_spaces(tokens, &mut p);
        if !match_keyword(tokens, &mut p, token::TOK_THEN, "THEN") && !match_keyword(tokens, &mut p, token::TOK_GOTO, "GOTO") {
            return Err(BasicError::SyntaxError);
        }
        if !truthy {
            return Ok(StmtResult::Continue(tokens.len()));
        }
        skip_spaces(tokens, &mut p);
        if p < tokens.len() && is_digit(tokens[p]) {
            let (n, _np) = self.eval_numeric(tokens, p)?;
            let target = numeric_to_line(n)?;
            let resolved = self.program.find_or_next(target).ok_or(BasicError::UndefinedStatement)?;
            self.jump_to_line(resolved);
            Ok(StmtResult::Jump)
        } else {
            self.execute_statement(tokens, p)
        }
    }

    fn stmt_on(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (idxf, mut p) = self.eval_numeric(tokens, pos)?;
        let index = idxf as i64;
        skip_spaces(tokens, &mut p);
        let is_gosub = if match_keyword(tokens, &mut p, token::TOK_GOTO, "GOTO") {
            false
        } else if match_keyword(tokens, &mut p, token::TOK_GOSUB, "GOSUB") {
            true
        } else {
            return Err(BasicError::SyntaxError);
        };

        let mut count = 0i64;
        let mut target_line: Option<u16> = None;
        loop {
            skip_spaces(tokens, &mut p);
            let (n, np) = self.eval_numeric(tokens, p)?;
            p = np;
            count += 1;
            if count == index {
                target_line = Some(numeric_to_line(n)?);
            }
            skip_spaces(tokens, &mut p);
            if tokens.get(p) == Some(&b',') {
                p += 1;
                continue;
            }
            break;
        }

        let Some(target_line) = target_line else {
            return Ok(StmtResult::Continue(p));
        };

        if is_gosub {
            self.stack.push_gosub(GosubFrame { return_cursor: Cursor::new(self.cursor.line, p) })?;
        }
        match self.program.find_or_next(target_line) {
            Some(resolved) => {
                self.jump_to_line(resolved);
                Ok(StmtResult::Jump)
            }
            None => {
                if is_gosub {
                    self.stack.pop();
                }
                Err(BasicError::UndefinedStatement)
            }
        }
    }

    fn stmt_for(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        let name_start = p;
        while tokens.get(p).map(|&c| token::is_ident_continue(c)).unwrap_or(false) {
            p += 1;
        }
        if p == name_start {
            return Err(BasicError::SyntaxError);
        }
        let var = VarName::parse(&String::from_utf8_lossy(&tokens[name_start..p]));
        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b'=') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        let (start, np) = self.eval_numeric(tokens, p)?;
        p = np;
        skip_spaces(tokens, &mut p);
        if !match_keyword(tokens, &mut p, token::TOK_TO, "TO") {
            return Err(BasicError::SyntaxError);
        }
        let (limit, np2) = self.eval_numeric(tokens, p)?;
        p = np2;
        skip_spaces(tokens, &mut p);
        let step = if match_keyword(tokens, &mut p, token::TOK_STEP, "STEP") {
            let (s, np3) = self.eval_numeric(tokens, p)?;
            p = np3;
            s
        } else {
            1.0
        };

        self.store_scalar(var, Value::Number(start))?;
        self.stack.push_for(ForFrame { var, limit, step, resume: Cursor::new(self.cursor.line, p) })?;
        Ok(StmtResult::Continue(p))
    }

    fn stmt_next(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        let var = if p < tokens.len() && is_letter(tokens[p]) {
            let name_start = p;
            while tokens.get(p).map(|&c| token::is_ident_continue(c)).unwrap_or(false) {
                p += 1;
            }
            Some(VarName::parse(&String::from_utf8_lossy(&tokens[name_start..p])))
        } else {
            None
        };

        let frame = self.stack.find_for(var)?;
        let current = match self.variables.get_scalar(frame.var) {
            Some(Value::Number(n)) => n,
            Some(Value::Integer(n)) => n as f64,
            _ => 0.0,
        };
        let updated = current + frame.step;
        self.store_scalar(frame.var, Value::Number(updated))?;

        let done = if frame.step >= 0.0 { updated > frame.limit } else { updated < frame.limit };
        if done {
            self.stack.pop_for(var)?;
            Ok(StmtResult::Continue(p))
        } else {
            self.cursor = frame.resume;
            if frame.resume.line.is_some() {
                self.running = true;
            }
            Ok(StmtResult::Jump)
        }
    }

    fn stmt_def(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        if !match_keyword(tokens, &mut p, token::TOK_FN, "FN") {
            return Err(BasicError::SyntaxError);
        }
        skip_spaces(tokens, &mut p);
        let fname = match tokens.get(p) {
            Some(&c) if is_letter(c) => c.to_ascii_uppercase(),
            _ => return Err(BasicError::SyntaxError),
        };
        p += 1;
        let name = VarName::parse(&(fname as char).to_string());

        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b'(') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        skip_spaces(tokens, &mut p);
        let pname = match tokens.get(p) {
            Some(&c) if is_letter(c) => c.to_ascii_uppercase(),
            _ => return Err(BasicError::SyntaxError),
        };
        p += 1;
        let param = VarName::parse(&(pname as char).to_string());

        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b')') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b'=') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;

        let body_start = p;
        let body_end = find_eos_quote_aware(tokens, body_start);
        let body = tokens[body_start..body_end].to_vec();
        self.functions.insert(name, UserFunction { param, body });
        Ok(StmtResult::Continue(body_end))
    }

    fn stmt_poke(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (addr, p1) = self.eval_numeric(tokens, pos)?;
        let mut p = p1;
        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b',') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        let (value, p2) = self.eval_numeric(tokens, p)?;
        p = p2;
        if addr >= 0.0 {
            self.memory.poke(addr as usize, value.clamp(0.0, 255.0) as u8);
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_wait(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (_, p1) = self.eval_numeric(tokens, pos)?;
        let mut p = p1;
        skip_spaces(tokens, &mut p);
        if tokens.get(p) != Some(&b',') {
            return Err(BasicError::SyntaxError);
        }
        p += 1;
        let (_, p2) = self.eval_numeric(tokens, p)?;
        p = p2;
        skip_spaces(tokens, &mut p);
        if tokens.get(p) == Some(&b',') {
            p += 1;
            let (_, p3) = self.eval_numeric(tokens, p)?;
            p = p3;
        }
        Ok(StmtResult::Continue(p))
    }

    fn stmt_null(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let (n, p) = self.eval_numeric(tokens, pos)?;
        if n.fract() != 0.0 || !(0.0..=255.0).contains(&n) {
            return Err(BasicError::IllegalQuantity);
        }
        self.terminal.null_count = n as usize;
        Ok(StmtResult::Continue(p))
    }

    fn stmt_list(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        let mut start: Option<u16> = None;
        let mut end: Option<u16> = None;
        if p < tokens.len() && is_digit(tokens[p]) {
            let (n, np) = self.eval_numeric(tokens, p)?;
            p = np;
            let line = numeric_to_line(n)?;
            start = Some(line);
            end = Some(line);
        }
        skip_spaces(tokens, &mut p);
        if tokens.get(p) == Some(&b'-') {
            p += 1;
            skip_spaces(tokens, &mut p);
            if p < tokens.len() && is_digit(tokens[p]) {
                let (n, np) = self.eval_numeric(tokens, p)?;
                p = np;
                end = Some(numeric_to_line(n)?);
            } else {
                end = Some(program::MAX_LINE_NUMBER);
            }
        }

        let lines: Vec<(u16, Vec<u8>)> = self.program.list_range(start, end).map(|(n, b)| (n, b.to_vec())).collect();
        for (num, body) in lines {
            let text = tokenizer::detokenize(&body);
            self.terminal.print_str(&mut self.output, &format!("{} {}", num, text));
            self.terminal.print_newline(&mut self.output);
        }
        Ok(StmtResult::Continue(p))
    }

    /// Shared reset performed by `CLEAR`, `RUN`, and (as part of a larger
    /// reset) `NEW`: wipe variables, arrays, user functions; reset the
    /// runtime stack, the data cursor, and the string heap.
    fn clear_variables(&mut self) {
        self.variables.clear();
        self.functions.clear();
        self.stack.clear();
        self.data.restore_to_start();
        self.strings.reset();
    }

    fn stmt_run(&mut self, tokens: &[u8], pos: usize) -> Result<StmtResult> {
        let mut p = pos;
        skip_spaces(tokens, &mut p);
        self.clear_variables();

        if p < tokens.len() && is_digit(tokens[p]) {
            let (n, np) = self.eval_numeric(tokens, p)?;
            p = np;
            let target = numeric_to_line(n)?;
            let resolved = self.program.find_or_next(target).ok_or(BasicError::UndefinedStatement)?;
            self.cursor = Cursor::new(Some(resolved), 0);
        } else if let Some(first) = self.program.first_line() {
            self.cursor = Cursor::new(Some(first), 0);
        } else {
            self.cursor = Cursor::new(None, 0);
        }
        self.running = true;
        self.can_continue = true;
        Ok(StmtResult::Jump)
    }

    fn stmt_clear(&mut self, pos: usize) -> Result<StmtResult> {
        self.clear_variables();
        Ok(StmtResult::Continue(pos))
    }

    fn stmt_new(&mut self, pos: usize) -> Result<StmtResult> {
        self.program.clear();
        self.clear_variables();
        self.cursor = Cursor::new(None, 0);
        self.running = false;
        self.can_continue = false;
        self.cont_cursor = None;
        Ok(StmtResult::Continue(pos))
    }
}
