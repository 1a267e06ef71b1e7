//! Interpreter core: the line driver and the `Host` seam (C10/C11)
//!
//! Ties every other module together into one runnable machine. Two
//! execution modes share the same statement engine: direct mode (typed at
//! the prompt, tokenized into a scratch buffer since it has no program
//! line to live in) and running mode (line-by-line over the `ProgramStore`,
//! driven by [`Interpreter::run`]). A `GOTO`/`GOSUB`/`RUN` issued from
//! direct mode hands straight into running mode rather than stopping at
//! end of line — a deliberate unification of the original's separate
//! "direct-mode jump" and "enter RUN" paths, licensed by the execution-mode
//! redesign flag.

use std::collections::HashMap;

use crate::builtins;
use crate::config::InterpreterConfig;
use crate::control::{Cursor, DataCursor, RuntimeStack};
use crate::dispatcher::StmtResult;
use crate::error::{BasicError, Result};
use crate::eval::{Evaluator, Host};
use crate::format::Terminal;
use crate::io::{BreakSignal, LineSource, Output};
use crate::memory::SimulatedMemory;
use crate::program::ProgramStore;
use crate::rnd::RndState;
use crate::strings::StringHeap;
use crate::tokenizer;
use crate::value::{VarName, Value};
use crate::variables::VariableStore;

/// A `DEF FN` user function: its single numeric parameter and tokenized
/// body expression.
#[derive(Debug, Clone)]
pub struct UserFunction {
    pub param: VarName,
    pub body: Vec<u8>,
}

/// The whole interpreter: program store, variable/string/array state,
/// control-flow stack, and the ambient collaborators (`Output`,
/// `LineSource`, `BreakSignal`) that let it run headless in tests.
pub struct Interpreter<O: Output, L: LineSource, B: BreakSignal> {
    pub program: ProgramStore,
    pub variables: VariableStore,
    pub strings: StringHeap,
    pub stack: RuntimeStack,
    pub data: DataCursor,
    pub memory: SimulatedMemory,
    pub terminal: Terminal,
    pub rnd: RndState,
    pub functions: HashMap<VarName, UserFunction>,
    pub config: InterpreterConfig,

    pub cursor: Cursor,
    /// Tokenized text of the line currently being executed in direct mode.
    /// Unlike program lines, direct-mode input has no home in
    /// `ProgramStore`, so it needs its own buffer.
    pub direct_buffer: Vec<u8>,
    pub running: bool,
    pub can_continue: bool,
    pub cont_cursor: Option<Cursor>,
    pub last_error: Option<BasicError>,
    pub error_line: Option<u16>,

    pub output: O,
    pub input: L,
    pub break_signal: B,
}

impl<O: Output, L: LineSource, B: BreakSignal> Interpreter<O, L, B> {
    pub fn new(config: InterpreterConfig, output: O, input: L, break_signal: B) -> Self {
        let memory = SimulatedMemory::new(config.memory_size);
        let strings = StringHeap::new(config.string_space_size);
        let terminal = Terminal::new(config.terminal_width, config.null_count);
        Interpreter {
            program: ProgramStore::new(),
            variables: VariableStore::new(),
            strings,
            stack: RuntimeStack::new(),
            data: DataCursor::new(),
            memory,
            terminal,
            rnd: RndState::new(),
            functions: HashMap::new(),
            config,
            cursor: Cursor::new(None, 0),
            direct_buffer: Vec::new(),
            running: false,
            can_continue: false,
            cont_cursor: None,
            last_error: None,
            error_line: None,
            output,
            input,
            break_signal,
        }
    }

    /// Set `cursor` to the start of `line` and enter (or stay in) running
    /// mode. Shared by every jump: `GOTO`, `GOSUB`, `ON...GOTO/GOSUB`,
    /// `IF...THEN <linenum>`, direct-mode `RUN`, and `NEXT`'s loop-back.
    pub fn jump_to_line(&mut self, line: u16) {
        self.cursor = Cursor::new(Some(line), 0);
        self.running = true;
    }

    /// Parse `NNNN <rest>` (digits already confirmed present) and either
    /// store or delete the program line.
    fn store_program_line(&mut self, line: &str) {
        let digits_end = line.find(|c: char| !c.is_ascii_digit()).unwrap_or(line.len());
        let line_num: u16 = line[..digits_end].parse().unwrap_or(0);
        let rest = line[digits_end..].trim_start_matches(' ');
        let body = if rest.is_empty() { Vec::new() } else { tokenizer::tokenize(rest) };
        self.program.store_line(line_num, body);
    }

    /// Execute one line of direct-mode input: a bare `NNNN ...` edits the
    /// program; anything else tokenizes and runs as a direct statement,
    /// handing off into [`Self::run`] if it enters running mode (`RUN`,
    /// `GOTO`, `GOSUB`, `CONT`, ...).
    pub fn execute_line(&mut self, line: &str) -> Result<()> {
        let trimmed = line.trim_start_matches(' ');
        if trimmed.chars().next().map(|c| c.is_ascii_digit()).unwrap_or(false) {
            self.store_program_line(trimmed);
            return Ok(());
        }

        self.direct_buffer = tokenizer::tokenize(trimmed);
        self.cursor = Cursor::new(None, 0);
        self.running = false;

        while self.cursor.offset < self.direct_buffer.len() && !self.running {
            let tokens = self.direct_buffer.clone();
            match self.execute_statement(&tokens, self.cursor.offset) {
                Ok(StmtResult::Jump) => {
                    self.strings.statement_boundary();
                }
                Ok(StmtResult::Continue(mut pos)) => {
                    self.strings.statement_boundary();
                    crate::dispatcher::skip_spaces(&tokens, &mut pos);
                    if tokens.get(pos) == Some(&b':') {
                        pos += 1;
                    }
                    self.cursor.offset = pos;
                }
                Err(e) => {
                    self.report_error(e);
                    return Err(e);
                }
            }
        }

        if self.running {
            self.run()
        } else {
            Ok(())
        }
    }

    /// The running-mode line driver: executes statements from `cursor`
    /// onward, advancing to the next stored line at end-of-line, until
    /// `END`/`STOP`/an error/a `Ctrl-C` break stops it.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            let Some(line) = self.cursor.line else {
                self.running = false;
                break;
            };
            let Some(tokens) = self.program.get(line).map(|b| b.to_vec()) else {
                self.running = false;
                break;
            };

            if self.cursor.offset >= tokens.len() {
                match self.program.next_after(line) {
                    Some(next) => {
                        self.cursor = Cursor::new(Some(next), 0);
                        continue;
                    }
                    None => {
                        self.running = false;
                        break;
                    }
                }
            }

            if self.break_signal.take_break() {
                self.report_error(BasicError::Break);
                return Err(BasicError::Break);
            }

            match self.execute_statement(&tokens, self.cursor.offset) {
                Ok(StmtResult::Jump) => {
                    self.strings.statement_boundary();
                }
                Ok(StmtResult::Continue(mut pos)) => {
                    self.strings.statement_boundary();
                    crate::dispatcher::skip_spaces(&tokens, &mut pos);
                    if tokens.get(pos) == Some(&b':') {
                        pos += 1;
                    }
                    self.cursor.offset = pos;
                }
                Err(e) => {
                    self.report_error(e);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Record an error's stopping point and print it. Only `BREAK` leaves
    /// `CONT` usable afterward; every other error clears it.
    fn report_error(&mut self, err: BasicError) {
        self.running = false;
        self.last_error = Some(err);
        self.error_line = self.cursor.line;
        if err.allows_continue() {
            self.can_continue = true;
            self.cont_cursor = Some(self.cursor);
        } else {
            self.can_continue = false;
            self.cont_cursor = None;
        }
        self.terminal.print_newline(&mut self.output);
        let msg = err.format_long(self.error_line);
        self.terminal.print_str(&mut self.output, &msg);
        self.terminal.print_newline(&mut self.output);
    }

    // --- Expression evaluation helpers ----------------------------------

    /// Evaluate an expression starting at `pos`, returning its value and
    /// the position just past it.
    pub fn eval_expr(&mut self, tokens: &[u8], pos: usize) -> Result<(Value, usize)> {
        let mut ev = Evaluator::new(tokens, pos, self);
        let v = ev.eval()?;
        let p = ev.position();
        Ok((v, p))
    }

    pub fn eval_numeric(&mut self, tokens: &[u8], pos: usize) -> Result<(f64, usize)> {
        let (v, p) = self.eval_expr(tokens, pos)?;
        match v {
            Value::Number(n) => Ok((n, p)),
            Value::Integer(n) => Ok((n as f64, p)),
            Value::Str(_) => Err(BasicError::TypeMismatch),
        }
    }

    /// Evaluate a string expression, returning an owned copy (so the
    /// caller is free to take `&mut self.strings` right afterward without
    /// fighting the borrow checker).
    pub fn eval_string(&mut self, tokens: &[u8], pos: usize) -> Result<(String, usize)> {
        let (v, p) = self.eval_expr(tokens, pos)?;
        match v {
            Value::Str(r) => Ok((self.strings.get(r).to_string(), p)),
            Value::Number(_) | Value::Integer(_) => Err(BasicError::TypeMismatch),
        }
    }

    /// Read a builtin/evaluator argument already known to be a string,
    /// returning an owned copy for the same reason as [`Self::eval_string`].
    pub(crate) fn arg_str_owned(&self, args: &[Value], i: usize) -> Result<String> {
        match args.get(i) {
            Some(Value::Str(r)) => Ok(self.strings.get(*r).to_string()),
            Some(_) => Err(BasicError::TypeMismatch),
            None => Err(BasicError::SyntaxError),
        }
    }

    /// Copy a [`Value`] for storage into a variable/array slot: numbers
    /// pass through, strings get a fresh Assigned copy on the heap so the
    /// slot does not alias whatever temporary produced the value.
    fn copy_into_heap(&mut self, value: Value) -> Result<Value> {
        match value {
            Value::Str(r) => {
                let s = self.strings.get(r).to_string();
                Ok(Value::Str(self.strings.alloc_assigned(&s)?))
            }
            other => Ok(other),
        }
    }

    pub(crate) fn store_scalar(&mut self, name: VarName, value: Value) -> Result<()> {
        if name.is_string() != value.is_string() {
            return Err(BasicError::TypeMismatch);
        }
        let value = self.copy_into_heap(value)?;
        self.variables.set_scalar(name, value);
        Ok(())
    }

    pub(crate) fn store_array(&mut self, name: VarName, indices: &[usize], value: Value) -> Result<()> {
        if name.is_string() != value.is_string() {
            return Err(BasicError::TypeMismatch);
        }
        let value = self.copy_into_heap(value)?;
        self.variables.set_array_element(name, indices, value)
    }

    // --- Builtin / user-function dispatch --------------------------------

    fn call_builtin_impl(&mut self, token: u8, args: &[Value]) -> Result<Value> {
        use crate::token::*;
        let num = |args: &[Value], i: usize| -> Result<f64> {
            match args.get(i) {
                Some(Value::Number(n)) => Ok(*n),
                Some(Value::Integer(n)) => Ok(*n as f64),
                Some(Value::Str(_)) => Err(BasicError::TypeMismatch),
                None => Err(BasicError::SyntaxError),
            }
        };

        match token {
            TOK_SGN => Ok(Value::Number(builtins::sgn(num(args, 0)?))),
            TOK_INT => Ok(Value::Number(builtins::int(num(args, 0)?))),
            TOK_ABS => Ok(Value::Number(builtins::abs(num(args, 0)?))),
            TOK_USR => Ok(Value::Number(builtins::usr(num(args, 0)?))),
            TOK_FRE => Ok(Value::Number(builtins::fre(self.strings.available()))),
            TOK_POS => Ok(Value::Number(builtins::pos(self.terminal.column))),
            TOK_SQR => Ok(Value::Number(builtins::sqr(num(args, 0)?)?)),
            TOK_RND => Ok(Value::Number(builtins::rnd(&mut self.rnd, num(args, 0)?))),
            TOK_LOG => Ok(Value::Number(builtins::log(num(args, 0)?)?)),
            TOK_EXP => Ok(Value::Number(builtins::exp(num(args, 0)?))),
            TOK_COS => Ok(Value::Number(builtins::cos(num(args, 0)?))),
            TOK_SIN => Ok(Value::Number(builtins::sin(num(args, 0)?))),
            TOK_TAN => Ok(Value::Number(builtins::tan(num(args, 0)?))),
            TOK_ATN => Ok(Value::Number(builtins::atn(num(args, 0)?))),
            TOK_PEEK => Ok(Value::Number(builtins::peek(&self.memory, num(args, 0)? as i64))),
            TOK_LEN => Ok(Value::Number(builtins::len(&self.arg_str_owned(args, 0)?))),
            TOK_STRS => Ok(Value::Str(builtins::str_(&mut self.strings, num(args, 0)?)?)),
            TOK_VAL => Ok(Value::Number(builtins::val(&self.arg_str_owned(args, 0)?))),
            TOK_ASC => Ok(Value::Number(builtins::asc(&self.arg_str_owned(args, 0)?)?)),
            TOK_CHRS => Ok(Value::Str(builtins::chr(&mut self.strings, num(args, 0)?)?)),
            TOK_LEFTS => {
                let s = self.arg_str_owned(args, 0)?;
                Ok(Value::Str(builtins::left(&mut self.strings, &s, num(args, 1)?)?))
            }
            TOK_RIGHTS => {
                let s = self.arg_str_owned(args, 0)?;
                Ok(Value::Str(builtins::right(&mut self.strings, &s, num(args, 1)?)?))
            }
            TOK_MIDS => {
                let s = self.arg_str_owned(args, 0)?;
                let start = num(args, 1)?;
                let len = if args.len() > 2 { Some(num(args, 2)?) } else { None };
                Ok(Value::Str(builtins::mid(&mut self.strings, &s, start, len)?))
            }
            _ => Err(BasicError::SyntaxError),
        }
    }

    fn call_user_function_impl(&mut self, name: VarName, arg: Value) -> Result<Value> {
        let func = self.functions.get(&name).cloned().ok_or(BasicError::UndefinedFunction)?;
        if arg.is_string() {
            return Err(BasicError::TypeMismatch);
        }
        let old_value = self.variables.get_scalar(func.param);
        self.variables.set_scalar(func.param, arg);

        let result = self.eval_numeric(&func.body, 0).map(|(n, _)| Value::Number(n));

        if let Some(v) = old_value {
            self.variables.set_scalar(func.param, v);
        }
        result
    }
}

impl<O: Output, L: LineSource, B: BreakSignal> Host for Interpreter<O, L, B> {
    fn get_scalar(&self, name: VarName) -> Value {
        self.variables.get_scalar(name).unwrap_or_else(|| {
            if name.is_string() {
                Value::Str(crate::strings::StringRef::empty())
            } else {
                Value::Number(0.0)
            }
        })
    }

    fn array_element(&mut self, name: VarName, indices: &[usize]) -> Result<Value> {
        self.variables.get_array_element(name, indices)
    }

    fn read_string(&self, r: crate::strings::StringRef) -> &str {
        self.strings.get(r)
    }

    fn new_temp_string(&mut self, s: &str) -> Result<crate::strings::StringRef> {
        self.strings.alloc_temporary(s)
    }

    fn call_builtin(&mut self, token: u8, args: &[Value]) -> Result<Value> {
        self.call_builtin_impl(token, args)
    }

    fn call_user_function(&mut self, name: VarName, arg: Value) -> Result<Value> {
        self.call_user_function_impl(name, arg)
    }
}
