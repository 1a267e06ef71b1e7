//! Control-flow engine: runtime stack, cursor, and data pointer (C8)
//!
//! Cursors are `(line_identifier, byte_offset)` pairs, never raw pointers
//! into a tokenized buffer — a buffer can be reallocated or a line can be
//! deleted out from under a saved frame, which a raw pointer would not
//! survive (see the redesign flag in `spec.md` §9). Deleting a line a
//! frame refers to does not corrupt anything; the frame simply becomes
//! unusable and is caught (as `ERR_US`) the next time control tries to
//! resume it.

use crate::error::{BasicError, Result};
use crate::value::VarName;

pub const MAX_STACK_DEPTH: usize = 512;

/// A position in the token stream: `None` line means the direct-mode
/// input buffer rather than a stored program line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub line: Option<u16>,
    pub offset: usize,
}

impl Cursor {
    pub fn new(line: Option<u16>, offset: usize) -> Self {
        Cursor { line, offset }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForFrame {
    pub var: VarName,
    pub limit: f64,
    pub step: f64,
    pub resume: Cursor,
}

#[derive(Debug, Clone, Copy)]
pub struct GosubFrame {
    pub return_cursor: Cursor,
}

#[derive(Debug, Clone, Copy)]
pub enum Frame {
    For(ForFrame),
    Gosub(GosubFrame),
}

/// Bounded LIFO runtime stack shared by `FOR`/`NEXT` and `GOSUB`/`RETURN`.
#[derive(Debug, Default)]
pub struct RuntimeStack {
    frames: Vec<Frame>,
}

impl RuntimeStack {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, frame: Frame) -> Result<()> {
        if self.frames.len() >= MAX_STACK_DEPTH {
            return Err(BasicError::OutOfMemory);
        }
        log::trace!("push frame, depth now {}", self.frames.len() + 1);
        self.frames.push(frame);
        Ok(())
    }

    /// `FOR`: discard any existing `ForFrame` for `var` (and everything
    /// pushed above it), then push the new one.
    pub fn push_for(&mut self, frame: ForFrame) -> Result<()> {
        if let Some(idx) = self.frames.iter().position(|f| matches!(f, Frame::For(f) if f.var == frame.var)) {
            self.frames.truncate(idx);
        }
        self.push(Frame::For(frame))
    }

    pub fn push_gosub(&mut self, frame: GosubFrame) -> Result<()> {
        self.push(Frame::Gosub(frame))
    }

    /// `NEXT [v]`: locate the topmost `ForFrame` (matching `v` if given,
    /// else nearest). Returns the frame without popping it — the caller
    /// updates the loop variable and decides whether to pop (loop done)
    /// or resume (loop continues).
    pub fn find_for(&self, var: Option<VarName>) -> Result<ForFrame> {
        self.frames
            .iter()
            .rev()
            .find_map(|f| match f {
                Frame::For(ff) if var.is_none() || var == Some(ff.var) => Some(*ff),
                _ => None,
            })
            .ok_or(BasicError::NextWithoutFor)
    }

    /// Pop the matched `ForFrame` located by [`find_for`] (loop complete).
    pub fn pop_for(&mut self, var: Option<VarName>) -> Result<()> {
        let idx = self
            .frames
            .iter()
            .rposition(|f| matches!(f, Frame::For(ff) if var.is_none() || var == Some(ff.var)))
            .ok_or(BasicError::NextWithoutFor)?;
        log::trace!("pop for-frame, depth now {idx}");
        self.frames.truncate(idx);
        Ok(())
    }

    /// `RETURN`: pop down to (and including) the nearest `GosubFrame`,
    /// discarding any `ForFrame`s above it.
    pub fn pop_to_gosub(&mut self) -> Result<Cursor> {
        let idx = self
            .frames
            .iter()
            .rposition(|f| matches!(f, Frame::Gosub(_)))
            .ok_or(BasicError::ReturnWithoutGosub)?;
        let cursor = match self.frames[idx] {
            Frame::Gosub(g) => g.return_cursor,
            Frame::For(_) => unreachable!(),
        };
        log::trace!("pop to gosub-frame, depth now {idx}");
        self.frames.truncate(idx);
        Ok(cursor)
    }

    /// Pop the most recently pushed frame unconditionally (used to unwind
    /// a just-pushed `GosubFrame` when the target line turns out missing).
    pub fn pop(&mut self) {
        self.frames.pop();
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

/// Position of the next `DATA` item to `READ`.
///
/// `READ`'s data cursor walks raw (untokenized beyond the `DATA`/string
/// rules) line text looking for the next value, and must distinguish "never
/// touched" from "scanned off the end of the program": collapsing those
/// into a single `Option<Cursor>` would make a `READ` run past the last
/// `DATA` statement re-scan from the top and loop forever instead of
/// raising `OUT OF DATA`, which is the `Start`/`ScanFrom`/`Exhausted` split
/// below exists to avoid.
#[derive(Debug, Clone, Copy)]
pub enum DataCursor {
    /// Never touched: scan from the program's first line.
    Start,
    /// Scan forward from `line` (or the program's start, if `None`) for the
    /// next `DATA` token.
    ScanFrom(Option<u16>),
    /// An exact pending-value byte offset within a line.
    Pending(Cursor),
    /// Scanned past the last line without finding more data; further
    /// `READ`s are `OUT OF DATA` until a `RESTORE`.
    Exhausted,
}

impl Default for DataCursor {
    fn default() -> Self {
        DataCursor::Start
    }
}

impl DataCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// `RESTORE` with no argument: back to the very start of the program.
    pub fn restore_to_start(&mut self) {
        *self = DataCursor::ScanFrom(None);
    }

    /// `RESTORE n`: back to the start of line `n`.
    pub fn restore_to_line(&mut self, line: u16) {
        *self = DataCursor::ScanFrom(Some(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(n: &str) -> VarName {
        VarName::parse(n)
    }

    #[test]
    fn for_next_basic_push_find() {
        let mut stack = RuntimeStack::new();
        stack
            .push_for(ForFrame { var: var("I"), limit: 10.0, step: 1.0, resume: Cursor::new(Some(10), 5) })
            .unwrap();
        let frame = stack.find_for(None).unwrap();
        assert_eq!(frame.limit, 10.0);
    }

    #[test]
    fn next_without_for_errors() {
        let stack = RuntimeStack::new();
        assert_eq!(stack.find_for(None), Err(BasicError::NextWithoutFor));
    }

    #[test]
    fn reentrant_for_discards_previous_and_nested() {
        let mut stack = RuntimeStack::new();
        stack
            .push_for(ForFrame { var: var("I"), limit: 5.0, step: 1.0, resume: Cursor::new(Some(10), 0) })
            .unwrap();
        stack
            .push_gosub(GosubFrame { return_cursor: Cursor::new(Some(20), 0) })
            .unwrap();
        stack
            .push_for(ForFrame { var: var("I"), limit: 9.0, step: 1.0, resume: Cursor::new(Some(30), 0) })
            .unwrap();
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn return_discards_for_frames_above_gosub() {
        let mut stack = RuntimeStack::new();
        stack
            .push_gosub(GosubFrame { return_cursor: Cursor::new(Some(10), 3) })
            .unwrap();
        stack
            .push_for(ForFrame { var: var("I"), limit: 5.0, step: 1.0, resume: Cursor::new(Some(20), 0) })
            .unwrap();
        let cursor = stack.pop_to_gosub().unwrap();
        assert_eq!(cursor, Cursor::new(Some(10), 3));
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn return_without_gosub_errors() {
        let mut stack = RuntimeStack::new();
        assert_eq!(stack.pop_to_gosub(), Err(BasicError::ReturnWithoutGosub));
    }

    #[test]
    fn stack_overflow_is_out_of_memory() {
        let mut stack = RuntimeStack::new();
        for i in 0..MAX_STACK_DEPTH {
            stack
                .push_gosub(GosubFrame { return_cursor: Cursor::new(Some(i as u16 + 1), 0) })
                .unwrap();
        }
        assert_eq!(
            stack.push_gosub(GosubFrame { return_cursor: Cursor::new(Some(1), 0) }),
            Err(BasicError::OutOfMemory)
        );
    }
}
