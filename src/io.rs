//! Terminal collaborator traits (ambient I/O seam)
//!
//! The interpreter core never writes to `stdout` directly. [`Output`] is
//! the byte sink `PRINT` and `LIST` write through; [`LineSource`] is where
//! `INPUT`/`GET`/the REPL read a line from; [`BreakSignal`] lets a host
//! (the CLI's Ctrl-C handler, a test harness) interrupt a running `RUN`.
//! Keeping these as traits — rather than hard-wiring `std::io::stdin`/
//! `stdout` — is what makes the evaluator and dispatcher testable without
//! a real terminal.

/// A byte sink for interpreter output.
pub trait Output {
    fn put_byte(&mut self, b: u8);

    fn put_str(&mut self, s: &str) {
        for b in s.bytes() {
            self.put_byte(b);
        }
    }
}

/// Writes to `stdout`, flushing after every byte (matching the original's
/// `fflush` policy, needed so output appears promptly during `INPUT`).
#[derive(Debug, Default)]
pub struct StdOutput;

impl Output for StdOutput {
    fn put_byte(&mut self, b: u8) {
        use std::io::Write;
        let mut stdout = std::io::stdout();
        let _ = stdout.write_all(&[b]);
        let _ = stdout.flush();
    }
}

/// An in-memory sink, used by tests and by `LIST`-to-string callers.
#[derive(Debug, Default, Clone)]
pub struct BufferOutput {
    pub bytes: Vec<u8>,
}

impl Output for BufferOutput {
    fn put_byte(&mut self, b: u8) {
        self.bytes.push(b);
    }
}

impl BufferOutput {
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// Where `INPUT`/`GET`/the direct-mode prompt read a line of text from.
pub trait LineSource {
    /// `None` signals end-of-input (e.g. piped stdin exhausted), treated
    /// the same as `BREAK` by the statements that call it.
    fn read_line(&mut self) -> Option<String>;
}

/// Polled between statements so a long `RUN` can be interrupted.
pub trait BreakSignal {
    fn take_break(&mut self) -> bool;
}

/// A `BreakSignal` that never fires, for headless/test use.
#[derive(Debug, Default)]
pub struct NeverBreak;

impl BreakSignal for NeverBreak {
    fn take_break(&mut self) -> bool {
        false
    }
}
