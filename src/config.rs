//! Runtime configuration (C13 ambient concern)
//!
//! Every knob here has a historical default transcribed from the original
//! dialect's constants, but all are overridable from the CLI so the
//! interpreter can be embedded with a different memory size or terminal
//! width without touching the core.

/// Tunable limits and terminal geometry, with the classic dialect's
/// defaults.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpreterConfig {
    /// Size in bytes of the simulated `PEEK`/`POKE` address space.
    pub memory_size: usize,
    /// String heap capacity in bytes.
    pub string_space_size: usize,
    /// Columns before an automatic line wrap.
    pub terminal_width: usize,
    /// Extra null bytes emitted after each newline (slow-terminal padding;
    /// `0` disables it).
    pub null_count: usize,
    /// Maximum depth of the combined `FOR`/`GOSUB` runtime stack.
    pub stack_size: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            memory_size: 65536,
            string_space_size: 16384,
            terminal_width: 80,
            null_count: 0,
            stack_size: crate::control::MAX_STACK_DEPTH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_historical_constants() {
        let cfg = InterpreterConfig::default();
        assert_eq!(cfg.memory_size, 65536);
        assert_eq!(cfg.terminal_width, 80);
        assert_eq!(cfg.stack_size, 512);
    }
}
