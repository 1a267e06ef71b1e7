//! Error taxonomy for the BASIC interpreter
//!
//! Every fallible operation in the core returns a tagged [`BasicError`]
//! instead of a raw string or a sentinel integer code. The variant set
//! mirrors the classic two-letter Microsoft BASIC error codes so that
//! user-visible messages match the historical dialect exactly.

use std::fmt;

/// Result type used throughout the interpreter core.
pub type Result<T> = std::result::Result<T, BasicError>;

/// Tagged error taxonomy matching the two-letter BASIC error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicError {
    /// NEXT WITHOUT FOR
    NextWithoutFor,
    /// SYNTAX ERROR
    SyntaxError,
    /// RETURN WITHOUT GOSUB
    ReturnWithoutGosub,
    /// OUT OF DATA
    OutOfData,
    /// ILLEGAL QUANTITY
    IllegalQuantity,
    /// OVERFLOW
    Overflow,
    /// OUT OF MEMORY
    OutOfMemory,
    /// UNDEF'D STATEMENT
    UndefinedStatement,
    /// BAD SUBSCRIPT
    BadSubscript,
    /// REDIM'D ARRAY
    RedimensionedArray,
    /// DIVISION BY ZERO
    DivisionByZero,
    /// ILLEGAL DIRECT
    IllegalDirect,
    /// TYPE MISMATCH
    TypeMismatch,
    /// STRING TOO LONG
    StringTooLong,
    /// FILE DATA ERROR
    FileDataError,
    /// FORMULA TOO COMPLEX
    FormulaTooComplex,
    /// CAN'T CONTINUE
    CantContinue,
    /// UNDEF'D FUNCTION
    UndefinedFunction,
    /// BREAK
    Break,
}

impl BasicError {
    /// The classic two-letter short code (e.g. `"NF"`, `"/0"`).
    pub fn short_code(self) -> &'static str {
        use BasicError::*;
        match self {
            NextWithoutFor => "NF",
            SyntaxError => "SN",
            ReturnWithoutGosub => "RG",
            OutOfData => "OD",
            IllegalQuantity => "FC",
            Overflow => "OV",
            OutOfMemory => "OM",
            UndefinedStatement => "US",
            BadSubscript => "BS",
            RedimensionedArray => "DD",
            DivisionByZero => "/0",
            IllegalDirect => "ID",
            TypeMismatch => "TM",
            StringTooLong => "LS",
            FileDataError => "FD",
            FormulaTooComplex => "ST",
            CantContinue => "CN",
            UndefinedFunction => "UF",
            Break => "BR",
        }
    }

    /// The long descriptive message (e.g. `"NEXT WITHOUT FOR"`).
    pub fn long_message(self) -> &'static str {
        use BasicError::*;
        match self {
            NextWithoutFor => "NEXT WITHOUT FOR",
            SyntaxError => "SYNTAX ERROR",
            ReturnWithoutGosub => "RETURN WITHOUT GOSUB",
            OutOfData => "OUT OF DATA",
            IllegalQuantity => "ILLEGAL QUANTITY",
            Overflow => "OVERFLOW",
            OutOfMemory => "OUT OF MEMORY",
            UndefinedStatement => "UNDEF'D STATEMENT",
            BadSubscript => "BAD SUBSCRIPT",
            RedimensionedArray => "REDIM'D ARRAY",
            DivisionByZero => "DIVISION BY ZERO",
            IllegalDirect => "ILLEGAL DIRECT",
            TypeMismatch => "TYPE MISMATCH",
            StringTooLong => "STRING TOO LONG",
            FileDataError => "FILE DATA ERROR",
            FormulaTooComplex => "FORMULA TOO COMPLEX",
            CantContinue => "CAN'T CONTINUE",
            UndefinedFunction => "UNDEF'D FUNCTION",
            Break => "BREAK",
        }
    }

    /// `true` for the one error that leaves continuation (`CONT`) enabled.
    pub fn allows_continue(self) -> bool {
        matches!(self, BasicError::Break)
    }

    /// Format the short form (`?XX` or `?XX IN n`) as emitted by the REPL.
    pub fn format_short(self, current_line: Option<u16>) -> String {
        format_error(&format!("?{}", self.short_code()), current_line)
    }

    /// Format the long form (`?MESSAGE` or `?MESSAGE IN n`) as emitted by the REPL.
    pub fn format_long(self, current_line: Option<u16>) -> String {
        format_error(&format!("?{}", self.long_message()), current_line)
    }
}

fn format_error(prefix: &str, current_line: Option<u16>) -> String {
    match current_line {
        Some(n) if n > 0 => format!("{} IN {}", prefix, n),
        _ => prefix.to_string(),
    }
}

impl fmt::Display for BasicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.long_message())
    }
}

impl std::error::Error for BasicError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_codes_match_table() {
        assert_eq!(BasicError::NextWithoutFor.short_code(), "NF");
        assert_eq!(BasicError::DivisionByZero.short_code(), "/0");
        assert_eq!(BasicError::Break.short_code(), "BR");
    }

    #[test]
    fn format_includes_line_when_positive() {
        assert_eq!(BasicError::SyntaxError.format_short(Some(20)), "?SN IN 20");
        assert_eq!(BasicError::SyntaxError.format_short(Some(0)), "?SN");
        assert_eq!(BasicError::SyntaxError.format_short(None), "?SN");
    }

    #[test]
    fn only_break_allows_continue() {
        assert!(BasicError::Break.allows_continue());
        assert!(!BasicError::SyntaxError.allows_continue());
        assert!(!BasicError::CantContinue.allows_continue());
    }
}
