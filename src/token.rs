//! Token table and character classifiers (C1)
//!
//! The fixed reserved-word table and the single-byte token codes the
//! tokenizer (C2) crunches source text into. Tokens occupy `0x80..=0xFF`;
//! anything below `0x80` is a literal source byte (ASCII, uppercased
//! outside quoted strings and `DATA`/`REM` payloads).

/// A reserved word and the token byte it crunches to.
///
/// The table order is the matching order: where one reserved word is a
/// prefix of another (none currently are, but the contract must hold for
/// any future addition) the longer word must appear first so the
/// longest-match rule in [`crate::tokenizer::tokenize`] is preserved.
pub struct ReservedWord {
    pub word: &'static str,
    pub token: u8,
}

macro_rules! tokens {
    ( $( $name:ident = $word:literal ),* $(,)? ) => {
        tokens!(@assign 0x80u8; $($name = $word),*);
    };
    (@assign $val:expr; $name:ident = $word:literal $(, $rest_name:ident = $rest_word:literal)*) => {
        pub const $name: u8 = $val;
        tokens!(@assign $val + 1; $($rest_name = $rest_word),*);
    };
    (@assign $val:expr;) => {};
}

// Statement tokens (order matches the original dispatch table).
tokens! {
    TOK_END = "END",
    TOK_FOR = "FOR",
    TOK_NEXT = "NEXT",
    TOK_DATA = "DATA",
    TOK_INPUT = "INPUT",
    TOK_DIM = "DIM",
    TOK_READ = "READ",
    TOK_LET = "LET",
    TOK_GOTO = "GOTO",
    TOK_RUN = "RUN",
    TOK_IF = "IF",
    TOK_RESTORE = "RESTORE",
    TOK_GOSUB = "GOSUB",
    TOK_RETURN = "RETURN",
    TOK_REM = "REM",
    TOK_STOP = "STOP",
    TOK_ON = "ON",
    TOK_NULL = "NULL",
    TOK_WAIT = "WAIT",
    TOK_LOAD = "LOAD",
    TOK_SAVE = "SAVE",
    TOK_VERIFY = "VERIFY",
    TOK_DEF = "DEF",
    TOK_POKE = "POKE",
    TOK_PRINT = "PRINT",
    TOK_CONT = "CONT",
    TOK_LIST = "LIST",
    TOK_CLEAR = "CLEAR",
    TOK_GET = "GET",
    TOK_NEW = "NEW",
    // Auxiliary keywords.
    TOK_TAB = "TAB(",
    TOK_TO = "TO",
    TOK_FN = "FN",
    TOK_SPC = "SPC(",
    TOK_THEN = "THEN",
    TOK_NOT = "NOT",
    TOK_STEP = "STEP",
    TOK_AND = "AND",
    TOK_OR = "OR",
    // Functions (numeric and string).
    TOK_SGN = "SGN",
    TOK_INT = "INT",
    TOK_ABS = "ABS",
    TOK_USR = "USR",
    TOK_FRE = "FRE",
    TOK_POS = "POS",
    TOK_SQR = "SQR",
    TOK_RND = "RND",
    TOK_LOG = "LOG",
    TOK_EXP = "EXP",
    TOK_COS = "COS",
    TOK_SIN = "SIN",
    TOK_TAN = "TAN",
    TOK_ATN = "ATN",
    TOK_PEEK = "PEEK",
    TOK_LEN = "LEN",
    TOK_STRS = "STR$",
    TOK_VAL = "VAL",
    TOK_ASC = "ASC",
    TOK_CHRS = "CHR$",
    TOK_LEFTS = "LEFT$",
    TOK_RIGHTS = "RIGHT$",
    TOK_MIDS = "MID$",
}

/// The full reserved-word table, in matching order.
pub static RESERVED_WORDS: &[ReservedWord] = &[
    ReservedWord { word: "END", token: TOK_END },
    ReservedWord { word: "FOR", token: TOK_FOR },
    ReservedWord { word: "NEXT", token: TOK_NEXT },
    ReservedWord { word: "DATA", token: TOK_DATA },
    ReservedWord { word: "INPUT", token: TOK_INPUT },
    ReservedWord { word: "DIM", token: TOK_DIM },
    ReservedWord { word: "READ", token: TOK_READ },
    ReservedWord { word: "LET", token: TOK_LET },
    ReservedWord { word: "GOTO", token: TOK_GOTO },
    ReservedWord { word: "RUN", token: TOK_RUN },
    ReservedWord { word: "IF", token: TOK_IF },
    ReservedWord { word: "RESTORE", token: TOK_RESTORE },
    ReservedWord { word: "GOSUB", token: TOK_GOSUB },
    ReservedWord { word: "RETURN", token: TOK_RETURN },
    ReservedWord { word: "REM", token: TOK_REM },
    ReservedWord { word: "STOP", token: TOK_STOP },
    ReservedWord { word: "ON", token: TOK_ON },
    ReservedWord { word: "NULL", token: TOK_NULL },
    ReservedWord { word: "WAIT", token: TOK_WAIT },
    ReservedWord { word: "LOAD", token: TOK_LOAD },
    ReservedWord { word: "SAVE", token: TOK_SAVE },
    ReservedWord { word: "VERIFY", token: TOK_VERIFY },
    ReservedWord { word: "DEF", token: TOK_DEF },
    ReservedWord { word: "POKE", token: TOK_POKE },
    ReservedWord { word: "PRINT", token: TOK_PRINT },
    ReservedWord { word: "CONT", token: TOK_CONT },
    ReservedWord { word: "LIST", token: TOK_LIST },
    ReservedWord { word: "CLEAR", token: TOK_CLEAR },
    ReservedWord { word: "GET", token: TOK_GET },
    ReservedWord { word: "NEW", token: TOK_NEW },
    ReservedWord { word: "TAB(", token: TOK_TAB },
    ReservedWord { word: "TO", token: TOK_TO },
    ReservedWord { word: "FN", token: TOK_FN },
    ReservedWord { word: "SPC(", token: TOK_SPC },
    ReservedWord { word: "THEN", token: TOK_THEN },
    ReservedWord { word: "NOT", token: TOK_NOT },
    ReservedWord { word: "STEP", token: TOK_STEP },
    ReservedWord { word: "AND", token: TOK_AND },
    ReservedWord { word: "OR", token: TOK_OR },
    ReservedWord { word: "SGN", token: TOK_SGN },
    ReservedWord { word: "INT", token: TOK_INT },
    ReservedWord { word: "ABS", token: TOK_ABS },
    ReservedWord { word: "USR", token: TOK_USR },
    ReservedWord { word: "FRE", token: TOK_FRE },
    ReservedWord { word: "POS", token: TOK_POS },
    ReservedWord { word: "SQR", token: TOK_SQR },
    ReservedWord { word: "RND", token: TOK_RND },
    ReservedWord { word: "LOG", token: TOK_LOG },
    ReservedWord { word: "EXP", token: TOK_EXP },
    ReservedWord { word: "COS", token: TOK_COS },
    ReservedWord { word: "SIN", token: TOK_SIN },
    ReservedWord { word: "TAN", token: TOK_TAN },
    ReservedWord { word: "ATN", token: TOK_ATN },
    ReservedWord { word: "PEEK", token: TOK_PEEK },
    ReservedWord { word: "LEN", token: TOK_LEN },
    ReservedWord { word: "STR$", token: TOK_STRS },
    ReservedWord { word: "VAL", token: TOK_VAL },
    ReservedWord { word: "ASC", token: TOK_ASC },
    ReservedWord { word: "CHR$", token: TOK_CHRS },
    ReservedWord { word: "LEFT$", token: TOK_LEFTS },
    ReservedWord { word: "RIGHT$", token: TOK_RIGHTS },
    ReservedWord { word: "MID$", token: TOK_MIDS },
];

/// Look up the canonical spelling for a token byte (detokenization).
pub fn token_name(tok: u8) -> Option<&'static str> {
    RESERVED_WORDS.iter().find(|rw| rw.token == tok).map(|rw| rw.word)
}

/// `true` if `b` is a token byte (reserved word, not a literal source char).
pub fn is_token(b: u8) -> bool {
    b >= 0x80
}

/// `true` for ASCII letters `A-Z`/`a-z`.
pub fn is_letter(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

/// `true` for ASCII digits `0-9`.
pub fn is_digit(c: u8) -> bool {
    c.is_ascii_digit()
}

/// `true` for characters that may continue an identifier after its first letter.
pub fn is_ident_continue(c: u8) -> bool {
    is_letter(c) || is_digit(c)
}

/// `true` if `c` ends a statement: `:`, end of line, or an unset byte.
pub fn is_end_of_statement(c: Option<u8>) -> bool {
    matches!(c, None | Some(b':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_bytes_are_in_range() {
        for rw in RESERVED_WORDS {
            assert!(rw.token >= 0x80);
        }
    }

    #[test]
    fn token_bytes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for rw in RESERVED_WORDS {
            assert!(seen.insert(rw.token), "duplicate token byte for {}", rw.word);
        }
    }

    #[test]
    fn round_trip_name_lookup() {
        assert_eq!(token_name(TOK_PRINT), Some("PRINT"));
        assert_eq!(token_name(TOK_GOTO), Some("GOTO"));
        assert_eq!(token_name(0xFF), None);
    }

    #[test]
    fn classifiers() {
        assert!(is_letter(b'A'));
        assert!(!is_letter(b'1'));
        assert!(is_digit(b'9'));
        assert!(is_ident_continue(b'Z'));
        assert!(is_end_of_statement(None));
        assert!(is_end_of_statement(Some(b':')));
        assert!(!is_end_of_statement(Some(b'A')));
    }
}
