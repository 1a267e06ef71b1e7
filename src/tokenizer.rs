//! Tokenizer / detokenizer (C2)
//!
//! Crunches BASIC source text into the one-byte-per-keyword token stream
//! described by `spec.md` §4.1, and expands it back for `LIST`. Three modes
//! besides `Normal` keep strings, `REM` comments, and `DATA` payloads intact.

use crate::token::{self, is_digit, is_ident_continue, is_letter, RESERVED_WORDS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Data,
    Rem,
}

/// Tokenize one source line's statement text (line number already stripped).
///
/// Outside quoted strings, `REM` text, and `DATA` payloads, letters are
/// uppercased and reserved words collapse to their single-byte token.
pub fn tokenize(source: &str) -> Vec<u8> {
    log::trace!("tokenize: {source:?}");
    let bytes = source.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut mode = Mode::Normal;
    let mut in_string = false;
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        if in_string {
            out.push(c);
            i += 1;
            if c == b'"' {
                in_string = false;
            }
            continue;
        }

        match mode {
            Mode::Rem => {
                out.push(c);
                i += 1;
            }
            Mode::Data => {
                if c == b'"' {
                    in_string = true;
                    out.push(c);
                    i += 1;
                } else if c == b':' {
                    out.push(c);
                    i += 1;
                    mode = Mode::Normal;
                } else {
                    out.push(c);
                    i += 1;
                }
            }
            Mode::Normal => {
                if c == b'"' {
                    in_string = true;
                    out.push(c);
                    i += 1;
                    continue;
                }
                if c == b' ' {
                    out.push(c);
                    i += 1;
                    continue;
                }
                if let Some((word, tok)) = match_reserved_word(&bytes[i..]) {
                    out.push(tok);
                    i += word.len();
                    if tok == token::TOK_REM {
                        mode = Mode::Rem;
                    } else if tok == token::TOK_DATA {
                        mode = Mode::Data;
                    }
                } else {
                    out.push(c.to_ascii_uppercase());
                    i += 1;
                }
            }
        }
    }

    log::trace!("tokenize: {} bytes -> {} tokens", bytes.len(), out.len());
    out
}

/// Find the longest reserved word matching the start of `rest`, honoring
/// the word-boundary rule (next char neither letter nor digit), except for
/// words ending in `(` (self-delimiting) and `FN` (always tokenized).
fn match_reserved_word(rest: &[u8]) -> Option<(&'static str, u8)> {
    let mut best: Option<(&'static str, u8)> = None;

    for rw in RESERVED_WORDS {
        let word = rw.word.as_bytes();
        if rest.len() < word.len() {
            continue;
        }
        if !rest[..word.len()].eq_ignore_ascii_case(word) {
            continue;
        }

        let boundary = word.last() == Some(&b'(')
            || rw.token == token::TOK_FN
            || match rest.get(word.len()) {
                Some(&next) => !is_letter(next) && !is_digit(next),
                None => true,
            };

        if !boundary {
            continue;
        }

        if best.map(|(w, _)| word.len() > w.len()).unwrap_or(true) {
            best = Some((rw.word, rw.token));
        }
    }

    best
}

/// Expand tokenized bytes back to canonical source text.
pub fn detokenize(bytes: &[u8]) -> String {
    log::trace!("detokenize: {} tokens", bytes.len());
    let mut out = String::with_capacity(bytes.len() * 2);
    let mut in_string = false;

    for &b in bytes {
        if in_string {
            out.push(b as char);
            if b == b'"' {
                in_string = false;
            }
            continue;
        }

        if b == b'"' {
            in_string = true;
            out.push('"');
            continue;
        }

        if token::is_token(b) {
            match token::token_name(b) {
                Some(word) => out.push_str(word),
                None => out.push('?'),
            }
        } else {
            out.push(b as char);
        }
    }

    out
}

/// `true` if the next significant character (after skipping spaces) in
/// `text[pos..]` is absent or is the statement separator `:`.
pub fn peek_is_ident_continue(text: &[u8], pos: usize) -> bool {
    text.get(pos).map(|&c| is_ident_continue(c)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizes_simple_statement() {
        let out = tokenize("PRINT \"HELLO\"");
        assert_eq!(out[0], token::TOK_PRINT);
        assert_eq!(detokenize(&out), "PRINT \"HELLO\"");
    }

    #[test]
    fn lowercase_keywords_are_recognized() {
        let out = tokenize("print \"hi\"");
        assert_eq!(out[0], token::TOK_PRINT);
        // Inside the string, case is preserved.
        assert_eq!(detokenize(&out), "PRINT \"hi\"");
    }

    #[test]
    fn rem_preserves_remainder_verbatim() {
        let src = "REM this Is a Comment: with colon";
        let out = tokenize(src);
        assert_eq!(out[0], token::TOK_REM);
        assert_eq!(detokenize(&out), "REM this Is a Comment: with colon");
    }

    #[test]
    fn data_stops_tokenizing_until_colon() {
        let src = "DATA 10,ABC,\"quoted: not a stop\":PRINT X";
        let out = tokenize(src);
        let text = detokenize(&out);
        assert_eq!(text, "DATA 10,ABC,\"quoted: not a stop\":PRINT X");
    }

    #[test]
    fn fn_is_always_tokenized_even_against_identifier() {
        let out = tokenize("Y=FNA(5)");
        assert!(out.contains(&token::TOK_FN));
    }

    #[test]
    fn tab_and_spc_are_self_delimiting() {
        let out = tokenize("PRINT TAB(10)\"X\"");
        assert!(out.contains(&token::TOK_TAB));
    }

    #[test]
    fn word_boundary_prevents_false_match() {
        // TOTAL must not tokenize as TO + TAL.
        let out = tokenize("TOTAL=5");
        assert!(!out.contains(&token::TOK_TO));
    }

    #[test]
    fn round_trip_preserves_case_fold_outside_strings_and_data() {
        let src = "for i=1 to 10:print i:next i";
        let tok = tokenize(src);
        let text = detokenize(&tok);
        assert_eq!(text, "FOR I=1 TO 10:PRINT I:NEXT I");
    }

    #[quickcheck_macros::quickcheck]
    fn detokenize_tokenize_never_panics(s: String) -> bool {
        let truncated: String = s.chars().take(255).collect();
        let tok = tokenize(&truncated);
        let _ = detokenize(&tok);
        true
    }
}
