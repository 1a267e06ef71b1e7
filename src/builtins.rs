//! Built-in numeric and string functions (C6)
//!
//! Pure, stateless wrappers except where the dialect's function genuinely
//! needs interpreter state (`RND`'s seed, `PEEK`'s memory, `FRE`'s heap
//! usage, `POS`'s cursor column) — those take that state as an explicit
//! parameter rather than reaching for a global. `RND` itself is a full
//! bit-exact port of the historical algorithm; see [`crate::rnd`].

use crate::error::{BasicError, Result};
use crate::memory::SimulatedMemory;
use crate::rnd::RndState;
use crate::strings::{StringHeap, StringRef};

pub fn sgn(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Greatest integer `<= x` (rounds toward negative infinity, so
/// `INT(-1.5) == -2`, not `-1`).
pub fn int(x: f64) -> f64 {
    x.floor()
}

pub fn abs(x: f64) -> f64 {
    x.abs()
}

pub fn sqr(x: f64) -> Result<f64> {
    if x < 0.0 {
        return Err(BasicError::IllegalQuantity);
    }
    Ok(x.sqrt())
}

pub fn log(x: f64) -> Result<f64> {
    if x <= 0.0 {
        return Err(BasicError::IllegalQuantity);
    }
    Ok(x.ln())
}

pub fn exp(x: f64) -> f64 {
    x.exp()
}

pub fn sin(x: f64) -> f64 {
    x.sin()
}

pub fn cos(x: f64) -> f64 {
    x.cos()
}

pub fn tan(x: f64) -> f64 {
    x.tan()
}

pub fn atn(x: f64) -> f64 {
    x.atan()
}

pub fn rnd(state: &mut RndState, x: f64) -> f64 {
    state.next(x)
}

/// `PEEK(addr)`: out-of-range addresses read as `0`, matching the real
/// machine's behavior for unmapped memory rather than erroring.
pub fn peek(memory: &SimulatedMemory, addr: i64) -> f64 {
    if addr < 0 {
        return 0.0;
    }
    memory.peek(addr as usize) as f64
}

/// `USR(x)`: no machine-language call hook exists in this dialect, so the
/// call is an identity passthrough (an Open Question resolved this way;
/// see `DESIGN.md`).
pub fn usr(x: f64) -> f64 {
    x
}

/// `FRE(x)`: bytes still available in the string heap. `x` is ignored,
/// matching the original (any argument forces a GC attempt upstream).
pub fn fre(available: usize) -> f64 {
    available as f64
}

/// `POS(x)`: the terminal's current 1-based column. `x` is ignored.
pub fn pos(column: usize) -> f64 {
    (column + 1) as f64
}

/// `STR$(x)`: positive numbers get a leading space, matching the sign
/// byte the ROM always reserves. Delegates to [`crate::format::format_number`]
/// for the digit rendering so `STR$` and `PRINT` never disagree.
pub fn str_(heap: &mut StringHeap, x: f64) -> Result<StringRef> {
    let formatted = crate::format::format_number(x);
    heap.alloc_temporary(formatted.trim_end())
}

/// `VAL(s)`: parse a leading numeric prefix, skipping leading spaces;
/// `0` if no digits are found at all (never an error).
pub fn val(s: &str) -> f64 {
    let trimmed = s.trim_start_matches(' ');
    let mut end = 0;
    let bytes = trimmed.as_bytes();
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut saw_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        saw_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            saw_digit = true;
        }
    }
    if saw_digit && end < bytes.len() && (bytes[end] == b'E' || bytes[end] == b'e') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_start {
            end = exp_end;
        }
    }
    if !saw_digit {
        return 0.0;
    }
    trimmed[..end].parse().unwrap_or(0.0)
}

pub fn len(s: &str) -> f64 {
    s.len() as f64
}

/// `ASC(s)`: `ERR_FC` on an empty string, matching the original (the
/// 6502 ROM reads past the descriptor rather than returning `0`).
pub fn asc(s: &str) -> Result<f64> {
    s.bytes().next().map(|b| b as f64).ok_or(BasicError::IllegalQuantity)
}

/// `CHR$(x)`: `x` must be a byte value `0..=255`.
pub fn chr(heap: &mut StringHeap, x: f64) -> Result<StringRef> {
    if !(0.0..=255.0).contains(&x) || x.fract() != 0.0 {
        return Err(BasicError::IllegalQuantity);
    }
    let ch = x as u8 as char;
    heap.alloc_temporary(&ch.to_string())
}

pub fn left(heap: &mut StringHeap, s: &str, n: f64) -> Result<StringRef> {
    let n = clamp_count(n)?;
    let take = n.min(s.len());
    heap.alloc_temporary(&s[..take])
}

pub fn right(heap: &mut StringHeap, s: &str, n: f64) -> Result<StringRef> {
    let n = clamp_count(n)?;
    let take = n.min(s.len());
    heap.alloc_temporary(&s[s.len() - take..])
}

/// `MID$(s, start, [len])`: `start` is 1-based. If `len` is `None`, runs
/// to the end of the string.
pub fn mid(heap: &mut StringHeap, s: &str, start: f64, len: Option<f64>) -> Result<StringRef> {
    if start.fract() != 0.0 || start < 1.0 {
        return Err(BasicError::IllegalQuantity);
    }
    let start0 = (start as usize).saturating_sub(1);
    if start0 >= s.len() {
        return heap.alloc_temporary("");
    }
    let max_len = s.len() - start0;
    let take = match len {
        Some(n) => clamp_count(n)?.min(max_len),
        None => max_len,
    };
    heap.alloc_temporary(&s[start0..start0 + take])
}

fn clamp_count(n: f64) -> Result<usize> {
    if n.fract() != 0.0 || n < 0.0 || n > i32::MAX as f64 {
        return Err(BasicError::IllegalQuantity);
    }
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_rounds_toward_negative_infinity() {
        assert_eq!(int(-1.5), -2.0);
        assert_eq!(int(1.9), 1.0);
    }

    #[test]
    fn sqr_of_negative_is_illegal_quantity() {
        assert_eq!(sqr(-1.0), Err(BasicError::IllegalQuantity));
    }

    #[test]
    fn val_parses_leading_number_and_ignores_trailing_garbage() {
        assert_eq!(val("  123ABC"), 123.0);
        assert_eq!(val("-4.5e2 apples"), -450.0);
        assert_eq!(val("nope"), 0.0);
    }

    #[test]
    fn left_right_mid_basic_slicing() {
        let mut heap = StringHeap::new(4096);
        let l = left(&mut heap, "HELLO", 2.0).unwrap();
        assert_eq!(heap.get(l), "HE");
        let r = right(&mut heap, "HELLO", 2.0).unwrap();
        assert_eq!(heap.get(r), "LO");
        let m = mid(&mut heap, "HELLO", 2.0, Some(3.0)).unwrap();
        assert_eq!(heap.get(m), "ELL");
        let m2 = mid(&mut heap, "HELLO", 2.0, None).unwrap();
        assert_eq!(heap.get(m2), "ELLO");
    }

    #[test]
    fn chr_round_trips_with_asc() {
        let mut heap = StringHeap::new(4096);
        let r = chr(&mut heap, 65.0).unwrap();
        assert_eq!(heap.get(r), "A");
        assert_eq!(asc("A"), Ok(65.0));
    }

    #[test]
    fn asc_of_empty_string_is_illegal_quantity() {
        assert_eq!(asc(""), Err(BasicError::IllegalQuantity));
    }
}
