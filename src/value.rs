//! The runtime [`Value`] type and variable-name identity rules (C4/C5).

use crate::strings::StringRef;

/// A polymorphic runtime value. `Integer` is used only for array-index
/// coercion; ordinary arithmetic always runs in `Number` (`f64`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Str(StringRef),
    Integer(i32),
}

impl Value {
    pub fn is_string(&self) -> bool {
        matches!(self, Value::Str(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Integer(_))
    }
}

/// Type of a variable or array slot: `Number` (including `%`-suffixed
/// names, which are still stored as `f64` — a faithful dialect quirk, not
/// a bug) or `String`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Number,
    IntegerSuffix,
    String,
}

impl VarKind {
    pub fn is_string(self) -> bool {
        matches!(self, VarKind::String)
    }
}

/// A variable's storage identity: the case-folded first two significant
/// characters of its source name plus its type marker. `SCORE`, `SC`, and
/// `SCOREBOARD` all resolve to the same identity; `A` and `A$` do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarName {
    chars: [u8; 2],
    kind: VarKindTag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VarKindTag {
    Number,
    IntegerSuffix,
    String,
}

impl VarName {
    /// Parse a variable name from its full (already-uppercased) source
    /// spelling, e.g. `"SCOREBOARD$"` or `"I%"`.
    pub fn parse(full_name: &str) -> Self {
        let bytes = full_name.as_bytes();
        let (letters, kind) = match bytes.last() {
            Some(b'$') => (&bytes[..bytes.len() - 1], VarKindTag::String),
            Some(b'%') => (&bytes[..bytes.len() - 1], VarKindTag::IntegerSuffix),
            _ => (bytes, VarKindTag::Number),
        };

        let mut chars = [0u8; 2];
        for (i, slot) in chars.iter_mut().enumerate() {
            *slot = letters.get(i).copied().unwrap_or(0).to_ascii_uppercase();
        }

        VarName { chars, kind }
    }

    pub fn kind(self) -> VarKind {
        match self.kind {
            VarKindTag::Number => VarKind::Number,
            VarKindTag::IntegerSuffix => VarKind::IntegerSuffix,
            VarKindTag::String => VarKind::String,
        }
    }

    pub fn is_string(self) -> bool {
        self.kind == VarKindTag::String
    }
}

impl std::fmt::Display for VarName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for &c in &self.chars {
            if c != 0 {
                write!(f, "{}", c as char)?;
            }
        }
        match self.kind {
            VarKindTag::String => write!(f, "$"),
            VarKindTag::IntegerSuffix => write!(f, "%"),
            VarKindTag::Number => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_identity_for_shared_prefix() {
        assert_eq!(VarName::parse("SCORE"), VarName::parse("SC"));
        assert_eq!(VarName::parse("SCORE"), VarName::parse("SCOREBOARD"));
    }

    #[test]
    fn suffix_distinguishes_identity() {
        assert_ne!(VarName::parse("A$"), VarName::parse("A"));
        assert_ne!(VarName::parse("A%"), VarName::parse("A"));
    }

    #[test]
    fn display_round_trips_canonical_form() {
        assert_eq!(VarName::parse("SCOREBOARD$").to_string(), "SC$");
        assert_eq!(VarName::parse("I%").to_string(), "I%");
    }
}
