//! Caller-supplied transaction ids.

use std::fmt;

const PREFIX: &str = "0x";
const HEX_LEN: usize = 64;

/// A well-formed transaction id: `0x` followed by 64 hex digits.
///
/// Hex digits are folded to lower case, so two spellings of one transaction
/// share a single replay-guard entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProofToken(String);

impl ProofToken {
    /// Validate and canonicalize `raw`. Purely lexical; never touches the
    /// network.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits = raw.strip_prefix(PREFIX)?;
        if digits.len() != HEX_LEN || hex::decode(digits).is_err() {
            return None;
        }
        Some(Self(canonical(raw)))
    }

    /// Canonical text form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the canonical string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProofToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Replay-guard key for arbitrary input. Agrees with [`ProofToken::parse`] on
/// well-formed ids and leaves anything else untouched.
pub fn canonical(raw: &str) -> String {
    match raw.strip_prefix(PREFIX) {
        Some(digits) => format!("{}{}", PREFIX, digits.to_ascii_lowercase()),
        None => raw.to_string(),
    }
}
