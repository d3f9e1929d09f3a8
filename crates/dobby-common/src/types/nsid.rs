use regex::Regex;
use std::sync::LazyLock;

/// Longest NSID the grammar permits.
pub const NSID_MAX_LEN: usize = 317;

/// NSID grammar: two or more domain segments (letters, digits, inner
/// hyphens) followed by a name segment of letters and digits.
pub static NSID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(\.[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+(\.[a-zA-Z][a-zA-Z0-9]{0,62})$")
        .expect("NSID regex is valid")
});

/// Error returned when a string is not a valid NSID.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum NsidError {
    /// Longer than [`NSID_MAX_LEN`].
    #[error("NSID is {actual} characters, the maximum is {NSID_MAX_LEN}")]
    #[diagnostic(code(nsid::length), url("https://atproto.com/specs/nsid"))]
    TooLong {
        /// Length of the rejected input
        actual: usize,
    },

    /// Does not match the NSID grammar.
    #[error("`{nsid}` is not a valid NSID")]
    #[diagnostic(
        code(nsid::syntax),
        url("https://atproto.com/specs/nsid"),
        help("an NSID looks like com.example.fooBar: dotted domain segments, then a name of letters and digits")
    )]
    Invalid {
        /// The rejected input
        nsid: String,
    },
}

/// Check a string against the NSID grammar.
pub fn validate(nsid: &str) -> Result<(), NsidError> {
    if nsid.len() > NSID_MAX_LEN {
        Err(NsidError::TooLong { actual: nsid.len() })
    } else if !NSID_REGEX.is_match(nsid) {
        Err(NsidError::Invalid {
            nsid: nsid.to_string(),
        })
    } else {
        Ok(())
    }
}
