//! Common types for the dobby lexicon tooling

#![warn(missing_docs)]
pub use smol_str;

/// Baseline fundamental AT Protocol data types.
pub mod types;

pub use types::nsid::NsidError;
pub use types::tid::{Tid, TidError, TidParts};
