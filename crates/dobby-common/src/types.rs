/// Namespaced identifiers naming lexicon documents.
pub mod nsid;
/// Timestamp identifiers: sortable, fixed-width base32 record keys.
pub mod tid;
