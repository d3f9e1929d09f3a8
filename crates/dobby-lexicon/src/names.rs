//! Naming rules shared by the compiler and the emitters.
//!
//! Every definition `key` of document `nsid` is addressed as
//! `TitleCase(nsid).TitleCase(key)`, and references are resolved purely
//! syntactically against that rule:
//!
//! - `#label` inside `com.atproto.label.defs` → `Com.Atproto.Label.Defs.Label`
//! - `com.atproto.repo.strongRef` → `Com.Atproto.Repo.StrongRef.Main`
//! - `com.atproto.label.defs#label` → `Com.Atproto.Label.Defs.Label`
//!
//! Nothing here checks that the referenced document exists; see
//! [`crate::corpus::LexiconCorpus::unresolved_refs`] for that.

use heck::ToSnakeCase;
use smol_str::{SmolStr, format_smolstr};
use std::path::PathBuf;

/// Uppercase the first character of a segment, leaving the rest untouched
pub fn capitalize(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Title-case a dotted name segment by segment: `app.bsky.feed` → `App.Bsky.Feed`
///
/// Hyphens inside a segment are dropped: `my-host` → `MyHost`.
pub fn title_case(dotted: &str) -> String {
    dotted
        .split('.')
        .map(|segment| segment.split('-').map(capitalize).collect::<String>())
        .collect::<Vec<_>>()
        .join(".")
}

/// Split an NSID into namespace and name at the final segment
///
/// `app.bsky.feed.getFeed` → (`app.bsky.feed`, `getFeed`)
pub fn split_nsid(nsid: &str) -> (&str, &str) {
    nsid.rsplit_once('.').unwrap_or(("", nsid))
}

/// Split a reference into its target NSID and definition name
///
/// Local refs (`#name`) target the enclosing document; refs without a
/// fragment target `main`. An empty fragment is treated as `main` too.
pub fn split_ref<'r>(enclosing_nsid: &'r str, reference: &'r str) -> (&'r str, &'r str) {
    let (nsid, def_name) = match reference.split_once('#') {
        Some(("", fragment)) => (enclosing_nsid, fragment),
        Some((nsid, fragment)) => (nsid, fragment),
        None => (reference, "main"),
    };
    if def_name.is_empty() {
        (nsid, "main")
    } else {
        (nsid, def_name)
    }
}

/// Fully qualify a reference as `nsid#name`
pub fn qualify_ref(enclosing_nsid: &str, reference: &str) -> SmolStr {
    let (nsid, def_name) = split_ref(enclosing_nsid, reference);
    format_smolstr!("{nsid}#{def_name}")
}

/// Resolve a reference to the type name of the definition it points at
pub fn resolve_ref(enclosing_nsid: &str, reference: &str) -> String {
    let (nsid, def_name) = split_ref(enclosing_nsid, reference);
    def_module_name(nsid, def_name)
}

/// Name of the module a definition is emitted into
pub fn def_module_name(nsid: &str, def_name: &str) -> String {
    format!("{}.{}", title_case(nsid), capitalize(def_name))
}

/// Output directory for a document, relative to the output root
///
/// `app.bsky.feed.post` → `app/bsky/feed/post`
pub fn nsid_to_dir(nsid: &str) -> PathBuf {
    nsid.split('.').collect()
}

/// Snake-cased function or parameter name: `getAuthorFeed` → `get_author_feed`
pub fn snake_name(name: &str) -> String {
    name.to_snake_case()
}
