use crate::compiler::Lexicon;
use crate::error::{CodegenError, Result};
use crate::names::split_ref;
use smol_str::SmolStr;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Expand one input pattern into document paths
///
/// An existing directory is searched recursively for `*.json` files, an
/// existing file is taken as-is, and anything else is treated as a glob.
pub fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    if path.is_dir() {
        let mut found = Vec::new();
        for entry in walkdir::WalkDir::new(path)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                found.push(path.to_path_buf());
            }
        }
        return Ok(found);
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = glob::glob(pattern).map_err(|source| CodegenError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;
    let mut found = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => found.push(path),
            Ok(_) => {}
            Err(e) => tracing::warn!(path = %e.path().display(), error = %e, "skipping unreadable path"),
        }
    }
    if found.is_empty() {
        tracing::warn!(pattern, "pattern matched no files");
    }
    Ok(found)
}

/// Expand every pattern; the result is sorted and free of duplicates
pub fn expand_all<I, S>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths = Vec::new();
    for pattern in patterns {
        paths.extend(expand(pattern.as_ref())?);
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

/// Read a document's raw bytes
pub fn read_document(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| CodegenError::io_at(e, path))
}

/// Read and compile one document
///
/// Malformed documents carry their path and source text in the error.
pub fn load_file(path: impl AsRef<Path>) -> Result<Lexicon> {
    let path = path.as_ref();
    let bytes = read_document(path)?;
    Lexicon::from_slice(&bytes)
        .map_err(|e| e.with_document(path, String::from_utf8_lossy(&bytes).into_owned()))
}

/// A reference whose target is not in the corpus
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnresolvedRef {
    /// NSID of the document holding the reference
    pub from: SmolStr,
    /// Qualified reference, `nsid#name`
    pub reference: SmolStr,
}

/// Registry of compiled lexicons, for referential-integrity checks
#[derive(Debug, Clone, Default)]
pub struct LexiconCorpus {
    lexicons: BTreeMap<SmolStr, Lexicon>,
}

impl LexiconCorpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lexicon, returning any previous lexicon with the same NSID
    pub fn insert(&mut self, lexicon: Lexicon) -> Option<Lexicon> {
        self.lexicons.insert(lexicon.nsid.clone(), lexicon)
    }

    /// Get a lexicon by NSID
    pub fn get(&self, nsid: &str) -> Option<&Lexicon> {
        self.lexicons.get(nsid)
    }

    /// Resolve a reference, handling fragments
    ///
    /// Examples:
    /// - `app.bsky.feed.post` → main def from that lexicon
    /// - `app.bsky.feed.post#replyRef` → replyRef def from that lexicon
    pub fn resolve_ref<'r>(&self, ref_str: &'r str) -> Option<(&Lexicon, &'r str)> {
        let (nsid, def_name) = split_ref("", ref_str);
        let lexicon = self.get(nsid)?;
        lexicon.has_definition(def_name).then_some((lexicon, def_name))
    }

    /// Check if a reference exists
    pub fn ref_exists(&self, ref_str: &str) -> bool {
        self.resolve_ref(ref_str).is_some()
    }

    /// Every reference, across all documents, whose target is missing
    pub fn unresolved_refs(&self) -> Vec<UnresolvedRef> {
        self.lexicons
            .values()
            .flat_map(|lexicon| {
                lexicon
                    .references
                    .iter()
                    .filter(|reference| !self.ref_exists(reference))
                    .map(|reference| UnresolvedRef {
                        from: lexicon.nsid.clone(),
                        reference: reference.clone(),
                    })
            })
            .collect()
    }

    /// Iterate over all lexicons in NSID order
    pub fn iter(&self) -> impl Iterator<Item = (&SmolStr, &Lexicon)> {
        self.lexicons.iter()
    }

    /// Number of loaded lexicons
    pub fn len(&self) -> usize {
        self.lexicons.len()
    }

    /// Check if corpus is empty
    pub fn is_empty(&self) -> bool {
        self.lexicons.is_empty()
    }
}

impl FromIterator<Lexicon> for LexiconCorpus {
    fn from_iter<T: IntoIterator<Item = Lexicon>>(iter: T) -> Self {
        let mut corpus = Self::new();
        for lexicon in iter {
            corpus.insert(lexicon);
        }
        corpus
    }
}
