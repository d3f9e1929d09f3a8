use miette::{Diagnostic, SourceSpan};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during lexicon compilation and code generation
#[derive(Debug, Error, Diagnostic)]
pub enum CodegenError {
    /// IO error while reading, writing or deleting a specific path
    #[error("IO error at {}: {source}", path.display())]
    #[diagnostic(code(lexicon::io))]
    IoAt {
        #[source]
        source: io::Error,
        /// Path being accessed
        path: PathBuf,
    },

    /// The document is not valid JSON, or lacks the shape the compiler needs
    #[error("Malformed lexicon document{}: {reason}", display_path(path))]
    #[diagnostic(
        code(lexicon::malformed),
        help("A lexicon document needs a string `id` holding an NSID and a `defs` object")
    )]
    MalformedDocument {
        /// What was wrong with the document
        reason: String,
        /// File the document came from, when known
        path: Option<PathBuf>,
        /// Source text of the document
        #[source_code]
        src: Option<String>,
        /// Location of the error in the source
        #[label("here")]
        span: Option<SourceSpan>,
        /// Underlying JSON error
        #[source]
        source: Option<serde_json::Error>,
    },

    /// A path pattern could not be parsed as a glob
    #[error("Invalid path pattern `{pattern}`")]
    #[diagnostic(
        code(lexicon::pattern),
        help("Patterns may be files, directories, or globs such as lexicons/**/*.json")
    )]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    /// The configuration file is not usable
    #[error("Invalid config{}: {message}", display_path(path))]
    #[diagnostic(code(lexicon::config))]
    Config {
        message: String,
        /// Config file, when known
        path: Option<PathBuf>,
    },

    /// A template could not be rendered
    #[error("Failed to render template {template}: {message}")]
    #[diagnostic(code(lexicon::render))]
    Render { template: String, message: String },
}

fn display_path(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => format!(" {}", path.display()),
        None => String::new(),
    }
}

impl CodegenError {
    /// Create a malformed-document error from a JSON parse failure
    pub fn malformed_json(source: serde_json::Error) -> Self {
        Self::MalformedDocument {
            reason: source.to_string(),
            path: None,
            src: None,
            span: None,
            source: Some(source),
        }
    }

    /// Create a malformed-document error for a structural problem
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            reason: reason.into(),
            path: None,
            src: None,
            span: None,
            source: None,
        }
    }

    /// Attach the originating file and its text to a malformed-document error
    ///
    /// Other variants are returned unchanged.
    pub fn with_document(self, doc_path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        match self {
            Self::MalformedDocument {
                reason,
                source,
                ..
            } => {
                let text = text.into();
                let span = source
                    .as_ref()
                    .and_then(|e| byte_offset(&text, e.line(), e.column()))
                    .map(|offset| SourceSpan::from((offset, 1)));
                Self::MalformedDocument {
                    reason,
                    path: Some(doc_path.into()),
                    src: Some(text),
                    span,
                    source,
                }
            }
            other => other,
        }
    }

    /// Wrap an IO error with the path it concerns
    pub fn io_at(source: io::Error, path: impl AsRef<Path>) -> Self {
        Self::IoAt {
            source,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>, path: Option<&Path>) -> Self {
        Self::Config {
            message: message.into(),
            path: path.map(Path::to_path_buf),
        }
    }

    /// Create a render error
    pub fn render(template: impl std::fmt::Display, message: impl Into<String>) -> Self {
        Self::Render {
            template: template.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error only invalidates the document being processed
    ///
    /// Such errors are reported and skipped; everything else halts the run.
    pub fn is_document_error(&self) -> bool {
        matches!(self, Self::MalformedDocument { .. })
    }
}

/// Convert serde_json's 1-based line/column into a byte offset into `src`
fn byte_offset(src: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    Some((line_start + column.saturating_sub(1)).min(src.len()))
}

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_offset() {
        let src = "{\n  \"id\": 3\n}";
        assert_eq!(byte_offset(src, 1, 1), Some(0));
        assert_eq!(byte_offset(src, 2, 3), Some(4));
        assert_eq!(byte_offset(src, 0, 0), None);
    }

    #[test]
    fn test_with_document_sets_span() {
        let text = "{\n  \"id\": }";
        let err = serde_json::from_str::<serde_json::Value>(text).unwrap_err();
        let err = CodegenError::malformed_json(err).with_document("a.json", text);
        match err {
            CodegenError::MalformedDocument { path, span, src, .. } => {
                assert_eq!(path, Some(PathBuf::from("a.json")));
                assert!(span.is_some());
                assert_eq!(src.as_deref(), Some(text));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_document_errors_are_classified() {
        assert!(CodegenError::malformed("missing id").is_document_error());
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert!(!CodegenError::io_at(io, "x.json").is_document_error());
    }
}
