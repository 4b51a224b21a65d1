//! Error taxonomy for a sitemap generation run.
//!
//! Every variant is fatal: the orchestrator stops at the first one it sees.
//! Items with empty address text are not errors and never show up here; they
//! are dropped by the batch partitioner and simply not counted.

use std::path::PathBuf;

/// Fatal conditions that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input feed is missing or cannot be read.
    #[error("source file {} does not exist or is unreadable: {source}", .path.display())]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The input feed is not well-formed XML (or its gzip stream is corrupt).
    #[error("source file {} is not well-formed XML: {message}", .path.display())]
    SourceMalformed { path: PathBuf, message: String },

    /// A selector expression could not be compiled.
    #[error("invalid selector '{expression}': {message}")]
    SelectorSyntax { expression: String, message: String },

    /// Creating the output directory or writing an output file failed.
    #[error("failed to write {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The generation parameters are out of range or unsafe.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn selector(expression: &str, message: impl Into<String>) -> Self {
        Error::SelectorSyntax {
            expression: expression.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::OutputWrite {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_error_names_expression() {
        let err = Error::selector("//offer[", "unexpected end of expression");
        let msg = err.to_string();
        assert!(msg.contains("//offer["));
        assert!(msg.contains("unexpected end"));
    }

    #[test]
    fn source_errors_are_distinct() {
        let missing = Error::SourceNotFound {
            path: PathBuf::from("feed.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        let malformed = Error::SourceMalformed {
            path: PathBuf::from("feed.xml"),
            message: "unclosed tag".to_string(),
        };
        assert!(missing.to_string().contains("does not exist"));
        assert!(malformed.to_string().contains("not well-formed"));
    }
}
