//! Fatal parse errors.
//!
//! All variants here are fatal: parsing stops as soon as one is raised.
//! Non-fatal issues (unrecognized section, dubious content) are carried as
//! [`metafw_diagnostics::Diagnostic`]s alongside a successful parse instead.

use std::path::PathBuf;

use thiserror::Error;

/// A fatal error raised while reading or parsing a build-description file.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A line violates the grammar for its dialect or active section.
    #[error("{file}:{line}: invalid syntax: {extra}")]
    FormatInvalid {
        /// File the error was found in.
        file: PathBuf,
        /// 1-based source line.
        line: u32,
        /// Human-readable detail.
        extra: String,
    },

    /// A `[...]` section header does not match any name known to the dialect.
    #[error("{file}:{line}: unrecognized section [{section}]")]
    FormatUnknownError {
        /// File the error was found in.
        file: PathBuf,
        /// 1-based source line.
        line: u32,
        /// The unrecognized section name.
        section: String,
    },

    /// A referenced file exists but could not be read.
    #[error("failed to read {file}: {source}")]
    FileReadFailure {
        /// The file that could not be read.
        file: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A referenced file does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// A file was parsed under a dialect inconsistent with its extension.
    #[error("{file}: expected {expected} dialect, found {actual} dialect")]
    FileTypeMismatch {
        /// The file whose dialect did not match.
        file: PathBuf,
        /// The dialect the caller expected.
        expected: &'static str,
        /// The dialect actually inferred from the extension.
        actual: &'static str,
    },

    /// A requested path differs only in case from the file that exists on disk.
    #[error("path case mismatch: requested {requested}, found {actual}")]
    FileCaseMismatch {
        /// Path as requested (e.g. by an `!include`).
        requested: PathBuf,
        /// Path as it actually exists on disk.
        actual: PathBuf,
    },

    /// An `!error` directive was reached while enabled.
    #[error("{file}:{line}: {message}")]
    ErrorStatement {
        /// File the directive appeared in.
        file: PathBuf,
        /// 1-based source line.
        line: u32,
        /// The directive's message text.
        message: String,
    },

    /// `!include` formed a cycle: a file transitively includes itself.
    #[error("include cycle detected at {0}")]
    IncludeCycle(PathBuf),

    /// The file's bytes are not valid UTF-8.
    #[error("{0}: not valid UTF-8")]
    Encoding(PathBuf),
}

impl ParseError {
    /// The file this error pertains to, when the variant carries one.
    #[must_use]
    pub fn file(&self) -> Option<&std::path::Path> {
        match self {
            Self::FormatInvalid { file, .. }
            | Self::FormatUnknownError { file, .. }
            | Self::FileReadFailure { file, .. }
            | Self::ErrorStatement { file, .. } => Some(file),
            Self::FileNotFound(f) | Self::IncludeCycle(f) | Self::Encoding(f) => Some(f),
            Self::FileTypeMismatch { file, .. } => Some(file),
            Self::FileCaseMismatch { requested, .. } => Some(requested),
        }
    }
}

/// Result alias used throughout this crate.
pub type ParseResult<T> = Result<T, ParseError>;
