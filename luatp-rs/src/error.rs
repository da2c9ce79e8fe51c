//! Error types.
//!
//! Every failure in luatp is fatal: errors travel up as [`Error`] to a single
//! reporting point in `main`, which prints them and exits with status 1.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ── Location ──────────────────────────────────────────────────────────────────

/// A `file:line` position in an input file.  `line` is 0-based internally
/// and displayed 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<String>, line: usize) -> Self {
        Self { file: file.into(), line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error at {}:{}", self.file, self.line + 1)
    }
}

// ── Error ─────────────────────────────────────────────────────────────────────

/// A fatal preprocessing error.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading a preload script or an input file failed.
    #[error("Cannot read file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No `-f` input was given.
    #[error("Input file is not specified")]
    NoInput,

    /// A file named on the command line does not exist.
    #[error("Provided {kind} file {} does not exist", .path.display())]
    MissingFile { kind: &'static str, path: PathBuf },

    /// The output file could not be created.
    #[error("Cannot create output file {}: {source}", .path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the output destination failed.
    #[error("Cannot write output: {0}")]
    Write(#[from] std::io::Error),

    /// Input ended inside a script block.
    #[error("{location}\nRead EOF while searching for lua block end marker [{marker}]. Found [{found}]")]
    UnterminatedBlock {
        location: Location,
        marker: &'static str,
        found: String,
    },

    /// Malformed macro invocation.
    #[error("{location}\n{message}")]
    Syntax { location: Location, message: String },

    /// A macro callback raised an error.
    #[error("{location}\nError while executing lua macro [{name}]\n{source}")]
    Macro {
        location: Location,
        name: String,
        #[source]
        source: ScriptError,
    },

    /// An embedded script block raised an error.
    #[error("{location}\nError while executing lua block\n{source}")]
    Block {
        location: Location,
        #[source]
        source: ScriptError,
    },

    /// A preload script raised an error.
    #[error("Error while processing lua file: {label}\n{source}")]
    Preload {
        label: String,
        #[source]
        source: ScriptError,
    },

    /// The line-info generator raised an error.
    #[error("{location}\nError while generating line information\n{source}")]
    LineInfo {
        location: Location,
        #[source]
        source: ScriptError,
    },

    /// The scripting runtime could not be set up.
    #[error("Cannot initialise lua runtime: {0}")]
    Runtime(#[source] ScriptError),
}

impl Error {
    /// Build a [`Error::Syntax`] at `location`.
    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Error::Syntax { location, message: message.into() }
    }
}

// ── ScriptError ───────────────────────────────────────────────────────────────

/// An error reported by the scripting runtime, flattened to its message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

// ── RegistryError ─────────────────────────────────────────────────────────────

/// A rejected macro or marked-block registration / lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Macros with name [{0}] already exists")]
    DuplicateMacro(String),

    #[error("Error while register macro [{name}]. Argument {index} marked as variadic, but it is not last argument")]
    VariadicNotLast { name: String, index: usize },

    #[error("Error while register macro [{name}]. Argument {index} type should be [raw] but found [{found}]")]
    UnknownParamKind { name: String, index: usize, found: String },

    #[error("Marked block with name [{0}] already exists")]
    DuplicateBlock(String),

    #[error("Marked block with name [{0}] does not exist")]
    UnknownBlock(String),
}

/// Escape control characters so offending text prints on one line.
pub fn escape_for_display(s: &str) -> String {
    s.replace('\r', "\\r").replace('\n', "\\n").replace('\t', "\\t")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
