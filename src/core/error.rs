//! Purpose: Single error type for engine, capabilities, and CLI.
//! Exports: `Error`, `ErrorKind`, `to_exit_code`, `error_trace`.
//! Role: Carries a stable kind plus optional message, hint, key, and source chain.
//! Invariants: Exit codes per kind are stable once published.
//! Invariants: `error_trace` renders the full source chain, one cause per line.
use bstr::BString;
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Internal,
    Usage,
    Connection,
    UnknownType,
    UnsupportedMutation,
    InvalidSelection,
    StoreOperation,
    Protocol,
    Io,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    hint: Option<String>,
    key: Option<BString>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            hint: None,
            key: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn key(&self) -> Option<&BString> {
        self.key.as_ref()
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<BString>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {key})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::Io).with_source(err)
    }
}

pub fn to_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => 1,
        ErrorKind::Usage => 2,
        ErrorKind::Connection => 3,
        ErrorKind::StoreOperation => 4,
        ErrorKind::UnsupportedMutation => 5,
        ErrorKind::InvalidSelection => 6,
        ErrorKind::Protocol => 7,
        ErrorKind::Io => 8,
        // Never escapes a scan; mapped for completeness.
        ErrorKind::UnknownType => 1,
    }
}

/// Renders an error and its causes as diagnostic text for `ExecutionOutcome`.
pub fn error_trace(err: &Error) -> String {
    let mut trace = err.to_string();
    let mut cur = err.source();
    while let Some(source) = cur {
        trace.push_str("\ncaused by: ");
        trace.push_str(&source.to_string());
        cur = source.source();
    }
    trace
}
