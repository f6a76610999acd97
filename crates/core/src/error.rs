//! Error types for the camsnap library.

use std::fmt;

use crate::discovery::Device;
use crate::watch::ErrorClass;

/// Errors that can occur in the camsnap library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Validation**: [`InvalidInput`](Self::InvalidInput). Bad threshold,
///   missing host, conflicting options. Never retried.
/// - **Transport**: [`Discovery`](Self::Discovery),
///   [`ScanAborted`](Self::ScanAborted), [`Io`](Self::Io),
///   [`Http`](Self::Http).
/// - **Parse**: [`Xml`](Self::Xml), [`NoProbeMatches`](Self::NoProbeMatches),
///   [`Decode`](Self::Decode).
/// - **Authentication**: [`Auth`](Self::Auth), HTTP 401/403 from a device.
/// - **Process supervision**: [`Spawn`](Self::Spawn),
///   [`ProcessExited`](Self::ProcessExited), [`Timeout`](Self::Timeout).
/// - **Camera store**: [`Config`](Self::Config), [`Yaml`](Self::Yaml).
#[derive(Debug, thiserror::Error)]
pub enum CamsnapError {
    /// Caller-supplied value rejected before any I/O happened.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Underlying I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Discovery socket setup failed before the probe went out.
    #[error("discovery {stage} failed: {source}")]
    Discovery {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A non-timeout receive error ended the scan early.
    ///
    /// `partial` holds the deduplicated devices collected before the error.
    #[error("discovery receive failed after {} device(s): {source}", partial.len())]
    ScanAborted {
        #[source]
        source: std::io::Error,
        partial: Vec<Device>,
    },

    /// XML was not well-formed or had an unexpected shape.
    #[error("XML parse error: {kind}")]
    Xml { kind: XmlErrorKind },

    /// A probe response decoded cleanly but carried no service addresses.
    #[error("probe response contained no addresses")]
    NoProbeMatches,

    /// HTTP client failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Device rejected the credentials (HTTP 401 or 403).
    #[error("auth failed (status {status})")]
    Auth { status: u16 },

    /// Device answered with a non-success, non-auth status.
    #[error("device info status {status}: {excerpt}")]
    Status { status: u16, excerpt: String },

    /// A 200 response whose body could not be decoded.
    #[error("decode device info: {0}")]
    Decode(String),

    /// The external process could not be started.
    #[error("start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The external process exited abnormally.
    ///
    /// `class` is derived from the process's trailing diagnostic output.
    #[error("{program} exited: {status} ({class})")]
    ProcessExited {
        program: String,
        status: String,
        class: ErrorClass,
    },

    /// A bounded job was killed when its deadline passed.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// An event record could not be serialized.
    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Camera store lookup or path resolution failed.
    #[error("config: {0}")]
    Config(String),

    /// Camera store could not be (de)serialized.
    #[error("config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A URL could not be parsed or rebuilt.
    #[error("invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),
}

/// Specific kind of XML parse failure.
#[derive(Debug)]
pub enum XmlErrorKind {
    /// Input was not valid UTF-8.
    Encoding,
    /// The tokenizer rejected the document (bad syntax, mismatched tags).
    Syntax(String),
    /// The document ended with elements still open.
    Unclosed,
    /// No root element was found.
    Empty,
    /// The root element was not a SOAP `Envelope`.
    UnexpectedRoot(String),
}

impl fmt::Display for XmlErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encoding => write!(f, "invalid UTF-8"),
            Self::Syntax(detail) => write!(f, "{detail}"),
            Self::Unclosed => write!(f, "unexpected end of document"),
            Self::Empty => write!(f, "no root element"),
            Self::UnexpectedRoot(name) => write!(f, "unexpected root element <{name}>"),
        }
    }
}

impl CamsnapError {
    /// Whether this error means the device rejected the credentials.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

/// Convenience alias for `Result<T, CamsnapError>`.
pub type Result<T> = std::result::Result<T, CamsnapError>;
