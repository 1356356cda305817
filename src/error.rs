//! Defines error types.

use std::num::NonZeroI32;

/// Failure cause reported by the native central manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NativeError {
    /// The native framework returned a non-zero status code.
    Status(NonZeroI32),
    /// The peer handle no longer refers to a usable peripheral.
    PeerUnavailable,
    /// Free-form description supplied by the native layer.
    Message(String),
}

impl std::error::Error for NativeError {}

impl std::fmt::Display for NativeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Status(code) => write!(f, "native status code {code}"),
            Self::PeerUnavailable => f.write_str("the peer handle is no longer available"),
            Self::Message(msg) => f.write_str(msg),
        }
    }
}

impl From<NonZeroI32> for NativeError {
    fn from(code: NonZeroI32) -> Self {
        Self::Status(code)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}

impl From<NativeError> for Error {
    fn from(err: NativeError) -> Self {
        let kind = match &err {
            NativeError::PeerUnavailable => ErrorKind::NotConnected,
            NativeError::Status(_) | NativeError::Message(_) => ErrorKind::Other,
        };
        let msg = err.to_string();
        Error::new(kind, Some(err), msg)
    }
}

/// The error type for central manager operations.
#[derive(Clone, Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<NativeError>,
    message: String,
}

impl Error {
    pub(crate) fn new<S: ToString>(
        kind: ErrorKind,
        source: Option<NativeError>,
        message: S,
    ) -> Self {
        Error {
            kind,
            source,
            message: message.to_string(),
        }
    }

    /// Wraps a native cause of a failed connection attempt.
    pub(crate) fn connect_failed(cause: NativeError) -> Self {
        let msg = cause.to_string();
        Error::new(ErrorKind::ConnectionFailed, Some(cause), msg)
    }

    /// Returns the corresponding [`ErrorKind`] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the native cause, if there is one.
    pub fn native(&self) -> Option<&NativeError> {
        self.source.as_ref()
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", &self.kind)
        } else {
            write!(f, "{}: {}", &self.kind, &self.message)
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = x;
            x
        })
    }
}

/// A list of general categories of central manager error.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// the Bluetooth adapter is not available
    AdapterUnavailable,
    /// the Bluetooth adapter is already scanning
    AlreadyScanning,
    /// connection failed
    ConnectionFailed,
    /// the Bluetooth device isn't connected
    NotConnected,
    /// timed out
    Timeout,
    /// an internal error has occured
    Internal,
    /// error
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::AdapterUnavailable => f.write_str("the Bluetooth adapter is not available"),
            ErrorKind::AlreadyScanning => f.write_str("the Bluetooth adapter is already scanning"),
            ErrorKind::ConnectionFailed => f.write_str("connection failed"),
            ErrorKind::NotConnected => f.write_str("the Bluetooth device isn't connected"),
            ErrorKind::Timeout => f.write_str("timed out"),
            ErrorKind::Internal => f.write_str("an internal error has occured"),
            ErrorKind::Other => f.write_str("error"),
        }
    }
}
