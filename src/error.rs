use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::result::Result as StdResult;

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = StdResult<T, E>;

// Convenience type alias for internal use.
pub(crate) type BoxDynError = Box<dyn StdError + 'static + Send + Sync>;

/// Represents all the ways a method can fail within this crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An operation was attempted on a closed (or never-opened) handle.
    #[error("{operation}() called on closed connection")]
    NotConnected { operation: &'static str },

    /// A value has no wire mapping, a declared column type has no decode
    /// mapping, or a stream view was used after being invalidated.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// A value was structurally sound but its content could not be converted
    /// (invalid UTF-8 in a text column, out-of-range calendar fields, ...).
    #[error("conversion failed: {0}")]
    ConversionFailed(String),

    /// This library was misused on the client side: a closed cursor was
    /// touched, a query format string was malformed, and so on. The server
    /// was never involved.
    #[error("interface misuse: {0}")]
    Interface(String),

    /// Error returned from the database.
    #[error("error returned from database: {0}")]
    Database(#[from] Comdb2Error),

    /// Error occurred while parsing a connection string.
    #[error("error occurred while parsing a connection string: {0}")]
    ParseConnectOptions(#[source] BoxDynError),
}

impl Error {
    /// The taxonomy kind of this error, for polymorphic handling without
    /// inspecting message text.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotConnected { .. } => ErrorKind::NotConnected,
            Error::Unsupported(_) => ErrorKind::Unsupported,
            Error::ConversionFailed(_) => ErrorKind::ConversionFailed,
            Error::Interface(_) | Error::ParseConnectOptions(_) => ErrorKind::Programming,
            Error::Database(error) => error.kind(),
        }
    }
}

/// A classification of errors into a fixed taxonomy, determined for server
/// errors by the numeric error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Operation on a handle already closed on the client side.
    NotConnected,
    /// No wire mapping exists for the value or declared type.
    Unsupported,
    /// Structurally valid data with unconvertible content.
    ConversionFailed,
    /// A unique key constraint would be violated.
    UniqueViolation,
    /// A foreign key constraint would be violated.
    ForeignKeyViolation,
    /// A non-null constraint would be violated.
    NotNullViolation,
    /// Some other constraint violation.
    ConstraintViolation,
    /// Malformed SQL or other misuse reported by the server, or client-side
    /// misuse of this library.
    Programming,
    /// Transient or server-side operational condition (I/O error, timeout,
    /// dropped connection).
    Operational,
    /// Unexpected internal server state.
    Internal,
}

impl ErrorKind {
    /// Returns `true` for every flavor of constraint violation.
    pub fn is_integrity(self) -> bool {
        matches!(
            self,
            ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::ConstraintViolation
        )
    }
}

/// An error reported by the Comdb2 server (or the connection layer under it).
///
/// Carries the numeric error code and the message exactly as returned by the
/// database; [`kind()`][Comdb2Error::kind] classifies the code into the fixed
/// taxonomy.
#[derive(Debug)]
pub struct Comdb2Error {
    code: i32,
    message: String,
}

impl Comdb2Error {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The error code from the failed call.
    pub fn code(&self) -> i32 {
        self.code
    }

    /// The message reported alongside the failed call.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> ErrorKind {
        // The server reports some non-null violations under the generic
        // constraints code; the message is the only discriminator.
        if self.message.contains("null constraint violation") {
            return ErrorKind::NotNullViolation;
        }

        match self.code {
            code::NOTCONNECTED
            | code::PREPARE_ERROR
            | code::NOSTATEMENT
            | code::BADCOLUMN
            | code::BADSTATE => ErrorKind::Programming,

            code::INTERNAL | code::INVALID_ID | code::NOMASTER => ErrorKind::Internal,

            code::READONLY
            | code::UNTAGGED_DATABASE
            | code::TRAN_MODE_UNSUPPORTED
            | code::NONKLESS
            | code::NOTSUPPORTED => ErrorKind::Unsupported,

            code::CONSTRAINTS => ErrorKind::ConstraintViolation,
            code::FKEY_VIOLATION => ErrorKind::ForeignKeyViolation,
            code::NULL_CONSTRAINT => ErrorKind::NotNullViolation,
            code::DUPLICATE => ErrorKind::UniqueViolation,

            code::CONV_FAIL | code::TZNAME_FAIL => ErrorKind::ConversionFailed,

            _ => ErrorKind::Operational,
        }
    }
}

impl Display for Comdb2Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Include the code; new codes can be added to the server at any time
        // and some messages are ambiguous without it.
        write!(f, "(code: {}) {}", self.code, self.message)
    }
}

impl StdError for Comdb2Error {}

/// The known Comdb2 error codes, from `cdb2api.h`.
///
/// The code carried by a [`Comdb2Error`] will generally be one of these,
/// though that is not guaranteed: new codes can be added to the server at any
/// time.
pub mod code {
    pub const CONNECT_ERROR: i32 = -1;
    pub const NOTCONNECTED: i32 = -2;
    pub const PREPARE_ERROR: i32 = -3;
    pub const IO_ERROR: i32 = -4;
    pub const INTERNAL: i32 = -5;
    pub const NOSTATEMENT: i32 = -6;
    pub const BADCOLUMN: i32 = -7;
    pub const BADSTATE: i32 = -8;
    pub const ASYNCERR: i32 = -9;
    pub const INVALID_ID: i32 = -12;
    pub const RECORD_OUT_OF_RANGE: i32 = -13;
    pub const REJECTED: i32 = -15;
    pub const STOPPED: i32 = -16;
    pub const BADREQ: i32 = -17;
    pub const DBCREATE_FAILED: i32 = -18;
    pub const THREADPOOL_INTERNAL: i32 = -20;
    pub const READONLY: i32 = -21;
    pub const NOMASTER: i32 = -101;
    pub const UNTAGGED_DATABASE: i32 = -102;
    pub const CONSTRAINTS: i32 = -103;
    pub const TRAN_IO_ERROR: i32 = -105;
    pub const ACCESS: i32 = -106;
    pub const TRAN_MODE_UNSUPPORTED: i32 = -107;
    pub const VERIFY_ERROR: i32 = 2;
    pub const FKEY_VIOLATION: i32 = 3;
    pub const NULL_CONSTRAINT: i32 = 4;
    pub const CONV_FAIL: i32 = 113;
    pub const NONKLESS: i32 = 114;
    pub const MALLOC: i32 = 115;
    pub const NOTSUPPORTED: i32 = 116;
    pub const DEADLOCK: i32 = 203;
    pub const DUPLICATE: i32 = 299;
    pub const UNKNOWN: i32 = 300;
    pub const TZNAME_FAIL: i32 = 401;
}
