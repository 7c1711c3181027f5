//! Centralized error handling for binser.
//!
//! Every fallible operation of the engine returns [`Result`]. Recoverable
//! conditions (I/O on a backing file, a failing stream encoder, a value of the
//! wrong primitive kind) are reported through [`SerializerError`]; the engine
//! never panics on them.
//!
//! Programming errors are a different matter: asking the bit codec for a field
//! that does not fit its backing integer is a bug in the structure description,
//! not a runtime condition, and trips an assertion.
//!
//! ## Unwinding
//!
//! Scoped operations (`do_at`, `do_endian`, `do_encoded`, resolving pointers)
//! restore the cursor, active target and byte order *before* the error leaves
//! the scope, so a caller that catches the error sees the engine in the state
//! it had before the scope was entered.
//!
//! ```rust
//! use binser::{Context, MemoryFile, SerializerError, SerializerExt, SerializerObject};
//!
//! let mut context = Context::default();
//! let file = context.add_file(MemoryFile::new("data.bin"));
//! let start = context.file_pointer(file)?;
//!
//! let mut s = context.serializer();
//! s.goto(Some(start))?;
//! match s.serialize::<u32>(42, "answer") {
//!     Ok(_) => {}
//!     Err(SerializerError::Io(e)) => eprintln!("I/O error: {e}"),
//!     Err(e) => eprintln!("other error: {e}"),
//! }
//! # Ok::<(), SerializerError>(())
//! ```

use std::fmt;
use std::io;
use std::sync::Arc;

use crate::pointer::FileId;

/// A specialized `Result` type for binser operations.
pub type Result<T> = std::result::Result<T, SerializerError>;

/// The master error enum covering all failure domains of the engine.
///
/// This type is `Clone`; I/O errors are wrapped in `Arc` for that reason.
#[derive(Debug, Clone)]
pub enum SerializerError {
    /// Low-level I/O failure on a backing file.
    Io(Arc<io::Error>),

    /// A value does not match the primitive kind the caller asked for.
    ///
    /// Raised before anything is written for that field.
    UnsupportedType(String),

    /// The object describes a layout this engine cannot represent, e.g. a
    /// packed color whose channels span more than 32 bits.
    UnsupportedFormat {
        /// Short description of the offending object.
        object: String,
        /// What exactly is unsupported.
        message: String,
    },

    /// The object has no canonical binary encoding and can never be serialized.
    NotSerializable(String),

    /// A stream encoder rejected its input.
    Encoding(String),

    /// A byte-level operation was issued while no target was selected.
    NoActiveTarget,

    /// A pointer references a file that is not registered in the context.
    UnknownFile(FileId),

    /// Logic error inside the engine. Should not occur; please report it.
    Internal(String),
}

impl fmt::Display for SerializerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O Error: {e}"),
            Self::UnsupportedType(s) => write!(f, "Unsupported Type: {s}"),
            Self::UnsupportedFormat { object, message } => {
                write!(f, "Unsupported Format in {object}: {message}")
            }
            Self::NotSerializable(s) => write!(f, "Not Serializable: {s}"),
            Self::Encoding(s) => write!(f, "Encoding Error: {s}"),
            Self::NoActiveTarget => write!(f, "No active write target"),
            Self::UnknownFile(id) => write!(f, "Unknown file {id}"),
            Self::Internal(s) => write!(f, "Internal Logic Error: {s}"),
        }
    }
}

impl std::error::Error for SerializerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SerializerError {
    fn from(err: io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
