// Error type shared by the encoder, decoder and driver.
//
// Every failure is fatal for the operation that raised it: nothing is
// retried and no partially reconstructed output is handed back.

use std::io;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Errors raised while encoding or decoding a delta.
#[derive(Debug, Error)]
pub enum DeltaError {
    /// Bad magic, inconsistent indicator, or a section pointer overrun.
    #[error("invalid delta format: {0}")]
    InvalidFormat(String),

    /// The input relies on a VCDIFF feature this engine does not implement,
    /// or exceeds a configured limit.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Malformed or over-length variable-length integer.
    #[error("malformed variable-length integer")]
    NumberEncoding,

    /// A decoded value does not fit the integer width it is stored in.
    #[error("integer overflow")]
    IntegerOverflow,

    /// A stream ended in the middle of a field.
    #[error("incomplete read: stream ended mid-field")]
    IncompleteRead,

    /// Any other failure of an underlying stream.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl DeltaError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<io::Error> for DeltaError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Self::IncompleteRead
        } else {
            Self::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_eof_maps_to_incomplete_read() {
        let e: DeltaError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(e, DeltaError::IncompleteRead));
    }

    #[test]
    fn other_io_errors_are_wrapped() {
        let e: DeltaError = io::Error::new(io::ErrorKind::BrokenPipe, "pipe").into();
        assert!(matches!(e, DeltaError::Io(_)));
        assert!(e.to_string().contains("pipe"));
    }
}
