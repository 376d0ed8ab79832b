/*!
Error types for frame reassembly and decoding.
*/

use thiserror::Error;

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, MeterError>;

/// Coarse classification of a failed reading cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The channel itself failed (read, write, or closed)
    Transport,
    /// Reports arrived but did not form a valid frame
    Framing,
    /// A frame was reassembled but is too short to decode
    MalformedFrame,
}

/// Errors raised while triggering and reassembling a frame
#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Unexpected report tag: {tag:#04x} (payload {payload:#04x})")]
    TagMismatch { tag: u8, payload: u8 },

    #[error("Short report: expected 2 bytes, got {0}")]
    ShortReport(usize),

    #[error("Invalid header byte at offset {offset}: {value:#04x}")]
    HeaderMismatch { offset: usize, value: u8 },

    #[error("Frame incomplete after {reads} report reads")]
    ReportLimitExceeded { reads: usize },
}

impl FrameError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            _ => ErrorKind::Framing,
        }
    }
}

/// Errors raised while decoding a reassembled frame
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed frame: {len} bytes, at least {required} required")]
    MalformedFrame { len: usize, required: usize },
}

/// Any failure of one request/response cycle
#[derive(Error, Debug)]
pub enum MeterError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

impl MeterError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Frame(e) => e.kind(),
            Self::Decode(DecodeError::MalformedFrame { .. }) => ErrorKind::MalformedFrame,
        }
    }

    /// Whether the caller may retry with a new trigger.
    ///
    /// Only a closed channel (end of stream) rules out a retry.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            Self::Frame(FrameError::Transport(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof
        )
    }
}
