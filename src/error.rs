//! # Error Types
//!
//! Comprehensive error handling for the world protocol core.
//!
//! This module defines all error variants that can occur while decoding frames,
//! replicating entity state, and dispatching packets to handlers.
//!
//! ## Error Categories
//! - **Codec Errors**: malformed codec calls and truncated frames
//! - **Dispatch Errors**: handler faults, wrapped with the handler name
//! - **Zone Errors**: zone definition parse and initialization failures
//! - **I/O Errors**: transport and file system failures
//!
//! Unknown packets and truncated frames are deliberately *not* surfaced to the
//! peer: dispatch logs and drops them, and only `HandlerFault` propagates up to
//! the connection boundary. All errors implement `std::error::Error`.

use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
/// Static strings are borrowed, avoiding heap allocations for common error cases.
pub mod constants {
    /// Codec validation errors
    pub const ERR_ZERO_STRING_WIDTH: &str = "String field width must be at least one slot";
    pub const ERR_STRING_TOO_LONG: &str = "String does not fit in its declared slot width";
    pub const ERR_SEEK_PAST_END: &str = "Seek target lies beyond the end of the frame";

    /// Frame validation errors
    pub const ERR_BAD_FRAME_MARKER: &str = "Frame does not start with the user-frame marker";
    pub const ERR_OVERSIZED_FRAME: &str = "Frame exceeds maximum size";
}

/// Primary error type for all protocol operations.
#[derive(Error, Debug)]
pub enum WorldError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed codec call. This is the caller's bug and fails fast.
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Frame shorter than the expected shape. Logged and dropped at the
    /// dispatch boundary; the connection survives.
    #[error("Decode mismatch: needed {needed} bits, {remaining} remaining")]
    DecodeMismatch { needed: usize, remaining: usize },

    /// A handler raised an error. Logged with full detail, then re-raised so
    /// the connection boundary can decide consequences.
    #[error("Handler fault in {handler}: {source}")]
    HandlerFault {
        handler: &'static str,
        #[source]
        source: Box<WorldError>,
    },

    #[error("Zone load failed: {0}")]
    ZoneLoad(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl WorldError {
    /// Wraps an error raised by a named handler.
    pub fn handler_fault(handler: &'static str, source: WorldError) -> Self {
        WorldError::HandlerFault {
            handler,
            source: Box::new(source),
        }
    }
}

/// Type alias for Results using WorldError
pub type Result<T> = std::result::Result<T, WorldError>;
