//! # Core Protocol Components
//!
//! Low-level bit codec and frame envelope handling.
//!
//! This module provides the foundation for the protocol: the bit-packed
//! primitive reads/writes every packet and replica snapshot is built from, and
//! the fixed frame header that routes a body to the right dispatch table.
//!
//! ## Components
//! - **Bitstream**: MSB-first bit cursor with presence bits and fixed-slot strings
//! - **Frame**: fixed 8-byte envelope plus length-delimited stream codec
//!
//! ## Security
//! - Maximum frame size: 1MB (prevents memory exhaustion)
//! - Length validation before allocation

pub mod bitstream;
pub mod frame;

pub use bitstream::{BitReader, BitWriter, FromBitStream, ToBitStream, DEFAULT_STRING_WIDTH};
pub use frame::{FrameCodec, FrameHeader, GAME_MESSAGE_BODY_OFFSET, GAME_MESSAGE_PACKET_ID};
