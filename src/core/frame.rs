//! # Frame Envelope
//!
//! Outer packet framing and transport codec.
//!
//! Every frame starts with the same fixed 8-byte header:
//!
//! ```text
//! [Marker(1)] [Phase(2, LE)] [PacketId(4, LE)] [Pad(1)] [Body(N)]
//! ```
//!
//! Game-message frames (packet id [`GAME_MESSAGE_PACKET_ID`] in the world
//! phase) continue with an addressed object id and message id, which places the
//! message payload at byte [`GAME_MESSAGE_BODY_OFFSET`]:
//!
//! ```text
//! [Header(8)] [ObjectId(8, LE)] [MessageId(2, LE)] [MessageBody(N)]
//! ```
//!
//! The transport is only assumed to deliver whole byte buffers per connection;
//! over a stream transport [`FrameCodec`] supplies length-delimited framing
//! with a max-frame-size guard.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{constants, Result, WorldError};
use crate::protocol::ConnectionPhase;

/// Marker byte opening every user frame.
pub const FRAME_MARKER: u8 = 0x53;

/// Byte length of the fixed frame header.
pub const FRAME_HEADER_LEN: usize = 8;

/// Packet id carrying the secondary game-message layer.
pub const GAME_MESSAGE_PACKET_ID: u32 = 0x05;

/// Absolute byte offset of a game message's payload within its frame.
pub const GAME_MESSAGE_BODY_OFFSET: usize = 18;

/// Max allowed frame size (prevents memory exhaustion on length-prefix abuse).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Parsed fixed header of an inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub phase: ConnectionPhase,
    pub packet_id: u32,
}

impl FrameHeader {
    /// Parses the fixed header from the start of a frame.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        if frame.len() < FRAME_HEADER_LEN {
            return Err(WorldError::DecodeMismatch {
                needed: FRAME_HEADER_LEN * 8,
                remaining: frame.len() * 8,
            });
        }
        if frame[0] != FRAME_MARKER {
            return Err(WorldError::InvalidArgument(constants::ERR_BAD_FRAME_MARKER));
        }
        let phase = ConnectionPhase::from_raw(u16::from_le_bytes([frame[1], frame[2]]));
        let packet_id = u32::from_le_bytes([frame[3], frame[4], frame[5], frame[6]]);
        Ok(Self { phase, packet_id })
    }

    /// True when the body carries the secondary message-id layer.
    pub fn is_game_message(&self) -> bool {
        self.phase == ConnectionPhase::World && self.packet_id == GAME_MESSAGE_PACKET_ID
    }

    /// Encodes the fixed header followed by `body` into a complete frame.
    pub fn encode(&self, body: &[u8]) -> Bytes {
        let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + body.len());
        out.put_u8(FRAME_MARKER);
        out.put_u16_le(self.phase.raw());
        out.put_u32_le(self.packet_id);
        out.put_u8(0);
        out.extend_from_slice(body);
        out.freeze()
    }
}

/// Length-delimited frame codec for stream transports.
///
/// Wire format: `[Length(4, LE)] [Frame(N)]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameCodec;

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = WorldError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if src.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_le_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            return Err(WorldError::InvalidArgument(constants::ERR_OVERSIZED_FRAME));
        }
        if src.len() < 4 + len {
            src.reserve(4 + len - src.len());
            return Ok(None);
        }
        src.advance(4);
        Ok(Some(src.split_to(len).freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = WorldError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > MAX_FRAME_SIZE {
            return Err(WorldError::InvalidArgument(constants::ERR_OVERSIZED_FRAME));
        }
        dst.reserve(4 + frame.len());
        dst.put_u32_le(frame.len() as u32);
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = FrameHeader {
            phase: ConnectionPhase::World,
            packet_id: 0x13,
        };
        let frame = header.encode(&[1, 2, 3]);
        let parsed = FrameHeader::parse(&frame).unwrap();
        assert_eq!(parsed, header);
        assert_eq!(&frame[FRAME_HEADER_LEN..], &[1, 2, 3]);
    }

    #[test]
    fn game_message_frames_are_flagged() {
        let header = FrameHeader {
            phase: ConnectionPhase::World,
            packet_id: GAME_MESSAGE_PACKET_ID,
        };
        assert!(header.is_game_message());
        assert!(!FrameHeader {
            phase: ConnectionPhase::Auth,
            ..header
        }
        .is_game_message());
    }

    #[test]
    fn codec_waits_for_full_frame() {
        let mut codec = FrameCodec;
        let mut buf = BytesMut::new();
        codec.encode(Bytes::from_static(&[9, 9, 9]), &mut buf).unwrap();

        let mut partial = BytesMut::from(&buf[..4]);
        assert!(codec.decode(&mut partial).unwrap().is_none());

        let frame = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&frame[..], &[9, 9, 9]);
    }
}
