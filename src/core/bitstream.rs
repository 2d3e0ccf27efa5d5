//! # Bitstream Codec
//!
//! Bit-level reader and writer over byte buffers.
//!
//! Every packet body and every replica component snapshot in the wire format is
//! bit-packed: optional fields are guarded by single presence bits and strings
//! occupy a fixed number of character slots. This module is the single set of
//! primitives both encode and decode sites go through, so the two can never
//! drift apart.
//!
//! ## Conventions
//! - Bits are packed MSB-first within each byte.
//! - Multi-byte integers and floats are little-endian.
//! - Fixed-slot strings are zero-terminated and always consume their full
//!   declared width, regardless of where the terminator lands.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{constants, Result, WorldError};

/// Default character-slot width for fixed-slot string fields.
pub const DEFAULT_STRING_WIDTH: usize = 33;

/// Decode half of the bitstream seam. Packet bodies and component snapshots
/// implement this to be readable through [`BitReader::decode`].
pub trait FromBitStream: Sized {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self>;
}

/// Encode half of the bitstream seam.
pub trait ToBitStream {
    fn encode(&self, writer: &mut BitWriter) -> Result<()>;
}

/// Bit-level writer backed by a growable byte buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    buf: BytesMut,
    scratch: u8,
    scratch_bits: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(bytes),
            scratch: 0,
            scratch_bits: 0,
        }
    }

    /// Number of bits written so far.
    pub fn bit_len(&self) -> usize {
        self.buf.len() * 8 + self.scratch_bits as usize
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.scratch = (self.scratch << 1) | bit as u8;
        self.scratch_bits += 1;
        if self.scratch_bits == 8 {
            self.buf.put_u8(self.scratch);
            self.scratch = 0;
            self.scratch_bits = 0;
        }
    }

    /// Writes one byte, MSB first.
    pub fn write_u8(&mut self, value: u8) {
        if self.scratch_bits == 0 {
            self.buf.put_u8(value);
        } else {
            for i in (0..8).rev() {
                self.write_bit((value >> i) & 1 == 1);
            }
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.scratch_bits == 0 {
            self.buf.extend_from_slice(bytes);
        } else {
            for &b in bytes {
                self.write_u8(b);
            }
        }
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_bytes(&value.to_le_bytes());
    }

    /// Writes a narrow fixed-slot string: one byte per slot, zero-terminated,
    /// padded with zero slots to exactly `width`.
    pub fn write_string(&mut self, value: &str, width: usize) -> Result<()> {
        self.write_slots(value.bytes().map(u16::from), width, false)
    }

    /// Writes a wide fixed-slot string: two bytes (one UTF-16 code unit) per slot.
    pub fn write_wide_string(&mut self, value: &str, width: usize) -> Result<()> {
        self.write_slots(value.encode_utf16(), width, true)
    }

    fn write_slots<I>(&mut self, slots: I, width: usize, wide: bool) -> Result<()>
    where
        I: Iterator<Item = u16>,
    {
        if width == 0 {
            return Err(WorldError::InvalidArgument(constants::ERR_ZERO_STRING_WIDTH));
        }
        let mut written = 0;
        for slot in slots {
            // The terminator slot must always fit.
            if written + 1 >= width {
                return Err(WorldError::InvalidArgument(constants::ERR_STRING_TOO_LONG));
            }
            if wide {
                self.write_u16(slot);
            } else {
                self.write_u8(slot as u8);
            }
            written += 1;
        }
        for _ in written..width {
            if wide {
                self.write_u16(0);
            } else {
                self.write_u8(0);
            }
        }
        Ok(())
    }

    pub fn encode<T: ToBitStream>(&mut self, value: &T) -> Result<()> {
        value.encode(self)
    }

    /// Finalizes the stream, zero-padding any trailing partial byte.
    pub fn finish(mut self) -> Bytes {
        if self.scratch_bits > 0 {
            let pad = 8 - self.scratch_bits;
            self.buf.put_u8(self.scratch << pad);
        }
        self.buf.freeze()
    }
}

/// Bit-level reader over a borrowed byte buffer.
#[derive(Debug)]
pub struct BitReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current cursor position in bits from the start of the buffer.
    pub fn bit_position(&self) -> usize {
        self.pos
    }

    pub fn remaining_bits(&self) -> usize {
        self.buf.len() * 8 - self.pos
    }

    /// Repositions the cursor to an absolute byte offset. The game-message
    /// dispatcher uses this to skip the outer packet envelope.
    pub fn seek_to_byte(&mut self, offset: usize) -> Result<()> {
        if offset > self.buf.len() {
            return Err(WorldError::InvalidArgument(constants::ERR_SEEK_PAST_END));
        }
        self.pos = offset * 8;
        Ok(())
    }

    fn require(&self, bits: usize) -> Result<()> {
        if self.remaining_bits() < bits {
            return Err(WorldError::DecodeMismatch {
                needed: bits,
                remaining: self.remaining_bits(),
            });
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        self.require(1)?;
        let byte = self.buf[self.pos / 8];
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(bit == 1)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(8)?;
        if self.pos % 8 == 0 {
            let byte = self.buf[self.pos / 8];
            self.pos += 8;
            return Ok(byte);
        }
        let mut value = 0u8;
        for _ in 0..8 {
            value = (value << 1) | self.read_bit()? as u8;
        }
        Ok(value)
    }

    /// Reads exactly `count` bytes as an opaque buffer, bit-shifting when the
    /// cursor is unaligned.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.require(count * 8)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read_u8()?);
        }
        Ok(out)
    }

    fn read_le<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.require(N * 8)?;
        let mut raw = [0u8; N];
        for b in raw.iter_mut() {
            *b = self.read_u8()?;
        }
        Ok(raw)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_le::<2>()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_le::<4>()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_le::<8>()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_le::<4>()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_le::<8>()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_le::<4>()?))
    }

    /// Reads a narrow fixed-slot string of `width` slots. Accumulation stops at
    /// the first zero slot, but the cursor always advances by exactly `width`
    /// slots so the position after the field is deterministic.
    pub fn read_string(&mut self, width: usize) -> Result<String> {
        let slots = self.read_slots(width, false)?;
        Ok(slots.into_iter().map(|s| s as u8 as char).collect())
    }

    /// Wide variant of [`read_string`](Self::read_string): two bytes per slot,
    /// decoded as UTF-16 code units.
    pub fn read_wide_string(&mut self, width: usize) -> Result<String> {
        let slots = self.read_slots(width, true)?;
        Ok(String::from_utf16_lossy(&slots))
    }

    fn read_slots(&mut self, width: usize, wide: bool) -> Result<Vec<u16>> {
        if width == 0 {
            return Err(WorldError::InvalidArgument(constants::ERR_ZERO_STRING_WIDTH));
        }
        self.require(width * if wide { 16 } else { 8 })?;

        let mut slots = Vec::new();
        let mut consumed = 0;
        for _ in 0..width {
            let slot = if wide {
                self.read_u16()?
            } else {
                self.read_u8()? as u16
            };
            consumed += 1;
            if slot == 0 {
                break;
            }
            slots.push(slot);
        }

        // Consume the padding slots so the cursor lands after the full field
        // no matter where the terminator appeared.
        for _ in consumed..width {
            if wide {
                self.read_u16()?;
            } else {
                self.read_u8()?;
            }
        }

        Ok(slots)
    }

    /// Generic entry point for any structured value with a decode-from-bitstream
    /// capability.
    pub fn decode<T: FromBitStream>(&mut self) -> Result<T> {
        T::decode(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bits_round_trip_across_byte_boundaries() {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_u32(0xDEAD_BEEF);
        writer.write_bit(false);
        writer.write_u16(513);
        let bytes = writer.finish();

        let mut reader = BitReader::new(&bytes);
        assert!(reader.read_bit().unwrap());
        assert_eq!(reader.read_u32().unwrap(), 0xDEAD_BEEF);
        assert!(!reader.read_bit().unwrap());
        assert_eq!(reader.read_u16().unwrap(), 513);
    }

    #[test]
    fn read_past_end_reports_mismatch() {
        let mut reader = BitReader::new(&[0xFF]);
        assert_eq!(reader.read_u8().unwrap(), 0xFF);
        let err = reader.read_bit().unwrap_err();
        assert!(matches!(err, WorldError::DecodeMismatch { .. }));
    }

    #[test]
    fn zero_width_string_is_invalid_argument() {
        let mut writer = BitWriter::new();
        assert!(matches!(
            writer.write_string("a", 0),
            Err(WorldError::InvalidArgument(_))
        ));
        let bytes = [0u8; 4];
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            reader.read_string(0),
            Err(WorldError::InvalidArgument(_))
        ));
    }
}
