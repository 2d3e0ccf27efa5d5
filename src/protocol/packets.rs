//! Concrete packet and game-message shapes.
//!
//! Each shape declares its default phase and id as constants; a registration
//! may override them. Game messages declare a message id instead and go
//! through the second-tier dispatcher.

use crate::core::{BitReader, BitWriter, FromBitStream, ToBitStream, DEFAULT_STRING_WIDTH};
use crate::error::Result;
use crate::protocol::dispatcher::GameMessageShape;
use crate::protocol::{ConnectionPhase, PacketShape};
use crate::replica::{ObjectId, Quaternion, Vector3};

/// First in-world packet of a connection: the client presents its session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_token: String,
}

impl PacketShape for SessionInfo {
    const PHASE: ConnectionPhase = ConnectionPhase::World;
    const PACKET_ID: u32 = 0x01;
    const NAME: &'static str = "SessionInfo";
}

impl FromBitStream for SessionInfo {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            session_token: reader.read_wide_string(DEFAULT_STRING_WIDTH)?,
        })
    }
}

impl ToBitStream for SessionInfo {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_wide_string(&self.session_token, DEFAULT_STRING_WIDTH)
    }
}

/// Client notification that it finished loading a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelLoadComplete {
    pub zone_id: u16,
    pub map_instance: u16,
    pub clone_id: u32,
}

impl PacketShape for LevelLoadComplete {
    const PHASE: ConnectionPhase = ConnectionPhase::World;
    const PACKET_ID: u32 = 0x13;
    const NAME: &'static str = "LevelLoadComplete";
}

impl FromBitStream for LevelLoadComplete {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        Ok(Self {
            zone_id: reader.read_u16()?,
            map_instance: reader.read_u16()?,
            clone_id: reader.read_u32()?,
        })
    }
}

impl ToBitStream for LevelLoadComplete {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_u16(self.zone_id);
        writer.write_u16(self.map_instance);
        writer.write_u32(self.clone_id);
        Ok(())
    }
}

/// Entity-addressed skill cast request. Every optional field is guarded by a
/// single presence bit and consumes nothing when omitted.
#[derive(Debug, Clone, PartialEq)]
pub struct StartSkill {
    pub used_mouse: bool,
    pub consumable_item: Option<ObjectId>,
    pub caster_latency: Option<f32>,
    pub cast_type: Option<i32>,
    pub last_clicked_position: Option<Vector3>,
    pub originator: ObjectId,
    pub target: Option<ObjectId>,
    pub originator_rotation: Option<Quaternion>,
    pub content: Vec<u8>,
    pub skill_id: i32,
    pub skill_handle: Option<u32>,
}

impl GameMessageShape for StartSkill {
    const MESSAGE_ID: u16 = 0x77;
    const NAME: &'static str = "StartSkill";
}

impl FromBitStream for StartSkill {
    fn decode(reader: &mut BitReader<'_>) -> Result<Self> {
        let used_mouse = reader.read_bit()?;
        let consumable_item = read_optional(reader, BitReader::decode::<ObjectId>)?;
        let caster_latency = read_optional(reader, BitReader::read_f32)?;
        let cast_type = read_optional(reader, BitReader::read_i32)?;
        let last_clicked_position = read_optional(reader, BitReader::decode::<Vector3>)?;
        let originator = reader.decode::<ObjectId>()?;
        let target = read_optional(reader, BitReader::decode::<ObjectId>)?;
        let originator_rotation = read_optional(reader, BitReader::decode::<Quaternion>)?;
        let content_len = reader.read_u32()? as usize;
        let content = reader.read_bytes(content_len)?;
        let skill_id = reader.read_i32()?;
        let skill_handle = read_optional(reader, BitReader::read_u32)?;

        Ok(Self {
            used_mouse,
            consumable_item,
            caster_latency,
            cast_type,
            last_clicked_position,
            originator,
            target,
            originator_rotation,
            content,
            skill_id,
            skill_handle,
        })
    }
}

impl ToBitStream for StartSkill {
    fn encode(&self, writer: &mut BitWriter) -> Result<()> {
        writer.write_bit(self.used_mouse);
        write_optional(writer, &self.consumable_item)?;
        write_optional_with(writer, self.caster_latency, BitWriter::write_f32);
        write_optional_with(writer, self.cast_type, BitWriter::write_i32);
        write_optional(writer, &self.last_clicked_position)?;
        writer.encode(&self.originator)?;
        write_optional(writer, &self.target)?;
        write_optional(writer, &self.originator_rotation)?;
        writer.write_u32(self.content.len() as u32);
        writer.write_bytes(&self.content);
        writer.write_i32(self.skill_id);
        write_optional_with(writer, self.skill_handle, BitWriter::write_u32);
        Ok(())
    }
}

fn read_optional<'a, T>(
    reader: &mut BitReader<'a>,
    read: impl FnOnce(&mut BitReader<'a>) -> Result<T>,
) -> Result<Option<T>> {
    if reader.read_bit()? {
        Ok(Some(read(reader)?))
    } else {
        Ok(None)
    }
}

fn write_optional<T: ToBitStream>(writer: &mut BitWriter, value: &Option<T>) -> Result<()> {
    writer.write_bit(value.is_some());
    if let Some(value) = value {
        writer.encode(value)?;
    }
    Ok(())
}

fn write_optional_with<T>(writer: &mut BitWriter, value: Option<T>, write: impl FnOnce(&mut BitWriter, T)) {
    writer.write_bit(value.is_some());
    if let Some(value) = value {
        write(writer, value);
    }
}
