//! # Protocol Dispatch
//!
//! Two-tier routing of inbound frames to application handlers.
//!
//! The first tier is the [`registry::HandlerRegistry`]: an immutable table
//! built once at startup that resolves `(connection phase, packet id)` to a
//! typed handler. The second tier is the [`dispatcher::GameMessageDispatcher`]:
//! entity-addressed game messages carry their own message id inside one outer
//! packet kind and fan out to every registered subscriber.
//!
//! Both tables are read-only after startup and need no synchronization for
//! lookup; one logical flow of control per connection awaits non-task handlers
//! inline, preserving per-connection frame ordering.

pub mod dispatcher;
pub mod packets;
pub mod registry;

pub use dispatcher::{GameMessageContext, GameMessageDispatcher, GameMessageShape};
pub use registry::{HandlerRegistry, RegistryBuilder, RunMode};

/// Connection-type context under which a packet identifier is interpreted.
///
/// A packet id only has meaning within a phase; the same numeric id can be a
/// different packet pre-auth and in-world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPhase {
    General,
    Auth,
    Chat,
    World,
    Client,
    /// Phase value this build does not know about. Frames in an unknown phase
    /// never match a handler and are dropped by dispatch.
    Unknown(u16),
}

impl ConnectionPhase {
    pub fn from_raw(raw: u16) -> Self {
        match raw {
            0 => ConnectionPhase::General,
            1 => ConnectionPhase::Auth,
            2 => ConnectionPhase::Chat,
            4 => ConnectionPhase::World,
            5 => ConnectionPhase::Client,
            other => ConnectionPhase::Unknown(other),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            ConnectionPhase::General => 0,
            ConnectionPhase::Auth => 1,
            ConnectionPhase::Chat => 2,
            ConnectionPhase::World => 4,
            ConnectionPhase::Client => 5,
            ConnectionPhase::Unknown(other) => other,
        }
    }
}

/// Declared-constant identity of a packet shape.
///
/// A registration may override both constants; absent an override these
/// defaults apply. Game messages deliberately do not implement this trait so
/// they cannot land in the first-tier table.
pub trait PacketShape {
    const PHASE: ConnectionPhase;
    const PACKET_ID: u32;
    const NAME: &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_raw_round_trip() {
        for raw in [0u16, 1, 2, 4, 5, 9000] {
            assert_eq!(ConnectionPhase::from_raw(raw).raw(), raw);
        }
    }
}
