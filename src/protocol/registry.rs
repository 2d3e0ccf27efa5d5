//! # Packet Handler Registry
//!
//! Startup-built, immutable table resolving `(phase, packet id)` to a handler.
//!
//! Registration is an explicit table assembled by the process bootstrap from
//! typed `register` calls; the packet type's declared constants supply the
//! default phase and id, and `register_as` overrides them. Re-registering a
//! pair overwrites the prior entry (logged, never fatal); last registration
//! wins.
//!
//! Dispatch decodes the packet body through the bitstream codec and invokes
//! the bound handler. Handlers registered as [`RunMode::Task`] run without
//! blocking subsequent frames on the connection; [`RunMode::Ordered`] handlers
//! run to completion first, preserving per-connection ordering.

use std::collections::HashMap;

use futures::future::BoxFuture;
use std::future::Future;
use tracing::{debug, error, warn};

use crate::core::{BitReader, FromBitStream};
use crate::error::{Result, WorldError};
use crate::protocol::{ConnectionPhase, PacketShape};

/// Whether a handler may run concurrently with other traffic on its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run to completion before the next frame on the connection is processed.
    #[default]
    Ordered,
    /// Spawn as a task; subsequent frames do not wait for it.
    Task,
}

type BoxedHandler<C> =
    Box<dyn Fn(&[u8], C) -> Result<BoxFuture<'static, Result<()>>> + Send + Sync>;

struct HandlerEntry<C> {
    name: &'static str,
    run_mode: RunMode,
    invoke: BoxedHandler<C>,
}

/// Builder collecting the static registration table.
pub struct RegistryBuilder<C> {
    entries: HashMap<(ConnectionPhase, u32), HandlerEntry<C>>,
}

impl<C: Send + 'static> Default for RegistryBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Send + 'static> RegistryBuilder<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Registers a handler under the packet type's declared phase and id.
    pub fn register<P, F, Fut>(self, run_mode: RunMode, handler: F) -> Self
    where
        P: PacketShape + FromBitStream + Send + 'static,
        F: Fn(P, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.register_as::<P, F, Fut>(P::PHASE, P::PACKET_ID, run_mode, handler)
    }

    /// Registers a handler with explicit phase and id, overriding the packet
    /// type's declared defaults.
    pub fn register_as<P, F, Fut>(
        mut self,
        phase: ConnectionPhase,
        packet_id: u32,
        run_mode: RunMode,
        handler: F,
    ) -> Self
    where
        P: PacketShape + FromBitStream + Send + 'static,
        F: Fn(P, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let invoke: BoxedHandler<C> = Box::new(move |body, ctx| {
            let mut reader = BitReader::new(body);
            let packet = reader.decode::<P>()?;
            Ok(Box::pin(handler(packet, ctx)))
        });

        let entry = HandlerEntry {
            name: P::NAME,
            run_mode,
            invoke,
        };

        match self.entries.insert((phase, packet_id), entry) {
            None => debug!(packet = P::NAME, ?phase, packet_id, "Registered handler"),
            Some(prior) => debug!(
                packet = P::NAME,
                prior = prior.name,
                ?phase,
                packet_id,
                "Handler overwritten"
            ),
        }

        self
    }

    /// Seals the table. No registration is possible afterwards.
    pub fn build(self) -> HandlerRegistry<C> {
        HandlerRegistry {
            entries: self.entries,
        }
    }
}

/// Immutable two-level handler table. Lookup requires no synchronization.
pub struct HandlerRegistry<C> {
    entries: HashMap<(ConnectionPhase, u32), HandlerEntry<C>>,
}

impl<C: Send + 'static> HandlerRegistry<C> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, phase: ConnectionPhase, packet_id: u32) -> bool {
        self.entries.contains_key(&(phase, packet_id))
    }

    /// Routes one decoded frame body.
    ///
    /// A missing handler or a body shorter than the packet shape is logged and
    /// dropped; neither surfaces to the peer. A fault from an ordered handler
    /// is logged, then re-raised so the connection boundary can decide
    /// consequences. Task-mode faults are logged inside the spawned task.
    pub async fn dispatch(
        &self,
        phase: ConnectionPhase,
        packet_id: u32,
        body: &[u8],
        ctx: C,
    ) -> Result<()> {
        let Some(entry) = self.entries.get(&(phase, packet_id)) else {
            warn!(?phase, packet_id, "No handler registered for packet, dropping frame");
            return Ok(());
        };

        let fut = match (entry.invoke)(body, ctx) {
            Ok(fut) => fut,
            Err(e) => {
                warn!(packet = entry.name, error = %e, "Failed to decode packet body, dropping frame");
                return Ok(());
            }
        };

        match entry.run_mode {
            RunMode::Task => {
                let name = entry.name;
                tokio::spawn(async move {
                    if let Err(e) = fut.await {
                        error!(packet = name, error = %e, "Task handler fault");
                    }
                });
                Ok(())
            }
            RunMode::Ordered => fut.await.map_err(|e| {
                error!(packet = entry.name, error = %e, "Handler fault");
                WorldError::handler_fault(entry.name, e)
            }),
        }
    }
}
