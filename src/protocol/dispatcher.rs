//! # Game Message Dispatcher
//!
//! Second-tier routing for entity-addressed game messages.
//!
//! Game messages arrive inside one outer packet kind and are identified by
//! their own message id. Each id maps to an ordered list of subscribers; all
//! are invoked in registration order, each with a fresh cursor repositioned to
//! the fixed header boundary.
//!
//! A missing mapping is a warning and a dropped frame, never fatal. A decode
//! or handler fault is logged, then re-raised so a misbehaving handler cannot
//! silently corrupt later state; the connection boundary decides what happens
//! to the connection.

use std::collections::HashMap;

use futures::future::BoxFuture;
use std::future::Future;
use tracing::{debug, error, warn};

use crate::core::{frame::GAME_MESSAGE_BODY_OFFSET, BitReader, FromBitStream};
use crate::error::{Result, WorldError};
use crate::replica::ObjectId;

/// Declared identity of a game message shape. The deliberate counterpart of
/// [`PacketShape`](crate::protocol::PacketShape): implementing this trait and
/// not that one keeps game messages out of the first-tier table.
pub trait GameMessageShape {
    const MESSAGE_ID: u16;
    const NAME: &'static str;
}

/// Context handed to game message subscribers.
#[derive(Debug, Clone)]
pub struct GameMessageContext<C> {
    /// The game object the message is addressed to.
    pub object_id: ObjectId,
    pub inner: C,
}

type BoxedSubscriber<C> =
    Box<dyn Fn(&[u8], GameMessageContext<C>) -> Result<BoxFuture<'static, Result<()>>> + Send + Sync>;

struct Subscriber<C> {
    name: &'static str,
    invoke: BoxedSubscriber<C>,
}

/// Message-id keyed fan-out table. Built at startup, then shared immutably.
pub struct GameMessageDispatcher<C> {
    subscribers: HashMap<u16, Vec<Subscriber<C>>>,
}

impl<C: Clone + Send + 'static> Default for GameMessageDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clone + Send + 'static> GameMessageDispatcher<C> {
    pub fn new() -> Self {
        Self {
            subscribers: HashMap::new(),
        }
    }

    /// Appends a subscriber for `M`. Multiple independent subscribers per
    /// message id are supported; dispatch invokes them in registration order.
    pub fn subscribe<M, F, Fut>(&mut self, handler: F)
    where
        M: GameMessageShape + FromBitStream + Send + 'static,
        F: Fn(M, GameMessageContext<C>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let invoke: BoxedSubscriber<C> = Box::new(move |frame, ctx| {
            let mut reader = BitReader::new(frame);
            reader.seek_to_byte(GAME_MESSAGE_BODY_OFFSET)?;
            let message = reader.decode::<M>()?;
            Ok(Box::pin(handler(message, ctx)))
        });

        debug!(message = M::NAME, message_id = M::MESSAGE_ID, "Subscribed game message handler");

        self.subscribers
            .entry(M::MESSAGE_ID)
            .or_default()
            .push(Subscriber {
                name: M::NAME,
                invoke,
            });
    }

    pub fn subscriber_count(&self, message_id: u16) -> usize {
        self.subscribers
            .get(&message_id)
            .map_or(0, |subs| subs.len())
    }

    /// Routes one game-message frame to every subscriber of its message id.
    ///
    /// `frame` is the complete frame including the outer envelope; each
    /// subscriber re-seeks to the message body boundary before decoding.
    pub async fn dispatch(
        &self,
        object_id: ObjectId,
        message_id: u16,
        frame: &[u8],
        ctx: C,
    ) -> Result<()> {
        let Some(subscribers) = self.subscribers.get(&message_id) else {
            warn!(message_id = format_args!("0x{message_id:x}"), "No handler registered for game message, dropping");
            return Ok(());
        };

        debug!(
            message = subscribers[0].name,
            ?object_id,
            "Dispatching game message"
        );

        for subscriber in subscribers {
            let ctx = GameMessageContext {
                object_id,
                inner: ctx.clone(),
            };
            let fut = match (subscriber.invoke)(frame, ctx) {
                Ok(fut) => fut,
                Err(e) => {
                    error!(message = subscriber.name, error = %e, "Failed to decode game message");
                    return Err(e);
                }
            };
            if let Err(e) = fut.await {
                error!(message = subscriber.name, error = %e, "Game message handler fault");
                return Err(WorldError::handler_fault(subscriber.name, e));
            }
        }

        Ok(())
    }
}
