//! # World Server
//!
//! Frame intake tying the dispatch tables to the world state.
//!
//! The bootstrap builds the handler registry and the game-message dispatcher,
//! hands them to [`WorldServer`], and points the transport at
//! [`WorldServer::handle_frame`]. One logical flow of control runs per client
//! connection: frames on a connection are processed sequentially, and many
//! connections run concurrently.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{error, info, warn};

use crate::config::WorldConfig;
use crate::core::frame::{FrameCodec, FrameHeader, FRAME_HEADER_LEN, GAME_MESSAGE_BODY_OFFSET};
use crate::core::BitReader;
use crate::error::Result;
use crate::protocol::{GameMessageDispatcher, HandlerRegistry};
use crate::replica::ObjectId;
use crate::world::session_cache::SessionCache;
use crate::world::zone_cache::ZoneRegistry;

/// Context handed to every handler invocation.
#[derive(Clone)]
pub struct WorldContext {
    pub peer: SocketAddr,
    pub sessions: Arc<SessionCache>,
    pub zones: Arc<ZoneRegistry>,
}

/// The network-facing core: dispatch tables plus the shared world state.
pub struct WorldServer {
    registry: HandlerRegistry<WorldContext>,
    game_messages: GameMessageDispatcher<WorldContext>,
    sessions: Arc<SessionCache>,
    zones: Arc<ZoneRegistry>,
}

impl WorldServer {
    pub fn new(
        config: &WorldConfig,
        registry: HandlerRegistry<WorldContext>,
        game_messages: GameMessageDispatcher<WorldContext>,
        zones: Arc<ZoneRegistry>,
    ) -> Self {
        Self {
            registry,
            game_messages,
            sessions: Arc::new(SessionCache::new(
                config.server.max_sessions,
                Duration::from_secs(config.server.session_ttl_secs),
            )),
            zones,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    pub fn zones(&self) -> &Arc<ZoneRegistry> {
        &self.zones
    }

    /// Per-connection frame intake, consumed by the transport layer.
    ///
    /// Malformed and unknown frames are logged and dropped; only a handler
    /// fault propagates, so the connection boundary can decide consequences.
    pub async fn handle_frame(&self, peer: SocketAddr, frame: &[u8]) -> Result<()> {
        let header = match FrameHeader::parse(frame) {
            Ok(header) => header,
            Err(e) => {
                warn!(%peer, error = %e, "Dropping malformed frame");
                return Ok(());
            }
        };

        let ctx = WorldContext {
            peer,
            sessions: self.sessions.clone(),
            zones: self.zones.clone(),
        };

        if header.is_game_message() {
            let mut reader = BitReader::new(frame);
            let (object_id, message_id) = match Self::read_message_envelope(&mut reader) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(%peer, error = %e, "Dropping truncated game message");
                    return Ok(());
                }
            };
            debug_assert_eq!(reader.bit_position(), GAME_MESSAGE_BODY_OFFSET * 8);
            self.game_messages
                .dispatch(object_id, message_id, frame, ctx)
                .await
        } else {
            self.registry
                .dispatch(header.phase, header.packet_id, &frame[FRAME_HEADER_LEN..], ctx)
                .await
        }
    }

    fn read_message_envelope(reader: &mut BitReader<'_>) -> Result<(ObjectId, u16)> {
        reader.seek_to_byte(FRAME_HEADER_LEN)?;
        let object_id = ObjectId(reader.read_i64()?);
        let message_id = reader.read_u16()?;
        Ok((object_id, message_id))
    }

    /// Accept loop over a stream transport. Each connection gets its own task;
    /// frames within a connection are processed in order.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let (_shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        self.serve_with_shutdown(listener, shutdown_rx).await
    }

    /// Accept loop with an external shutdown channel.
    pub async fn serve_with_shutdown(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        info!(address = %listener.local_addr()?, "World server listening");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down world server");
                    return Ok(());
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            info!(%peer, "New connection established");
                            let server = self.clone();

                            tokio::spawn(async move {
                                let mut framed = Framed::new(stream, FrameCodec);

                                while let Some(next) = framed.next().await {
                                    match next {
                                        Ok(frame) => {
                                            // A fault from an ordered handler closes this
                                            // connection; others are unaffected.
                                            if let Err(e) = server.handle_frame(peer, &frame).await {
                                                error!(%peer, error = %e, "Handler fault, closing connection");
                                                break;
                                            }
                                        }
                                        Err(e) => {
                                            warn!(%peer, error = %e, "Transport decode error, closing connection");
                                            break;
                                        }
                                    }
                                }

                                server.sessions.delete_session(peer).await;
                                info!(%peer, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Error accepting connection");
                        }
                    }
                }
            }
        }
    }
}
