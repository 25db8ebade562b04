//! Server network layer: WebSocket transport and the session event loop

use crate::config::ServerConfig;
use crate::connection_manager::Outbound;
use crate::dispatcher::Dispatcher;
use crate::session::{Admission, Session};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::codec::{encode, EncodedFrame};
use shared::{ClientMessage, Encoding, PlayerId, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, sleep_until, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Events sent from connection tasks to the session loop
#[derive(Debug)]
pub enum SessionEvent {
    Join {
        addr: SocketAddr,
        outbound: mpsc::Sender<Outbound>,
        reply: oneshot::Sender<Admission>,
    },
    Message {
        player_id: PlayerId,
        message: ClientMessage,
    },
    Leave {
        player_id: PlayerId,
    },
}

/// Per-connection settings copied out of the server config
#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    idle_timeout: Option<Duration>,
    outbound_capacity: usize,
}

/// Authoritative arena server
pub struct Server {
    listener: TcpListener,
    session: Session,
    dispatcher: Dispatcher,
    settings: ConnectionSettings,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl Server {
    /// Validates the config, binds the listener and seeds the world.
    ///
    /// A bind failure is returned to the caller; the binary treats it as fatal.
    pub async fn bind(config: ServerConfig) -> Result<Self, BoxError> {
        config.validate()?;

        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!(
            "Server listening on {} (capacity {})",
            listener.local_addr()?,
            config.max_players
        );

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            session: Session::new(&config),
            dispatcher: Dispatcher::new(),
            settings: ConnectionSettings {
                idle_timeout: config.idle_timeout,
                outbound_capacity: config.outbound_capacity,
            },
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections and applies session events until the task is dropped.
    pub async fn run(mut self) -> Result<(), BoxError> {
        let mut stats_interval = interval(STATS_INTERVAL);

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => self.spawn_connection(stream, addr),
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },

                event = self.events_rx.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("Session channel closed, shutting down");
                        break;
                    }
                },

                _ = stats_interval.tick() => {
                    if !self.session.connections().is_empty() {
                        debug!(
                            "Revision {}: {} players, {} collectibles left, {} consumed, {} messages dropped",
                            self.session.revision(),
                            self.session.registry().len(),
                            self.session.pool().collectible_count(),
                            self.session.pool().consumed(),
                            self.dispatcher.dropped()
                        );
                    }
                },
            }
        }

        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        let events = self.events_tx.clone();
        let settings = self.settings;

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, addr, events, settings).await {
                debug!("Connection from {} ended with error: {}", addr, e);
            }
        });
    }

    /// Runs one event to completion: validate, mutate, then broadcast.
    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Join {
                addr,
                outbound,
                reply,
            } => {
                let admission = self.session.join(addr, outbound);
                let Admission::Admitted { player_id } = admission else {
                    let _ = reply.send(admission);
                    return;
                };

                if reply.send(admission).is_err() {
                    warn!("Connection {} went away during admission", player_id);
                    let broadcast = self.session.leave(player_id);
                    self.dispatcher.dispatch(&self.session, broadcast);
                    return;
                }

                let welcome = self.session.welcome(player_id);
                let objects = self.session.objects_snapshot();
                self.dispatcher.send_to(&self.session, player_id, welcome);
                self.dispatcher.send_to(&self.session, player_id, objects);
                self.session.activate(player_id);
                self.dispatcher.broadcast_players(&self.session);
            }

            SessionEvent::Message { player_id, message } => {
                let broadcast = self.session.apply(player_id, message);
                self.dispatcher.dispatch(&self.session, broadcast);
            }

            SessionEvent::Leave { player_id } => {
                let broadcast = self.session.leave(player_id);
                self.dispatcher.dispatch(&self.session, broadcast);
            }
        }
    }
}

/// Drives a single client from handshake to teardown
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<SessionEvent>,
    settings: ConnectionSettings,
) -> Result<(), BoxError> {
    let mut ws = accept_async(stream).await?;

    let (outbound_tx, mut outbound_rx) = mpsc::channel(settings.outbound_capacity);
    let (reply_tx, reply_rx) = oneshot::channel();
    events
        .send(SessionEvent::Join {
            addr,
            outbound: outbound_tx,
            reply: reply_tx,
        })
        .map_err(|_| "session loop has shut down")?;

    let player_id = match reply_rx.await? {
        Admission::Admitted { player_id } => player_id,
        Admission::Rejected => {
            let rejection = ServerMessage::AdmissionRejected {
                reason: "Server full".to_string(),
            };
            send_message(&mut ws, &rejection, Encoding::Json).await?;
            ws.close(None).await?;
            return Ok(());
        }
    };

    let mut encoding = Encoding::Json;
    let mut last_seen = Instant::now();

    loop {
        let deadline = settings.idle_timeout.map(|timeout| last_seen + timeout);

        tokio::select! {
            frame = ws.next() => {
                let decoded = match frame {
                    Some(Ok(Message::Text(text))) => Some((ClientMessage::from_text(&text), Encoding::Json)),
                    Some(Ok(Message::Binary(bytes))) => Some((ClientMessage::from_binary(&bytes), Encoding::Bincode)),
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        debug!("Read error on connection {}: {}", player_id, e);
                        break;
                    }
                };
                last_seen = Instant::now();

                match decoded {
                    Some((Ok(message), frame_encoding)) => {
                        encoding = frame_encoding;
                        match message {
                            ClientMessage::Probe { nonce } => {
                                if send_message(&mut ws, &ServerMessage::ProbeAck { nonce }, encoding).await.is_err() {
                                    break;
                                }
                            }
                            ClientMessage::Leave => break,
                            message => {
                                if events.send(SessionEvent::Message { player_id, message }).is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some((Err(e), _)) => warn!("Dropping malformed frame from connection {}: {}", player_id, e),
                    None => {}
                }
            },

            outbound = outbound_rx.recv() => match outbound {
                Some(message) => {
                    if let Err(e) = send_message(&mut ws, &message, encoding).await {
                        debug!("Write error on connection {}: {}", player_id, e);
                        break;
                    }
                }
                None => break,
            },

            _ = idle_expired(deadline) => {
                info!("Connection {} idle for too long, disconnecting", player_id);
                break;
            },
        }
    }

    debug!("Connection {} from {} closed", player_id, addr);
    let _ = events.send(SessionEvent::Leave { player_id });
    let _ = ws.close(None).await;
    Ok(())
}

async fn send_message(
    ws: &mut WebSocketStream<TcpStream>,
    message: &ServerMessage,
    encoding: Encoding,
) -> Result<(), BoxError> {
    let frame = match encode(message, encoding)? {
        EncodedFrame::Text(text) => Message::Text(text),
        EncodedFrame::Binary(bytes) => Message::Binary(bytes),
    };
    ws.send(frame).await?;
    Ok(())
}

async fn idle_expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::ConnectionState;

    fn local_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            max_players: 2,
            collectibles: 4,
            hazards: 1,
            seed: Some(5),
            ..ServerConfig::default()
        }
    }

    fn test_addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = ServerConfig {
            max_players: 0,
            ..local_config()
        };
        assert!(Server::bind(config).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_rejects_zero_outbound_capacity() {
        let config = ServerConfig {
            outbound_capacity: 0,
            ..local_config()
        };
        assert!(Server::bind(config).await.is_err());
    }

    #[tokio::test]
    async fn test_bind_fails_on_taken_port() {
        let first = Server::bind(local_config()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let config = ServerConfig {
            bind_addr: taken.to_string(),
            ..local_config()
        };
        assert!(Server::bind(config).await.is_err());
    }

    #[tokio::test]
    async fn test_join_event_queues_welcome_then_snapshots() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let (outbound, mut rx) = mpsc::channel(8);
        let (reply, reply_rx) = oneshot::channel();

        server.handle_event(SessionEvent::Join {
            addr: test_addr(),
            outbound,
            reply,
        });

        let Admission::Admitted { player_id } = reply_rx.await.unwrap() else {
            panic!("expected admission");
        };
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            ServerMessage::Welcome { player_id: id, max_players: 2 } if *id == player_id
        ));
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            ServerMessage::ObjectsSnapshot { .. }
        ));
        assert!(matches!(
            rx.try_recv().unwrap().as_ref(),
            ServerMessage::PlayersSnapshot { .. }
        ));
        assert_eq!(
            server.session.connections().state(player_id),
            Some(ConnectionState::Active)
        );
    }

    #[tokio::test]
    async fn test_join_with_dropped_reply_is_cleaned_up() {
        let mut server = Server::bind(local_config()).await.unwrap();
        let (outbound, _rx) = mpsc::channel(8);
        let (reply, reply_rx) = oneshot::channel();
        drop(reply_rx);

        server.handle_event(SessionEvent::Join {
            addr: test_addr(),
            outbound,
            reply,
        });

        assert!(server.session.connections().is_empty());
        assert!(server.session.registry().is_empty());
    }

    #[tokio::test]
    async fn test_leave_event_broadcasts_to_remaining() {
        let mut server = Server::bind(local_config()).await.unwrap();

        let mut ids = Vec::new();
        let mut queues = Vec::new();
        for _ in 0..2 {
            let (outbound, rx) = mpsc::channel(16);
            let (reply, reply_rx) = oneshot::channel();
            server.handle_event(SessionEvent::Join {
                addr: test_addr(),
                outbound,
                reply,
            });
            if let Admission::Admitted { player_id } = reply_rx.await.unwrap() {
                ids.push(player_id);
            }
            queues.push(rx);
        }

        server.handle_event(SessionEvent::Leave { player_id: ids[0] });

        let survivor = &mut queues[1];
        let mut last_players = None;
        while let Ok(message) = survivor.try_recv() {
            if let ServerMessage::PlayersSnapshot { players, .. } = message.as_ref() {
                last_players = Some(players.clone());
            }
        }
        let players = last_players.expect("survivor saw no players snapshot");
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, ids[1]);
    }

    #[test]
    fn test_idle_expired_without_timeout_never_fires() {
        let mut expired = tokio_test::task::spawn(idle_expired(None));
        tokio_test::assert_pending!(expired.poll());
        tokio_test::assert_pending!(expired.poll());
    }

    #[tokio::test]
    async fn test_idle_expired_fires_at_deadline() {
        let deadline = Instant::now() + Duration::from_millis(5);
        let fired = tokio::time::timeout(Duration::from_secs(1), idle_expired(Some(deadline))).await;
        assert!(fired.is_ok());
    }
}
