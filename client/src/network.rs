use crate::game::ArenaView;
use crate::latency::LatencyMonitor;
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::codec::{encode, EncodedFrame};
use shared::{
    ClientMessage, Encoding, ObjectId, ServerMessage, ARENA_HALF_EXTENT, PROBE_INTERVAL,
};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub server_url: String,
    pub encoding: Encoding,
    pub move_interval: Duration,
    pub probe_interval: Duration,
    /// Distance walked per move tick
    pub step: f32,
    /// Leave after this long; run until the server closes otherwise
    pub duration: Option<Duration>,
    pub seed: Option<u64>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000".to_string(),
            encoding: Encoding::Json,
            move_interval: Duration::from_millis(50),
            probe_interval: PROBE_INTERVAL,
            step: 1.5,
            duration: None,
            seed: None,
        }
    }
}

/// How a client session ended
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Rejected { reason: String },
    Left { final_size: Option<f32> },
    ServerClosed,
}

/// Headless arena client: wanders, eats what it touches, measures latency
pub struct Client {
    socket: Socket,
    options: ClientOptions,
    view: ArenaView,
    latency: LatencyMonitor,
    rng: StdRng,
    position: Option<(f32, f32)>,
    target: (f32, f32),
    requested: HashSet<ObjectId>,
}

impl Client {
    pub async fn connect(options: ClientOptions) -> Result<Self, BoxError> {
        let (socket, _) = connect_async(options.server_url.as_str()).await?;
        info!("Connected to {}", options.server_url);

        let mut rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let target = random_point(&mut rng);

        Ok(Client {
            socket,
            options,
            view: ArenaView::new(),
            latency: LatencyMonitor::default(),
            rng,
            position: None,
            target,
            requested: HashSet::new(),
        })
    }

    pub fn view(&self) -> &ArenaView {
        &self.view
    }

    pub fn latency(&self) -> &LatencyMonitor {
        &self.latency
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), BoxError> {
        let frame = match encode(message, self.options.encoding)? {
            EncodedFrame::Text(text) => Message::Text(text),
            EncodedFrame::Binary(bytes) => Message::Binary(bytes),
        };
        self.socket.send(frame).await?;
        Ok(())
    }

    /// Waits for the server's admission decision
    async fn await_admission(&mut self) -> Result<Option<SessionOutcome>, BoxError> {
        while let Some(frame) = self.socket.next().await {
            match decode(frame?) {
                Some(message @ ServerMessage::Welcome { .. }) => {
                    self.view.apply(&message);
                    info!("Admitted as player {:?}", self.view.player_id);
                    return Ok(None);
                }
                Some(ServerMessage::AdmissionRejected { reason }) => {
                    warn!("Admission rejected: {}", reason);
                    return Ok(Some(SessionOutcome::Rejected { reason }));
                }
                Some(other) => debug!("Ignoring {:?} before admission", other),
                None => {}
            }
        }
        Ok(Some(SessionOutcome::ServerClosed))
    }

    pub async fn run(&mut self) -> Result<SessionOutcome, BoxError> {
        if let Some(outcome) = self.await_admission().await? {
            return Ok(outcome);
        }

        let mut move_interval = interval(self.options.move_interval);
        move_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut probe_interval = interval(self.options.probe_interval);
        probe_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let duration = self.options.duration;
        let deadline = async move {
            match duration {
                Some(duration) => sleep(duration).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                frame = self.socket.next() => match frame {
                    Some(Ok(frame)) => {
                        if let Some(message) = decode(frame) {
                            self.handle_message(message).await?;
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionOutcome::ServerClosed),
                },

                _ = move_interval.tick() => self.step().await?,

                _ = probe_interval.tick() => {
                    let probe = self.latency.next_probe(Instant::now());
                    self.send(&probe).await?;
                },

                _ = &mut deadline => break,
            }
        }

        let final_size = self.view.me().map(|player| player.size);
        self.send(&ClientMessage::Leave).await?;
        let _ = self.socket.close(None).await;
        info!(
            "Leaving with size {:?}, average rtt {:?} over {} probes",
            final_size,
            self.latency.average(),
            self.latency.samples()
        );
        Ok(SessionOutcome::Left { final_size })
    }

    async fn handle_message(&mut self, message: ServerMessage) -> Result<(), BoxError> {
        match message {
            ServerMessage::ProbeAck { nonce } => {
                if let Some(rtt) = self.latency.on_ack(nonce, Instant::now()) {
                    debug!("Probe {} round trip {:?}", nonce, rtt);
                }
            }
            message => {
                if self.view.apply(&message) {
                    if self.position.is_none() {
                        self.position = self.view.me().map(|player| (player.x, player.z));
                    }
                    let view = &self.view;
                    self.requested.retain(|id| view.has_collectible(*id));
                    self.try_consume().await?;
                }
            }
        }
        Ok(())
    }

    /// Walks one step toward the current target and reports the new position
    async fn step(&mut self) -> Result<(), BoxError> {
        let Some((x, z)) = self.position else {
            return Ok(());
        };

        let (dx, dz) = (self.target.0 - x, self.target.1 - z);
        let distance = (dx * dx + dz * dz).sqrt();
        let next = if distance <= self.options.step {
            let reached = self.target;
            self.target = random_point(&mut self.rng);
            reached
        } else {
            let scale = self.options.step / distance;
            (x + dx * scale, z + dz * scale)
        };

        self.position = Some(next);
        self.send(&ClientMessage::Move {
            x: next.0,
            z: next.1,
        })
        .await?;
        self.try_consume().await
    }

    async fn try_consume(&mut self) -> Result<(), BoxError> {
        let Some((x, z)) = self.position else {
            return Ok(());
        };
        let size = self.view.me().map(|player| player.size).unwrap_or(shared::INITIAL_SIZE);

        let Some(object_id) = self
            .view
            .touching_collectible(x, z, size)
            .map(|object| object.id)
        else {
            return Ok(());
        };

        if self.requested.insert(object_id) {
            debug!("Consuming object {}", object_id);
            self.send(&ClientMessage::Consume { object_id }).await?;
        }
        Ok(())
    }
}

fn decode(frame: Message) -> Option<ServerMessage> {
    let decoded = match frame {
        Message::Text(text) => ServerMessage::from_text(&text),
        Message::Binary(bytes) => ServerMessage::from_binary(&bytes),
        _ => return None,
    };
    match decoded {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("Ignoring undecodable server message: {}", e);
            None
        }
    }
}

fn random_point<R: Rng>(rng: &mut R) -> (f32, f32) {
    (
        rng.gen_range(-ARENA_HALF_EXTENT..ARENA_HALF_EXTENT),
        rng.gen_range(-ARENA_HALF_EXTENT..ARENA_HALF_EXTENT),
    )
}
