use std::collections::{BTreeMap, BTreeSet};
use std::future;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::clock::SimulationClock;
use crate::constants::COMMAND_QUEUE_CAPACITY;
use crate::engine::GameEngine;
use crate::rng::Rng;
use crate::server_protocol::{ParsedClientMessage, ServerMessage};
use crate::server_utils::{make_player_name, player_order_key};
use crate::types::PlayerId;

#[derive(Debug)]
pub enum HubCommand {
    Connect {
        tx: mpsc::Sender<String>,
        reply: oneshot::Sender<PlayerId>,
    },
    Disconnect {
        player_id: PlayerId,
    },
    Client {
        player_id: PlayerId,
        message: ParsedClientMessage,
    },
    PlayerCount {
        reply: oneshot::Sender<usize>,
    },
}

struct ClientHandle {
    tx: mpsc::Sender<String>,
}

/// Single owner of the game engine and the connected clients. Commands and
/// ticks run on the same task, so no two mutations ever interleave.
pub struct Hub {
    engine: GameEngine,
    clients: BTreeMap<PlayerId, ClientHandle>,
    clock: SimulationClock,
    rng: Rng,
    next_id: u64,
}

impl Hub {
    pub fn new(engine: GameEngine, name_seed: u32) -> Self {
        Self {
            engine,
            clients: BTreeMap::new(),
            clock: SimulationClock::default(),
            rng: Rng::new(name_seed),
            next_id: 0,
        }
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn connect(&mut self, tx: mpsc::Sender<String>, now: Instant) -> PlayerId {
        self.next_id += 1;
        let player_id = format!("player_{}", self.next_id);
        let name = make_player_name(&mut self.rng);

        let welcome = ServerMessage::Welcome {
            player_id: player_id.clone(),
            name: name.clone(),
        };
        if tx.try_send(welcome.to_json()).is_err() {
            warn!(player = %player_id, "client closed before welcome");
            return player_id;
        }

        self.clients.insert(player_id.clone(), ClientHandle { tx });
        self.engine.add_player(player_id.clone(), name);
        if self.clock.start(now) {
            info!("simulation clock started");
        }
        self.flush();
        player_id
    }

    pub fn disconnect(&mut self, player_id: &str) {
        self.drop_client(player_id);
        self.flush();
    }

    pub fn handle_client(&mut self, player_id: &str, message: ParsedClientMessage) {
        if !self.clients.contains_key(player_id) {
            debug!(player = %player_id, "message from unknown client dropped");
            return;
        }
        self.engine.apply(player_id, message);
        self.flush();
    }

    pub fn tick(&mut self, now: Instant) {
        let Some(dt) = self.clock.begin_tick(now) else {
            return;
        };
        self.engine.step(dt);
        self.flush();
        self.clock.finish_tick(Instant::now());
        if let Some(stats) = self.clock.take_tick_rate_report() {
            info!(
                mean = format_args!("{:.1}", stats.mean),
                min = format_args!("{:.1}", stats.min),
                max = format_args!("{:.1}", stats.max),
                "tick rate"
            );
        }
    }

    fn handle_command(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { tx, reply } => {
                let player_id = self.connect(tx, Instant::now());
                let _ = reply.send(player_id);
            }
            HubCommand::Disconnect { player_id } => self.disconnect(&player_id),
            HubCommand::Client { player_id, message } => self.handle_client(&player_id, message),
            HubCommand::PlayerCount { reply } => {
                let _ = reply.send(self.engine.player_count());
            }
        }
    }

    fn drop_client(&mut self, player_id: &str) {
        let had_client = self.clients.remove(player_id).is_some();
        let name = self.engine.remove_player(player_id);
        if had_client || name.is_some() {
            info!(player = %player_id, remaining = self.clients.len(), "client disconnected");
        }
        if self.clients.is_empty() && self.clock.stop() {
            info!("simulation clock stopped");
        }
    }

    /// Delivers everything the engine queued. Each message is serialized once;
    /// a client whose queue is full is disconnected, which may queue more.
    fn flush(&mut self) {
        loop {
            let outbox = self.engine.drain_outbox();
            if outbox.is_empty() {
                return;
            }

            let mut order: Vec<PlayerId> = self.clients.keys().cloned().collect();
            order.sort_by_key(|id| player_order_key(id));
            let mut failed = BTreeSet::new();

            for outbound in outbox {
                let payload = outbound.message.to_json();
                for player_id in &order {
                    if failed.contains(player_id) || !outbound.audience.includes(player_id) {
                        continue;
                    }
                    let Some(client) = self.clients.get(player_id) else {
                        continue;
                    };
                    match client.tx.try_send(payload.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!(player = %player_id, "outbound queue full; disconnecting");
                            failed.insert(player_id.clone());
                        }
                        Err(TrySendError::Closed(_)) => {
                            failed.insert(player_id.clone());
                        }
                    }
                }
            }

            for player_id in failed {
                self.drop_client(&player_id);
            }
        }
    }

    pub async fn run(mut self, mut commands: mpsc::Receiver<HubCommand>) {
        loop {
            let deadline = self.clock.deadline();
            let wait = async move {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => future::pending::<()>().await,
                }
            };
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = wait => self.tick(Instant::now()),
            }
        }
        debug!("hub command queue closed");
    }

    pub fn spawn(self) -> HubHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
        tokio::spawn(self.run(rx));
        HubHandle { tx }
    }
}

#[derive(Clone, Debug)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub async fn connect(&self, outbound: mpsc::Sender<String>) -> Option<PlayerId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(HubCommand::Connect {
                tx: outbound,
                reply,
            })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn disconnect(&self, player_id: PlayerId) {
        let _ = self.tx.send(HubCommand::Disconnect { player_id }).await;
    }

    pub async fn send(&self, player_id: PlayerId, message: ParsedClientMessage) {
        let _ = self.tx.send(HubCommand::Client { player_id, message }).await;
    }

    pub async fn player_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(HubCommand::PlayerCount { reply }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
