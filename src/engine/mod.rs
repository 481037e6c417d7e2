use std::collections::BTreeSet;

use tracing::{error, info};

use crate::config::GameSettings;
use crate::constants::{TICK_RATE, TORUS_CHANCE};
use crate::maze::{generate_maze, Maze, MazeError};
use crate::rng::Rng;
use crate::routing::RoutingTable;
use crate::server_protocol::{Audience, Outbound, ServerMessage};
use crate::types::{
    CellIndex, Direction, DotsState, GhostId, GhostView, InitialSnapshot, PlayerId, PlayerStats,
    PlayerView, Position, RoundSettingsView, RoundStateView,
};

mod collision;
mod commands;
mod ghost_ai;
mod movement;

use self::movement::{distance_to_next_cell, move_along, round_to_next_cell, tick_distance};

#[derive(Clone, Copy, Debug)]
struct Character {
    pos: Position,
    dir: Direction,
    speed: [f64; 4],
}

#[derive(Clone, Debug)]
struct PlayerInternal {
    id: PlayerId,
    name: String,
    body: Character,
    lives: i32,
    invulnerable_window: f64,
    is_being_hunted: bool,
    requested_dir: Option<Direction>,
    captures: u32,
    stats: PlayerStats,
}

#[derive(Clone, Debug)]
struct GhostInternal {
    id: GhostId,
    color: [f32; 3],
    body: Character,
    captured_window: f64,
    pursuit_target: Option<PlayerId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GhostState {
    Idle,
    Pursuing,
    Captured,
}

#[derive(Clone, Copy, Debug)]
enum Actor {
    Player(usize),
    Ghost(usize),
}

struct RoundLayout {
    maze: Maze,
    routing: RoutingTable,
    dots: BTreeSet<CellIndex>,
    big_dots: BTreeSet<CellIndex>,
    use_torus: bool,
}

fn generate_layout(settings: &GameSettings, rng: &mut Rng) -> Result<RoundLayout, MazeError> {
    let maze = generate_maze(&settings.maze, rng)?;
    Ok(layout_from_maze(settings, maze, rng))
}

fn layout_from_maze(settings: &GameSettings, maze: Maze, rng: &mut Rng) -> RoundLayout {
    let routing = RoutingTable::compute(&maze);
    let dots: BTreeSet<CellIndex> = maze.normal_cells().collect();
    let candidates: Vec<CellIndex> = dots.iter().copied().collect();
    let wanted = settings.big_dot_count.min(candidates.len());
    let mut big_dots = BTreeSet::new();
    while big_dots.len() < wanted {
        if let Some(cell) = rng.pick(&candidates) {
            big_dots.insert(*cell);
        }
    }
    let use_torus = rng.chance(TORUS_CHANCE);
    RoundLayout {
        maze,
        routing,
        dots,
        big_dots,
        use_torus,
    }
}

/// The authoritative round. Every mutation goes through `&mut self`; the
/// caller serializes commands and ticks and drains `outbox` after each call.
#[derive(Clone)]
pub struct GameEngine {
    settings: GameSettings,
    rng: Rng,
    maze: Maze,
    routing: RoutingTable,
    players: Vec<PlayerInternal>,
    ghosts: Vec<GhostInternal>,
    dots: BTreeSet<CellIndex>,
    big_dots: BTreeSet<CellIndex>,
    hunt_window: f64,
    follow_target_change_window: f64,
    win_delay: f64,
    running: bool,
    use_torus: bool,
    round: u64,
    outbox: Vec<Outbound>,
}

impl GameEngine {
    pub fn new(settings: GameSettings, seed: u32) -> Result<Self, MazeError> {
        let mut rng = Rng::new(seed);
        let layout = generate_layout(&settings, &mut rng)?;
        Ok(Self::from_layout(settings, rng, layout))
    }

    /// Starts the first round on a fixed layout. Later rounds are generated.
    pub fn with_maze(settings: GameSettings, maze: Maze, seed: u32) -> Self {
        let mut rng = Rng::new(seed);
        let layout = layout_from_maze(&settings, maze, &mut rng);
        Self::from_layout(settings, rng, layout)
    }

    fn from_layout(settings: GameSettings, rng: Rng, layout: RoundLayout) -> Self {
        let seed_pos = Position::from_cell(layout.maze.seed());
        let ghosts = settings
            .ghost_colors
            .iter()
            .enumerate()
            .map(|(id, color)| GhostInternal {
                id,
                color: *color,
                body: Character {
                    pos: seed_pos,
                    dir: Direction::Right,
                    speed: settings.ghost_speed,
                },
                captured_window: 0.0,
                pursuit_target: None,
            })
            .collect();
        let mut engine = Self {
            rng,
            maze: layout.maze,
            routing: layout.routing,
            players: Vec::new(),
            ghosts,
            dots: layout.dots,
            big_dots: layout.big_dots,
            hunt_window: 0.0,
            follow_target_change_window: settings.target_change_interval_sec,
            win_delay: 0.0,
            running: false,
            use_torus: layout.use_torus,
            round: 0,
            outbox: Vec::new(),
            settings,
        };
        engine.begin_round();
        engine
    }

    fn install_layout(&mut self, layout: RoundLayout) {
        self.maze = layout.maze;
        self.routing = layout.routing;
        self.dots = layout.dots;
        self.big_dots = layout.big_dots;
        self.use_torus = layout.use_torus;
        self.begin_round();
    }

    fn begin_round(&mut self) {
        self.hunt_window = 0.0;
        self.follow_target_change_window = self.settings.target_change_interval_sec;
        self.win_delay = 0.0;
        self.round += 1;

        for idx in 0..self.ghosts.len() {
            self.ghosts[idx].captured_window = 0.0;
            self.ghosts[idx].pursuit_target = None;
            self.place_character(Actor::Ghost(idx));
        }
        for idx in 0..self.players.len() {
            self.reset_player(idx);
        }
        self.running = true;
        info!(
            round = self.round,
            normal_cells = self.dots.len(),
            torus = self.use_torus,
            "round started"
        );
    }

    /// Regenerates maze, routing and dots after a won round. On failure the
    /// finished round stays in place and another attempt follows one win
    /// delay later.
    fn start_next_round(&mut self) {
        match generate_layout(&self.settings, &mut self.rng) {
            Ok(layout) => {
                self.install_layout(layout);
                let snapshot = self.initial_snapshot();
                self.push(Audience::All, ServerMessage::Initial(Box::new(snapshot)));
            }
            Err(err) => {
                error!(error = %err, "failed to generate the next round");
                self.win_delay = self.settings.win_delay_sec.max(f64::MIN_POSITIVE);
            }
        }
    }

    pub fn step(&mut self, dt: f64) {
        if self.win_delay > 0.0 {
            self.win_delay -= dt;
            if self.win_delay <= 0.0 {
                self.win_delay = 0.0;
                self.start_next_round();
                return;
            }
        }
        if !self.running {
            return;
        }

        if self.follow_target_change_window > 0.0 {
            self.follow_target_change_window -= dt;
        }
        if self.hunt_window > 0.0 {
            self.hunt_window = (self.hunt_window - dt).max(0.0);
        } else if self.follow_target_change_window <= 0.0 {
            self.follow_target_change_window = self.settings.target_change_interval_sec;
            self.retarget_ghosts();
        }

        for idx in 0..self.ghosts.len() {
            if self.ghosts[idx].captured_window > 0.0 {
                self.tick_captured_ghost(idx, dt);
            } else {
                self.advance(Actor::Ghost(idx), dt);
            }
        }

        for idx in 0..self.players.len() {
            if !self.running {
                break;
            }
            if self.players[idx].lives <= 0 {
                continue;
            }
            if self.players[idx].invulnerable_window > 0.0 {
                self.players[idx].invulnerable_window =
                    (self.players[idx].invulnerable_window - dt).max(0.0);
            }
            self.advance(Actor::Player(idx), dt);
        }

        self.resolve_collisions();
    }

    fn body(&self, actor: Actor) -> Character {
        match actor {
            Actor::Player(idx) => self.players[idx].body,
            Actor::Ghost(idx) => self.ghosts[idx].body,
        }
    }

    fn body_mut(&mut self, actor: Actor) -> &mut Character {
        match actor {
            Actor::Player(idx) => &mut self.players[idx].body,
            Actor::Ghost(idx) => &mut self.ghosts[idx].body,
        }
    }

    /// Moves one character along its heading. Crossing a grid line snaps to
    /// it and runs the on-cell hook once; a blocked heading parks the
    /// character on the line.
    fn advance(&mut self, actor: Actor, dt: f64) {
        let body = self.body(actor);
        let mut move_delta = tick_distance(body.speed[body.dir.index()], dt);
        let mut remaining = distance_to_next_cell(body.pos, body.dir);

        let mut just_reached = false;
        if remaining > 0.0 && remaining <= move_delta {
            self.body_mut(actor).pos = round_to_next_cell(body.pos, body.dir);
            move_delta -= remaining;
            remaining = 0.0;
            just_reached = true;
        }

        if remaining == 0.0 {
            match actor {
                Actor::Player(idx) => self.player_on_cell(idx, just_reached),
                Actor::Ghost(idx) => self.ghost_on_cell(idx),
            }
            let body = self.body(actor);
            let (x, y) = body.pos.cell();
            let (nx, ny) = self.maze.neighbor(x, y, body.dir);
            if !self.maze.is_normal(nx, ny) {
                return;
            }
        }

        let body = self.body_mut(actor);
        body.pos = move_along(body.pos, body.dir, move_delta);
    }

    fn player_on_cell(&mut self, idx: usize, just_reached: bool) {
        let (x, y) = self.players[idx].body.pos.cell();
        let mut just_turned = false;
        if let Some(requested) = self.players[idx].requested_dir {
            let (nx, ny) = self.maze.neighbor(x, y, requested);
            if self.maze.is_normal(nx, ny) {
                let player = &mut self.players[idx];
                player.body.dir = requested;
                player.requested_dir = None;
                just_turned = true;
            }
        }

        let dots_changed = match self.maze.index_of(x, y) {
            Some(cell) => self.consume_dot_at(idx, cell),
            None => false,
        };
        if dots_changed {
            self.push_player_update(idx, Audience::All, true);
        } else if just_reached || just_turned {
            self.push_player_update(idx, Audience::All, false);
        }
    }

    fn place_character(&mut self, actor: Actor) {
        let cell = self
            .maze
            .random_normal_cell(&mut self.rng)
            .unwrap_or_else(|| self.maze.seed());
        let open = self.maze.open_directions(cell.0, cell.1);
        let dir = self.rng.pick(&open).copied().unwrap_or(Direction::Right);
        let body = self.body_mut(actor);
        body.pos = Position::from_cell(cell);
        body.dir = dir;
    }

    fn reset_player(&mut self, idx: usize) {
        self.release_pursuits_of(idx);
        let settings = &self.settings;
        let player = &mut self.players[idx];
        player.requested_dir = None;
        player.invulnerable_window = settings.invulnerable_sec;
        player.lives = settings.initial_lives;
        player.body.speed = settings.player_speed;
        player.is_being_hunted = false;
        player.captures = 0;
        self.place_character(Actor::Player(idx));
    }

    fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|player| player.id == player_id)
    }

    fn push(&mut self, audience: Audience, message: ServerMessage) {
        self.outbox.push(Outbound::new(audience, message));
    }

    fn push_player_update(&mut self, idx: usize, audience: Audience, with_dots: bool) {
        let dots = with_dots.then(|| self.dots_state());
        let message = ServerMessage::PlayerUpdate {
            id: self.players[idx].id.clone(),
            data: Some(self.player_view_at(idx)),
            dots,
        };
        self.push(audience, message);
    }

    fn push_ghost_update(&mut self, idx: usize, audience: Audience) {
        let message = ServerMessage::GhostUpdate {
            id: self.ghosts[idx].id,
            data: self.ghost_view_at(idx),
        };
        self.push(audience, message);
    }

    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn player_view_at(&self, idx: usize) -> PlayerView {
        let player = &self.players[idx];
        PlayerView {
            id: player.id.clone(),
            name: player.name.clone(),
            pos: player.body.pos,
            dir: player.body.dir,
            speed: player.body.speed,
            lives: player.lives,
            invulnerable_window: player.invulnerable_window,
            is_being_hunted: player.is_being_hunted,
            requested_dir: player.requested_dir,
            captures: player.captures,
            stats: player.stats.clone(),
        }
    }

    fn ghost_view_at(&self, idx: usize) -> GhostView {
        let ghost = &self.ghosts[idx];
        GhostView {
            id: ghost.id,
            color: ghost.color,
            pos: ghost.body.pos,
            dir: ghost.body.dir,
            speed: ghost.body.speed,
            captured_window: ghost.captured_window,
            pursuit_target: ghost.pursuit_target.clone(),
        }
    }

    pub fn player_view(&self, player_id: &str) -> Option<PlayerView> {
        self.player_index(player_id)
            .map(|idx| self.player_view_at(idx))
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        (0..self.players.len())
            .map(|idx| self.player_view_at(idx))
            .collect()
    }

    pub fn ghost_view(&self, ghost_id: GhostId) -> Option<GhostView> {
        (ghost_id < self.ghosts.len()).then(|| self.ghost_view_at(ghost_id))
    }

    pub fn ghost_views(&self) -> Vec<GhostView> {
        (0..self.ghosts.len())
            .map(|idx| self.ghost_view_at(idx))
            .collect()
    }

    pub fn ghost_state(&self, ghost_id: GhostId) -> Option<GhostState> {
        let ghost = self.ghosts.get(ghost_id)?;
        Some(if ghost.captured_window > 0.0 {
            GhostState::Captured
        } else if ghost.pursuit_target.is_some() {
            GhostState::Pursuing
        } else {
            GhostState::Idle
        })
    }

    pub fn dots_state(&self) -> DotsState {
        DotsState {
            dots: self.dots.iter().copied().collect(),
            big_dots: self.big_dots.iter().copied().collect(),
            hunt_window: self.hunt_window,
        }
    }

    pub fn initial_snapshot(&self) -> InitialSnapshot {
        InitialSnapshot {
            round: self.round,
            maze: self.maze.to_view(),
            settings: RoundSettingsView {
                tick_rate: TICK_RATE,
                initial_lives: self.settings.initial_lives,
                hunt_duration_sec: self.settings.hunt_duration_sec,
                ghost_captured_sec: self.settings.ghost_captured_sec,
                invulnerable_sec: self.settings.invulnerable_sec,
                captures_for_extra_life: self.settings.captures_for_extra_life,
                use_torus: self.use_torus,
            },
            state: RoundStateView {
                dots: self.dots.iter().copied().collect(),
                big_dots: self.big_dots.iter().copied().collect(),
                players: self.player_views(),
                ghosts: self.ghost_views(),
                hunt_window: self.hunt_window,
                running: self.running,
            },
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn routing(&self) -> &RoutingTable {
        &self.routing
    }

    pub fn dots(&self) -> &BTreeSet<CellIndex> {
        &self.dots
    }

    pub fn big_dots(&self) -> &BTreeSet<CellIndex> {
        &self.big_dots
    }

    pub fn dots_remaining(&self) -> usize {
        self.dots.len()
    }

    pub fn hunt_window(&self) -> f64 {
        self.hunt_window
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn round(&self) -> u64 {
        self.round
    }
}
