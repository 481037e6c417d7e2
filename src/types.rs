use serde::{Serialize, Serializer};

pub type PlayerId = String;
pub type GhostId = usize;
pub type CellIndex = usize;

/// Headings in their fixed cyclic order. On the wire a heading is its index
/// (`Right = 0` .. `Down = 3`); `Up` points toward increasing `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    Right,
    Up,
    Left,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Right,
        Direction::Up,
        Direction::Left,
        Direction::Down,
    ];

    pub fn index(self) -> usize {
        match self {
            Self::Right => 0,
            Self::Up => 1,
            Self::Left => 2,
            Self::Down => 3,
        }
    }

    pub fn from_index(value: i64) -> Option<Self> {
        match value {
            0 => Some(Self::Right),
            1 => Some(Self::Up),
            2 => Some(Self::Left),
            3 => Some(Self::Down),
            _ => None,
        }
    }

    pub fn parse_name(value: &str) -> Option<Self> {
        match value {
            "right" => Some(Self::Right),
            "up" => Some(Self::Up),
            "left" => Some(Self::Left),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn turn(self, steps: i32) -> Self {
        let idx = (self.index() as i32 + steps).rem_euclid(4) as usize;
        Self::ALL[idx]
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Right => (1, 0),
            Self::Up => (0, 1),
            Self::Left => (-1, 0),
            Self::Down => (0, -1),
        }
    }

    pub fn between(from: (i32, i32), to: (i32, i32)) -> Option<Self> {
        let diff = (to.0 - from.0, to.1 - from.1);
        Self::ALL.into_iter().find(|dir| dir.delta() == diff)
    }
}

impl Serialize for Direction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.index() as u8)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MazeCell {
    Normal,
    Border,
    Unreachable,
    Untested,
}

impl MazeCell {
    pub fn code(self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Border => 1,
            Self::Unreachable => 2,
            Self::Untested => 3,
        }
    }
}

impl Serialize for MazeCell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn from_cell((x, y): (i32, i32)) -> Self {
        Self {
            x: x as f64,
            y: y as f64,
        }
    }

    pub fn is_at_rest(&self) -> bool {
        self.x.fract() == 0.0 && self.y.fract() == 0.0
    }

    pub fn cell(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct CellCoord {
    pub x: i32,
    pub y: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlayerStats {
    #[serde(rename = "dotsEaten")]
    pub dots_eaten: u32,
    #[serde(rename = "ghostsCaptured")]
    pub ghosts_captured: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub pos: Position,
    pub dir: Direction,
    pub speed: [f64; 4],
    pub lives: i32,
    #[serde(rename = "invulnerableWindow")]
    pub invulnerable_window: f64,
    #[serde(rename = "isBeingHunted")]
    pub is_being_hunted: bool,
    #[serde(rename = "requestedDir")]
    pub requested_dir: Option<Direction>,
    pub captures: u32,
    pub stats: PlayerStats,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostView {
    pub id: GhostId,
    pub color: [f32; 3],
    pub pos: Position,
    pub dir: Direction,
    pub speed: [f64; 4],
    #[serde(rename = "capturedWindow")]
    pub captured_window: f64,
    #[serde(rename = "pursuitTarget")]
    pub pursuit_target: Option<PlayerId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct DotsState {
    pub dots: Vec<CellIndex>,
    #[serde(rename = "bigDots")]
    pub big_dots: Vec<CellIndex>,
    #[serde(rename = "huntWindow")]
    pub hunt_window: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct MazeView {
    pub width: i32,
    pub height: i32,
    pub cells: Vec<MazeCell>,
    pub seed: CellCoord,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundSettingsView {
    #[serde(rename = "tickRate")]
    pub tick_rate: u32,
    #[serde(rename = "initialLives")]
    pub initial_lives: i32,
    #[serde(rename = "huntDurationSec")]
    pub hunt_duration_sec: f64,
    #[serde(rename = "ghostCapturedSec")]
    pub ghost_captured_sec: f64,
    #[serde(rename = "invulnerableSec")]
    pub invulnerable_sec: f64,
    #[serde(rename = "capturesForExtraLife")]
    pub captures_for_extra_life: u32,
    #[serde(rename = "useTorus")]
    pub use_torus: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundStateView {
    pub dots: Vec<CellIndex>,
    #[serde(rename = "bigDots")]
    pub big_dots: Vec<CellIndex>,
    pub players: Vec<PlayerView>,
    pub ghosts: Vec<GhostView>,
    #[serde(rename = "huntWindow")]
    pub hunt_window: f64,
    pub running: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct InitialSnapshot {
    pub round: u64,
    pub maze: MazeView,
    pub settings: RoundSettingsView,
    pub state: RoundStateView,
}

#[derive(Clone, Debug, Serialize)]
pub struct GhostTag {
    pub color: [f32; 3],
}

#[derive(Clone, Debug, Serialize)]
pub struct TargetTag {
    pub id: PlayerId,
    pub name: String,
}
