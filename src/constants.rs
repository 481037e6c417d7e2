pub const TICK_RATE: u32 = 50;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;
pub const MAX_TICK_DELTA_MS: u64 = 250;
pub const TICK_RATE_WINDOW: usize = 30;
pub const TICK_RATE_REPORT_TICKS: u64 = 300;

pub const MAZE_WIDTH: i32 = 20;
pub const MAZE_HEIGHT: i32 = 15;
pub const MAX_MAZE_CELLS: usize = 1_600;
pub const NORMAL_PROBABILITY: f64 = 0.6;
pub const MIN_NORMAL_RATIO: f64 = 0.4;
pub const MAX_GENERATION_ATTEMPTS: u32 = 10_000;

pub const BIG_DOT_COUNT: usize = 10;
pub const PLAYER_SPEED: [f64; 4] = [2.5, 2.9, 2.5, 2.9];
pub const GHOST_SPEED: [f64; 4] = [2.3, 2.7, 2.3, 2.7];
pub const INITIAL_LIVES: i32 = 5;
pub const MAX_LIVES: i32 = 99;
pub const CAPTURES_FOR_EXTRA_LIFE: u32 = 3;

pub const HUNT_DURATION_SEC: f64 = 7.0;
pub const TARGET_CHANGE_INTERVAL_SEC: f64 = 10.0;
pub const WIN_DELAY_SEC: f64 = 2.0;
pub const GHOST_CAPTURED_SEC: f64 = 6.0;
pub const INVULNERABLE_SEC: f64 = 1.5;

pub const GHOST_TARGET_KEEP_CHANCE: f64 = 0.5;
pub const GHOST_RANDOM_TURN_CHANCE: f64 = 0.3;
pub const TORUS_CHANCE: f64 = 0.65;

pub const GHOST_COLORS: [[f32; 3]; 4] = [
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 0.4, 0.2],
];

pub const CHAT_MAX_CHARS: usize = 200;
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;
pub const COMMAND_QUEUE_CAPACITY: usize = 1_024;

pub fn min_normal_cells(width: i32, height: i32, ratio: f64) -> usize {
    let area = (width.max(0) as f64) * (height.max(0) as f64);
    // Tolerance keeps exact products like 300 * 0.4 from rounding up.
    (area * ratio - 1e-9).ceil().max(0.0) as usize
}
