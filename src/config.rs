use thiserror::Error;

use crate::constants::{
    BIG_DOT_COUNT, CAPTURES_FOR_EXTRA_LIFE, GHOST_CAPTURED_SEC, GHOST_COLORS, GHOST_SPEED,
    HUNT_DURATION_SEC, INITIAL_LIVES, INVULNERABLE_SEC, MAX_MAZE_CELLS, PLAYER_SPEED,
    TARGET_CHANGE_INTERVAL_SEC, WIN_DELAY_SEC,
};
use crate::maze::MazeSettings;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("maze {width}x{height} is too small (minimum 3x3)")]
    MazeTooSmall { width: i32, height: i32 },
    #[error("maze {width}x{height} exceeds the routing limit of {max} cells")]
    MazeTooLarge { width: i32, height: i32, max: usize },
    #[error("{name} must be within [0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("at least one ghost color is required")]
    NoGhosts,
}

#[derive(Clone, Debug)]
pub struct GameSettings {
    pub maze: MazeSettings,
    pub big_dot_count: usize,
    pub player_speed: [f64; 4],
    pub ghost_speed: [f64; 4],
    pub initial_lives: i32,
    pub captures_for_extra_life: u32,
    pub hunt_duration_sec: f64,
    pub target_change_interval_sec: f64,
    pub win_delay_sec: f64,
    pub ghost_captured_sec: f64,
    pub invulnerable_sec: f64,
    pub ghost_colors: Vec<[f32; 3]>,
    /// When false, client outcome reports are dropped and only heading
    /// intents reach the simulation.
    pub trust_client_reports: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            maze: MazeSettings::default(),
            big_dot_count: BIG_DOT_COUNT,
            player_speed: PLAYER_SPEED,
            ghost_speed: GHOST_SPEED,
            initial_lives: INITIAL_LIVES,
            captures_for_extra_life: CAPTURES_FOR_EXTRA_LIFE,
            hunt_duration_sec: HUNT_DURATION_SEC,
            target_change_interval_sec: TARGET_CHANGE_INTERVAL_SEC,
            win_delay_sec: WIN_DELAY_SEC,
            ghost_captured_sec: GHOST_CAPTURED_SEC,
            invulnerable_sec: INVULNERABLE_SEC,
            ghost_colors: GHOST_COLORS.to_vec(),
            trust_client_reports: true,
        }
    }
}

impl GameSettings {
    pub fn with_dimensions(width: i32, height: i32) -> Result<Self, ConfigError> {
        let settings = Self {
            maze: MazeSettings::new(width, height),
            ..Self::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let (width, height) = (self.maze.width, self.maze.height);
        if width < 3 || height < 3 {
            return Err(ConfigError::MazeTooSmall { width, height });
        }
        if (width as usize) * (height as usize) > MAX_MAZE_CELLS {
            return Err(ConfigError::MazeTooLarge {
                width,
                height,
                max: MAX_MAZE_CELLS,
            });
        }
        for (name, value) in [
            ("normal_probability", self.maze.normal_probability),
            ("min_normal_ratio", self.maze.min_normal_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::RatioOutOfRange { name, value });
            }
        }
        if self.ghost_colors.is_empty() {
            return Err(ConfigError::NoGhosts);
        }
        Ok(())
    }
}
