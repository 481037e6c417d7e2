use thiserror::Error;

use crate::constants::{
    min_normal_cells, MAX_GENERATION_ATTEMPTS, MAZE_HEIGHT, MAZE_WIDTH, MIN_NORMAL_RATIO,
    NORMAL_PROBABILITY,
};
use crate::rng::Rng;
use crate::types::{CellCoord, CellIndex, Direction, MazeCell, MazeView};

#[derive(Debug, Error, PartialEq)]
pub enum MazeError {
    #[error("invalid maze settings: {0}")]
    InvalidSettings(String),
    #[error("no maze with at least {required} open cells after {attempts} attempts")]
    AttemptsExhausted { attempts: u32, required: usize },
}

#[derive(Clone, Debug)]
pub struct MazeSettings {
    pub width: i32,
    pub height: i32,
    pub normal_probability: f64,
    pub min_normal_ratio: f64,
    pub max_attempts: u32,
}

impl Default for MazeSettings {
    fn default() -> Self {
        Self::new(MAZE_WIDTH, MAZE_HEIGHT)
    }
}

impl MazeSettings {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            normal_probability: NORMAL_PROBABILITY,
            min_normal_ratio: MIN_NORMAL_RATIO,
            max_attempts: MAX_GENERATION_ATTEMPTS,
        }
    }

    pub fn seed_cell(&self) -> (i32, i32) {
        (self.width / 2, self.height / 2)
    }

    pub fn min_normal_cells(&self) -> usize {
        min_normal_cells(self.width, self.height, self.min_normal_ratio)
    }

    fn check(&self) -> Result<(), MazeError> {
        if self.width < 3 || self.height < 3 {
            return Err(MazeError::InvalidSettings(format!(
                "{}x{} leaves no interior",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.normal_probability) {
            return Err(MazeError::InvalidSettings(format!(
                "normal probability {} outside [0, 1]",
                self.normal_probability
            )));
        }
        if !(0.0..=1.0).contains(&self.min_normal_ratio) {
            return Err(MazeError::InvalidSettings(format!(
                "minimum normal ratio {} outside [0, 1]",
                self.min_normal_ratio
            )));
        }
        Ok(())
    }
}

/// A generated grid. Immutable once built: every `Normal` cell reaches every
/// other `Normal` cell and the outer ring is `Unreachable`.
#[derive(Clone, Debug)]
pub struct Maze {
    width: i32,
    height: i32,
    cells: Vec<MazeCell>,
    seed: (i32, i32),
}

impl Maze {
    /// Builds a maze from an ASCII layout where row `i` is `y = i`:
    /// `.` normal, `+` border, anything else unreachable. Mainly for tests
    /// and tools; no connectivity check is applied.
    pub fn from_rows(rows: &[&str]) -> Self {
        let height = rows.len() as i32;
        let width = rows.iter().map(|row| row.len()).max().unwrap_or(0) as i32;
        let mut cells = vec![MazeCell::Unreachable; (width * height) as usize];
        let mut seed = None;
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.bytes().enumerate() {
                let idx = y * width as usize + x;
                cells[idx] = match ch {
                    b'.' => {
                        seed.get_or_insert((x as i32, y as i32));
                        MazeCell::Normal
                    }
                    b'+' => MazeCell::Border,
                    _ => MazeCell::Unreachable,
                };
            }
        }
        Self {
            width,
            height,
            cells,
            seed: seed.unwrap_or((width / 2, height / 2)),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn seed(&self) -> (i32, i32) {
        self.seed
    }

    pub fn cells(&self) -> &[MazeCell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn index_of(&self, x: i32, y: i32) -> Option<CellIndex> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    pub fn coord_of(&self, index: CellIndex) -> (i32, i32) {
        let index = index as i32;
        (index % self.width, index / self.width)
    }

    pub fn cell(&self, x: i32, y: i32) -> Option<MazeCell> {
        self.index_of(x, y).map(|idx| self.cells[idx])
    }

    pub fn is_normal(&self, x: i32, y: i32) -> bool {
        self.cell(x, y) == Some(MazeCell::Normal)
    }

    pub fn is_normal_index(&self, index: CellIndex) -> bool {
        self.cells.get(index) == Some(&MazeCell::Normal)
    }

    pub fn neighbor(&self, x: i32, y: i32, dir: Direction) -> (i32, i32) {
        let (dx, dy) = dir.delta();
        (x + dx, y + dy)
    }

    pub fn open_directions(&self, x: i32, y: i32) -> Vec<Direction> {
        if !self.is_normal(x, y) {
            return Vec::new();
        }
        Direction::ALL
            .into_iter()
            .filter(|dir| {
                let (nx, ny) = self.neighbor(x, y, *dir);
                self.is_normal(nx, ny)
            })
            .collect()
    }

    pub fn normal_cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| **cell == MazeCell::Normal)
            .map(|(idx, _)| idx)
    }

    pub fn normal_count(&self) -> usize {
        self.normal_cells().count()
    }

    pub fn random_normal_cell(&self, rng: &mut Rng) -> Option<(i32, i32)> {
        let normals: Vec<CellIndex> = self.normal_cells().collect();
        rng.pick(&normals).map(|idx| self.coord_of(*idx))
    }

    pub fn to_view(&self) -> MazeView {
        MazeView {
            width: self.width,
            height: self.height,
            cells: self.cells.clone(),
            seed: CellCoord {
                x: self.seed.0,
                y: self.seed.1,
            },
        }
    }
}

/// Accept/reject generation: scatter open cells, flood fill from the seed,
/// keep the first layout whose connected region is large enough.
pub fn generate_maze(settings: &MazeSettings, rng: &mut Rng) -> Result<Maze, MazeError> {
    settings.check()?;
    let required = settings.min_normal_cells();
    let (width, height) = (settings.width, settings.height);
    let seed = settings.seed_cell();

    for _ in 0..settings.max_attempts {
        let mut cells = scatter_cells(settings, rng);
        cells[(seed.1 * width + seed.0) as usize] = MazeCell::Untested;
        let normal_count = flood_fill(&mut cells, width, height, seed);
        if normal_count < required {
            continue;
        }
        for cell in &mut cells {
            if *cell == MazeCell::Untested {
                *cell = MazeCell::Unreachable;
            }
        }
        return Ok(Maze {
            width,
            height,
            cells,
            seed,
        });
    }

    Err(MazeError::AttemptsExhausted {
        attempts: settings.max_attempts,
        required,
    })
}

fn scatter_cells(settings: &MazeSettings, rng: &mut Rng) -> Vec<MazeCell> {
    let (width, height) = (settings.width, settings.height);
    let mut cells = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        for x in 0..width {
            let cell = if is_outer_ring(x, y, width, height) {
                MazeCell::Unreachable
            } else if rng.chance(settings.normal_probability) {
                MazeCell::Untested
            } else {
                MazeCell::Unreachable
            };
            cells.push(cell);
        }
    }
    cells
}

fn is_outer_ring(x: i32, y: i32, width: i32, height: i32) -> bool {
    x <= 0 || y <= 0 || x >= width - 1 || y >= height - 1
}

/// Returns the number of cells turned `Normal`. Interior walls touching the
/// region become `Border`; the outer ring is never reclassified.
fn flood_fill(cells: &mut [MazeCell], width: i32, height: i32, seed: (i32, i32)) -> usize {
    let mut count = 0;
    let mut stack = vec![seed];
    while let Some((x, y)) = stack.pop() {
        if is_outer_ring(x, y, width, height) {
            continue;
        }
        let idx = (y * width + x) as usize;
        match cells[idx] {
            MazeCell::Untested => {
                cells[idx] = MazeCell::Normal;
                count += 1;
                for dir in Direction::ALL {
                    let (dx, dy) = dir.delta();
                    stack.push((x + dx, y + dy));
                }
            }
            MazeCell::Unreachable => cells[idx] = MazeCell::Border,
            MazeCell::Normal | MazeCell::Border => {}
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use super::*;

    fn reachable_from_seed(maze: &Maze) -> HashSet<(i32, i32)> {
        let mut out = HashSet::new();
        let start = maze.seed();
        if !maze.is_normal(start.0, start.1) {
            return out;
        }
        let mut queue = VecDeque::new();
        out.insert(start);
        queue.push_back(start);
        while let Some((x, y)) = queue.pop_front() {
            for dir in Direction::ALL {
                let next = maze.neighbor(x, y, dir);
                if maze.is_normal(next.0, next.1) && out.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out
    }

    #[test]
    fn every_normal_cell_is_reachable_from_seed() {
        let settings = MazeSettings::default();
        for seed in 0..60u32 {
            let mut rng = Rng::new(seed);
            let maze = generate_maze(&settings, &mut rng).expect("default settings generate");
            let reachable = reachable_from_seed(&maze);
            assert_eq!(reachable.len(), maze.normal_count(), "seed={seed}");
            for idx in maze.normal_cells() {
                assert!(reachable.contains(&maze.coord_of(idx)), "seed={seed}");
            }
        }
    }

    #[test]
    fn outer_ring_is_always_unreachable() {
        let settings = MazeSettings::default();
        for seed in 0..60u32 {
            let mut rng = Rng::new(seed);
            let maze = generate_maze(&settings, &mut rng).expect("default settings generate");
            for x in 0..maze.width() {
                assert_eq!(maze.cell(x, 0), Some(MazeCell::Unreachable));
                assert_eq!(maze.cell(x, maze.height() - 1), Some(MazeCell::Unreachable));
            }
            for y in 0..maze.height() {
                assert_eq!(maze.cell(0, y), Some(MazeCell::Unreachable));
                assert_eq!(maze.cell(maze.width() - 1, y), Some(MazeCell::Unreachable));
            }
        }
    }

    #[test]
    fn open_area_meets_threshold_and_no_untested_cells_remain() {
        let settings = MazeSettings::default();
        for seed in 0..60u32 {
            let mut rng = Rng::new(seed);
            let maze = generate_maze(&settings, &mut rng).expect("default settings generate");
            assert!(maze.normal_count() >= settings.min_normal_cells());
            assert!(maze.is_normal(maze.seed().0, maze.seed().1));
            assert!(!maze.cells().contains(&MazeCell::Untested));
        }
    }

    #[test]
    fn border_cells_touch_the_open_region() {
        let mut rng = Rng::new(9);
        let maze = generate_maze(&MazeSettings::default(), &mut rng).expect("maze");
        for idx in 0..maze.len() {
            if maze.cells()[idx] != MazeCell::Border {
                continue;
            }
            let (x, y) = maze.coord_of(idx);
            let touches = Direction::ALL.into_iter().any(|dir| {
                let (nx, ny) = maze.neighbor(x, y, dir);
                maze.is_normal(nx, ny)
            });
            assert!(touches, "border cell ({x},{y}) is isolated");
        }
    }

    #[test]
    fn exhausted_attempts_are_reported() {
        let settings = MazeSettings {
            normal_probability: 0.0,
            max_attempts: 5,
            ..MazeSettings::default()
        };
        let mut rng = Rng::new(1);
        assert_eq!(
            generate_maze(&settings, &mut rng).unwrap_err(),
            MazeError::AttemptsExhausted {
                attempts: 5,
                required: 120
            }
        );
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut rng = Rng::new(1);
        let settings = MazeSettings::new(2, 9);
        assert!(matches!(
            generate_maze(&settings, &mut rng),
            Err(MazeError::InvalidSettings(_))
        ));
    }

    #[test]
    fn layout_parser_and_queries() {
        let maze = Maze::from_rows(&["#####", "#...#", "#+#.#", "#####"]);
        assert_eq!(maze.width(), 5);
        assert_eq!(maze.height(), 4);
        assert_eq!(maze.seed(), (1, 1));
        assert!(maze.is_normal(3, 2));
        assert_eq!(maze.cell(1, 2), Some(MazeCell::Border));
        assert!(!maze.is_normal(-1, 0));
        assert!(!maze.is_normal(5, 1));
        assert_eq!(maze.index_of(3, 2), Some(13));
        assert_eq!(maze.coord_of(13), (3, 2));
        assert_eq!(
            maze.open_directions(3, 1),
            vec![Direction::Up, Direction::Left]
        );
        assert_eq!(maze.normal_count(), 4);
    }
}
