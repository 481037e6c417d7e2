use tracing::debug;

use super::*;
use crate::constants::{GHOST_RANDOM_TURN_CHANCE, GHOST_TARGET_KEEP_CHANCE};
use crate::types::{GhostTag, TargetTag};

const RANDOM_TURN_TRIES: usize = 8;

/// Rotates `dir` a quarter turn either way until the neighbor ahead of `cell`
/// is open. After a few random tries the four headings are scanned in order,
/// so a dead end always resolves.
fn turn_until_open(maze: &Maze, rng: &mut Rng, cell: (i32, i32), dir: Direction) -> Direction {
    let is_open = |dir: Direction| {
        let (nx, ny) = maze.neighbor(cell.0, cell.1, dir);
        maze.is_normal(nx, ny)
    };
    let mut dir = dir;
    for _ in 0..RANDOM_TURN_TRIES {
        if is_open(dir) {
            return dir;
        }
        dir = dir.turn(rng.sign());
    }
    (0..4)
        .map(|steps| dir.turn(steps))
        .find(|candidate| is_open(*candidate))
        .unwrap_or(dir)
}

impl GameEngine {
    pub(super) fn ghost_on_cell(&mut self, idx: usize) {
        let here = self.ghosts[idx].body.pos.cell();
        let mut chosen = None;

        if self.hunt_window <= 0.0 {
            if let Some(target_id) = self.ghosts[idx].pursuit_target.clone() {
                match self.player_index(&target_id) {
                    Some(target) if self.players[target].lives > 0 => {
                        let body = self.players[target].body;
                        let predicted = round_to_next_cell(body.pos, body.dir).cell();
                        if here == predicted {
                            self.drop_pursuit(idx);
                        } else {
                            chosen = self.routing.direction_toward(&self.maze, here, predicted);
                        }
                    }
                    _ => {
                        debug!(ghost = idx, target = %target_id, "pursuit target gone");
                        self.drop_pursuit(idx);
                    }
                }
            }
        }

        let mut dir = self.ghosts[idx].body.dir;
        if let Some(best) = chosen {
            dir = best;
        } else if self.rng.chance(GHOST_RANDOM_TURN_CHANCE) {
            dir = dir.turn(self.rng.sign());
        }
        self.ghosts[idx].body.dir = turn_until_open(&self.maze, &mut self.rng, here, dir);
        self.push_ghost_update(idx, Audience::All);
    }

    pub(super) fn drop_pursuit(&mut self, idx: usize) {
        let Some(target_id) = self.ghosts[idx].pursuit_target.take() else {
            return;
        };
        if let Some(player) = self.players.iter_mut().find(|p| p.id == target_id) {
            player.is_being_hunted = false;
        }
    }

    pub(super) fn release_pursuits_of(&mut self, player_idx: usize) {
        let player_id = self.players[player_idx].id.clone();
        for ghost in &mut self.ghosts {
            if ghost.pursuit_target.as_deref() == Some(player_id.as_str()) {
                ghost.pursuit_target = None;
            }
        }
        self.players[player_idx].is_being_hunted = false;
    }

    pub(super) fn retarget_ghosts(&mut self) {
        for idx in 0..self.ghosts.len() {
            self.retarget_ghost(idx);
        }
    }

    fn retarget_ghost(&mut self, idx: usize) {
        let previous = self.ghosts[idx].pursuit_target.clone();
        self.drop_pursuit(idx);
        if self.ghosts[idx].captured_window > 0.0 || self.rng.chance(GHOST_TARGET_KEEP_CHANCE) {
            return;
        }

        let candidates: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, player)| player.lives > 0 && !player.is_being_hunted)
            .map(|(player_idx, _)| player_idx)
            .collect();
        let Some(&target) = self.rng.pick(&candidates) else {
            return;
        };

        let player = &mut self.players[target];
        player.is_being_hunted = true;
        let target_id = player.id.clone();
        let target_name = player.name.clone();
        self.ghosts[idx].pursuit_target = Some(target_id.clone());

        if previous.as_deref() != Some(target_id.as_str()) {
            debug!(ghost = idx, target = %target_id, "ghost changed target");
            let message = ServerMessage::GhostTargetChanged {
                ghost: GhostTag {
                    color: self.ghosts[idx].color,
                },
                target: TargetTag {
                    id: target_id,
                    name: target_name,
                },
            };
            self.push(Audience::All, message);
        }
    }

    /// Captured countdown; at zero the ghost respawns on a random open cell.
    pub(super) fn tick_captured_ghost(&mut self, idx: usize, dt: f64) {
        let ghost = &mut self.ghosts[idx];
        ghost.captured_window -= dt;
        if ghost.captured_window > 0.0 {
            return;
        }
        ghost.captured_window = 0.0;
        self.place_character(Actor::Ghost(idx));
        self.push_ghost_update(idx, Audience::All);
    }
}
