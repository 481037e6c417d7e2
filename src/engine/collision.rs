use tracing::{debug, info};

use super::movement::overlaps;
use super::*;
use crate::constants::MAX_LIVES;

impl GameEngine {
    pub(super) fn resolve_collisions(&mut self) {
        if !self.running {
            return;
        }
        for player_idx in 0..self.players.len() {
            for ghost_idx in 0..self.ghosts.len() {
                if self.players[player_idx].lives <= 0 {
                    break;
                }
                if self.ghosts[ghost_idx].captured_window > 0.0 {
                    continue;
                }
                if !overlaps(
                    self.players[player_idx].body.pos,
                    self.ghosts[ghost_idx].body.pos,
                ) {
                    continue;
                }
                if self.hunt_window > 0.0 {
                    self.capture_ghost(player_idx, ghost_idx);
                } else if self.players[player_idx].invulnerable_window <= 0.0 {
                    self.damage_player(player_idx);
                }
            }
        }
    }

    fn capture_ghost(&mut self, player_idx: usize, ghost_idx: usize) {
        self.ghosts[ghost_idx].captured_window = self.settings.ghost_captured_sec;
        self.drop_pursuit(ghost_idx);

        let threshold = self.settings.captures_for_extra_life;
        let player = &mut self.players[player_idx];
        player.captures += 1;
        player.stats.ghosts_captured += 1;
        let earned_life = threshold > 0 && player.captures >= threshold;
        if earned_life {
            player.captures = 0;
            player.lives = (player.lives + 1).min(MAX_LIVES);
        }
        let player_id = player.id.clone();
        debug!(player = %player_id, ghost = ghost_idx, earned_life, "ghost captured");

        self.push_ghost_update(ghost_idx, Audience::All);
        self.push_player_update(player_idx, Audience::All, false);
        if earned_life {
            self.push(
                Audience::Only(player_id),
                ServerMessage::Chat {
                    text: "You earned 1 life.".to_string(),
                },
            );
        }
    }

    fn damage_player(&mut self, player_idx: usize) {
        let player = &mut self.players[player_idx];
        player.lives -= 1;
        if player.lives > 0 {
            player.invulnerable_window = self.settings.invulnerable_sec;
            self.push_player_update(player_idx, Audience::All, false);
            return;
        }

        player.lives = 0;
        player.invulnerable_window = 0.0;
        player.requested_dir = None;
        let name = player.name.clone();
        info!(player = %player.id, "player died");
        self.release_pursuits_of(player_idx);
        self.push(
            Audience::All,
            ServerMessage::Chat {
                text: format!("{name} died."),
            },
        );
        self.push_player_update(player_idx, Audience::All, false);
    }

    /// Removes the dot and big dot on `cell`, crediting the player. Returns
    /// whether anything was eaten.
    pub(super) fn consume_dot_at(&mut self, player_idx: usize, cell: CellIndex) -> bool {
        let ate_dot = self.dots.remove(&cell);
        let ate_big_dot = self.big_dots.remove(&cell);
        if !ate_dot && !ate_big_dot {
            return false;
        }

        if ate_dot {
            self.players[player_idx].stats.dots_eaten += 1;
        }
        if ate_big_dot {
            self.hunt_window = self.settings.hunt_duration_sec;
            let text = format!("{} caught a big dot.", self.players[player_idx].name);
            self.push(Audience::All, ServerMessage::Chat { text });
        }
        if ate_dot && self.dots.is_empty() && self.running {
            self.complete_round(player_idx);
        }
        true
    }

    fn complete_round(&mut self, player_idx: usize) {
        let name = self.players[player_idx].name.clone();
        self.running = false;
        self.win_delay = self.settings.win_delay_sec.max(f64::MIN_POSITIVE);
        info!(round = self.round, winner = %name, "round won");
        self.push(
            Audience::All,
            ServerMessage::Chat {
                text: format!("WON! {name} caught the last dot!"),
            },
        );
        self.push(Audience::All, ServerMessage::RoundWon);
    }
}
