use tracing::{debug, info};

use super::*;
use crate::constants::MAX_LIVES;
use crate::server_protocol::{is_position_in_bounds, ParsedClientMessage};
use crate::server_utils::sanitize_chat;

impl GameEngine {
    /// Adds a connected player on a random open cell. The newcomer gets the
    /// round snapshot; everyone else gets its first update.
    pub fn add_player(&mut self, id: PlayerId, name: String) {
        if self.player_index(&id).is_some() {
            return;
        }
        self.players.push(PlayerInternal {
            id: id.clone(),
            name: name.clone(),
            body: Character {
                pos: Position::from_cell(self.maze.seed()),
                dir: Direction::Right,
                speed: self.settings.player_speed,
            },
            lives: self.settings.initial_lives,
            invulnerable_window: self.settings.invulnerable_sec,
            is_being_hunted: false,
            requested_dir: None,
            captures: 0,
            stats: PlayerStats::default(),
        });
        let idx = self.players.len() - 1;
        self.reset_player(idx);
        info!(player = %id, name = %name, players = self.players.len(), "player joined");

        let snapshot = self.initial_snapshot();
        self.push(
            Audience::Only(id.clone()),
            ServerMessage::Initial(Box::new(snapshot)),
        );
        self.push(
            Audience::Only(id.clone()),
            ServerMessage::Chat {
                text: format!("Hi {name}"),
            },
        );
        self.push(
            Audience::AllExcept(id.clone()),
            ServerMessage::Chat {
                text: format!("{name} joined"),
            },
        );
        self.push_player_update(idx, Audience::AllExcept(id), false);
    }

    pub fn remove_player(&mut self, player_id: &str) -> Option<String> {
        let idx = self.player_index(player_id)?;
        self.release_pursuits_of(idx);
        let player = self.players.remove(idx);
        info!(player = %player.id, players = self.players.len(), "player left");

        self.push(
            Audience::All,
            ServerMessage::PlayerUpdate {
                id: player.id,
                data: None,
                dots: None,
            },
        );
        self.push(
            Audience::All,
            ServerMessage::Chat {
                text: format!("{} left", player.name),
            },
        );
        Some(player.name)
    }

    pub fn apply(&mut self, player_id: &str, message: ParsedClientMessage) {
        match message {
            ParsedClientMessage::Chat { text } => self.chat(player_id, &text),
            ParsedClientMessage::SetHeading { dir } => self.set_heading_intent(player_id, dir),
            ParsedClientMessage::Jump => self.request_jump(player_id),
            ParsedClientMessage::ReportPosition {
                x,
                y,
                dir,
                dot_eaten,
            } => {
                self.report_position(player_id, x, y, dir, dot_eaten);
            }
            ParsedClientMessage::ReportLives {
                lives,
                invulnerable_window,
            } => {
                self.report_lives(player_id, lives, invulnerable_window);
            }
            ParsedClientMessage::ReportGhostCaptured { ghost_id } => {
                self.report_ghost_captured(player_id, ghost_id);
            }
            ParsedClientMessage::Restart => self.request_restart(player_id),
        }
    }

    pub fn set_heading_intent(&mut self, player_id: &str, dir: Direction) {
        if let Some(idx) = self.player_index(player_id) {
            self.players[idx].requested_dir = Some(dir);
        }
    }

    pub fn request_jump(&mut self, player_id: &str) {
        if self.player_index(player_id).is_none() {
            return;
        }
        self.push(
            Audience::AllExcept(player_id.to_string()),
            ServerMessage::Jump {
                player_id: player_id.to_string(),
            },
        );
    }

    pub fn chat(&mut self, player_id: &str, text: &str) {
        let Some(idx) = self.player_index(player_id) else {
            return;
        };
        let Some(text) = sanitize_chat(text) else {
            return;
        };
        let text = format!("{}: {text}", self.players[idx].name);
        self.push(
            Audience::AllExcept(player_id.to_string()),
            ServerMessage::Chat { text },
        );
    }

    fn accepts_reports(&self, player_id: &str, kind: &str) -> bool {
        if !self.settings.trust_client_reports {
            debug!(player = %player_id, kind, "client report ignored in authoritative mode");
        }
        self.settings.trust_client_reports
    }

    /// Applies a client-computed position. The off-axis coordinate is snapped
    /// onto the grid line of the heading before the bounds check.
    pub fn report_position(
        &mut self,
        player_id: &str,
        x: f64,
        y: f64,
        dir: Direction,
        dot_eaten: bool,
    ) -> bool {
        if !self.accepts_reports(player_id, "position") {
            return false;
        }
        let Some(idx) = self.player_index(player_id) else {
            return false;
        };
        let pos = match dir {
            Direction::Right | Direction::Left => Position { x, y: y.round() },
            Direction::Up | Direction::Down => Position { x: x.round(), y },
        };
        if !is_position_in_bounds(pos.x, pos.y, self.maze.width(), self.maze.height()) {
            debug!(player = %player_id, x, y, "position report out of bounds");
            return false;
        }

        let body = &mut self.players[idx].body;
        body.pos = pos;
        body.dir = dir;

        let mut dots_changed = false;
        if dot_eaten {
            let (cx, cy) = pos.cell();
            if let Some(cell) = self.maze.index_of(cx, cy) {
                dots_changed = self.consume_dot_at(idx, cell);
            }
        }
        if dots_changed {
            self.push_player_update(idx, Audience::All, true);
        } else {
            self.push_player_update(idx, Audience::AllExcept(player_id.to_string()), false);
        }
        true
    }

    pub fn report_lives(&mut self, player_id: &str, lives: i64, invulnerable_window: f64) -> bool {
        if !self.accepts_reports(player_id, "lives") {
            return false;
        }
        let Some(idx) = self.player_index(player_id) else {
            return false;
        };

        let lives = lives.clamp(0, MAX_LIVES as i64) as i32;
        let was_alive = self.players[idx].lives > 0;
        let player = &mut self.players[idx];
        player.lives = lives;
        player.invulnerable_window = invulnerable_window.max(0.0);
        if lives <= 0 {
            let text = format!("{} died.", player.name);
            player.requested_dir = None;
            if was_alive {
                info!(player = %player_id, "player reported death");
            }
            self.release_pursuits_of(idx);
            self.push(Audience::All, ServerMessage::Chat { text });
        }
        self.push_player_update(idx, Audience::AllExcept(player_id.to_string()), false);
        true
    }

    pub fn report_ghost_captured(&mut self, player_id: &str, ghost_id: GhostId) -> bool {
        if !self.accepts_reports(player_id, "ghost capture") {
            return false;
        }
        if self.player_index(player_id).is_none() || ghost_id >= self.ghosts.len() {
            return false;
        }
        self.ghosts[ghost_id].captured_window = self.settings.ghost_captured_sec;
        self.drop_pursuit(ghost_id);
        self.push_ghost_update(ghost_id, Audience::AllExcept(player_id.to_string()));
        true
    }

    /// Respawns the player with fresh lives. Only the requester receives
    /// the full snapshot.
    pub fn request_restart(&mut self, player_id: &str) {
        let Some(idx) = self.player_index(player_id) else {
            return;
        };
        self.reset_player(idx);
        debug!(player = %player_id, "player restarted");
        let snapshot = self.initial_snapshot();
        self.push(
            Audience::Only(player_id.to_string()),
            ServerMessage::Initial(Box::new(snapshot)),
        );
        self.push_player_update(idx, Audience::AllExcept(player_id.to_string()), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_protocol::parse_client_message;

    fn engine() -> GameEngine {
        let maze = Maze::from_rows(&[
            "#######", //
            "#.....#", //
            "#.#.#.#", //
            "#.....#", //
            "#######",
        ]);
        let mut engine = GameEngine::with_maze(GameSettings::default(), maze, 5);
        engine.big_dots.clear();
        engine.add_player("player_1".to_string(), "Alpha".to_string());
        engine.add_player("player_2".to_string(), "Bravo".to_string());
        engine.drain_outbox();
        engine
    }

    #[test]
    fn joining_sends_snapshot_and_greetings() {
        let mut engine = engine();
        engine.add_player("player_3".to_string(), "Charlie".to_string());
        let out = engine.drain_outbox();
        let me = Audience::Only("player_3".to_string());
        let others = Audience::AllExcept("player_3".to_string());

        assert!(matches!(out[0].message, ServerMessage::Initial(_)));
        assert_eq!(out[0].audience, me);
        assert!(out.iter().any(|o| o.audience == me
            && matches!(&o.message, ServerMessage::Chat { text } if text == "Hi Charlie")));
        assert!(out.iter().any(|o| o.audience == others
            && matches!(&o.message, ServerMessage::Chat { text } if text == "Charlie joined")));
        assert!(out.iter().any(|o| o.audience == others
            && matches!(&o.message, ServerMessage::PlayerUpdate { data: Some(_), .. })));

        let view = engine.player_view("player_3").expect("player exists");
        assert_eq!(view.lives, 5);
        assert_eq!(view.invulnerable_window, 1.5);
    }

    #[test]
    fn leaving_releases_pursuit_and_broadcasts_removal() {
        let mut engine = engine();
        engine.players[0].is_being_hunted = true;
        engine.ghosts[2].pursuit_target = Some("player_1".to_string());

        assert_eq!(engine.remove_player("player_1").as_deref(), Some("Alpha"));
        assert_eq!(engine.ghost_state(2), Some(GhostState::Idle));
        assert_eq!(engine.player_count(), 1);
        assert_eq!(engine.remove_player("player_1"), None);

        let out = engine.drain_outbox();
        assert!(out.iter().any(|o| o.audience == Audience::All
            && matches!(&o.message, ServerMessage::PlayerUpdate { id, data: None, .. } if id == "player_1")));
        assert!(out.iter().any(
            |o| matches!(&o.message, ServerMessage::Chat { text } if text == "Alpha left")
        ));
    }

    #[test]
    fn chat_and_jump_skip_the_sender() {
        let mut engine = engine();
        engine.apply(
            "player_1",
            parse_client_message(r#"{"type":"chat","text":"  hello  "}"#).expect("chat"),
        );
        engine.apply("player_1", ParsedClientMessage::Jump);
        engine.chat("player_1", "   ");
        engine.chat("player_9", "ghost");

        let out = engine.drain_outbox();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].audience, Audience::AllExcept("player_1".to_string()));
        assert!(matches!(&out[0].message, ServerMessage::Chat { text } if text == "Alpha: hello"));
        assert!(matches!(&out[1].message, ServerMessage::Jump { player_id } if player_id == "player_1"));
    }

    #[test]
    fn heading_intent_is_stored_for_the_next_cell() {
        let mut engine = engine();
        engine.apply(
            "player_2",
            ParsedClientMessage::SetHeading {
                dir: Direction::Down,
            },
        );
        assert_eq!(engine.players[1].requested_dir, Some(Direction::Down));
    }

    #[test]
    fn reported_dot_is_consumed_and_broadcast_to_everyone() {
        let mut engine = engine();
        let cell = engine.maze.index_of(3, 1).expect("in bounds");
        assert!(engine.dots.contains(&cell));

        assert!(engine.report_position("player_1", 3.0, 1.2, Direction::Right, true));
        assert!(!engine.dots.contains(&cell));
        assert_eq!(engine.players[0].body.pos, Position { x: 3.0, y: 1.0 });
        let out = engine.drain_outbox();
        let update = out.last().expect("update");
        assert_eq!(update.audience, Audience::All);
        assert!(matches!(
            update.message,
            ServerMessage::PlayerUpdate { dots: Some(_), .. }
        ));

        assert!(engine.report_position("player_1", 3.0, 1.0, Direction::Right, true));
        let out = engine.drain_outbox();
        assert_eq!(out[0].audience, Audience::AllExcept("player_1".to_string()));
    }

    #[test]
    fn out_of_bounds_position_is_dropped() {
        let mut engine = engine();
        let before = engine.players[0].body.pos;
        assert!(!engine.report_position("player_1", 7.0, 1.0, Direction::Right, false));
        assert!(!engine.report_position("player_1", -0.5, 1.0, Direction::Right, false));
        assert_eq!(engine.players[0].body.pos, before);
        assert!(engine.drain_outbox().is_empty());
    }

    #[test]
    fn snapped_position_must_stay_inside_the_maze() {
        let mut engine = engine();
        let before = engine.players[0].body.pos;
        assert!(!engine.report_position("player_1", 6.6, 1.0, Direction::Up, false));
        assert!(!engine.report_position("player_1", 1.0, 4.5, Direction::Left, false));
        assert_eq!(engine.players[0].body.pos, before);
        assert!(engine.drain_outbox().is_empty());

        assert!(engine.report_position("player_1", 5.4, 1.5, Direction::Up, false));
        assert_eq!(engine.players[0].body.pos, Position { x: 5.0, y: 1.5 });
    }

    #[test]
    fn lives_report_is_clamped_and_announces_death() {
        let mut engine = engine();
        assert!(engine.report_lives("player_2", 500, 0.5));
        assert_eq!(engine.players[1].lives, 99);

        assert!(engine.report_lives("player_2", -3, 0.0));
        assert_eq!(engine.players[1].lives, 0);
        let out = engine.drain_outbox();
        assert!(out.iter().any(
            |o| matches!(&o.message, ServerMessage::Chat { text } if text == "Bravo died.")
        ));
    }

    #[test]
    fn ghost_capture_report_ignores_unknown_ghosts() {
        let mut engine = engine();
        assert!(!engine.report_ghost_captured("player_1", 42));
        assert!(engine.report_ghost_captured("player_1", 1));
        assert_eq!(engine.ghost_state(1), Some(GhostState::Captured));
        let out = engine.drain_outbox();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].audience, Audience::AllExcept("player_1".to_string()));
    }

    #[test]
    fn authoritative_mode_drops_every_report() {
        let mut settings = GameSettings::default();
        settings.trust_client_reports = false;
        let maze = Maze::from_rows(&["#####", "#...#", "#####"]);
        let mut engine = GameEngine::with_maze(settings, maze, 1);
        engine.add_player("player_1".to_string(), "Alpha".to_string());
        engine.drain_outbox();
        let before = engine.players[0].body.pos;
        let dots = engine.dots.len();

        assert!(!engine.report_position("player_1", 2.0, 1.0, Direction::Left, true));
        assert!(!engine.report_lives("player_1", 0, 0.0));
        assert!(!engine.report_ghost_captured("player_1", 0));
        assert_eq!(engine.players[0].body.pos, before);
        assert_eq!(engine.players[0].lives, 5);
        assert_eq!(engine.dots.len(), dots);
        assert_eq!(engine.ghost_state(0), Some(GhostState::Idle));
        assert!(engine.drain_outbox().is_empty());

        engine.set_heading_intent("player_1", Direction::Left);
        assert_eq!(engine.players[0].requested_dir, Some(Direction::Left));
    }
}
