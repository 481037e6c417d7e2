use std::collections::{BTreeMap, HashSet};

use anyhow::Context;
use clap::Parser;
use ghosthunt_server::config::GameSettings;
use ghosthunt_server::constants::{MAZE_HEIGHT, MAZE_WIDTH, TICK_MS};
use ghosthunt_server::engine::GameEngine;
use ghosthunt_server::server_protocol::ServerMessage;
use ghosthunt_server::types::{Direction, PlayerId, PlayerView};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const RESTART_AFTER_SEC: f64 = 3.0;

/// Headless bot runner: drives the engine without sockets and reports one
/// JSON line per round on stdout.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 3)]
    rounds: u32,
    #[arg(long, default_value_t = 4)]
    bots: usize,
    #[arg(long)]
    seed: Option<u32>,
    /// Simulated seconds a single round may last before the run gives up.
    #[arg(long, default_value_t = 600)]
    max_seconds: u32,
    #[arg(long, default_value_t = MAZE_WIDTH)]
    width: i32,
    #[arg(long, default_value_t = MAZE_HEIGHT)]
    height: i32,
}

#[derive(Clone, Debug, Serialize)]
struct RoundResultLine {
    round: u64,
    seed: u32,
    ticks: u64,
    #[serde(rename = "timedOut")]
    timed_out: bool,
    #[serde(rename = "dotsEaten")]
    dots_eaten: u32,
    deaths: u32,
    #[serde(rename = "ghostsCaptured")]
    ghosts_captured: u32,
    #[serde(rename = "targetChanges")]
    target_changes: u32,
    anomalies: Vec<String>,
}

struct Bot {
    id: PlayerId,
    dead_for: Option<f64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let settings =
        GameSettings::with_dimensions(cli.width, cli.height).context("invalid maze dimensions")?;
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut engine = GameEngine::new(settings, seed).context("failed to generate the first maze")?;

    let mut bots = Vec::with_capacity(cli.bots);
    for idx in 0..cli.bots {
        let id = format!("bot_{}", idx + 1);
        engine.add_player(id.clone(), format!("Bot-{:02}", idx + 1));
        bots.push(Bot { id, dead_for: None });
    }
    engine.drain_outbox();
    info!(seed, bots = cli.bots, rounds = cli.rounds, "simulation started");

    let mut has_anomaly = false;
    for _ in 0..cli.rounds {
        let result = run_round(&mut engine, &mut bots, seed, cli.max_seconds);
        for anomaly in &result.anomalies {
            warn!(round = result.round, anomaly = %anomaly, "anomaly detected");
        }
        has_anomaly |= !result.anomalies.is_empty();
        println!("{}", serde_json::to_string(&result)?);
        if result.timed_out {
            break;
        }
    }

    if has_anomaly {
        std::process::exit(1);
    }
    Ok(())
}

fn run_round(
    engine: &mut GameEngine,
    bots: &mut [Bot],
    seed: u32,
    max_seconds: u32,
) -> RoundResultLine {
    let dt = TICK_MS as f64 / 1000.0;
    let max_ticks = u64::from(max_seconds) * 1000 / TICK_MS;
    let round = engine.round();
    let stats_at_start = stats_by_player(engine);

    let mut ticks = 0u64;
    let mut deaths = 0u32;
    let mut target_changes = 0u32;
    let mut anomalies = Vec::new();
    let mut seen = HashSet::new();
    let mut last_dots = engine.dots_remaining();
    let mut stats_at_end = stats_at_start.clone();

    while engine.round() == round && ticks < max_ticks {
        for bot in bots.iter_mut() {
            steer_bot(engine, bot, dt);
        }
        engine.step(dt);
        ticks += 1;

        for outbound in engine.drain_outbox() {
            match outbound.message {
                ServerMessage::GhostTargetChanged { .. } => target_changes += 1,
                ServerMessage::Chat { text } if text.ends_with(" died.") => deaths += 1,
                _ => {}
            }
        }

        if engine.round() != round {
            break;
        }
        stats_at_end = stats_by_player(engine);
        let remaining = engine.dots_remaining();
        if remaining > last_dots {
            record(&mut anomalies, &mut seen, format!("dots grew from {last_dots} to {remaining}"));
        }
        last_dots = remaining;
        for message in collect_anomalies(engine) {
            record(&mut anomalies, &mut seen, message);
        }
    }

    let (dots_eaten, ghosts_captured) = stats_at_end.iter().fold((0, 0), |acc, (id, end)| {
        let start = stats_at_start.get(id).copied().unwrap_or((0, 0));
        (acc.0 + end.0 - start.0, acc.1 + end.1 - start.1)
    });
    let timed_out = engine.round() == round;
    info!(round, ticks, timed_out, dots_eaten, "round finished");

    RoundResultLine {
        round,
        seed,
        ticks,
        timed_out,
        dots_eaten,
        deaths,
        ghosts_captured,
        target_changes,
        anomalies,
    }
}

fn stats_by_player(engine: &GameEngine) -> BTreeMap<PlayerId, (u32, u32)> {
    engine
        .player_views()
        .into_iter()
        .map(|view| (view.id, (view.stats.dots_eaten, view.stats.ghosts_captured)))
        .collect()
}

fn steer_bot(engine: &mut GameEngine, bot: &mut Bot, dt: f64) {
    let Some(view) = engine.player_view(&bot.id) else {
        return;
    };
    if view.lives <= 0 {
        let waited = bot.dead_for.get_or_insert(0.0);
        *waited += dt;
        if *waited >= RESTART_AFTER_SEC {
            bot.dead_for = None;
            engine.request_restart(&bot.id);
        }
        return;
    }
    bot.dead_for = None;
    if let Some(dir) = heading_to_nearest_dot(engine, &view) {
        if view.requested_dir != Some(dir) {
            engine.set_heading_intent(&bot.id, dir);
        }
    }
}

fn heading_to_nearest_dot(engine: &GameEngine, view: &PlayerView) -> Option<Direction> {
    let maze = engine.maze();
    let routing = engine.routing();
    let here = view.pos.cell();
    let from = maze.index_of(here.0, here.1)?;
    let target = engine
        .dots()
        .iter()
        .copied()
        .filter(|&dot| dot != from)
        .filter_map(|dot| routing.distance(from, dot).map(|distance| (distance, dot)))
        .min()?;
    routing.direction_toward(maze, here, maze.coord_of(target.1))
}

fn collect_anomalies(engine: &GameEngine) -> Vec<String> {
    let maze = engine.maze();
    let mut anomalies = Vec::new();
    if !engine.hunt_window().is_finite() || engine.hunt_window() < 0.0 {
        anomalies.push(format!("invalid hunt window: {}", engine.hunt_window()));
    }
    if let Some(&dot) = engine.dots().iter().find(|&&dot| !maze.is_normal_index(dot)) {
        anomalies.push(format!("dot on non-walkable cell {dot}"));
    }
    for player in engine.player_views() {
        let (x, y) = player.pos.cell();
        if !maze.is_normal(x, y) {
            anomalies.push(format!("player {} inside a wall at ({x}, {y})", player.id));
        }
        if player.lives < 0 {
            anomalies.push(format!("player {} has negative lives", player.id));
        }
    }
    for ghost in engine.ghost_views() {
        let (x, y) = ghost.pos.cell();
        if !maze.is_normal(x, y) {
            anomalies.push(format!("ghost {} inside a wall at ({x}, {y})", ghost.id));
        }
    }
    anomalies
}

fn record(anomalies: &mut Vec<String>, seen: &mut HashSet<String>, message: String) {
    if seen.insert(message.clone()) {
        anomalies.push(message);
    }
}
