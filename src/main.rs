use anyhow::{bail, Context};
use clap::Parser;
use digworld::session::{ClickOutcome, GameSession, NotificationKind};
use digworld::world::persistence;
use digworld::{GameConfig, WorldSeeds};
use std::path::{Path, PathBuf};
use std::time::Duration;
use web_time::Instant;

const FRAME: Duration = Duration::from_millis(16);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Save file (overrides the configured path)
    #[arg(long)]
    save: Option<PathBuf>,

    /// Config file in RON format (defaults to ./config.ron plus DIGWORLD_* env vars)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the hardness noise field
    #[arg(long)]
    seed_main: Option<u32>,

    /// Seed for the ore noise field
    #[arg(long)]
    seed_ore: Option<u32>,

    /// Load the existing save before doing anything else
    #[arg(long)]
    load: bool,

    /// Delete the existing save and start fresh
    #[arg(long)]
    regenerate: bool,

    /// Game ticks to run before saving
    #[arg(long, default_value_t = 60)]
    ticks: u32,

    /// Dig the block under world pixel X,Y until it breaks (repeatable)
    #[arg(long, value_parser = parse_point)]
    dig: Vec<(i32, i32)>,
}

fn parse_point(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse().map_err(|e| format!("bad x '{}': {}", x, e))?;
    let y = y.trim().parse().map_err(|e| format!("bad y '{}': {}", y, e))?;
    Ok((x, y))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => GameConfig::load_from(path)?,
        None => GameConfig::load().context("Failed to load configuration")?,
    };
    if let Some(save) = &args.save {
        config.world.save_path = save.to_string_lossy().into_owned();
    }

    // Handle --regenerate flag
    if args.regenerate {
        log::info!("--regenerate flag detected, deleting existing save");
        persistence::delete_save(Path::new(&config.world.save_path))?;
    }

    let mut session = match (args.seed_main, args.seed_ore) {
        (None, None) => GameSession::new(config),
        (main, ore) => {
            let random = WorldSeeds::random(&mut rand::rng());
            let seeds = WorldSeeds::new(main.unwrap_or(random.main), ore.unwrap_or(random.ore));
            GameSession::with_seeds(config, seeds)
        }
    };

    log::info!(
        "Starting digworld (seed main: {}, seed ore: {})",
        session.world().seeds().main,
        session.world().seeds().ore
    );

    if args.load {
        session.request_load();
        run_until_idle(&mut session);
    }
    session.tick(Instant::now());

    for &(x, y) in &args.dig {
        dig(&mut session, x, y);
    }

    for _ in 0..args.ticks {
        session.tick(Instant::now());
        std::thread::sleep(FRAME);
    }
    log::info!("{} particles still alive", session.particles().len());

    session.request_save();
    run_until_idle(&mut session);

    if report(&mut session) {
        bail!("Save or load failed");
    }
    Ok(())
}

fn dig(session: &mut GameSession, x: i32, y: i32) {
    let mut hits = 0;
    loop {
        match session.click(x, y) {
            ClickOutcome::Nothing => {
                log::info!("Nothing to dig at ({}, {}) after {} hits", x, y, hits);
                return;
            }
            ClickOutcome::Damaged { .. } => hits += 1,
            ClickOutcome::Broken { particles } => {
                log::info!(
                    "Broke block at ({}, {}) in {} hits, {} particles",
                    x,
                    y,
                    hits + 1,
                    particles
                );
                return;
            }
        }
    }
}

fn run_until_idle(session: &mut GameSession) {
    while session.is_saving() || session.is_loading() {
        session.tick(Instant::now());
        std::thread::sleep(FRAME);
    }
    session.tick(Instant::now());
}

/// Log pending notifications; true if any was an error
fn report(session: &mut GameSession) -> bool {
    let mut failed = false;
    for note in session.drain_notifications() {
        match note.kind {
            NotificationKind::Error => {
                failed = true;
                log::error!("{}", note.message);
            }
            _ => log::info!("{}", note.message),
        }
    }
    failed
}
