//! Integration tests driving a whole game session

use digworld::session::{ClickOutcome, GameSession};
use digworld::world::{RequestStatus, WorldSeeds};
use digworld::GameConfig;
use glam::IVec2;
use std::time::Duration;
use tempfile::TempDir;
use web_time::Instant;

fn config_in(dir: &TempDir) -> GameConfig {
    let mut config = GameConfig::default();
    config.world.save_path = dir
        .path()
        .join("savedata.json")
        .to_string_lossy()
        .into_owned();
    config
}

fn run_until_idle(session: &mut GameSession) {
    for _ in 0..2000 {
        session.tick(Instant::now());
        if !session.is_saving() && !session.is_loading() {
            return;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    panic!("background work did not finish");
}

/// Any unbroken, generated block with exactly this hardness
fn find_block_with_hardness(session: &GameSession, hardness: u32) -> Option<IVec2> {
    session
        .world()
        .chunks()
        .flat_map(|c| c.blocks().iter())
        .find(|b| b.max_hardness() == hardness && !b.is_broken())
        .map(|b| b.position)
}

#[test]
fn test_hardness_five_block_breaks_on_fifth_click() {
    let dir = TempDir::new().unwrap();
    let mut session = GameSession::with_seeds(config_in(&dir), WorldSeeds::new(1, 2));

    // Hardness climbs 1 per 10 blocks of depth; look a little way down
    for step in 0..40 {
        session.move_camera(0, 120);
        if step > 2 && find_block_with_hardness(&session, 5).is_some() {
            break;
        }
    }
    let pos = find_block_with_hardness(&session, 5).expect("no hardness-5 block generated");

    for remaining in (1..5).rev() {
        assert_eq!(session.click(pos.x, pos.y), ClickOutcome::Damaged { remaining });
    }
    let ClickOutcome::Broken { particles } = session.click(pos.x, pos.y) else {
        panic!("fifth click should break the block");
    };
    assert!((5..=15).contains(&particles), "burst of {}", particles);
}

#[test]
fn test_particles_settle_and_expire() {
    let dir = TempDir::new().unwrap();
    let mut session = GameSession::with_seeds(config_in(&dir), WorldSeeds::new(7, 8));
    let start = Instant::now();
    session.tick(start);

    for _ in 0..3 {
        session.click(40, 64);
    }
    assert!(!session.particles().is_empty());

    // Two simulated seconds of frames, then jump past the rest timeout
    let frame = Duration::from_millis(16);
    let mut now = start;
    for _ in 0..120 {
        now += frame;
        session.tick(now);
    }
    for _ in 0..3 {
        now += Duration::from_secs(6);
        session.tick(now);
    }
    assert!(session.particles().is_empty());
}

#[test]
fn test_world_is_frozen_while_loading() {
    let dir = TempDir::new().unwrap();
    let mut session = GameSession::with_seeds(config_in(&dir), WorldSeeds::new(1, 2));
    session.tick(Instant::now());
    for _ in 0..3 {
        session.click(16, 64);
    }
    assert_eq!(session.request_save(), RequestStatus::Started);
    run_until_idle(&mut session);

    let mut other = GameSession::with_seeds(config_in(&dir), WorldSeeds::new(3, 4));
    assert_eq!(other.request_load(), RequestStatus::Started);
    assert_eq!(other.click(16, 72), ClickOutcome::Nothing);
    assert_eq!(other.request_save(), RequestStatus::AlreadyRunning);
    run_until_idle(&mut other);

    assert_eq!(other.world().seeds(), WorldSeeds::new(1, 2));
    assert!(other.world().peek_block(16, 64).unwrap().is_broken());
}
