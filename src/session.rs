//! Game session - owns the world, camera, particles and save/load orchestration
//!
//! Everything here runs on the game-loop thread. Saves and loads are handed to
//! the persistence workers and picked up again in [`GameSession::tick`].

use glam::IVec2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::VecDeque;
use web_time::Instant;

use crate::config::GameConfig;
use crate::error::PersistenceError;
use crate::simulation::ParticleSystem;
use crate::world::{
    HitOutcome, PersistenceManager, RequestStatus, SaveDocument, Settings, World, WorldRect,
    WorldSeeds, BLOCK_SIZE,
};

/// Oldest notifications are dropped past this many
pub const MAX_NOTIFICATIONS: usize = 5;

/// Camera limit on either axis, far inside the addressable chunk range
pub const MAX_CAMERA: i32 = 1 << 30;

fn clamp_camera(camera: IVec2) -> IVec2 {
    camera.clamp(IVec2::splat(-MAX_CAMERA), IVec2::splat(MAX_CAMERA))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// Message for the UI to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

/// What a click did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Air, an already broken block, or input blocked by a load
    Nothing,
    Damaged { remaining: u32 },
    Broken { particles: usize },
}

pub struct GameSession {
    config: GameConfig,
    /// Top-left corner of the view in world pixels
    camera: IVec2,
    settings: Settings,
    world: World,
    particles: ParticleSystem,
    persistence: PersistenceManager,
    notifications: VecDeque<Notification>,
    rng: Xoshiro256PlusPlus,
    /// A missing save on the boot load is expected and stays quiet
    quiet_not_found: bool,
}

impl GameSession {
    /// New session with fresh random seeds
    pub fn new(config: GameConfig) -> Self {
        let seeds = WorldSeeds::random(&mut rand::rng());
        Self::with_seeds(config, seeds)
    }

    pub fn with_seeds(config: GameConfig, seeds: WorldSeeds) -> Self {
        let world = World::new(seeds, config.generation.clone());
        let particles = ParticleSystem::new(config.particles.clone());
        let persistence = PersistenceManager::new(&config.world.save_path);

        Self {
            config,
            camera: IVec2::ZERO,
            settings: Settings::default(),
            world,
            particles,
            persistence,
            notifications: VecDeque::new(),
            rng: Xoshiro256PlusPlus::seed_from_u64(seeds.main as u64),
            quiet_not_found: false,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn camera(&self) -> IVec2 {
        self.camera
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Settings are passthrough: the UI edits them, saves carry them
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn persistence(&self) -> &PersistenceManager {
        &self.persistence
    }

    pub fn is_loading(&self) -> bool {
        self.persistence.is_loading()
    }

    pub fn is_saving(&self) -> bool {
        self.persistence.is_saving()
    }

    pub fn viewport(&self) -> WorldRect {
        self.config.world.viewport(self.camera.x, self.camera.y)
    }

    /// Generate the starting view and try to pick up an existing save
    pub fn boot(&mut self) {
        self.load_visible_chunks();
        self.quiet_not_found = true;
        self.request_load();
    }

    /// One frame of game logic
    pub fn tick(&mut self, now: Instant) {
        self.process_save_completion();
        self.process_load_completion();

        // Chunks may be replaced by a load in flight; leave the world alone
        if self.is_loading() {
            return;
        }

        self.load_visible_chunks();

        let view = self.viewport();
        let area = view.expanded(self.config.world.view_margin_blocks * BLOCK_SIZE);
        let blocks = self.world.active_blocks_in_region(area);
        self.particles.update(&blocks, view, now);
    }

    fn load_visible_chunks(&mut self) -> usize {
        let view = self.viewport();
        self.world
            .load_visible_chunks(view, self.config.world.view_margin_blocks)
    }

    /// Hit the block under a world pixel, spawning debris if it breaks
    pub fn click(&mut self, world_x: i32, world_y: i32) -> ClickOutcome {
        if self.is_loading() {
            return ClickOutcome::Nothing;
        }

        let Some(hit) = self.world.hit_block(world_x, world_y) else {
            return ClickOutcome::Nothing;
        };

        match hit.outcome {
            HitOutcome::Ignored => ClickOutcome::Nothing,
            HitOutcome::Damaged { remaining } => ClickOutcome::Damaged { remaining },
            HitOutcome::Broken => {
                let particles = self.particles.spawn_break_burst(
                    hit.block.position,
                    hit.block.max_hardness(),
                    &mut self.rng,
                );
                ClickOutcome::Broken { particles }
            }
        }
    }

    /// Shift the camera and make sure the new view is generated
    pub fn move_camera(&mut self, dx: i32, dy: i32) {
        let moved = IVec2::new(self.camera.x.saturating_add(dx), self.camera.y.saturating_add(dy));
        self.camera = clamp_camera(moved);
        if !self.is_loading() {
            self.load_visible_chunks();
        }
    }

    /// Snapshot the world and hand it to the save worker
    pub fn request_save(&mut self) -> RequestStatus {
        if self.is_saving() || self.is_loading() {
            self.notify(NotificationKind::Info, "Save already in progress".to_string());
            return RequestStatus::AlreadyRunning;
        }

        let doc = SaveDocument::snapshot(&self.world, self.camera, &self.settings);
        match self.persistence.request_save(doc) {
            Ok(RequestStatus::Started) => {
                self.notify(NotificationKind::Info, "Saving...".to_string());
                RequestStatus::Started
            }
            Ok(RequestStatus::AlreadyRunning) => {
                self.notify(NotificationKind::Info, "Save already in progress".to_string());
                RequestStatus::AlreadyRunning
            }
            Err(e) => {
                self.report_save_error(&e);
                RequestStatus::AlreadyRunning
            }
        }
    }

    /// Start loading the save file; input and world updates pause until it lands
    pub fn request_load(&mut self) -> RequestStatus {
        match self.persistence.request_load() {
            Ok(status) => status,
            Err(e) => {
                self.report_load_error(&e);
                RequestStatus::AlreadyRunning
            }
        }
    }

    fn process_save_completion(&mut self) {
        match self.persistence.poll_save() {
            None => {}
            Some(Ok(path)) => {
                let message = if self.config.debug.show_debug_info {
                    format!("Game saved to {}", path.display())
                } else {
                    "Game saved".to_string()
                };
                self.notify(NotificationKind::Success, message);
            }
            Some(Err(e)) => self.report_save_error(&e),
        }
    }

    fn process_load_completion(&mut self) {
        match self.persistence.poll_load() {
            None => {}
            Some(Ok(doc)) => self.apply_document(doc),
            Some(Err(e)) => self.report_load_error(&e),
        }
    }

    /// Replace session state with a loaded document
    pub fn apply_document(&mut self, doc: SaveDocument) {
        self.quiet_not_found = false;

        let seeds = doc.seeds().unwrap_or_else(|| {
            log::warn!("[LOAD] Save has no seeds, generating new ones");
            WorldSeeds::random(&mut self.rng)
        });

        self.camera = clamp_camera(doc.camera());
        if self.camera != doc.camera() {
            log::warn!(
                "[LOAD] Camera ({}, {}) out of range, clamped to ({}, {})",
                doc.camera_x,
                doc.camera_y,
                self.camera.x,
                self.camera.y
            );
        }
        self.settings = doc.settings();
        self.rng = Xoshiro256PlusPlus::seed_from_u64(seeds.main as u64);

        self.world.reseed(seeds);
        self.world
            .rebuild_from_diffs(doc.generated_coords(), &doc.modified_chunks);

        self.particles.clear();
        self.load_visible_chunks();

        let message = if self.config.debug.show_debug_info {
            format!(
                "Game loaded from {} ({} chunks, {} modified blocks)",
                self.persistence.path().display(),
                self.world.chunk_count(),
                doc.modified_block_count()
            )
        } else {
            "Game loaded".to_string()
        };
        self.notify(NotificationKind::Success, message);
    }

    fn report_save_error(&mut self, e: &PersistenceError) {
        log::error!("[SAVE] {}", e);
        let message = self.error_message("Save failed", e);
        self.notify(NotificationKind::Error, message);
    }

    fn report_load_error(&mut self, e: &PersistenceError) {
        let quiet = std::mem::take(&mut self.quiet_not_found);
        if quiet && e.is_not_found() {
            log::info!("[LOAD] No save yet, starting a new world");
            return;
        }

        match e {
            PersistenceError::NotFound { .. } => log::warn!("[LOAD] {}", e),
            _ => log::error!("[LOAD] {}", e),
        }
        let message = self.error_message("Load failed", e);
        self.notify(NotificationKind::Error, message);
    }

    fn error_message(&self, action: &str, e: &PersistenceError) -> String {
        if self.config.debug.show_debug_info {
            format!("{}: {}", action, e)
        } else {
            format!("{}: {}", action, e.user_message())
        }
    }

    fn notify(&mut self, kind: NotificationKind, message: String) {
        log::debug!("Notification ({:?}): {}", kind, message);
        if self.notifications.len() >= MAX_NOTIFICATIONS {
            self.notifications.pop_front();
        }
        self.notifications.push_back(Notification { kind, message });
    }

    /// Take all pending notifications, oldest first
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_in(dir: &TempDir) -> GameSession {
        let mut config = GameConfig::default();
        config.world.save_path = dir
            .path()
            .join("savedata.json")
            .to_string_lossy()
            .into_owned();
        GameSession::with_seeds(config, WorldSeeds::new(1, 2))
    }

    fn wait_until_idle(session: &mut GameSession) {
        for _ in 0..1000 {
            session.tick(Instant::now());
            if !session.is_saving() && !session.is_loading() {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(2));
        }
        panic!("persistence did not finish");
    }

    #[test]
    fn test_click_until_broken_spawns_particles() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.tick(Instant::now());

        // First underground row is always hardness 3
        assert_eq!(session.click(16, 64), ClickOutcome::Damaged { remaining: 2 });
        assert_eq!(session.click(17, 65), ClickOutcome::Damaged { remaining: 1 });
        let ClickOutcome::Broken { particles } = session.click(16, 64) else {
            panic!("third hit should break the block");
        };
        assert!((5..=15).contains(&particles));
        assert_eq!(session.particles().len(), particles);
        assert_eq!(session.click(16, 64), ClickOutcome::Nothing);
    }

    #[test]
    fn test_clicking_air_does_nothing() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        assert_eq!(session.click(0, 0), ClickOutcome::Nothing);
    }

    #[test]
    fn test_move_camera_generates_view() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.move_camera(1024, 0);
        assert_eq!(session.camera(), IVec2::new(1024, 0));
        assert!(session.world().is_generated(IVec2::new(8, 0)));
    }

    #[test]
    fn test_move_camera_saturates() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.move_camera(i32::MAX, i32::MIN);
        assert_eq!(session.camera(), IVec2::new(MAX_CAMERA, -MAX_CAMERA));
        session.move_camera(i32::MAX, 0);
        assert_eq!(session.camera().x, MAX_CAMERA);
    }

    #[test]
    fn test_load_with_out_of_range_coordinates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("savedata.json");
        std::fs::write(
            &path,
            r#"{
                "camera_x": 2147483000,
                "camera_y": 0,
                "world_seed_main": 1,
                "world_seed_ore": 2,
                "generated_chunk_coords": [[0, 0], [20000000, 0]],
                "modified_chunks": [
                    {"cx": -20000000, "cy": 0, "modified_blocks": [{"x": 0, "y": 0, "current_hardness": 0}]}
                ]
            }"#,
        )
        .unwrap();

        let mut session = session_in(&dir);
        session.request_load();
        wait_until_idle(&mut session);

        let notes = session.drain_notifications();
        assert_eq!(notes.last().map(|n| n.kind), Some(NotificationKind::Success));
        assert_eq!(session.camera(), IVec2::new(MAX_CAMERA, 0));
        assert!(!session.world().is_generated(IVec2::new(20_000_000, 0)));
        assert!(session.world().is_generated(IVec2::ZERO));

        // the world stays playable after the bad load
        assert_eq!(session.click(16, 64), ClickOutcome::Damaged { remaining: 2 });
    }

    #[test]
    fn test_failed_save_reports_error() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.tick(Instant::now());

        // a directory where the temp file goes makes the write fail
        std::fs::create_dir(dir.path().join("savedata.json.tmp")).unwrap();

        assert_eq!(session.request_save(), RequestStatus::Started);
        wait_until_idle(&mut session);

        let notes = session.drain_notifications();
        let last = notes.last().unwrap();
        assert_eq!(last.kind, NotificationKind::Error);
        assert!(last.message.starts_with("Save failed"));
        assert!(!dir.path().join("savedata.json").exists());
    }

    #[test]
    fn test_boot_without_save_is_quiet() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.boot();
        wait_until_idle(&mut session);
        assert!(session.drain_notifications().is_empty());

        // A later explicit load reports the missing file
        session.request_load();
        wait_until_idle(&mut session);
        let notes = session.drain_notifications();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].kind, NotificationKind::Error);
    }

    #[test]
    fn test_save_and_load_restore_session() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.tick(Instant::now());
        for _ in 0..3 {
            session.click(16, 64);
        }
        session.move_camera(-8, 0);
        session.settings_mut().bgm_on = false;

        assert_eq!(session.request_save(), RequestStatus::Started);
        wait_until_idle(&mut session);
        let kinds: Vec<_> = session.drain_notifications().iter().map(|n| n.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Info, NotificationKind::Success]);

        let mut restored = session_in(&dir);
        restored.request_load();
        wait_until_idle(&mut restored);

        assert_eq!(restored.camera(), IVec2::new(-8, 0));
        assert!(!restored.settings().bgm_on);
        assert_eq!(restored.world().seeds(), WorldSeeds::new(1, 2));
        assert!(restored.world().peek_block(16, 64).unwrap().is_broken());
        assert!(restored.particles().is_empty());
        let notes = restored.drain_notifications();
        assert_eq!(notes.last().map(|n| n.kind), Some(NotificationKind::Success));
    }

    #[test]
    fn test_second_save_reports_in_progress() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.tick(Instant::now());

        assert_eq!(session.request_save(), RequestStatus::Started);
        assert_eq!(session.request_save(), RequestStatus::AlreadyRunning);
        let notes = session.drain_notifications();
        assert_eq!(notes[1].message, "Save already in progress");
        wait_until_idle(&mut session);
    }

    #[test]
    fn test_verbose_messages_include_path() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        session.config.debug.show_debug_info = true;
        session.request_save();
        wait_until_idle(&mut session);
        let notes = session.drain_notifications();
        let saved = notes.last().unwrap();
        assert_eq!(saved.kind, NotificationKind::Success);
        assert!(saved.message.contains("savedata.json"));
    }

    #[test]
    fn test_notifications_are_capped() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        for i in 0..(MAX_NOTIFICATIONS + 3) {
            session.notify(NotificationKind::Info, i.to_string());
        }
        let notes = session.drain_notifications();
        assert_eq!(notes.len(), MAX_NOTIFICATIONS);
        assert_eq!(notes[0].message, "3");
    }
}
