use glam::IVec2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::background::{RequestStatus, TaskPoll, TaskSlot};
use super::chunk::ChunkDiff;
use super::generation::WorldSeeds;
use super::world::World;
use crate::error::{PersistenceError, PersistenceResult};

/// Current save document format
pub const SAVE_VERSION: u32 = 1;

pub const DEFAULT_LANGUAGE: &str = "en_us";

/// Player-facing settings carried through saves without interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub se_on: bool,
    pub bgm_on: bool,
    pub language: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            se_on: true,
            bgm_on: true,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Everything written to the save file (JSON)
///
/// Every field has a default, so older or hand-edited files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveDocument {
    pub version: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
    pub camera_x: i32,
    pub camera_y: i32,
    pub se_on: bool,
    pub bgm_on: bool,
    pub world_seed_main: Option<u32>,
    pub world_seed_ore: Option<u32>,
    #[serde(alias = "generated_coords")]
    pub generated_chunk_coords: Vec<[i32; 2]>,
    pub modified_chunks: Vec<ChunkDiff>,
    pub current_language: String,
}

impl Default for SaveDocument {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            version: SAVE_VERSION,
            saved_at: None,
            camera_x: 0,
            camera_y: 0,
            se_on: settings.se_on,
            bgm_on: settings.bgm_on,
            world_seed_main: None,
            world_seed_ore: None,
            generated_chunk_coords: Vec::new(),
            modified_chunks: Vec::new(),
            current_language: settings.language,
        }
    }
}

impl SaveDocument {
    /// Capture the world synchronously so the worker never touches live state
    pub fn snapshot(world: &World, camera: IVec2, settings: &Settings) -> Self {
        let seeds = world.seeds();

        #[cfg(not(target_arch = "wasm32"))]
        let saved_at = Some(chrono::Local::now().to_rfc3339());
        #[cfg(target_arch = "wasm32")]
        let saved_at = None;

        Self {
            version: SAVE_VERSION,
            saved_at,
            camera_x: camera.x,
            camera_y: camera.y,
            se_on: settings.se_on,
            bgm_on: settings.bgm_on,
            world_seed_main: Some(seeds.main),
            world_seed_ore: Some(seeds.ore),
            generated_chunk_coords: world
                .generated_coords()
                .into_iter()
                .map(|c| [c.x, c.y])
                .collect(),
            modified_chunks: world.collect_diffs(),
            current_language: settings.language.clone(),
        }
    }

    /// Seeds, if the document carries both
    pub fn seeds(&self) -> Option<WorldSeeds> {
        Some(WorldSeeds::new(self.world_seed_main?, self.world_seed_ore?))
    }

    pub fn camera(&self) -> IVec2 {
        IVec2::new(self.camera_x, self.camera_y)
    }

    pub fn settings(&self) -> Settings {
        Settings {
            se_on: self.se_on,
            bgm_on: self.bgm_on,
            language: self.current_language.clone(),
        }
    }

    pub fn generated_coords(&self) -> impl Iterator<Item = IVec2> + '_ {
        self.generated_chunk_coords
            .iter()
            .map(|[x, y]| IVec2::new(*x, *y))
    }

    /// Number of modified blocks across all chunk diffs
    pub fn modified_block_count(&self) -> usize {
        self.modified_chunks
            .iter()
            .map(|c| c.modified_blocks.len())
            .sum()
    }
}

pub fn encode(doc: &SaveDocument) -> PersistenceResult<String> {
    serde_json::to_string_pretty(doc)
        .map_err(|e| PersistenceError::Unexpected(format!("Failed to serialize save: {}", e)))
}

pub fn decode(path: &Path, text: &str) -> PersistenceResult<SaveDocument> {
    serde_json::from_str(text).map_err(|source| PersistenceError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    if source.kind() == io::ErrorKind::NotFound {
        PersistenceError::NotFound {
            path: path.to_path_buf(),
        }
    } else {
        PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write the document atomically: temp file first, then rename over the target
pub fn write_document(path: &Path, doc: &SaveDocument) -> PersistenceResult<()> {
    let text = encode(doc)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| PersistenceError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, text.as_bytes()).map_err(|source| PersistenceError::Io {
        path: temp_path.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    log::info!(
        "[SAVE] Wrote {} chunks ({} modified, {} blocks) to {:?} ({} bytes)",
        doc.generated_chunk_coords.len(),
        doc.modified_chunks.len(),
        doc.modified_block_count(),
        path,
        text.len()
    );
    Ok(())
}

pub fn read_document(path: &Path) -> PersistenceResult<SaveDocument> {
    let text = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    log::debug!("[LOAD] Read {} bytes from {:?}", text.len(), path);

    let doc = decode(path, &text)?;
    if doc.version > SAVE_VERSION {
        log::warn!(
            "[LOAD] {:?} has version {}, newer than {}; loading what is understood",
            path,
            doc.version,
            SAVE_VERSION
        );
    }
    Ok(doc)
}

/// Delete a save file; returns whether one existed
pub fn delete_save(path: &Path) -> PersistenceResult<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            log::info!("Deleted save: {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(PersistenceError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// `.json` files in `dir` that look like save documents, sorted by path
pub fn list_save_files(dir: &Path) -> PersistenceResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| io_error(dir, e))?;

    let mut saves = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) else {
            log::debug!("Skipping {:?}: not JSON", path);
            continue;
        };
        let looks_like_save = value
            .as_object()
            .is_some_and(|o| o.contains_key("version") || o.contains_key("world_seed_main"));
        if looks_like_save {
            saves.push(path);
        }
    }

    saves.sort();
    Ok(saves)
}

/// Runs saves and loads of one save file on background workers
///
/// At most one save and one load exist at a time, and a save never starts
/// while a load is in flight. Results are handed back once through polling.
pub struct PersistenceManager {
    path: PathBuf,
    save_task: TaskSlot<PersistenceResult<PathBuf>>,
    load_task: TaskSlot<PersistenceResult<SaveDocument>>,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_task: TaskSlot::new(),
            load_task: TaskSlot::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_saving(&self) -> bool {
        self.save_task.is_running()
    }

    pub fn is_loading(&self) -> bool {
        self.load_task.is_running()
    }

    /// Hand a snapshot to a save worker
    pub fn request_save(&mut self, doc: SaveDocument) -> PersistenceResult<RequestStatus> {
        if self.is_loading() {
            log::info!("[SAVE] Load in progress, save request rejected");
            return Ok(RequestStatus::AlreadyRunning);
        }

        let path = self.path.clone();
        let status = self
            .save_task
            .try_start("world-save", move || {
                write_document(&path, &doc).map(|()| path)
            })
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;

        match status {
            RequestStatus::Started => log::info!("[SAVE] Saving to {:?}", self.path),
            RequestStatus::AlreadyRunning => log::info!("[SAVE] Save already in progress"),
        }
        Ok(status)
    }

    /// Start reading and decoding the save file on a worker
    pub fn request_load(&mut self) -> PersistenceResult<RequestStatus> {
        let path = self.path.clone();
        let status = self
            .load_task
            .try_start("world-load", move || read_document(&path))
            .map_err(|source| PersistenceError::Io {
                path: self.path.clone(),
                source,
            })?;

        match status {
            RequestStatus::Started => log::info!("[LOAD] Loading from {:?}", self.path),
            RequestStatus::AlreadyRunning => log::info!("[LOAD] Load already in progress"),
        }
        Ok(status)
    }

    /// Completed save result, delivered exactly once
    pub fn poll_save(&mut self) -> Option<PersistenceResult<PathBuf>> {
        finished(self.save_task.poll(), "save")
    }

    /// Completed load result, delivered exactly once
    pub fn poll_load(&mut self) -> Option<PersistenceResult<SaveDocument>> {
        finished(self.load_task.poll(), "load")
    }

    /// Block until the in-flight save finishes
    pub fn wait_save(&mut self) -> Option<PersistenceResult<PathBuf>> {
        finished(self.save_task.wait(), "save")
    }

    /// Block until the in-flight load finishes
    pub fn wait_load(&mut self) -> Option<PersistenceResult<SaveDocument>> {
        finished(self.load_task.wait(), "load")
    }
}

fn finished<T>(poll: TaskPoll<PersistenceResult<T>>, what: &str) -> Option<PersistenceResult<T>> {
    match poll {
        TaskPoll::Idle | TaskPoll::Pending => None,
        TaskPoll::Finished(result) => Some(result),
        TaskPoll::Lost => {
            log::error!("{} worker exited without a result", what);
            Some(Err(PersistenceError::Unexpected(format!(
                "{} worker exited without a result",
                what
            ))))
        }
    }
}
