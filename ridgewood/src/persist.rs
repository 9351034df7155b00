use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dodge::{self, FieldItem, FIELD_ITEM_RADIUS};
use crate::encounter::{self, EncounterDef};
use crate::state::{AppState, Enemy, GameMode, PlayerState};

pub const SAVE_VERSION: u32 = 1;
pub const SAVE_FILE_NAME: &str = "save.json";

/// On-disk snapshot of a run. Battles resume at the command menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SaveRecord {
    pub version: u32,
    pub player: PlayerState,
    pub encounters: Vec<EncounterDef>,
    pub encounter_index: usize,
    pub kills: u32,
    pub mercies: u32,
    pub mode: GameMode,
    #[serde(default)]
    pub enemy: Option<Enemy>,
    #[serde(default)]
    pub field_items: Vec<FieldItem>,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SaveRejected {
    #[error("unsupported save version {0}")]
    UnsupportedVersion(u32),
    #[error("save has an empty encounter table")]
    EmptyEncounterTable,
    #[error("encounter {index} is out of range for {len} encounters in {mode:?}")]
    EncounterIndexOutOfRange {
        index: usize,
        len: usize,
        mode: GameMode,
    },
    #[error("{0:?} needs an enemy but none was saved")]
    MissingEnemy(GameMode),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("no save file at {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to access save file: {0}")]
    Io(#[from] std::io::Error),
    #[error("save file corrupted: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Load failure as carried on an action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LoadFailure {
    Missing,
    Corrupt(String),
    Io(String),
}

impl From<PersistError> for LoadFailure {
    fn from(error: PersistError) -> Self {
        match error {
            PersistError::NotFound(_) => LoadFailure::Missing,
            PersistError::Corrupt(e) => LoadFailure::Corrupt(e.to_string()),
            PersistError::Io(e) => LoadFailure::Io(e.to_string()),
        }
    }
}

impl SaveRecord {
    pub fn capture(state: &AppState) -> Self {
        Self {
            version: SAVE_VERSION,
            player: state.player.clone(),
            encounters: state.encounters.clone(),
            encounter_index: state.encounter_index,
            kills: state.kills,
            mercies: state.mercies,
            mode: state.mode,
            enemy: state.enemy.clone(),
            field_items: state.field_items.clone(),
        }
    }

    /// Rejects structurally impossible saves and clamps the rest into range.
    pub fn validate(mut self) -> Result<Self, SaveRejected> {
        if self.version != SAVE_VERSION {
            return Err(SaveRejected::UnsupportedVersion(self.version));
        }
        let len = self.encounters.len();
        if len == 0 {
            return Err(SaveRejected::EmptyEncounterTable);
        }
        let needs_current = matches!(
            self.mode,
            GameMode::Intro | GameMode::Exploration | GameMode::BattleStart | GameMode::Battle
        );
        if self.encounter_index > len || (needs_current && self.encounter_index == len) {
            return Err(SaveRejected::EncounterIndexOutOfRange {
                index: self.encounter_index,
                len,
                mode: self.mode,
            });
        }
        if self.mode.needs_enemy() && self.enemy.is_none() {
            return Err(SaveRejected::MissingEnemy(self.mode));
        }

        self.player.clamp_into_range();
        for def in &mut self.encounters {
            def.enemy.clamp_into_range();
        }

        if self.mode.needs_enemy() {
            if let Some(enemy) = self.enemy.as_mut() {
                enemy.clamp_into_range();
            }
        } else {
            self.enemy = None;
        }

        self.kills = self.kills.min(self.encounter_index as u32);
        self.mercies = self.mercies.min(self.encounter_index as u32 - self.kills);

        if self.mode == GameMode::Battle {
            self.field_items
                .retain(|item| encounter::item_stack(&item.item_id, 1).is_some());
            for item in &mut self.field_items {
                let (x, y) = dodge::clamp_to_arena(item.x, item.y, FIELD_ITEM_RADIUS);
                item.x = x;
                item.y = y;
            }
        } else {
            self.field_items.clear();
        }

        Ok(self)
    }
}

pub fn default_save_dir() -> PathBuf {
    let base = dirs_next::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    base.join("ridgewood")
}

pub fn save_file_path(save_dir: Option<&Path>) -> PathBuf {
    match save_dir {
        Some(dir) => dir.join(SAVE_FILE_NAME),
        None => default_save_dir().join(SAVE_FILE_NAME),
    }
}

pub async fn save_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

pub async fn save_record(path: &Path, record: &SaveRecord) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_string_pretty(record)?;
    tokio::fs::write(path, json).await?;
    log::info!("saved game to {}", path.display());
    Ok(())
}

pub async fn load_record(path: &Path) -> Result<SaveRecord, PersistError> {
    let json = match tokio::fs::read_to_string(path).await {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PersistError::NotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let record = serde_json::from_str(&json)?;
    log::info!("loaded save from {}", path.display());
    Ok(record)
}
