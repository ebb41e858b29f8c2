//! Flat key/value slot storage for learner progress.
//!
//! Every slot holds one complete JSON value; a save replaces it wholesale.
//! Reads never fail: absent or unreadable slots come back as `None`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, instrument, warn};

use crate::error::StoreError;

/// Prefix shared by every slot name.
pub const SLOT_PREFIX: &str = "moet_app_";

/// The persisted slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
  Studied,
  Attempts,
  Portfolio,
  Credential,
}

impl Slot {
  pub const ALL: [Slot; 4] = [Slot::Studied, Slot::Attempts, Slot::Portfolio, Slot::Credential];

  /// Storage key, compatible with the browser app's local storage layout.
  pub fn key(self) -> &'static str {
    match self {
      Slot::Studied => "moet_app_studiedKSBs",
      Slot::Attempts => "moet_app_testHistory",
      Slot::Portfolio => "moet_app_portfolioPieces",
      Slot::Credential => "moet_app_apiKey",
    }
  }
}

pub trait SlotStore: Send + Sync {
  fn load(&self, key: &str) -> Option<String>;
  fn save(&self, key: &str, value: &str) -> Result<(), StoreError>;
  /// Remove every slot in the namespace.
  fn clear(&self) -> Result<(), StoreError>;
}

/// One `<key>.json` file per slot under a data directory.
#[derive(Clone, Debug)]
pub struct FileSlotStore {
  dir: PathBuf,
}

impl FileSlotStore {
  pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io { slot: dir.display().to_string(), source })?;
    Ok(Self { dir })
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  fn path_for(&self, key: &str) -> PathBuf {
    self.dir.join(format!("{key}.json"))
  }
}

impl SlotStore for FileSlotStore {
  #[instrument(level = "debug", skip(self))]
  fn load(&self, key: &str) -> Option<String> {
    match std::fs::read_to_string(self.path_for(key)) {
      Ok(s) => Some(s),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
      Err(e) => {
        warn!(target: "store", %key, error = %e, "Slot unreadable; treating as absent");
        None
      }
    }
  }

  #[instrument(level = "debug", skip(self, value), fields(value_len = value.len()))]
  fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
    let io = |source| StoreError::Io { slot: key.to_string(), source };
    let path = self.path_for(key);
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, value).map_err(io)?;
    std::fs::rename(&tmp, &path).map_err(io)?;
    debug!(target: "store", %key, "Slot written");
    Ok(())
  }

  #[instrument(level = "info", skip(self))]
  fn clear(&self) -> Result<(), StoreError> {
    let io = |source| StoreError::Io { slot: self.dir.display().to_string(), source };
    for entry in std::fs::read_dir(&self.dir).map_err(io)? {
      let path = entry.map_err(io)?.path();
      let in_namespace = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(SLOT_PREFIX));
      if in_namespace {
        std::fs::remove_file(&path).map_err(io)?;
      }
    }
    Ok(())
  }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemorySlotStore {
  slots: Mutex<HashMap<String, String>>,
}

impl SlotStore for MemorySlotStore {
  fn load(&self, key: &str) -> Option<String> {
    self.slots.lock().ok()?.get(key).cloned()
  }

  fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
    if let Ok(mut slots) = self.slots.lock() {
      slots.insert(key.to_string(), value.to_string());
    }
    Ok(())
  }

  fn clear(&self) -> Result<(), StoreError> {
    if let Ok(mut slots) = self.slots.lock() {
      slots.clear();
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("moet-store-{}", uuid::Uuid::new_v4()))
  }

  #[test]
  fn file_store_round_trips_and_clears_namespace() {
    let dir = temp_dir();
    let store = FileSlotStore::open(&dir).unwrap();
    assert_eq!(store.load(Slot::Studied.key()), None);

    store.save(Slot::Studied.key(), r#"["K1"]"#).unwrap();
    store.save(Slot::Studied.key(), r#"["K1","K2"]"#).unwrap();
    assert_eq!(store.load(Slot::Studied.key()).as_deref(), Some(r#"["K1","K2"]"#));

    std::fs::write(dir.join("notes.txt"), "keep me").unwrap();
    store.clear().unwrap();
    assert_eq!(store.load(Slot::Studied.key()), None);
    assert!(dir.join("notes.txt").exists());

    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn memory_store_clear_drops_everything() {
    let store = MemorySlotStore::default();
    for slot in Slot::ALL {
      store.save(slot.key(), "1").unwrap();
    }
    store.clear().unwrap();
    assert!(Slot::ALL.iter().all(|s| store.load(s.key()).is_none()));
  }
}
