use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::document::{DocumentId, DocumentInfo};

/// Per-document view state kept between runs. Bookmarks are not stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedViewState {
    /// One-based page number.
    pub current_page: u32,
    pub zoom: f32,
}

impl Default for PersistedViewState {
    fn default() -> Self {
        Self {
            current_page: 1,
            zoom: 1.0,
        }
    }
}

pub trait StateStore: Send + Sync {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedViewState>>;
    fn save(&self, doc: &DocumentInfo, state: &PersistedViewState) -> Result<()>;
}

pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn state_path(&self, doc: &DocumentInfo) -> PathBuf {
        self.root.join(format!("{}.json", doc.id))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedViewState>> {
        let path = self.state_path(doc);
        if !path.exists() {
            return Ok(None);
        }
        let mut file =
            File::open(&path).with_context(|| format!("failed to open state file {:?}", path))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        let state = serde_json::from_str(&buf)
            .with_context(|| format!("failed to decode state file {:?}", path))?;
        Ok(Some(state))
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedViewState) -> Result<()> {
        let path = self.state_path(doc);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(state)?;
        let mut file = File::create(&tmp)
            .with_context(|| format!("failed to open temp state file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to replace state file {:?}", path))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<HashMap<DocumentId, PersistedViewState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, doc: &DocumentInfo) -> Result<Option<PersistedViewState>> {
        Ok(self.inner.lock().get(&doc.id).cloned())
    }

    fn save(&self, doc: &DocumentInfo, state: &PersistedViewState) -> Result<()> {
        self.inner.lock().insert(doc.id, state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{document_id_for_path, DocumentMetadata};

    use tempfile::tempdir;

    fn info_for(path: PathBuf) -> DocumentInfo {
        DocumentInfo {
            id: document_id_for_path(&path),
            path,
            page_count: 3,
            metadata: DocumentMetadata::default(),
        }
    }

    #[test]
    fn file_state_store_restores_state_with_stable_id() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("sample.pdf");
        std::fs::write(&file_path, b"dummy").unwrap();
        let info = info_for(file_path);

        let store = FileStateStore::new(dir.path().join("state")).unwrap();
        assert!(store.load(&info).unwrap().is_none());

        let state = PersistedViewState {
            current_page: 2,
            zoom: 1.5,
        };
        store.save(&info, &state).unwrap();

        let restored = store.load(&info).unwrap().unwrap();
        assert_eq!(restored, state);
        assert!(!dir
            .path()
            .join("state")
            .join(format!("{}.json.tmp", info.id))
            .exists());
    }

    #[test]
    fn memory_store_keeps_states_per_document() {
        let store = MemoryStateStore::new();
        let a = info_for(PathBuf::from("/tmp/a.pdf"));
        let b = info_for(PathBuf::from("/tmp/b.pdf"));
        store
            .save(
                &a,
                &PersistedViewState {
                    current_page: 7,
                    zoom: 0.5,
                },
            )
            .unwrap();
        assert_eq!(store.load(&a).unwrap().unwrap().current_page, 7);
        assert!(store.load(&b).unwrap().is_none());
    }
}
