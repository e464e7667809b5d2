use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::sync::Mutex;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use indexmap::IndexSet;
use tempfile::Builder;

use crate::config::StartupConfig;
use crate::error::DredgeError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DredgeError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DredgeError>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    pub fn new() -> Result<Self, DredgeError> {
        let root = BaseDirs::new()
            .and_then(|dirs| Utf8PathBuf::from_path_buf(dirs.data_local_dir().join("dredge")).ok())
            .ok_or_else(|| DredgeError::Filesystem("unable to resolve data directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.root.join(sanitize_key(key))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, DredgeError> {
        match fs::read_to_string(self.path_for(key).as_std_path()) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(DredgeError::Storage(err.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DredgeError> {
        let path = self.path_for(key);
        write_atomic(&path, value.as_bytes())
    }
}

fn write_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), DredgeError> {
    let parent = path
        .parent()
        .ok_or_else(|| DredgeError::Filesystem(format!("invalid store path {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| DredgeError::Filesystem(err.to_string()))?;
    let mut temp = Builder::new()
        .prefix("dredge-store")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| DredgeError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| DredgeError::Storage(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| DredgeError::Storage(err.to_string()))?;
    Ok(())
}

fn sanitize_key(key: &str) -> String {
    let name = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect::<String>();
    match name.trim_start_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DredgeError> {
        let values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DredgeError> {
        let mut values = self.values.lock().unwrap_or_else(|p| p.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedTranscripts {
    ids: IndexSet<String>,
}

impl SavedTranscripts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(store: &dyn KeyValueStore, startup: &StartupConfig) -> Result<Self, DredgeError> {
        if !startup.source.persists_saved_transcripts() {
            return Ok(Self::new());
        }
        let stored = store.get(&startup.saved_transcripts_key())?;
        Ok(Self::from_ids(parse_ids(stored.as_deref().unwrap_or_default())))
    }

    pub fn persist(
        &self,
        store: &dyn KeyValueStore,
        startup: &StartupConfig,
    ) -> Result<(), DredgeError> {
        if !startup.source.persists_saved_transcripts() {
            return Ok(());
        }
        store.set(&startup.saved_transcripts_key(), &self.export_text())
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn import_text(&mut self, text: &str) -> usize {
        let mut merged = parse_ids(text).collect::<IndexSet<_>>();
        let added = merged.iter().filter(|id| !self.ids.contains(*id)).count();
        merged.extend(self.ids.drain(..));
        self.ids = merged;
        added
    }

    pub fn export_text(&self) -> String {
        self.ids
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn ids(&self) -> &IndexSet<String> {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

fn parse_ids(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
}
