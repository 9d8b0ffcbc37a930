// Display names and their persistence.
//
// Names are keyed by the walker's asset key, so a rename carries over to
// every later spawn of the same archetype. Fetching is best effort (any
// failure reads as an empty map) and saving is fire-and-forget on a worker
// thread: errors are logged and never retried.

use crossbeam_channel::{Sender, unbounded};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use super::error::NameStoreError;

pub type NameMap = HashMap<String, String>;

/// Readable name from an asset reference: directory and extension dropped,
/// runs of `_` or `-` become one space, and each word is capitalised.
///
/// `models/minion_gold.obj` becomes `Minion Gold`.
pub fn humanize_name(reference: &str) -> String {
    let file = reference.rsplit(['/', '\\']).next().unwrap_or(reference);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };

    let mut out = String::with_capacity(stem.len());
    let mut prev: Option<char> = None;
    for c in stem.chars() {
        let c = if c == '_' || c == '-' { ' ' } else { c };
        if c == ' ' && prev == Some(' ') {
            continue;
        }
        let word_start = prev.is_none_or(|p| !p.is_alphanumeric());
        if word_start && c.is_alphanumeric() {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev = Some(c);
    }
    out
}

pub trait NameStore: Send + Sync {
    fn fetch_all(&self) -> Result<NameMap, NameStoreError>;
    fn save(&self, key: &str, name: &str) -> Result<(), NameStoreError>;
}

fn check_blank(key: &str, name: &str) -> Result<(), NameStoreError> {
    if key.trim().is_empty() || name.trim().is_empty() {
        return Err(NameStoreError::Blank);
    }
    Ok(())
}

/// Fetch, degrading any failure to an empty map.
pub fn fetch_or_empty(store: &dyn NameStore) -> NameMap {
    match store.fetch_all() {
        Ok(names) => {
            log::debug!("fetched {} saved names", names.len());
            names
        }
        Err(err) => {
            log::warn!("could not fetch saved names, starting without them: {err}");
            NameMap::new()
        }
    }
}

/// Key to name map in a JSON file. A missing file is an empty map.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<NameMap, NameStoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(NameMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(NameMap::new()),
            Err(e) => Err(NameStoreError::Io(self.path.clone(), e)),
        }
    }
}

impl NameStore for JsonFileStore {
    fn fetch_all(&self) -> Result<NameMap, NameStoreError> {
        self.read()
    }

    fn save(&self, key: &str, name: &str) -> Result<(), NameStoreError> {
        check_blank(key, name)?;
        let mut names = self.read()?;
        names.insert(key.to_string(), name.to_string());
        let json = serde_json::to_string_pretty(&names)?;

        // Write beside the target then rename, so readers never see half a file.
        let tmp = self.path.with_extension("json.tmp");
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| NameStoreError::Io(dir.to_path_buf(), e))?;
        }
        std::fs::write(&tmp, json).map_err(|e| NameStoreError::Io(tmp.clone(), e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| NameStoreError::Io(self.path.clone(), e))?;
        Ok(())
    }
}

/// In-process store, used when no names file is configured.
#[derive(Debug, Default)]
pub struct MemoryStore {
    names: Mutex<NameMap>,
}

impl NameStore for MemoryStore {
    fn fetch_all(&self) -> Result<NameMap, NameStoreError> {
        self.names
            .lock()
            .map(|names| names.clone())
            .map_err(|_| NameStoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn save(&self, key: &str, name: &str) -> Result<(), NameStoreError> {
        check_blank(key, name)?;
        let mut names = self
            .names
            .lock()
            .map_err(|_| NameStoreError::Unavailable("memory store lock poisoned".into()))?;
        names.insert(key.to_string(), name.to_string());
        Ok(())
    }
}

struct SaveRequest {
    key: String,
    name: String,
}

/// Background saver. Dropping it finishes queued saves before returning.
pub struct NameSaver {
    sender: Option<Sender<SaveRequest>>,
    worker: Option<JoinHandle<()>>,
}

impl NameSaver {
    pub fn spawn(store: Arc<dyn NameStore>) -> Self {
        let (sender, receiver) = unbounded::<SaveRequest>();
        let worker = std::thread::Builder::new().name("name-saver".into()).spawn(move || {
            for SaveRequest { key, name } in receiver {
                match store.save(&key, &name) {
                    Ok(()) => log::debug!("saved name '{name}' for {key}"),
                    Err(err) => log::warn!("could not save name '{name}' for {key}: {err}"),
                }
            }
        });
        match worker {
            Ok(worker) => Self { sender: Some(sender), worker: Some(worker) },
            Err(err) => {
                log::warn!("name saver thread failed to start, renames will not persist: {err}");
                Self { sender: None, worker: None }
            }
        }
    }

    /// Queue a save. Never blocks.
    pub fn save(&self, key: &str, name: &str) {
        let Some(sender) = &self.sender else {
            return;
        };
        let request = SaveRequest { key: key.to_string(), name: name.to_string() };
        if sender.send(request).is_err() {
            log::warn!("name saver has stopped; '{name}' for {key} was not saved");
        }
    }
}

impl Drop for NameSaver {
    fn drop(&mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("name saver thread panicked");
            }
        }
    }
}
