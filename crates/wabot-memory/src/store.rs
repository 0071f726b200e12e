//! JSON-file-backed conversation memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};
use wabot_core::{
    config::{shellexpand, MemoryConfig},
    context::{ContextEntry, Role},
    error::WabotError,
};

/// Partition of the memory: one chat talking to one persona.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey {
    pub chat_id: String,
    pub persona: String,
}

impl ConversationKey {
    pub fn new(chat_id: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            persona: persona.into(),
        }
    }

    /// Key under which the entries are stored in the file.
    fn storage_key(&self) -> String {
        format!("{}|{}", self.chat_id, self.persona)
    }
}

/// One remembered turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub role: Role,
    pub text: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
}

impl From<MemoryEntry> for ContextEntry {
    fn from(entry: MemoryEntry) -> Self {
        Self {
            role: entry.role,
            content: entry.text,
        }
    }
}

/// Size of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStats {
    pub keys: usize,
    pub entries: usize,
}

/// Bounded per-conversation history, written through to one JSON file.
///
/// Appends for every key go through one write lock on the map, so concurrent
/// appends to the same key are never lost or duplicated. File writes are
/// serialized separately so a slow disk never blocks readers.
pub struct MemoryStore {
    path: PathBuf,
    cap: usize,
    data: RwLock<HashMap<String, Vec<MemoryEntry>>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    /// Open the store described by the memory config.
    pub async fn open(config: &MemoryConfig) -> Result<Self, WabotError> {
        Self::open_at(shellexpand(&config.path), config.cap).await
    }

    /// Open (or create) the store at `path`, keeping at most `cap` entries per key.
    /// An unreadable file is logged and replaced by an empty store.
    pub async fn open_at(path: impl Into<PathBuf>, cap: usize) -> Result<Self, WabotError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| WabotError::Memory(format!("failed to create memory dir: {e}")))?;
        }

        let mut data = load_file(&path).await?;
        for entries in data.values_mut() {
            trim_front(entries, cap);
        }

        info!(
            "Memory store loaded from {} ({} conversations)",
            path.display(),
            data.len()
        );

        Ok(Self {
            path,
            cap,
            data: RwLock::new(data),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one turn, evicting the oldest entries beyond the cap.
    pub async fn append(&self, key: &ConversationKey, role: Role, text: &str) {
        self.push(key, &[(role, text)]).await;
    }

    /// Append a question and its answer as adjacent entries, then write
    /// through. Concurrent exchanges on one key never interleave.
    pub async fn append_exchange(
        &self,
        key: &ConversationKey,
        question: &str,
        answer: &str,
    ) -> Result<(), WabotError> {
        self.push(key, &[(Role::User, question), (Role::Assistant, answer)])
            .await;
        self.persist().await
    }

    async fn push(&self, key: &ConversationKey, turns: &[(Role, &str)]) {
        let mut data = self.data.write().await;
        let entries = data.entry(key.storage_key()).or_default();
        let now = Utc::now();
        entries.extend(turns.iter().map(|(role, text)| MemoryEntry {
            role: *role,
            text: text.to_string(),
            timestamp: now,
        }));
        trim_front(entries, self.cap);
    }

    /// The `limit` most recent entries for `key`, oldest first.
    pub async fn history(&self, key: &ConversationKey, limit: usize) -> Vec<MemoryEntry> {
        let data = self.data.read().await;
        match data.get(&key.storage_key()) {
            Some(entries) => entries[entries.len().saturating_sub(limit)..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Write the whole store to disk atomically (temp file, then rename).
    pub async fn persist(&self) -> Result<(), WabotError> {
        // Held across snapshot and rename so files land in snapshot order.
        let _guard = self.write_lock.lock().await;
        let bytes = {
            let data = self.data.read().await;
            serde_json::to_vec_pretty(&*data)?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| WabotError::Memory(format!("failed to write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| {
                WabotError::Memory(format!("failed to replace {}: {e}", self.path.display()))
            })?;
        Ok(())
    }

    /// Append and write through.
    pub async fn append_and_persist(
        &self,
        key: &ConversationKey,
        role: Role,
        text: &str,
    ) -> Result<(), WabotError> {
        self.append(key, role, text).await;
        self.persist().await
    }

    pub async fn stats(&self) -> MemoryStats {
        let data = self.data.read().await;
        MemoryStats {
            keys: data.len(),
            entries: data.values().map(Vec::len).sum(),
        }
    }
}

async fn load_file(path: &Path) -> Result<HashMap<String, Vec<MemoryEntry>>, WabotError> {
    match tokio::fs::read(path).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(HashMap::new()),
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(data) => Ok(data),
            Err(e) => {
                warn!(
                    "memory file {} is not valid, starting empty: {e}",
                    path.display()
                );
                Ok(HashMap::new())
            }
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
        Err(e) => Err(WabotError::Memory(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

fn trim_front(entries: &mut Vec<MemoryEntry>, cap: usize) {
    if entries.len() > cap {
        let over = entries.len() - cap;
        entries.drain(..over);
    }
}
