//! Persistence collaborators: the classified action ledger and the snapshot
//! sink.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::analysis::{ClassifiedAction, HandAnalysis};
use crate::materialize::AggregateSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Ledger of every classified action, keyed by hand.
pub trait ActionStore: Send + Sync {
    fn contains_hand(&self, hand_id: &str) -> Result<bool, StoreError>;

    /// Adds analysed hands; a hand already present is left untouched. Returns
    /// the number of hands added.
    fn commit(&self, hands: Vec<HandAnalysis>) -> Result<usize, StoreError>;

    /// Visits every stored action.
    fn for_each(&self, visit: &mut dyn FnMut(&ClassifiedAction)) -> Result<(), StoreError>;

    fn hand_count(&self) -> Result<usize, StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    hands: RwLock<BTreeMap<String, Vec<ClassifiedAction>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActionStore for MemoryStore {
    fn contains_hand(&self, hand_id: &str) -> Result<bool, StoreError> {
        Ok(self.hands.read().contains_key(hand_id))
    }

    fn commit(&self, hands: Vec<HandAnalysis>) -> Result<usize, StoreError> {
        let mut stored = self.hands.write();
        let mut added = 0;
        for hand in hands {
            if !stored.contains_key(&hand.hand_id) {
                stored.insert(hand.hand_id, hand.actions);
                added += 1;
            }
        }
        Ok(added)
    }

    fn for_each(&self, visit: &mut dyn FnMut(&ClassifiedAction)) -> Result<(), StoreError> {
        for action in self.hands.read().values().flatten() {
            visit(action);
        }
        Ok(())
    }

    fn hand_count(&self) -> Result<usize, StoreError> {
        Ok(self.hands.read().len())
    }
}

/// Durable copy of each snapshot, written before it is published.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn persist(&self, snapshot: &AggregateSnapshot) -> Result<(), StoreError>;
}

/// Discards snapshots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

#[async_trait]
impl SnapshotSink for NullSink {
    async fn persist(&self, _snapshot: &AggregateSnapshot) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Pretty JSON file replaced through a temporary sibling and a rename, so the
/// file on disk is always a whole snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The last persisted snapshot, if the file exists.
    pub async fn load(&self) -> Result<Option<AggregateSnapshot>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn persist(&self, snapshot: &AggregateSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(io(dir))?;
        }
        tokio::fs::write(&tmp, &bytes).await.map_err(io(&tmp))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(io(&self.path))?;
        Ok(())
    }
}
