//! Content-addressed cache of processed recordings.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

use crate::analysis::ProcessedRecording;
use crate::bundle::Bundle;

/// A processed upload together with the free-text files of its latest upload
#[derive(Debug)]
pub struct Recording {
    pub id: String,
    pub header: Option<String>,
    pub info: Option<String>,
    pub data: Arc<ProcessedRecording>,
}

/// Cache key of a bundle: SHA-256 over the CFG text, the DAT bytes and the station
pub fn recording_id(bundle: &Bundle) -> String {
    let mut hasher = Sha256::new();
    for part in [bundle.cfg_text.as_bytes(), bundle.dat.as_slice(), bundle.station.as_bytes()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hex::encode(hasher.finalize())
}

#[derive(Default)]
struct Entries {
    by_id: HashMap<String, Arc<Recording>>,
    order: VecDeque<String>,
}

/// Bounded store; the oldest recording is evicted first
pub struct RecordingStore {
    capacity: usize,
    entries: RwLock<Entries>,
}

impl RecordingStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Recording>> {
        self.entries.read().by_id.get(id).cloned()
    }

    /// Insert a recording, returning the stored instance.
    ///
    /// An existing entry with the same id keeps its processed data and
    /// position in the eviction order; its header and info are replaced.
    pub fn insert(&self, recording: Recording) -> Arc<Recording> {
        let mut entries = self.entries.write();
        if let Some(data) = entries.by_id.get(&recording.id).map(|e| e.data.clone()) {
            let updated = Arc::new(Recording { data, ..recording });
            entries.by_id.insert(updated.id.clone(), updated.clone());
            return updated;
        }
        while entries.order.len() >= self.capacity {
            if let Some(oldest) = entries.order.pop_front() {
                entries.by_id.remove(&oldest);
                debug!(id = %oldest, "evicted recording");
            }
        }
        let recording = Arc::new(recording);
        entries.order.push_back(recording.id.clone());
        entries.by_id.insert(recording.id.clone(), recording.clone());
        recording
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
