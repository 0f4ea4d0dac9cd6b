//! Export Store - keep generated result workbooks for download
//!
//! Memory only: artifacts live as long as the server process and the
//! oldest job is evicted once `capacity` is reached.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

use crate::export::{ExportArtifact, ExportKind};

/// Default number of jobs kept.
pub const DEFAULT_CAPACITY: usize = 32;

/// Result workbooks of one comparison job.
#[derive(Debug, Clone)]
pub struct StoredJob {
    /// Unique identifier
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Generated workbooks
    pub artifacts: Vec<ExportArtifact>,
}

impl StoredJob {
    pub fn artifact(&self, kind: ExportKind) -> Option<&ExportArtifact> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }
}

/// Bounded in-memory store of comparison exports
pub struct ExportStore {
    capacity: usize,
    jobs: HashMap<String, StoredJob>,
    /// Insertion order, oldest first
    order: VecDeque<String>,
}

impl ExportStore {
    /// Create a store with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a store keeping at most `capacity` jobs (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            jobs: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Store the artifacts of a job. Returns the jobs evicted to make room,
    /// oldest first.
    pub fn insert(
        &mut self,
        id: impl Into<String>,
        artifacts: Vec<ExportArtifact>,
    ) -> Vec<StoredJob> {
        let id = id.into();
        let mut evicted = Vec::new();

        if self.jobs.contains_key(&id) {
            self.order.retain(|existing| existing != &id);
        }

        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => evicted.extend(self.jobs.remove(&oldest)),
                None => break,
            }
        }

        let job = StoredJob {
            id: id.clone(),
            created_at: Utc::now(),
            artifacts,
        };
        self.jobs.insert(id.clone(), job);
        self.order.push_back(id);

        evicted
    }

    /// Get a job by ID
    pub fn get(&self, id: &str) -> Option<&StoredJob> {
        self.jobs.get(id)
    }

    /// Get one workbook of a job
    pub fn artifact(&self, id: &str, kind: ExportKind) -> Option<&ExportArtifact> {
        self.get(id).and_then(|job| job.artifact(kind))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl Default for ExportStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(kind: ExportKind) -> ExportArtifact {
        ExportArtifact {
            kind,
            file_name: format!("{}.xlsx", kind.as_str()),
            rows: 1,
            bytes: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_get_artifact_by_kind() {
        let mut store = ExportStore::new();
        store.insert("job-1", vec![artifact(ExportKind::Aposentados)]);

        assert!(store.artifact("job-1", ExportKind::Aposentados).is_some());
        assert!(store.artifact("job-1", ExportKind::Pensionistas).is_none());
        assert!(store.artifact("job-2", ExportKind::Aposentados).is_none());
    }

    #[test]
    fn test_oldest_job_is_evicted() {
        let mut store = ExportStore::with_capacity(2);
        store.insert("a", vec![]);
        store.insert("b", vec![]);
        let evicted = store.insert("c", vec![]);

        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "a");
        assert!(evicted[0].created_at <= store.get("c").unwrap().created_at);
        assert_eq!(store.len(), 2);
        assert!(store.get("a").is_none());
        assert!(store.get("b").is_some());
        assert!(store.get("c").is_some());
    }

    #[test]
    fn test_reinsert_refreshes_position() {
        let mut store = ExportStore::with_capacity(2);
        store.insert("a", vec![]);
        store.insert("b", vec![]);
        store.insert("a", vec![artifact(ExportKind::Pensionistas)]);
        store.insert("c", vec![]);

        assert!(store.get("b").is_none());
        assert!(store.artifact("a", ExportKind::Pensionistas).is_some());
    }

    #[test]
    fn test_zero_capacity_keeps_one() {
        let mut store = ExportStore::with_capacity(0);
        store.insert("a", vec![]);
        assert_eq!(store.len(), 1);
    }
}
