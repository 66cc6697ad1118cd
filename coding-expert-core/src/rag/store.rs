use crate::rag::embedder::cosine_similarity;
use crate::rag::{Filters, Metadata, RagError};
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorEntry {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Metadata,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace entries by id
    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<(), RagError>;

    /// Up to `top_k` entries matching `filters`, best first
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredEntry>, RagError>;

    async fn delete(&self, id: &str) -> Result<bool, RagError>;

    async fn len(&self) -> usize;
}

/// Exhaustive cosine search over entries held in memory
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    dimension: Option<usize>,
    entries: RwLock<IndexMap<String, VectorEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects vectors of any other length
    pub fn with_dimension(dimension: usize) -> Self {
        Self {
            dimension: Some(dimension),
            entries: RwLock::new(IndexMap::new()),
        }
    }

    fn expected_dimension(&self, entries: &IndexMap<String, VectorEntry>) -> Option<usize> {
        self.dimension
            .or_else(|| entries.values().next().map(|entry| entry.vector.len()))
    }
}

fn matches_filters(metadata: &Metadata, filters: &Filters) -> bool {
    filters.iter().all(|(key, wanted)| match metadata.get(key) {
        Some(Value::String(value)) => value.eq_ignore_ascii_case(wanted),
        Some(other) => other.to_string().eq_ignore_ascii_case(wanted),
        None => false,
    })
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<(), RagError> {
        let mut stored = self.entries.write();
        let mut expected = self.expected_dimension(&stored);
        for entry in &entries {
            let actual = entry.vector.len();
            match expected {
                Some(expected) if expected != actual => {
                    return Err(RagError::DimensionMismatch { expected, actual });
                }
                _ => expected = Some(actual),
            }
        }
        for entry in entries {
            stored.insert(entry.id.clone(), entry);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filters: &Filters,
    ) -> Result<Vec<ScoredEntry>, RagError> {
        let stored = self.entries.read();
        if let Some(expected) = self.expected_dimension(&stored) {
            if expected != vector.len() {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        let mut scored: Vec<ScoredEntry> = stored
            .values()
            .filter(|entry| matches_filters(&entry.metadata, filters))
            .map(|entry| ScoredEntry {
                id: entry.id.clone(),
                score: cosine_similarity(vector, &entry.vector),
                content: entry.content.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();
        // Ties break on id so equal queries give equal rankings
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, id: &str) -> Result<bool, RagError> {
        Ok(self.entries.write().shift_remove(id).is_some())
    }

    async fn len(&self) -> usize {
        self.entries.read().len()
    }
}
