//! Retrieval pipeline: embed a query, look up nearest documents, filter by score.
//!
//! The pipeline owns neither collaborator; [`Embedder`] and [`VectorStore`] are
//! separate seams so external services can replace the in-memory defaults.

pub mod embedder;
pub mod pipeline;
pub mod store;

pub use embedder::{Embedder, HashingEmbedder};
pub use pipeline::RagPipeline;
pub use store::{InMemoryVectorStore, ScoredEntry, VectorEntry, VectorStore};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub type Metadata = Map<String, Value>;

/// Exact-match metadata filters, compared case-insensitively
pub type Filters = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagQuery {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f32>,
    #[serde(default)]
    pub filters: Filters,
}

impl RagQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            top_k: None,
            min_score: None,
            filters: Filters::new(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagHit {
    pub id: String,
    pub score: f32,
    pub content: String,
    pub metadata: Metadata,
}

/// Ranked hits, best first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub query: String,
    pub hits: Vec<RagHit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSearchRequest {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSearchHit {
    pub id: String,
    pub language: String,
    pub score: f32,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSearchResponse {
    pub query: String,
    pub results: Vec<CodeSearchHit>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RagError {
    #[error("query text is empty")]
    EmptyQuery,
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("vector store error: {0}")]
    Store(String),
    #[error("failed to load documents: {0}")]
    Load(String),
}

impl RagError {
    /// Backend outages are retryable; data and shape errors are not
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::Unavailable(_))
    }
}
