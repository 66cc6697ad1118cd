use crate::config::RagConfig;
use crate::rag::{
    CodeSearchHit, CodeSearchRequest, CodeSearchResponse, Document, Embedder, Filters,
    HashingEmbedder, InMemoryVectorStore, Metadata, RagError, RagHit, RagQuery, RagResult,
    VectorEntry, VectorStore,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const INDEXED_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst"];

/// Embeds queries, queries the store and drops hits below the score floor
#[derive(Clone)]
pub struct RagPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    top_k: usize,
    min_score: f32,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("dimension", &self.embedder.dimension())
            .field("top_k", &self.top_k)
            .field("min_score", &self.min_score)
            .finish()
    }
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k: top_k.max(1),
            min_score,
        }
    }

    /// Hashing embedder plus in-memory store sized from configuration
    pub fn in_memory(config: &RagConfig) -> Self {
        let dimension = config.embedding_dimension;
        Self::new(
            Arc::new(HashingEmbedder::new(dimension)),
            Arc::new(InMemoryVectorStore::with_dimension(dimension)),
            config.top_k,
            config.min_score,
        )
    }

    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, RagError> {
        let mut vectors = self.embedder.embed(&[text.to_string()]).await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| RagError::Unavailable("embedder returned no vector".to_string()))?;
        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(RagError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    pub async fn add_document(
        &self,
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: Metadata,
    ) -> Result<(), RagError> {
        let content = content.into();
        let vector = self.embed_one(&content).await?;
        self.store
            .upsert(vec![VectorEntry {
                id: id.into(),
                vector,
                content,
                metadata,
            }])
            .await
    }

    pub async fn add_documents(&self, documents: Vec<Document>) -> Result<usize, RagError> {
        let count = documents.len();
        for document in documents {
            self.add_document(document.id, document.content, document.metadata)
                .await?;
        }
        Ok(count)
    }

    pub async fn retrieve(&self, query: &RagQuery) -> Result<RagResult, RagError> {
        if query.text.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        let vector = self.embed_one(&query.text).await?;
        let top_k = query.top_k.unwrap_or(self.top_k).max(1);
        let min_score = query.min_score.unwrap_or(self.min_score);
        let hits: Vec<RagHit> = self
            .store
            .query(&vector, top_k, &query.filters)
            .await?
            .into_iter()
            .filter(|entry| entry.score >= min_score)
            .map(|entry| RagHit {
                id: entry.id,
                score: entry.score,
                content: entry.content,
                metadata: entry.metadata,
            })
            .collect();
        debug!(query = %query.text, hits = hits.len(), "retrieved documents");
        Ok(RagResult {
            query: query.text.clone(),
            hits,
        })
    }

    /// Like [`RagPipeline::retrieve`], restricted to snippets tagged with `language`
    pub async fn search_code(
        &self,
        request: &CodeSearchRequest,
    ) -> Result<CodeSearchResponse, RagError> {
        let mut filters = Filters::new();
        if let Some(language) = request.language.as_deref().filter(|l| !l.trim().is_empty()) {
            filters.insert("language".to_string(), language.to_string());
        }
        let query = RagQuery {
            text: request.query.clone(),
            top_k: request.top_k,
            min_score: None,
            filters,
        };
        let result = self.retrieve(&query).await?;
        let results = result
            .hits
            .into_iter()
            .map(|hit| CodeSearchHit {
                language: metadata_str(&hit.metadata, "language")
                    .unwrap_or("unknown")
                    .to_string(),
                description: metadata_str(&hit.metadata, "description")
                    .or_else(|| metadata_str(&hit.metadata, "title"))
                    .map(str::to_string),
                id: hit.id,
                score: hit.score,
                content: hit.content,
            })
            .collect();
        Ok(CodeSearchResponse {
            query: request.query.clone(),
            results,
        })
    }

    /// Index a JSON file of [`Document`]s or a directory of markdown/text files.
    /// Directory entries get `source`, `title` and (from a `language` subdirectory
    /// or front word) `language` metadata.
    pub async fn load_path(&self, path: &Path) -> Result<usize, RagError> {
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| RagError::Load(format!("{}: {e}", path.display())))?;
        let documents = if meta.is_dir() {
            read_directory(path).await?
        } else {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| RagError::Load(format!("{}: {e}", path.display())))?;
            serde_json::from_str::<Vec<Document>>(&raw)
                .map_err(|e| RagError::Load(format!("{}: {e}", path.display())))?
        };
        let count = self.add_documents(documents).await?;
        info!(path = %path.display(), documents = count, "indexed documentation");
        Ok(count)
    }
}

fn metadata_str<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata.get(key).and_then(Value::as_str)
}

async fn read_directory(root: &Path) -> Result<Vec<Document>, RagError> {
    let mut documents = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| RagError::Load(format!("{}: {e}", dir.display())))?;
        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| RagError::Load(format!("{}: {e}", dir.display())))?
        {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| INDEXED_EXTENSIONS.contains(&ext))
            {
                files.push(path);
            }
        }
        files.sort();
        for path in files {
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable document");
                    continue;
                }
            };
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let id = relative.display().to_string();
            let title = content
                .lines()
                .map(|line| line.trim_start_matches('#').trim())
                .find(|line| !line.is_empty())
                .unwrap_or_default()
                .to_string();
            let mut metadata = Metadata::new();
            metadata.insert("source".into(), json!(id));
            metadata.insert("title".into(), json!(title));
            if let Some(language) = relative
                .components()
                .next()
                .filter(|_| relative.components().count() > 1)
                .and_then(|c| c.as_os_str().to_str())
            {
                metadata.insert("language".into(), json!(language.to_lowercase()));
            }
            documents.push(Document {
                id,
                content,
                metadata,
            });
        }
    }
    documents.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(documents)
}
