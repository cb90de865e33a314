//! Ingestion pipeline: embed each document and upsert it into the collection

use crate::config::Config;
use crate::embedding::{Embedder, EmbeddingError};
use crate::extract::Document;
use crate::output::{RunCounters, SnapshotWriter};
use crate::pipeline::text::{is_embeddable, prepare_embedding_text};
use crate::vector_store::{CollectionDescriptor, EnsureOutcome, Point, VectorStore};
use crate::IndexerError;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Characters of body text kept in the payload preview
const PREVIEW_CHARS: usize = 1000;

/// Headings kept in the payload
const PAYLOAD_HEADINGS: usize = 5;

/// A progress line is logged every this many indexed documents
const PROGRESS_EVERY: u64 = 10;

/// Result of processing one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Indexed,
    /// Prepared text too short to embed
    Skipped,
    /// Embedding or upsert failed; the run continues
    Failed,
}

/// What `close` observed after the last document
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub collection_size: Option<u64>,
    pub snapshot_path: Option<PathBuf>,
}

/// Turns extracted documents into points of the vector collection
///
/// Lifecycle is explicit: [`open`](Self::open) once before the crawl,
/// [`process`](Self::process) per document from any number of workers, and
/// [`close`](Self::close) once after the last document.
pub struct IngestionPipeline {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    collection: String,
    dimensions: usize,
    counters: Arc<RunCounters>,
    snapshot: Option<SnapshotWriter>,
    documents: Mutex<Vec<Document>>,
}

impl IngestionPipeline {
    /// Prepares the collection for this run
    ///
    /// The collection is created when absent and left untouched when present,
    /// unless `vector-store.recreate` asks for a fresh one.
    ///
    /// # Errors
    ///
    /// Fails when either capability is unreachable, or when an existing
    /// collection's vector size differs from the embedder's.
    pub async fn open(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        counters: Arc<RunCounters>,
    ) -> Result<Self, IndexerError> {
        let dimensions = embedder.dimensions().await?;
        let collection = config.vector_store.collection.clone();
        let descriptor = CollectionDescriptor::cosine(collection.clone(), dimensions);

        if config.vector_store.recreate {
            warn!(collection = %collection, "Recreating collection; existing points are dropped");
            store.recreate_collection(&descriptor).await?;
            info!(collection = %collection, dimensions, "Collection recreated");
        } else {
            match store.ensure_collection(&descriptor).await? {
                EnsureOutcome::Created => {
                    info!(collection = %collection, dimensions, "Collection created");
                }
                EnsureOutcome::Existing {
                    dimensions: Some(existing),
                } if existing != dimensions => {
                    return Err(IndexerError::DimensionMismatch {
                        collection,
                        existing,
                        expected: dimensions,
                    });
                }
                EnsureOutcome::Existing { .. } => {
                    info!(collection = %collection, "Collection already exists");
                }
            }
        }

        let snapshot = config
            .output
            .snapshot_dir
            .as_deref()
            .map(SnapshotWriter::new);

        Ok(Self {
            embedder,
            store,
            collection,
            dimensions,
            counters,
            snapshot,
            documents: Mutex::new(Vec::new()),
        })
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embeds and upserts one document
    ///
    /// Never fails: every document ends up counted as indexed, skipped or failed.
    pub async fn process(&self, doc: Document) -> ProcessOutcome {
        if self.snapshot.is_some() {
            self.documents
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(doc.clone());
        }

        let text = prepare_embedding_text(&doc);
        if !is_embeddable(&text) {
            debug!(url = %doc.url, "Skipping document, embedding text too short");
            self.counters.record_skipped();
            return ProcessOutcome::Skipped;
        }

        match self.index(&doc, &text).await {
            Ok(()) => {
                let indexed = self.counters.record_indexed();
                debug!(url = %doc.url, id = %doc.id, "Indexed document");
                if indexed % PROGRESS_EVERY == 0 {
                    info!("Indexed {} documents...", indexed);
                }
                ProcessOutcome::Indexed
            }
            Err(e) => {
                warn!(url = %doc.url, id = %doc.id, error = %e, "Failed to index document");
                self.counters.record_failed();
                ProcessOutcome::Failed
            }
        }
    }

    async fn index(&self, doc: &Document, text: &str) -> Result<(), IndexerError> {
        let vector = self.embedder.embed(text).await?;
        if vector.len() != self.dimensions {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            }
            .into());
        }

        let point = Point {
            id: doc.id.clone(),
            vector,
            payload: build_payload(doc),
        };
        self.store.upsert(&self.collection, point).await?;
        Ok(())
    }

    /// Logs the totals and writes the snapshot, if one is configured
    pub async fn close(&self) -> PipelineReport {
        let counts = self.counters.snapshot();
        info!(
            processed = counts.processed,
            indexed = counts.indexed,
            skipped = counts.skipped,
            failed = counts.failed,
            "Ingestion finished"
        );

        let collection_size = match self.store.collection_stats(&self.collection).await {
            Ok(size) => {
                info!(collection = %self.collection, points = size, "Collection size");
                Some(size)
            }
            Err(e) => {
                warn!(collection = %self.collection, error = %e, "Could not read collection size");
                None
            }
        };

        let snapshot_path = match &self.snapshot {
            Some(writer) => {
                let documents = std::mem::take(
                    &mut *self.documents.lock().unwrap_or_else(PoisonError::into_inner),
                );
                match writer.write(&documents, Utc::now()) {
                    Ok(path) => {
                        info!(path = %path.display(), documents = documents.len(), "Snapshot written");
                        Some(path)
                    }
                    Err(e) => {
                        warn!(dir = %writer.dir().display(), error = %e, "Failed to write snapshot");
                        None
                    }
                }
            }
            None => None,
        };

        PipelineReport {
            collection_size,
            snapshot_path,
        }
    }
}

/// Payload stored alongside the vector; an upsert replaces it wholesale
fn build_payload(doc: &Document) -> Map<String, Value> {
    let preview: String = doc.body_text.chars().take(PREVIEW_CHARS).collect();
    let headings: Vec<&String> = doc.headings.iter().take(PAYLOAD_HEADINGS).collect();

    let payload = json!({
        "url": doc.url,
        "title": doc.title,
        "meta_description": doc.meta_description,
        "text": preview,
        "full_text": doc.body_text,
        "category": doc.category,
        "word_count": doc.word_count,
        "headings": headings,
        "fetched_at": doc.fetched_at.to_rfc3339(),
    });

    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
