//! Ingestion pipeline
//!
//! Documents extracted by the crawler flow through here into the vector store.

mod ingest;
mod text;

pub use ingest::{IngestionPipeline, PipelineReport, ProcessOutcome};
pub use text::{is_embeddable, prepare_embedding_text, MIN_EMBED_CHARS};
