//! Core data models used throughout Policy Navigator.
//!
//! These types represent the uploaded documents, their chunks, and the
//! retrieval results that flow through the ingestion and question-answering
//! pipeline.

use serde::Serialize;

/// Metadata for an uploaded document.
///
/// Serializes to the element shape of `GET /api/documents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub pages: i64,
    pub chunks: i64,
    pub uploaded_at: String, // ISO8601
    pub summary: Option<String>,
}

/// A chunk of a document's extracted text.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
}

/// A chunk ranked against a question.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub score: f64,
}
