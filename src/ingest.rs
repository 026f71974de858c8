//! Upload pipeline.
//!
//! Coordinates the flow for one uploaded PDF: validate → save → extract →
//! chunk → store. The saved PDF is removed again whenever a later step
//! fails, so a rejected upload leaves nothing behind.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::config::Config;
use crate::db;
use crate::error::{NavigatorError, NavigatorResult};
use crate::extract::{extract_pdf, ExtractError};
use crate::models::DocumentRecord;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Document uploaded and processed successfully";

/// Response body of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    pub id: String,
    pub title: String,
    pub message: String,
}

/// Validate, store, and index an uploaded PDF.
pub async fn ingest_upload(
    pool: &SqlitePool,
    config: &Config,
    filename: &str,
    bytes: Vec<u8>,
) -> NavigatorResult<UploadOutcome> {
    let filename = base_filename(filename);
    if filename.is_empty() {
        return Err(NavigatorError::bad_request("No file selected"));
    }
    if !has_pdf_extension(filename) {
        return Err(NavigatorError::bad_request("Only PDF files are supported"));
    }

    let doc_id = new_document_id();
    let upload_dir = &config.storage.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await?;
    let path = pdf_path(upload_dir, &doc_id);
    tokio::fs::write(&path, &bytes).await?;

    match process_saved_upload(pool, config, &doc_id, filename, bytes).await {
        Ok(record) => {
            tracing::info!(
                id = %record.id,
                title = %record.title,
                pages = record.pages,
                chunks = record.chunks,
                "document indexed"
            );
            Ok(UploadOutcome {
                id: record.id,
                title: record.title,
                message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            })
        }
        Err(e) => {
            tracing::warn!(filename, error = %e, "upload rejected");
            remove_if_exists(&path).await?;
            Err(e)
        }
    }
}

async fn process_saved_upload(
    pool: &SqlitePool,
    config: &Config,
    doc_id: &str,
    filename: &str,
    bytes: Vec<u8>,
) -> NavigatorResult<DocumentRecord> {
    // pdf-extract is CPU-bound; keep it off the async workers.
    let extracted = tokio::task::spawn_blocking(move || extract_pdf(&bytes))
        .await
        .map_err(|e| ExtractError::Pdf(format!("extraction task failed: {}", e)))??;

    if extracted.text.trim().is_empty() {
        return Err(NavigatorError::bad_request(
            "Could not extract text from this PDF",
        ));
    }

    index_text(
        pool,
        config,
        doc_id,
        filename,
        &extracted.text,
        extracted.page_count as i64,
    )
    .await
}

/// Chunk already-extracted text and store it with its document record.
///
/// Document row and chunks are written in a single transaction.
pub async fn index_text(
    pool: &SqlitePool,
    config: &Config,
    doc_id: &str,
    filename: &str,
    text: &str,
    pages: i64,
) -> NavigatorResult<DocumentRecord> {
    let chunks = chunk_text(
        doc_id,
        text,
        config.chunking.chunk_chars,
        config.chunking.overlap_chars,
    );

    let record = DocumentRecord {
        id: doc_id.to_string(),
        title: title_from_filename(filename),
        filename: filename.to_string(),
        pages,
        chunks: chunks.len() as i64,
        uploaded_at: chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
        summary: None,
    };

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO documents (id, title, filename, pages, chunks, uploaded_at, body, summary)
        VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
        "#,
    )
    .bind(&record.id)
    .bind(&record.title)
    .bind(&record.filename)
    .bind(record.pages)
    .bind(record.chunks)
    .bind(&record.uploaded_at)
    .bind(text)
    .execute(&mut *tx)
    .await?;

    for chunk in &chunks {
        sqlx::query("INSERT INTO chunks (id, document_id, chunk_index, text) VALUES (?, ?, ?, ?)")
            .bind(&chunk.id)
            .bind(&chunk.document_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(record)
}

/// Short document id: the first 8 hex digits of a v4 UUID.
pub fn new_document_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Display title: the filename without its `.pdf` extension.
pub fn title_from_filename(filename: &str) -> String {
    if has_pdf_extension(filename) {
        filename[..filename.len() - 4].to_string()
    } else {
        filename.to_string()
    }
}

fn has_pdf_extension(filename: &str) -> bool {
    let split = filename.len().saturating_sub(4);
    filename.len() >= 4
        && filename.is_char_boundary(split)
        && filename[split..].eq_ignore_ascii_case(".pdf")
}

/// Where the PDF for `doc_id` is kept.
pub fn pdf_path(upload_dir: &Path, doc_id: &str) -> PathBuf {
    upload_dir.join(format!("{}.pdf", doc_id))
}

/// Strip any client-side directory components from an uploaded filename.
fn base_filename(filename: &str) -> &str {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .trim()
}

pub(crate) async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// CLI entry point: uploads a local PDF and prints the outcome.
pub async fn run_upload(config: &Config, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path)?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let pool = db::connect(config).await?;
    let outcome = ingest_upload(&pool, config, &filename, bytes).await;
    pool.close().await;
    let outcome = outcome?;

    println!("upload {}", filename);
    println!("  id:    {}", outcome.id);
    println!("  title: {}", outcome.title);
    println!("ok");
    Ok(())
}
