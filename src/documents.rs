//! Document listing, lookup, and deletion.
//!
//! Used by both the `pnav documents` / `pnav delete` CLI commands and the
//! `/api/documents` HTTP endpoints.

use anyhow::Result;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{NavigatorError, NavigatorResult};
use crate::ingest::{pdf_path, remove_if_exists};
use crate::models::DocumentRecord;

pub const DELETE_SUCCESS_MESSAGE: &str = "Document deleted successfully";

const RECORD_COLUMNS: &str = "id, title, filename, pages, chunks, uploaded_at, summary";

/// Response body of a successful delete.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteOutcome {
    pub message: String,
}

/// All documents in upload order.
pub async fn list_documents(pool: &SqlitePool) -> NavigatorResult<Vec<DocumentRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM documents ORDER BY rowid ASC",
        RECORD_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(record_from_row).collect())
}

pub async fn get_document(pool: &SqlitePool, id: &str) -> NavigatorResult<Option<DocumentRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM documents WHERE id = ?",
        RECORD_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(record_from_row))
}

/// Extracted full text of a document, if it exists.
pub async fn get_document_body(pool: &SqlitePool, id: &str) -> NavigatorResult<Option<String>> {
    let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(body)
}

pub async fn set_summary(pool: &SqlitePool, id: &str, summary: &str) -> NavigatorResult<()> {
    sqlx::query("UPDATE documents SET summary = ? WHERE id = ?")
        .bind(summary)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a document, its stored PDF, and its chunks.
pub async fn delete_document(
    pool: &SqlitePool,
    config: &Config,
    id: &str,
) -> NavigatorResult<DeleteOutcome> {
    if get_document(pool, id).await?.is_none() {
        return Err(NavigatorError::document_not_found());
    }

    remove_if_exists(&pdf_path(&config.storage.upload_dir, id)).await?;

    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(id, "document deleted");

    Ok(DeleteOutcome {
        message: DELETE_SUCCESS_MESSAGE.to_string(),
    })
}

fn record_from_row(row: &SqliteRow) -> DocumentRecord {
    DocumentRecord {
        id: row.get("id"),
        title: row.get("title"),
        filename: row.get("filename"),
        pages: row.get("pages"),
        chunks: row.get("chunks"),
        uploaded_at: row.get("uploaded_at"),
        summary: row.get("summary"),
    }
}

/// CLI entry point: prints all documents.
pub async fn run_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let docs = list_documents(&pool).await;
    pool.close().await;
    let docs = docs?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }

    for (i, doc) in docs.iter().enumerate() {
        println!("{}. {}", i + 1, doc.title);
        println!("    id:       {}", doc.id);
        println!("    file:     {}", doc.filename);
        println!("    pages:    {}", doc.pages);
        println!("    chunks:   {}", doc.chunks);
        println!("    uploaded: {}", doc.uploaded_at);
        println!(
            "    summary:  {}",
            if doc.summary.is_some() { "cached" } else { "none" }
        );
        println!();
    }

    Ok(())
}

/// CLI entry point: deletes one document.
pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let outcome = delete_document(&pool, config, id).await;
    pool.close().await;

    println!("{}", outcome?.message);
    Ok(())
}
