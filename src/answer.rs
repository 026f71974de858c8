//! Question answering and document summaries.
//!
//! Both operations build a prompt around document text and hand it to the
//! configured [`Generator`]. Answers are grounded in the chunks returned by
//! [`search::retrieve`](crate::search::retrieve); summaries use the stored
//! full text, truncated to `summary.max_chars`, and are cached on the
//! document row after the first successful generation.

use anyhow::Result;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::documents;
use crate::error::{NavigatorError, NavigatorResult};
use crate::llm::{self, Generator};
use crate::search;

pub const NO_CONTEXT_ANSWER: &str =
    "No relevant information found. Please upload a document first.";

pub const NOT_FOUND_SENTENCE: &str =
    "I couldn't find this information in the uploaded documents.";

pub const TRUNCATION_MARKER: &str = "\n\n[Document truncated for summarization...]";

const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Response body of `POST /api/query`.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Response body of `GET /api/summary/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub summary: String,
}

pub fn build_answer_prompt(question: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join(CONTEXT_SEPARATOR);
    format!(
        r#"You are a helpful government policy analyst. Answer the user's question
using ONLY the context below, taken from uploaded policy documents. If the
context does not contain the answer, reply exactly: "{not_found}"

Use clear, plain language that an ordinary citizen can follow.

Context:
{context}

Question: {question}

Answer:"#,
        not_found = NOT_FOUND_SENTENCE,
        context = context,
        question = question,
    )
}

pub fn build_summary_prompt(text: &str, max_chars: usize) -> String {
    let text = truncate_for_summary(text, max_chars);
    format!(
        r#"You are a government policy expert. Write a clear, plain-language summary
of the policy document below using these sections:

1. **Purpose**: What is this policy about?
2. **Key Provisions**: What are the main rules or requirements?
3. **Who is Affected**: Who does this policy impact?
4. **Important Details**: Deadlines, penalties, or other notable points.

Write so an ordinary citizen can easily understand it.

Document:
{text}

Summary:"#
    )
}

/// Keep at most `max_chars` characters, marking the cut when one is made.
pub fn truncate_for_summary(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}{}", &text[..byte_idx], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}

/// Answer a question from the indexed documents.
///
/// When retrieval finds nothing, a fixed answer is returned without calling
/// the model.
pub async fn ask(
    pool: &SqlitePool,
    config: &Config,
    generator: &dyn Generator,
    question: &str,
    doc_id: Option<&str>,
) -> NavigatorResult<Answer> {
    let chunks = search::retrieve(pool, question, doc_id, config.retrieval.top_k).await?;
    if chunks.is_empty() {
        return Ok(Answer {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
        });
    }

    let texts: Vec<String> = chunks.into_iter().map(|c| c.text).collect();
    let prompt = build_answer_prompt(question, &texts);
    let answer = generator
        .generate(&prompt)
        .await
        .map_err(|e| NavigatorError::Llm(e.to_string()))?;

    tracing::info!(
        model = generator.model_name(),
        context_chunks = texts.len(),
        "answered question"
    );

    let sources = texts
        .into_iter()
        .take(config.retrieval.max_sources)
        .collect();
    Ok(Answer { answer, sources })
}

/// Return the cached summary of a document, generating it on first request.
pub async fn summarize(
    pool: &SqlitePool,
    config: &Config,
    generator: &dyn Generator,
    id: &str,
) -> NavigatorResult<Summary> {
    let record = documents::get_document(pool, id)
        .await?
        .ok_or_else(NavigatorError::document_not_found)?;

    if let Some(summary) = record.summary.filter(|s| !s.is_empty()) {
        return Ok(Summary { summary });
    }

    let body = documents::get_document_body(pool, id)
        .await?
        .ok_or_else(NavigatorError::document_not_found)?;

    let prompt = build_summary_prompt(&body, config.summary.max_chars);
    let summary = generator
        .generate(&prompt)
        .await
        .map_err(|e| NavigatorError::Llm(e.to_string()))?;

    documents::set_summary(pool, id, &summary).await?;
    tracing::info!(id, model = generator.model_name(), "summary cached");

    Ok(Summary { summary })
}

/// CLI entry point: answers a question and prints the sources.
pub async fn run_ask(config: &Config, question: &str, doc_id: Option<String>) -> Result<()> {
    let generator = llm::create_generator(&config.llm)?;
    let pool = db::connect(config).await?;
    let result = ask(
        &pool,
        config,
        generator.as_ref(),
        question,
        doc_id.as_deref().filter(|d| !d.is_empty()),
    )
    .await;
    pool.close().await;
    let answer = result?;

    println!("{}", answer.answer);
    if !answer.sources.is_empty() {
        println!();
        println!("--- Sources ({}) ---", answer.sources.len());
        for (i, source) in answer.sources.iter().enumerate() {
            let excerpt: String = source.chars().take(200).collect();
            println!("[{}] {}...", i + 1, excerpt.replace('\n', " ").trim());
        }
    }

    Ok(())
}

/// CLI entry point: prints a document summary.
pub async fn run_summary(config: &Config, id: &str) -> Result<()> {
    let generator = llm::create_generator(&config.llm)?;
    let pool = db::connect(config).await?;
    let result = summarize(&pool, config, generator.as_ref(), id).await;
    pool.close().await;

    println!("{}", result?.summary);
    Ok(())
}
