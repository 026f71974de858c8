//! Keyword retrieval over stored chunks.
//!
//! Scores every candidate chunk against the question with a TF-IDF sum:
//!
//! ```text
//! score(chunk) = Σ over query tokens t present in chunk:
//!                    count(t, chunk) / len(chunk) × ln((N + 1) / (1 + df(t)))
//! ```
//!
//! where `N` is the number of candidate chunks and `df(t)` the number of
//! candidates containing `t`. Query tokens are not deduplicated, so a word
//! repeated in the question weighs more. Document frequencies are computed
//! over the candidate set only, which means scoping a question to one
//! document also rescales its IDF.

use sqlx::{Row, SqlitePool};
use std::collections::{HashMap, HashSet};

use crate::error::NavigatorResult;
use crate::models::ScoredChunk;

/// Lowercase the text and split it into maximal alphanumeric runs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    for ch in text.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            word.push(ch);
        } else if !word.is_empty() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

/// Relevance of one tokenized chunk to the query tokens.
pub fn score_chunk(
    query_tokens: &[String],
    chunk_tokens: &[String],
    df: &HashMap<String, usize>,
    total_chunks: usize,
) -> f64 {
    if chunk_tokens.is_empty() {
        return 0.0;
    }

    let mut tf: HashMap<&str, usize> = HashMap::new();
    for token in chunk_tokens {
        *tf.entry(token.as_str()).or_insert(0) += 1;
    }
    let chunk_len = chunk_tokens.len() as f64;

    let mut score = 0.0;
    for token in query_tokens {
        if let Some(&count) = tf.get(token.as_str()) {
            let term_freq = count as f64 / chunk_len;
            let doc_freq = df.get(token).copied().unwrap_or(0);
            let idf = ((total_chunks as f64 + 1.0) / (1.0 + doc_freq as f64)).ln();
            score += term_freq * idf;
        }
    }
    score
}

/// A chunk loaded from storage, before scoring.
#[derive(Debug, Clone)]
pub struct CandidateChunk {
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
}

/// Rank candidates against the question and keep the best `top_k`.
///
/// Ordering is by score descending; equal scores keep candidate order.
/// Returns an empty vector when the question has no tokens or there are no
/// candidates.
pub fn rank_chunks(question: &str, candidates: Vec<CandidateChunk>, top_k: usize) -> Vec<ScoredChunk> {
    let query_tokens = tokenize(question);
    if query_tokens.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let tokenized: Vec<Vec<String>> = candidates.iter().map(|c| tokenize(&c.text)).collect();

    let mut df: HashMap<String, usize> = HashMap::new();
    for tokens in &tokenized {
        let unique: HashSet<&String> = tokens.iter().collect();
        for token in unique {
            *df.entry(token.clone()).or_insert(0) += 1;
        }
    }

    let total = candidates.len();
    let mut scored: Vec<ScoredChunk> = candidates
        .into_iter()
        .zip(tokenized.iter())
        .map(|(cand, tokens)| ScoredChunk {
            score: score_chunk(&query_tokens, tokens, &df, total),
            document_id: cand.document_id,
            chunk_index: cand.chunk_index,
            text: cand.text,
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);
    scored
}

/// Retrieve the chunks most relevant to `question`.
///
/// With `doc_id`, only that document's chunks are candidates; otherwise all
/// chunks in upload order. An unknown `doc_id` yields no results.
pub async fn retrieve(
    pool: &SqlitePool,
    question: &str,
    doc_id: Option<&str>,
    top_k: usize,
) -> NavigatorResult<Vec<ScoredChunk>> {
    if tokenize(question).is_empty() {
        return Ok(Vec::new());
    }

    let candidates = load_candidates(pool, doc_id).await?;
    let results = rank_chunks(question, candidates, top_k);

    tracing::debug!(
        doc_id = doc_id.unwrap_or("*"),
        hits = results.len(),
        top_score = results.first().map(|c| c.score).unwrap_or(0.0),
        "retrieved chunks"
    );

    Ok(results)
}

async fn load_candidates(
    pool: &SqlitePool,
    doc_id: Option<&str>,
) -> NavigatorResult<Vec<CandidateChunk>> {
    // documents.rowid follows insertion order, i.e. upload order.
    let rows = match doc_id {
        Some(id) => {
            sqlx::query(
                r#"
                SELECT c.document_id, c.chunk_index, c.text
                FROM chunks c
                WHERE c.document_id = ?
                ORDER BY c.chunk_index ASC
                "#,
            )
            .bind(id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                SELECT c.document_id, c.chunk_index, c.text
                FROM chunks c
                JOIN documents d ON d.id = c.document_id
                ORDER BY d.rowid ASC, c.chunk_index ASC
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows
        .iter()
        .map(|row| CandidateChunk {
            document_id: row.get("document_id"),
            chunk_index: row.get("chunk_index"),
            text: row.get("text"),
        })
        .collect())
}
