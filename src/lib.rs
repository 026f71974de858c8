//! # Policy Navigator
//!
//! Upload policy PDFs, read plain-language summaries, and ask questions
//! answered from the documents.
//!
//! Uploaded PDFs are converted to text, split into overlapping character
//! windows, and stored in SQLite. Questions are matched against the stored
//! chunks with a TF-IDF scorer and the best chunks are handed to an
//! OpenAI-compatible chat model (Groq by default) as context.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │  Upload  │──▶│ Extract+Chunk│──▶│  SQLite  │
//! │  (PDF)   │   │              │   │ docs+chunks
//! └──────────┘   └──────────────┘   └────┬─────┘
//!                                        │ TF-IDF retrieve
//!                                        ▼
//!                 ┌──────────┐     ┌──────────┐
//!                 │ CLI/HTTP │◀────│   LLM    │
//!                 │ (pnav)   │     │ answers  │
//!                 └──────────┘     └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | PDF text extraction |
//! | [`chunk`] | Overlapping text chunking |
//! | [`ingest`] | Upload pipeline |
//! | [`documents`] | Listing and deletion |
//! | [`search`] | TF-IDF chunk retrieval |
//! | [`llm`] | Chat-completion generator abstraction |
//! | [`answer`] | Question answering and summaries |
//! | [`server`] | HTTP API and static UI |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`error`] | Service error type and HTTP status mapping |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod llm;
pub mod migrate;
pub mod models;
pub mod search;
pub mod server;
