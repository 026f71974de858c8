//! HTTP API tests.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`,
//! backed by a temporary SQLite database and a stub generator that records
//! every prompt it receives.

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

use policy_navigator::config::{parse_config, Config};
use policy_navigator::llm::Generator;
use policy_navigator::server::{build_router, AppState};
use policy_navigator::{db, ingest, migrate};

// ============ Harness ============

struct StubGenerator {
    reply: String,
    fail: bool,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl StubGenerator {
    fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: String::new(),
            fail: true,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Generator for StubGenerator {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.fail {
            anyhow::bail!("upstream model unavailable");
        }
        Ok(self.reply.clone())
    }
}

struct TestEnv {
    _tmp: TempDir,
    root: PathBuf,
    config: Config,
    state: AppState,
}

impl TestEnv {
    fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    fn upload_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    async fn add_document(&self, id: &str, filename: &str, text: &str) {
        ingest::index_text(&self.state.pool, &self.config, id, filename, text, 2)
            .await
            .unwrap();
    }
}

async fn setup_with(generator: Arc<StubGenerator>) -> TestEnv {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let static_dir = root.join("static");
    fs::create_dir_all(&static_dir).unwrap();
    fs::write(
        static_dir.join("index.html"),
        "<!doctype html><title>Policy Navigator</title>",
    )
    .unwrap();

    let config = parse_config(&format!(
        r#"[db]
path = "{root}/data/pnav.sqlite"

[storage]
upload_dir = "{root}/uploads"

[chunking]
chunk_chars = 120
overlap_chars = 20

[server]
static_dir = "{root}/static"
max_upload_bytes = 4096
"#,
        root = root.display()
    ))
    .unwrap();

    let pool = db::connect(&config).await.unwrap();
    migrate::migrate_pool(&pool).await.unwrap();

    let state = AppState::new(config.clone(), pool, generator);
    TestEnv {
        _tmp: tmp,
        root,
        config,
        state,
    }
}

async fn setup() -> (TestEnv, Arc<StubGenerator>) {
    let generator = StubGenerator::replying("Renters earning under the threshold qualify.");
    let env = setup_with(generator.clone()).await;
    (env, generator)
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

const BOUNDARY: &str = "pnav-test-boundary";

fn multipart_upload(field: &str, filename: &str, content: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn files_in(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

const HOUSING_TEXT: &str = "Housing Assistance Act. Renters whose household income is below the \
regional threshold may apply for a monthly rent subsidy. Applications are reviewed each quarter.";

const FISHERIES_TEXT: &str = "Coastal Fisheries Regulation. Commercial vessels must report their \
catch within 48 hours. Quotas are set annually for cod and haddock.";

// ============ Health & static ============

#[tokio::test]
async fn health_reports_ok() {
    let (env, _) = setup().await;
    let (status, body) = send(env.router(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn index_page_is_served() {
    let (env, _) = setup().await;
    let response = env.router().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("Policy Navigator"));
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let (env, _) = setup().await;
    let request = Request::builder()
        .uri("/api/documents")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = env.router().oneshot(request).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

// ============ GET /api/documents ============

#[tokio::test]
async fn documents_empty_list() {
    let (env, _) = setup().await;
    let (status, body) = send(env.router(), get("/api/documents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([]));
}

#[tokio::test]
async fn documents_listed_in_upload_order() {
    let (env, _) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;
    env.add_document("bbbb2222", "Fisheries.pdf", FISHERIES_TEXT)
        .await;

    let (status, body) = send(env.router(), get("/api/documents")).await;
    assert_eq!(status, StatusCode::OK);
    let docs = body.as_array().unwrap();
    assert_eq!(docs.len(), 2);

    assert_eq!(docs[0]["id"], "aaaa1111");
    assert_eq!(docs[0]["title"], "Housing Act");
    assert_eq!(docs[0]["filename"], "Housing Act.pdf");
    assert_eq!(docs[0]["pages"], 2);
    assert!(docs[0]["chunks"].as_i64().unwrap() >= 1);
    assert!(docs[0]["summary"].is_null());
    assert!(docs[0]["uploaded_at"].as_str().unwrap().contains('T'));

    assert_eq!(docs[1]["id"], "bbbb2222");
}

// ============ POST /api/query ============

#[tokio::test]
async fn query_without_question_is_rejected() {
    let (env, generator) = setup().await;

    let (status, body) = send(env.router(), post_json("/api/query", serde_json::json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No question provided");

    let (status, body) = send(
        env.router(),
        post_json("/api/query", serde_json::json!({ "question": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No question provided");

    let request = Request::builder()
        .method("POST")
        .uri("/api/query")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(env.router(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No question provided");

    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn query_with_no_documents_returns_fallback() {
    let (env, generator) = setup().await;
    let (status, body) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "Who gets the subsidy?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["answer"],
        "No relevant information found. Please upload a document first."
    );
    assert_eq!(body["sources"], serde_json::json!([]));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn query_answers_from_relevant_chunks() {
    let (env, generator) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;
    env.add_document("bbbb2222", "Fisheries.pdf", FISHERIES_TEXT)
        .await;

    let (status, body) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "Who can apply for the rent subsidy?" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "Renters earning under the threshold qualify.");

    let sources = body["sources"].as_array().unwrap();
    assert!(!sources.is_empty() && sources.len() <= 3);
    assert!(sources[0].as_str().unwrap().contains("subsidy"));

    assert_eq!(generator.calls(), 1);
    let prompt = generator.last_prompt();
    assert!(prompt.contains("Question: Who can apply for the rent subsidy?"));
    assert!(prompt.contains("rent subsidy"));
}

#[tokio::test]
async fn query_scoped_to_document() {
    let (env, generator) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;
    env.add_document("bbbb2222", "Fisheries.pdf", FISHERIES_TEXT)
        .await;

    let (status, body) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "What are the subsidy rules?", "doc_id": "bbbb2222" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    for source in body["sources"].as_array().unwrap() {
        let text = source.as_str().unwrap();
        assert!(
            FISHERIES_TEXT.contains(text),
            "source outside scoped document: {}",
            text
        );
    }
    assert!(!generator.last_prompt().contains("Housing Assistance"));
}

#[tokio::test]
async fn query_empty_doc_id_means_all_documents() {
    let (env, generator) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;

    let (status, body) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "rent subsidy", "doc_id": "" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body["sources"].as_array().unwrap().is_empty());
    assert_eq!(generator.calls(), 1);
}

#[tokio::test]
async fn query_unknown_document_returns_fallback() {
    let (env, generator) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;

    let (status, body) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "rent subsidy", "doc_id": "ffffffff" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"], serde_json::json!([]));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn query_generator_failure_is_server_error() {
    let generator = StubGenerator::failing();
    let env = setup_with(generator.clone()).await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;

    let (status, body) = send(
        env.router(),
        post_json("/api/query", serde_json::json!({ "question": "rent subsidy" })),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("upstream model unavailable"));
}

// ============ GET /api/summary/{id} ============

#[tokio::test]
async fn summary_unknown_document_is_not_found() {
    let (env, generator) = setup().await;
    let (status, body) = send(env.router(), get("/api/summary/ffffffff")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Document not found");
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn summary_generated_once_then_cached() {
    let generator = StubGenerator::replying("1. **Purpose**: Rent help for low-income renters.");
    let env = setup_with(generator.clone()).await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;

    let (status, first) = send(env.router(), get("/api/summary/aaaa1111")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        first["summary"],
        "1. **Purpose**: Rent help for low-income renters."
    );
    assert!(generator.last_prompt().contains("Housing Assistance Act"));

    let (status, second) = send(env.router(), get("/api/summary/aaaa1111")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["summary"], first["summary"]);
    assert_eq!(generator.calls(), 1);

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    assert_eq!(docs[0]["summary"], first["summary"]);
}

#[tokio::test]
async fn summary_failure_is_not_cached() {
    let generator = StubGenerator::failing();
    let env = setup_with(generator.clone()).await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;

    let (status, body) = send(env.router(), get("/api/summary/aaaa1111")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    assert!(docs[0]["summary"].is_null());

    send(env.router(), get("/api/summary/aaaa1111")).await;
    assert_eq!(generator.calls(), 2);
}

// ============ DELETE /api/documents/{id} ============

#[tokio::test]
async fn delete_unknown_document_is_not_found() {
    let (env, _) = setup().await;
    let (status, body) = send(env.router(), delete("/api/documents/ffffffff")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Document not found");
}

#[tokio::test]
async fn delete_removes_document_chunks_and_file() {
    let (env, generator) = setup().await;
    env.add_document("aaaa1111", "Housing Act.pdf", HOUSING_TEXT)
        .await;
    env.add_document("bbbb2222", "Fisheries.pdf", FISHERIES_TEXT)
        .await;
    fs::create_dir_all(env.upload_dir()).unwrap();
    let pdf = env.upload_dir().join("aaaa1111.pdf");
    fs::write(&pdf, b"%PDF-1.4 placeholder").unwrap();

    let (status, body) = send(env.router(), delete("/api/documents/aaaa1111")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Document deleted successfully");
    assert!(!pdf.exists());

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    let ids: Vec<&str> = docs
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["bbbb2222"]);

    let (_, answer) = send(
        env.router(),
        post_json(
            "/api/query",
            serde_json::json!({ "question": "rent subsidy", "doc_id": "aaaa1111" }),
        ),
    )
    .await;
    assert_eq!(answer["sources"], serde_json::json!([]));
    assert_eq!(generator.calls(), 0);
}

// ============ POST /api/upload ============

#[tokio::test]
async fn upload_rejects_non_pdf() {
    let (env, _) = setup().await;
    let (status, body) = send(
        env.router(),
        multipart_upload("file", "notes.docx", b"PK\x03\x04"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Only PDF files are supported");
    assert_eq!(files_in(&env.upload_dir()), 0);
}

#[tokio::test]
async fn upload_without_file_field() {
    let (env, _) = setup().await;
    let (status, body) = send(
        env.router(),
        multipart_upload("attachment", "act.pdf", b"%PDF-1.4"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn upload_with_empty_filename() {
    let (env, _) = setup().await;
    let (status, body) = send(env.router(), multipart_upload("file", "", b"")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file selected");
}

#[tokio::test]
async fn upload_requires_multipart() {
    let (env, _) = setup().await;
    let (status, body) = send(
        env.router(),
        post_json("/api/upload", serde_json::json!({ "file": "act.pdf" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file provided");
}

#[tokio::test]
async fn upload_corrupt_pdf_leaves_nothing_behind() {
    let (env, _) = setup().await;
    let (status, body) = send(
        env.router(),
        multipart_upload("file", "broken.pdf", b"this is not a pdf at all"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("PDF extraction failed"));
    assert_eq!(files_in(&env.upload_dir()), 0);

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    assert_eq!(docs, serde_json::json!([]));
}

#[tokio::test]
async fn upload_over_size_limit_is_rejected() {
    let (env, _) = setup().await;
    let big = vec![b'x'; 10_000];
    let (status, body) = send(env.router(), multipart_upload("file", "big.pdf", &big)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "File too large");
    assert_eq!(files_in(&env.upload_dir()), 0);
}

/// One-page PDF with a single line of Helvetica text, built with lopdf.
fn one_page_pdf(line: &str) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(line)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

#[tokio::test]
async fn upload_real_pdf_is_indexed() {
    let (env, _) = setup().await;
    let pdf = one_page_pdf("Rent subsidy eligibility rules");
    let (status, body) = send(
        env.router(),
        multipart_upload("file", "Rent Rules.pdf", &pdf),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "upload failed: {}", body);
    assert_eq!(body["title"], "Rent Rules");
    assert_eq!(body["message"], "Document uploaded and processed successfully");
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 8);
    assert!(env.upload_dir().join(format!("{}.pdf", id)).exists());

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    let docs = docs.as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["id"], id.as_str());
    assert_eq!(docs[0]["filename"], "Rent Rules.pdf");
    assert_eq!(docs[0]["pages"], 1);
    assert!(docs[0]["chunks"].as_i64().unwrap() >= 1);
}

#[tokio::test]
async fn upload_pdf_without_text_is_rejected() {
    let (env, _) = setup().await;
    let pdf = one_page_pdf("");
    let (status, body) = send(env.router(), multipart_upload("file", "Blank.pdf", &pdf)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Could not extract text from this PDF");
    assert_eq!(files_in(&env.upload_dir()), 0);

    let (_, docs) = send(env.router(), get("/api/documents")).await;
    assert_eq!(docs, serde_json::json!([]));
}
