//! Integration tests for the upload HTTP API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use tokio::io::AsyncReadExt;
use tower::ServiceExt;

use chunkyard_transfer::{
    ArtifactStore, BlobReader, CoordinatorConfig, DiskArtifactStore, MemoryChunkSink,
    MemoryStateStore, PersistedArtifact, StoreFuture, TransferError, UploadCoordinator,
};
use chunkyard_upload_server::{UploadHandler, router};

const BOUNDARY: &str = "chunkyard-test-boundary";

struct TestApp {
    router: Router,
    sink: Arc<MemoryChunkSink>,
    state: Arc<MemoryStateStore>,
    media: TempDir,
}

async fn app_with(
    partial_uploads: bool,
    max_chunk_bytes: usize,
    artifacts: Option<Arc<dyn ArtifactStore>>,
) -> TestApp {
    let media = TempDir::new().unwrap();
    let sink = Arc::new(MemoryChunkSink::new());
    let state = Arc::new(MemoryStateStore::default());
    let artifacts: Arc<dyn ArtifactStore> = match artifacts {
        Some(store) => store,
        None => Arc::new(DiskArtifactStore::new(media.path(), "/media/").await.unwrap()),
    };
    let coordinator = UploadCoordinator::new(
        CoordinatorConfig { partial_uploads },
        sink.clone(),
        state.clone(),
        artifacts,
    );
    let handler = Arc::new(UploadHandler::new(Arc::new(coordinator)));
    TestApp {
        router: router(handler, max_chunk_bytes),
        sink,
        state,
        media,
    }
}

async fn app() -> TestApp {
    app_with(true, 1024 * 1024, None).await
}

/// Persistence that always fails after draining the blob.
struct FailingStore;

impl ArtifactStore for FailingStore {
    fn persist<'a>(&'a self, _name: &'a str, mut blob: BlobReader) -> StoreFuture<'a, PersistedArtifact> {
        Box::pin(async move {
            let mut sink = Vec::new();
            blob.read_to_end(&mut sink).await?;
            Err(TransferError::Persistence("media volume is read-only".into()))
        })
    }
}

fn multipart_body(field: &str, file_name: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// POSTs one chunk as the `files` multipart part.
fn chunk_request(
    collection: &str,
    file_name: &str,
    data: &[u8],
    headers: &[(&str, &str)],
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/upload/{collection}"))
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    for (k, v) in headers {
        builder = builder.header(*k, *v);
    }
    builder
        .body(Body::from(multipart_body("files", file_name, data)))
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

fn stored_file(app: &TestApp, response: &Value) -> Vec<u8> {
    let url = response["files"][0]["url"].as_str().unwrap();
    let stored = url.trim_start_matches("/media/");
    std::fs::read(app.media.path().join(stored)).unwrap()
}

#[tokio::test]
async fn single_request_upload_completes() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        chunk_request("Document", "a.txt", b"0123456789", &[]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "files": [{
                "name": "a.txt",
                "size": 10,
                "url": "/media/a.txt",
                "sha256": hex::encode(Sha256::digest(b"0123456789")),
            }]
        })
    );
    assert_eq!(stored_file(&app, &body), b"0123456789");
    assert!(app.sink.is_empty().await);
    assert!(app.state.is_empty().await);
}

#[tokio::test]
async fn two_chunk_upload_reports_progress_then_completes() {
    let app = app().await;
    let disposition = "attachment; filename=\"b.txt\"";

    let (status, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"01234",
            &[
                ("content-range", "bytes 0-4/10"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "size": 5 }));

    let (status, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"56789",
            &[
                ("content-range", "bytes 5-9/10"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["name"], "b.txt");
    assert_eq!(body["files"][0]["size"], 10);
    assert_eq!(stored_file(&app, &body), b"0123456789");
}

#[tokio::test]
async fn restart_from_zero_discards_previous_attempt() {
    let app = app().await;
    let disposition = "attachment; filename=\"c.txt\"";

    let (_, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"abcde",
            &[
                ("content-range", "bytes 0-4/20"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    assert_eq!(body, json!({ "size": 5 }));

    let (_, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"ABCD",
            &[
                ("content-range", "bytes 0-3/8"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    assert_eq!(body, json!({ "size": 4 }));
    // Only the restarted attempt is still held.
    assert_eq!(app.sink.len().await, 1);

    let (_, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"EFGH",
            &[
                ("content-range", "bytes 4-7/8"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    assert_eq!(body["files"][0]["size"], 8);
    assert_eq!(stored_file(&app, &body), b"ABCDEFGH");
}

#[tokio::test]
async fn persistence_failure_reports_error_list() {
    let app = app_with(true, 1024 * 1024, Some(Arc::new(FailingStore))).await;
    let disposition = "attachment; filename=\"f.txt\"";

    send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"01234",
            &[
                ("content-range", "bytes 0-4/10"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;
    let (status, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "blob",
            b"56789",
            &[
                ("content-range", "bytes 5-9/10"),
                ("content-disposition", disposition),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{ "name": "f.txt", "error": "ERROR SAVING FILE" }])
    );
    assert!(app.sink.is_empty().await);
    assert!(app.state.is_empty().await);
}

#[tokio::test]
async fn malformed_range_is_bad_request() {
    let app = app().await;
    let (status, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "a.txt",
            b"0123",
            &[("content-range", "bytes four-five/ten")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "malformed_range_header");
    assert!(app.sink.is_empty().await);
    assert!(app.state.is_empty().await);
}

#[tokio::test]
async fn missing_files_part_is_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/upload/Document")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body("avatar", "a.png", b"png")))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_upload_body");
}

#[tokio::test]
async fn empty_raw_body_is_bad_request() {
    let app = app().await;
    let request = Request::builder()
        .method("POST")
        .uri("/upload/Document")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "missing_upload_body");
}

#[tokio::test]
async fn raw_body_chunks_are_accepted() {
    let app = app().await;
    let raw = |data: &'static [u8], range: &str| {
        Request::builder()
            .method("POST")
            .uri("/upload/Document")
            .header("content-range", range)
            .header("content-disposition", "attachment; filename=\"raw.bin\"")
            .body(Body::from(data))
            .unwrap()
    };

    let (_, body) = send(&app.router, raw(b"abc", "bytes 0-2/6")).await;
    assert_eq!(body, json!({ "size": 3 }));
    let (_, body) = send(&app.router, raw(b"def", "bytes 3-5/6")).await;
    assert_eq!(body["files"][0]["name"], "raw.bin");
    assert_eq!(stored_file(&app, &body), b"abcdef");
}

#[tokio::test]
async fn progress_probe_reports_received_bytes() {
    let app = app().await;
    let probe = || {
        Request::builder()
            .uri("/upload/Document?file=p.bin")
            .header("x-upload-session", "s1")
            .body(Body::empty())
            .unwrap()
    };

    let (status, body) = send(&app.router, probe()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "size": 0 }));

    send(
        &app.router,
        chunk_request(
            "Document",
            "p.bin",
            b"0123456",
            &[
                ("content-range", "bytes 0-6/100"),
                ("x-upload-session", "s1"),
            ],
        ),
    )
    .await;

    let (_, body) = send(&app.router, probe()).await;
    assert_eq!(body, json!({ "size": 7 }));
}

#[tokio::test]
async fn progress_probe_rejects_bad_names() {
    let app = app().await;
    let request = Request::builder()
        .uri("/upload/Document?file=..")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_name");
}

#[tokio::test]
async fn sessions_do_not_share_uploads() {
    let app = app().await;
    let chunk = |session: &str, data: &[u8], range: &str| {
        let cookie = format!("sessionid={session}");
        chunk_request(
            "Document",
            "shared.txt",
            data,
            &[("content-range", range), ("cookie", cookie.as_str())],
        )
    };

    let (_, body) = send(&app.router, chunk("alice", b"aaaa", "bytes 0-3/8")).await;
    assert_eq!(body, json!({ "size": 4 }));
    let (_, body) = send(&app.router, chunk("bob", b"bb", "bytes 0-1/8")).await;
    assert_eq!(body, json!({ "size": 2 }));
    let (_, body) = send(&app.router, chunk("alice", b"AAAA", "bytes 4-7/8")).await;
    assert_eq!(stored_file(&app, &body), b"aaaaAAAA");
}

#[tokio::test]
async fn collections_do_not_share_uploads() {
    let app = app().await;
    let range = [("content-range", "bytes 0-3/8")];

    let (_, body) = send(&app.router, chunk_request("Document", "x.txt", b"dddd", &range)).await;
    assert_eq!(body, json!({ "size": 4 }));
    let (_, body) = send(&app.router, chunk_request("Photo", "x.txt", b"pppp", &range)).await;
    assert_eq!(body, json!({ "size": 4 }));
}

#[tokio::test]
async fn whole_file_mode_ignores_range_headers() {
    let app = app_with(false, 1024 * 1024, None).await;
    let (status, body) = send(
        &app.router,
        chunk_request(
            "Document",
            "w.txt",
            b"hello",
            &[("content-range", "not even a range")],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["files"][0]["size"], 5);
    assert_eq!(stored_file(&app, &body), b"hello");
    assert!(app.state.is_empty().await);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let app = app_with(true, 16, None).await;
    let request = Request::builder()
        .method("POST")
        .uri("/upload/Document")
        .header("content-disposition", "attachment; filename=\"big.bin\"")
        .body(Body::from(vec![7u8; 64]))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["code"], "payload_too_large");
    assert!(app.sink.is_empty().await);
}

#[tokio::test]
async fn health_check() {
    let app = app().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}
