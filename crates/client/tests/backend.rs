use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::Json;
use serde_json::{Value, json};
use tokio::sync::{Notify, mpsc};

use divemedia_client::{
    DeleteDiveOptions, DiveMediaClient, Error, PendingFile, ProgressUpdate, UploadProgress,
    UploadQueue, UploadStage, UploadState,
};

// -- Mock backend ---------------------------------------------------------

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    query: HashMap<String, String>,
    authorization: Option<String>,
    body: Value,
}

#[derive(Default)]
struct Backend {
    base_url: Mutex<String>,
    calls: Mutex<Vec<Recorded>>,
    put_sizes: Mutex<HashMap<String, usize>>,
    fail_put: Mutex<HashSet<String>>,
    fail_save: Mutex<HashSet<String>>,
    fail_media: Mutex<HashSet<String>>,
    skip_broker: Mutex<HashSet<String>>,
    log_status: Mutex<Option<StatusCode>>,
    list_gate: Mutex<Option<Arc<Notify>>>,
    put_gate: Mutex<HashMap<String, Arc<Notify>>>,
}

impl Backend {
    fn record(&self, method: Method, uri: &Uri, headers: &HeaderMap, body: Value) {
        let query = uri
            .query()
            .map(|q| {
                q.split('&')
                    .filter_map(|kv| kv.split_once('='))
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect()
            })
            .unwrap_or_default();
        self.calls.lock().unwrap().push(Recorded {
            method,
            path: uri.path().to_owned(),
            query,
            authorization: headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
            body,
        });
    }

    fn calls_to(&self, method: &Method, path: &str) -> Vec<Recorded> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .cloned()
            .collect()
    }

    fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }
}

type Shared = Arc<Backend>;

async fn list_dives(State(b): State<Shared>, uri: Uri, headers: HeaderMap) -> Json<Value> {
    b.record(Method::GET, &uri, &headers, Value::Null);
    let gate = b.list_gate.lock().unwrap().clone();
    if let Some(gate) = gate {
        gate.notified().await;
    }
    Json(json!([{ "id": 1, "name": "Blue Hole", "media_items": [] }]))
}

async fn get_dive(
    State(b): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    b.record(Method::GET, &uri, &headers, Value::Null);
    if id == "missing" {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({
        "id": id,
        "name": "Blue Hole",
        "media_items": [{
            "id": 7,
            "filename": "reef.jpg",
            "mime_type": "image/jpeg",
            "raw_url": "https://storage.example/reef.jpg",
            "state": "processing",
        }],
    }))
    .into_response()
}

async fn rename_dive(
    State(b): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    b.record(Method::PATCH, &uri, &headers, body.clone());
    Json(json!({ "id": id, "name": body["name"], "media_items": null }))
}

async fn delete_dive(State(b): State<Shared>, uri: Uri, headers: HeaderMap) -> StatusCode {
    b.record(Method::DELETE, &uri, &headers, Value::Null);
    StatusCode::NO_CONTENT
}

async fn get_log(State(b): State<Shared>, uri: Uri, headers: HeaderMap) -> Response {
    b.record(Method::GET, &uri, &headers, Value::Null);
    let status = *b.log_status.lock().unwrap();
    match status {
        Some(status) => (status, "log backend exploded").into_response(),
        None => Json(json!({ "max_depth": 18.5, "notes": "turtle" })).into_response(),
    }
}

async fn upload_urls(
    State(b): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    b.record(Method::POST, &uri, &headers, body.clone());
    let base = b.base_url.lock().unwrap().clone();
    let urls: serde_json::Map<String, Value> = body["files"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|f| {
            let name = f["name"].as_str().unwrap_or_default();
            !b.skip_broker.lock().unwrap().contains(name)
        })
        .map(|f| {
            let id = f["id"].as_str().unwrap_or_default().to_owned();
            let name = f["name"].as_str().unwrap_or_default();
            (id, Value::String(format!("{base}/storage/{name}")))
        })
        .collect();
    Json(Value::Object(urls))
}

async fn storage_put(
    State(b): State<Shared>,
    Path(name): Path<String>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    b.record(
        Method::PUT,
        &uri,
        &headers,
        json!({ "content_type": headers.get("content-type").and_then(|v| v.to_str().ok()) }),
    );
    let gate = b.put_gate.lock().unwrap().get(&name).cloned();
    if let Some(gate) = gate {
        gate.notified().await;
    }
    if b.fail_put.lock().unwrap().contains(&name) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    b.put_sizes.lock().unwrap().insert(name, body.len());
    StatusCode::OK
}

async fn save_media(
    State(b): State<Shared>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    b.record(Method::POST, &uri, &headers, body.clone());
    let filename = body["filename"].as_str().unwrap_or_default();
    if b.fail_save.lock().unwrap().contains(filename) {
        return (StatusCode::BAD_GATEWAY, "database unavailable").into_response();
    }
    Json(json!({ "id": 99 })).into_response()
}

async fn delete_media(
    State(b): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    b.record(Method::DELETE, &uri, &headers, Value::Null);
    if b.fail_media.lock().unwrap().contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "media is locked").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn move_media(
    State(b): State<Shared>,
    Path(id): Path<String>,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    b.record(Method::PATCH, &uri, &headers, Value::Null);
    if b.fail_media.lock().unwrap().contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "media is locked").into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn toggle_favorite(State(b): State<Shared>, uri: Uri, headers: HeaderMap) -> Json<Value> {
    b.record(Method::POST, &uri, &headers, Value::Null);
    Json(json!({ "is_favorite": true }))
}

async fn start_backend() -> (Shared, String) {
    let backend = Arc::new(Backend::default());
    let app = Router::new()
        .route("/dives/", get(list_dives))
        .route(
            "/dives/{id}",
            get(get_dive).delete(delete_dive).patch(rename_dive),
        )
        .route("/dives/{id}/log", get(get_log))
        .route("/media/get_upload_urls", post(upload_urls))
        .route("/media/save", post(save_media))
        .route("/media/{id}", delete(delete_media))
        .route("/media/{id}/move", patch(move_media))
        .route("/media/{id}/toggle_favorite", post(toggle_favorite))
        .route("/storage/{name}", put(storage_put))
        .with_state(Arc::clone(&backend));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock backend");
    let port = listener.local_addr().unwrap().port();
    let base_url = format!("http://127.0.0.1:{port}");
    *backend.base_url.lock().unwrap() = base_url.clone();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (backend, base_url)
}

fn client(base_url: &str) -> DiveMediaClient {
    DiveMediaClient::builder(base_url)
        .access_token("test-token")
        .build()
        .unwrap()
}

fn media_file(dir: &tempfile::TempDir, name: &str, len: usize) -> PendingFile {
    let path: PathBuf = dir.path().join(name);
    let bytes: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, bytes).unwrap();
    let mime = if name.ends_with(".mp4") {
        "video/mp4"
    } else {
        "image/jpeg"
    };
    PendingFile::new(path, name, mime, len as u64)
}

// -- Authenticated fetch --------------------------------------------------

#[tokio::test]
async fn bearer_token_is_attached() {
    let (backend, url) = start_backend().await;
    let dives = client(&url).list_dives().await.unwrap();
    assert_eq!(dives.len(), 1);
    assert_eq!(dives[0].id, "1");

    let calls = backend.calls_to(&Method::GET, "/dives/");
    assert_eq!(calls[0].authorization.as_deref(), Some("Bearer test-token"));
}

#[tokio::test]
async fn missing_session_fails_before_network() {
    let (backend, url) = start_backend().await;
    let anonymous = DiveMediaClient::new(&url);
    let err = anonymous.list_dives().await.unwrap_err();
    assert!(matches!(err, Error::NoSession));
    assert!(backend.calls().is_empty());
    assert!(!anonymous.busy().is_busy());
}

#[tokio::test]
async fn busy_indicator_spans_the_call() {
    let (backend, url) = start_backend().await;
    let gate = Arc::new(Notify::new());
    *backend.list_gate.lock().unwrap() = Some(Arc::clone(&gate));

    let client = client(&url);
    let mut busy = client.busy().subscribe();
    let task = {
        let client = client.clone();
        tokio::spawn(async move { client.list_dives().await })
    };

    busy.wait_for(|n| *n == 1).await.unwrap();
    assert!(client.busy().is_busy());

    gate.notify_one();
    task.await.unwrap().unwrap();
    assert_eq!(client.busy().in_flight(), 0);
}

#[tokio::test]
async fn not_found_is_distinguished() {
    let (_backend, url) = start_backend().await;
    let err = client(&url).get_dive("missing").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "404");
}

#[tokio::test]
async fn missing_dive_log_is_none() {
    let (backend, url) = start_backend().await;
    *backend.log_status.lock().unwrap() = Some(StatusCode::NOT_FOUND);
    assert!(client(&url).get_dive_log("5").await.unwrap().is_none());
}

#[tokio::test]
async fn dive_log_server_error_propagates() {
    let (backend, url) = start_backend().await;
    *backend.log_status.lock().unwrap() = Some(StatusCode::INTERNAL_SERVER_ERROR);
    let err = client(&url).get_dive_log("5").await.unwrap_err();
    match err {
        Error::RequestFailed { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "log backend exploded");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn dive_log_is_decoded() {
    let (_backend, url) = start_backend().await;
    let log = client(&url).get_dive_log("5").await.unwrap().unwrap();
    assert_eq!(log.max_depth, Some(18.5));
    assert_eq!(log.notes.as_deref(), Some("turtle"));
}

#[tokio::test]
async fn delete_dive_sends_delete_media_flag() {
    let (backend, url) = start_backend().await;
    let client = client(&url);
    client
        .delete_dive("5", DeleteDiveOptions { delete_media: true })
        .await
        .unwrap();
    client
        .delete_dive("6", DeleteDiveOptions::default())
        .await
        .unwrap();

    let first = backend.calls_to(&Method::DELETE, "/dives/5");
    assert_eq!(first[0].query.get("delete_media").map(String::as_str), Some("true"));
    let second = backend.calls_to(&Method::DELETE, "/dives/6");
    assert_eq!(second[0].query.get("delete_media").map(String::as_str), Some("false"));
}

#[tokio::test]
async fn toggle_favorite_returns_new_flag() {
    let (backend, url) = start_backend().await;
    assert!(client(&url).toggle_favorite("7").await.unwrap());
    assert_eq!(backend.calls_to(&Method::POST, "/media/7/toggle_favorite").len(), 1);
}

#[tokio::test]
async fn rename_patches_the_dive_name() {
    let (backend, url) = start_backend().await;
    let dive = client(&url).rename_dive("5", "Night dive").await.unwrap();
    assert_eq!(dive.name, "Night dive");
    assert!(dive.media_items.is_empty());

    let calls = backend.calls_to(&Method::PATCH, "/dives/5");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].body, json!({ "name": "Night dive" }));
}

#[tokio::test]
async fn move_passes_destination_as_query() {
    let (backend, url) = start_backend().await;
    client(&url).move_media("7", "12").await.unwrap();

    let calls = backend.calls_to(&Method::PATCH, "/media/7/move");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].query.get("new_dive_id").map(String::as_str), Some("12"));
    assert_eq!(calls[0].body, Value::Null);
}

#[tokio::test]
async fn batch_delete_reports_each_item_in_order() {
    let (backend, url) = start_backend().await;
    backend.fail_media.lock().unwrap().insert("2".into());
    let ids: Vec<String> = ["1", "2", "3"].map(String::from).to_vec();

    let results = client(&url).delete_media_batch(&ids).await;
    let order: Vec<&str> = results.iter().map(|r| r.media_id.as_str()).collect();
    assert_eq!(order, ["1", "2", "3"]);
    let ok: Vec<bool> = results.iter().map(|r| r.is_success()).collect();
    assert_eq!(ok, [true, false, true]);
    match &results[1].result {
        Err(Error::RequestFailed { status, message }) => {
            assert_eq!(*status, 500);
            assert_eq!(message, "media is locked");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }

    for id in &ids {
        assert_eq!(backend.calls_to(&Method::DELETE, &format!("/media/{id}")).len(), 1);
    }
}

#[tokio::test]
async fn batch_move_attempts_every_item() {
    let (backend, url) = start_backend().await;
    backend.fail_media.lock().unwrap().insert("1".into());
    let ids: Vec<String> = ["1", "2"].map(String::from).to_vec();

    let results = client(&url).move_media_batch(&ids, "9").await;
    assert!(!results[0].is_success());
    assert!(results[1].is_success());

    for id in &ids {
        let calls = backend.calls_to(&Method::PATCH, &format!("/media/{id}/move"));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].query.get("new_dive_id").map(String::as_str), Some("9"));
    }
}

// -- Uploads --------------------------------------------------------------

#[tokio::test]
async fn upload_brokers_once_and_registers_each_file() {
    let (backend, url) = start_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let mut queue = UploadQueue::new();
    queue.add(media_file(&dir, "reef.jpg", 10_000));
    queue.add(media_file(&dir, "shark.mp4", 64_000));
    queue.add(media_file(&dir, "ray.jpg", 0));
    let ids: HashSet<String> = queue.files().map(|f| f.id.clone()).collect();

    let report = queue.upload(&client, "42").await.unwrap();
    assert!(report.is_success());
    assert_eq!(report.registered().count(), 3);

    let broker = backend.calls_to(&Method::POST, "/media/get_upload_urls");
    assert_eq!(broker.len(), 1);
    let requested: HashSet<String> = broker[0].body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(requested, ids);
    assert!(broker[0].authorization.is_some());

    let puts: Vec<Recorded> = backend
        .calls()
        .into_iter()
        .filter(|c| c.method == Method::PUT)
        .collect();
    assert_eq!(puts.len(), 3);
    assert!(puts.iter().all(|c| c.authorization.is_none()));
    let shark = puts.iter().find(|c| c.path == "/storage/shark.mp4").unwrap();
    assert_eq!(shark.body["content_type"], "video/mp4");

    let sizes = backend.put_sizes.lock().unwrap().clone();
    assert_eq!(sizes.get("reef.jpg"), Some(&10_000));
    assert_eq!(sizes.get("shark.mp4"), Some(&64_000));
    assert_eq!(sizes.get("ray.jpg"), Some(&0));

    let saves = backend.calls_to(&Method::POST, "/media/save");
    assert_eq!(saves.len(), 3);
    for save in &saves {
        assert_eq!(save.query.get("dive_id").map(String::as_str), Some("42"));
        let filename = save.body["filename"].as_str().unwrap();
        assert_eq!(
            save.body["raw_url"].as_str().unwrap(),
            format!("{url}/storage/{filename}")
        );
    }

    assert!(queue.is_empty());
    assert!(queue.progress().is_empty());
}

#[tokio::test]
async fn failed_put_does_not_block_other_files() {
    let (backend, url) = start_backend().await;
    backend.fail_put.lock().unwrap().insert("a.jpg".into());
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let mut queue = UploadQueue::new();
    let a = queue.add(media_file(&dir, "a.jpg", 2_000)).id.clone();
    queue.add(media_file(&dir, "b.jpg", 3_000));

    let report = queue.upload(&client, "42").await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.registered().count(), 1);

    let saves = backend.calls_to(&Method::POST, "/media/save");
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].body["filename"], "b.jpg");

    assert_eq!(queue.len(), 1);
    assert!(matches!(
        queue.state(&a),
        Some(UploadState::Failed {
            stage: UploadStage::Put,
            raw_url: None,
            ..
        })
    ));

    let err = report.into_result().unwrap_err();
    assert!(matches!(
        err,
        Error::UploadIncomplete {
            registered: 1,
            failed: 1
        }
    ));

    // Second attempt only brokers and uploads the file that failed.
    backend.fail_put.lock().unwrap().clear();
    let retry = queue.upload(&client, "42").await.unwrap();
    assert!(retry.is_success());
    let broker = backend.calls_to(&Method::POST, "/media/get_upload_urls");
    assert_eq!(broker.len(), 2);
    assert_eq!(broker[1].body["files"].as_array().unwrap().len(), 1);
    assert_eq!(broker[1].body["files"][0]["id"], a.as_str());
    assert!(queue.is_empty());
}

#[tokio::test]
async fn failed_registration_is_retried_without_reupload() {
    let (backend, url) = start_backend().await;
    backend.fail_save.lock().unwrap().insert("wreck.mp4".into());
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let mut queue = UploadQueue::new();
    let id = queue.add(media_file(&dir, "wreck.mp4", 5_000)).id.clone();

    let report = queue.upload(&client, "42").await.unwrap();
    assert!(!report.is_success());
    let stored = match queue.state(&id) {
        Some(UploadState::Failed {
            stage: UploadStage::Register,
            raw_url: Some(raw_url),
            ..
        }) => raw_url.clone(),
        other => panic!("expected register failure, got {other:?}"),
    };
    assert!(stored.ends_with("/storage/wreck.mp4"));

    backend.fail_save.lock().unwrap().clear();
    let retry = queue.upload(&client, "42").await.unwrap();
    assert!(retry.is_success());

    assert_eq!(backend.calls_to(&Method::POST, "/media/get_upload_urls").len(), 1);
    assert_eq!(backend.calls_to(&Method::PUT, "/storage/wreck.mp4").len(), 1);
    let saves = backend.calls_to(&Method::POST, "/media/save");
    assert_eq!(saves.len(), 2);
    assert_eq!(saves[1].body["raw_url"], stored.as_str());
}

#[tokio::test]
async fn progress_only_moves_forward() {
    let (_backend, url) = start_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let (tx, mut rx) = mpsc::unbounded_channel::<ProgressUpdate>();
    let mut queue = UploadQueue::new().with_progress(UploadProgress::new().with_listener(tx));
    let big = queue.add(media_file(&dir, "big.mp4", 256 * 1024)).id.clone();
    let small = queue.add(media_file(&dir, "small.jpg", 1_500)).id.clone();

    queue.upload(&client, "42").await.unwrap().into_result().unwrap();

    let mut seen: HashMap<String, Vec<u8>> = HashMap::new();
    while let Ok(update) = rx.try_recv() {
        seen.entry(update.file_id).or_default().push(update.percent);
    }
    for id in [&big, &small] {
        let values = &seen[id];
        assert!(values.windows(2).all(|w| w[0] < w[1]), "{values:?}");
        assert!(values.iter().all(|p| *p <= 100));
        assert_eq!(values.last(), Some(&100));
    }
    assert!(seen[&big].len() > 2);
}

#[tokio::test]
async fn broker_failure_aborts_before_any_put() {
    let (backend, _url) = start_backend().await;
    // No broker route on this path prefix: every backend call 404s.
    let base = format!("{}/nowhere", backend.base_url.lock().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let client = client(&base);

    let mut queue = UploadQueue::new();
    queue.add(media_file(&dir, "reef.jpg", 100));
    let err = queue.upload(&client, "42").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(queue.len(), 1);
    assert!(backend.calls().iter().all(|c| c.method != Method::PUT));
}

#[tokio::test]
async fn slow_put_does_not_hold_back_sibling_registration() {
    let (backend, url) = start_backend().await;
    let gate = Arc::new(Notify::new());
    backend
        .put_gate
        .lock()
        .unwrap()
        .insert("slow.mp4".into(), Arc::clone(&gate));
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let mut queue = UploadQueue::new();
    queue.add(media_file(&dir, "slow.mp4", 32_000));
    queue.add(media_file(&dir, "fast.jpg", 1_000));

    let upload = queue.upload(&client, "42");
    let observer = async {
        let saved_fast = || {
            backend
                .calls_to(&Method::POST, "/media/save")
                .iter()
                .any(|c| c.body["filename"] == "fast.jpg")
        };
        for _ in 0..500 {
            if saved_fast() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(saved_fast(), "fast.jpg was not registered while slow.mp4 was in flight");
        let saves = backend.calls_to(&Method::POST, "/media/save");
        assert!(saves.iter().all(|c| c.body["filename"] != "slow.mp4"));
        gate.notify_one();
    };
    let (report, ()) = tokio::join!(upload, observer);

    let report = report.unwrap();
    assert!(report.is_success());
    assert_eq!(backend.calls_to(&Method::POST, "/media/save").len(), 2);
}

#[tokio::test]
async fn missing_broker_entry_fails_only_that_file() {
    let (backend, url) = start_backend().await;
    backend.skip_broker.lock().unwrap().insert("ghost.jpg".into());
    let dir = tempfile::tempdir().unwrap();
    let client = client(&url);

    let mut queue = UploadQueue::new();
    let ghost = queue.add(media_file(&dir, "ghost.jpg", 500)).id.clone();
    queue.add(media_file(&dir, "real.jpg", 700));

    let report = queue.upload(&client, "42").await.unwrap();
    assert_eq!(report.registered().count(), 1);
    assert_eq!(report.failed().count(), 1);
    assert!(matches!(
        queue.state(&ghost),
        Some(UploadState::Failed {
            stage: UploadStage::Broker,
            raw_url: None,
            ..
        })
    ));
    assert!(backend.calls_to(&Method::PUT, "/storage/ghost.jpg").is_empty());
    let saves = backend.calls_to(&Method::POST, "/media/save");
    assert_eq!(saves.len(), 1);
    assert_eq!(saves[0].body["filename"], "real.jpg");

    // The file is brokered again on the next attempt.
    backend.skip_broker.lock().unwrap().clear();
    let retry = queue.upload(&client, "42").await.unwrap();
    assert!(retry.is_success());
    assert_eq!(backend.calls_to(&Method::PUT, "/storage/ghost.jpg").len(), 1);
    assert!(queue.is_empty());
}
