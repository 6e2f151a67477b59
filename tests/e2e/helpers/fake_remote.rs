use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use story_narrator::domain::audio::{encode_wav, AudioSamples};

pub const FAKE_SAMPLE_RATE: u32 = 24_000;

/// How the fake synthesis endpoint wraps its audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStyle {
    Direct,
    Gateway,
}

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// State behind the fake synthesis endpoint and the fake object storage
pub struct FakeRemote {
    pub synthesis_requests: Mutex<Vec<Value>>,
    pub failing_chunks: Mutex<HashSet<usize>>,
    pub envelope: Mutex<EnvelopeStyle>,
    pub unit_audio: Duration,
    objects: Mutex<HashMap<String, StoredObject>>,
    /// Typed uploads rejected before one is accepted
    pub rejected_typed_puts: AtomicUsize,
    pub reject_all_puts: AtomicBool,
    pub cdn_enabled: AtomicBool,
    pub cdn_downloads: AtomicUsize,
    pub storage_downloads: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            synthesis_requests: Mutex::new(Vec::new()),
            failing_chunks: Mutex::new(HashSet::new()),
            envelope: Mutex::new(EnvelopeStyle::Direct),
            unit_audio: Duration::from_millis(200),
            objects: Mutex::new(HashMap::new()),
            rejected_typed_puts: AtomicUsize::new(0),
            reject_all_puts: AtomicBool::new(false),
            cdn_enabled: AtomicBool::new(false),
            cdn_downloads: AtomicUsize::new(0),
            storage_downloads: AtomicUsize::new(0),
        }
    }

    pub fn fail_chunks(&self, chunks: &[usize]) {
        self.failing_chunks.lock().unwrap().extend(chunks.iter().copied());
    }

    pub fn set_envelope(&self, style: EnvelopeStyle) {
        *self.envelope.lock().unwrap() = style;
    }

    pub fn insert_object(&self, key: &str, bytes: Vec<u8>, content_type: &str) {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.synthesis_requests.lock().unwrap().clone()
    }
}

pub fn wav_fixture(duration: Duration) -> Vec<u8> {
    encode_wav(&AudioSamples::silence(duration, FAKE_SAMPLE_RATE)).unwrap()
}

pub fn router(remote: Arc<FakeRemote>) -> Router {
    Router::new()
        .route("/synthesize", post(synthesize))
        .route("/storage/*key", get(get_object).put(put_object))
        .route("/cdn/*key", get(get_cdn_object))
        .with_state(remote)
}

async fn synthesize(State(remote): State<Arc<FakeRemote>>, Json(body): Json<Value>) -> Response {
    remote.synthesis_requests.lock().unwrap().push(body.clone());

    let chunk_index = body["chunkIndex"].as_u64().unwrap_or_default() as usize;
    let story_index = body["storyIndex"].as_u64().unwrap_or_default();

    if remote.failing_chunks.lock().unwrap().contains(&chunk_index) {
        return Json(json!({ "error": format!("voice rejected chunk {}", chunk_index) }))
            .into_response();
    }

    let payload = json!({
        "audioData": BASE64.encode(wav_fixture(remote.unit_audio)),
        "chunkIndex": chunk_index,
        "storyIndex": story_index,
        "message": "ok",
    });

    let style = *remote.envelope.lock().unwrap();
    match style {
        EnvelopeStyle::Direct => Json(payload).into_response(),
        EnvelopeStyle::Gateway => Json(json!({
            "statusCode": 200,
            "body": payload.to_string(),
        }))
        .into_response(),
    }
}

async fn get_object(
    State(remote): State<Arc<FakeRemote>>,
    method: Method,
    Path(key): Path<String>,
) -> Response {
    if method == Method::GET {
        remote.storage_downloads.fetch_add(1, Ordering::SeqCst);
    }
    serve_object(&remote, &key)
}

async fn get_cdn_object(
    State(remote): State<Arc<FakeRemote>>,
    method: Method,
    Path(key): Path<String>,
) -> Response {
    if !remote.cdn_enabled.load(Ordering::SeqCst) {
        return StatusCode::NOT_FOUND.into_response();
    }
    if method == Method::GET {
        remote.cdn_downloads.fetch_add(1, Ordering::SeqCst);
    }
    serve_object(&remote, &key)
}

fn serve_object(remote: &FakeRemote, key: &str) -> Response {
    match remote.object(key.trim_start_matches('/')) {
        Some(object) => (
            [(header::CONTENT_TYPE, object.content_type)],
            object.bytes,
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn put_object(
    State(remote): State<Arc<FakeRemote>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if remote.reject_all_puts.load(Ordering::SeqCst) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let typed = content_type != "application/octet-stream";
    if typed
        && remote
            .rejected_typed_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    {
        return StatusCode::BAD_REQUEST;
    }

    remote.insert_object(key.trim_start_matches('/'), body.to_vec(), &content_type);
    StatusCode::OK
}
