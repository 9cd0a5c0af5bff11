#![allow(dead_code)]

use std::{
    collections::HashMap,
    io::{Cursor, Write},
    net::SocketAddr,
    sync::{mpsc, Arc, Mutex},
    thread,
};

use bytes::Bytes;
use once_cell::sync::Lazy;
use roboflow::Config;
use serde_json::Value;
use warp::{http::StatusCode, path::FullPath, Filter};
use zip::{write::FileOptions, CompressionMethod, ZipWriter};

pub const API_KEY: &str = "test-key";

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: body.to_string().into_bytes(),
        }
    }

    pub fn bytes(status: u16, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: "application/zip",
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Canned responses by path plus every request seen.
#[derive(Default)]
struct StubState {
    routes: HashMap<String, StubResponse>,
    requests: Vec<RecordedRequest>,
}

pub struct StubServer {
    base_url: String,
    state: Arc<Mutex<StubState>>,
}

fn stub_routes(
    state: Arc<Mutex<StubState>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(warp::query::raw().or(warp::any().map(String::new)).unify())
        .and(warp::body::bytes())
        .and(warp::any().map(move || state.clone()))
        .map(
            |method: warp::http::Method,
             path: FullPath,
             query: String,
             body: Bytes,
             state: Arc<Mutex<StubState>>| {
                let target = if query.is_empty() {
                    path.as_str().to_string()
                } else {
                    format!("{}?{query}", path.as_str())
                };
                let mut state = state.lock().unwrap();
                state.requests.push(RecordedRequest {
                    method: method.to_string(),
                    target,
                    body: body.to_vec(),
                });
                let response = state.routes.get(path.as_str()).cloned().unwrap_or_else(|| {
                    StubResponse::json(404, serde_json::json!({"error": "no stub"}))
                });
                warp::reply::with_status(
                    warp::reply::with_header(response.body, "content-type", response.content_type),
                    StatusCode::from_u16(response.status).unwrap(),
                )
            },
        )
}

/// Serves on its own runtime thread so blocking clients can call it from test threads.
fn start_stub() -> (SocketAddr, Arc<Mutex<StubState>>) {
    let state = Arc::new(Mutex::new(StubState::default()));
    let routes = stub_routes(state.clone());
    let (ready, bound) = mpsc::channel();

    thread::spawn(move || {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            ready.send(listener.local_addr().unwrap()).unwrap();
            let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
            warp::serve(routes).run_incoming(incoming).await;
        });
    });

    (bound.recv().unwrap(), state)
}

static SERVER: Lazy<StubServer> = Lazy::new(|| {
    let (addr, state) = start_stub();
    let base_url = format!("http://{addr}");
    roboflow::config::init_with(Config {
        api_url: base_url.clone(),
        ..Config::default()
    });
    StubServer { base_url, state }
});

/// Starts the stub once per test binary and installs it as the API base.
pub fn server() -> &'static StubServer {
    &SERVER
}

impl StubServer {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn route(&self, path: &str, response: StubResponse) {
        self.state
            .lock()
            .unwrap()
            .routes
            .insert(path.to_string(), response);
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .unwrap()
            .requests
            .iter()
            .filter(|request| request.target.split('?').next() == Some(path))
            .cloned()
            .collect()
    }
}

/// Stored (uncompressed) zip so tests can locate and damage entry bytes.
pub fn zip_archive(entries: &[(&str, &str)]) -> Vec<u8> {
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(contents.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn corrupt(archive: &mut [u8], needle: &[u8]) {
    let offset = archive
        .windows(needle.len())
        .position(|window| window == needle)
        .expect("needle present in archive");
    archive[offset] ^= 0xff;
}
