use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::Router;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) body: String,
}

#[derive(Default)]
struct MockState {
    routes: Mutex<HashMap<String, (u16, String)>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// axum app answering canned JSON per request target (path plus query).
/// Unknown targets get a 404. Routes may be added after the server started,
/// so bodies can embed the server's own URL.
pub(crate) struct MockServer {
    pub(crate) base_url: String,
    state: Arc<MockState>,
}

impl MockServer {
    pub(crate) async fn start() -> MockServer {
        let state = Arc::new(MockState::default());
        let app = Router::new().fallback(respond).with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        MockServer {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub(crate) fn route(&self, target: &str, status: u16, body: impl Into<String>) -> &Self {
        self.state
            .routes
            .lock()
            .expect("routes lock")
            .insert(target.to_string(), (status, body.into()));
        self
    }

    pub(crate) fn url(&self, target: &str) -> String {
        format!("{}{}", self.base_url, target)
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("requests lock").clone()
    }
}

async fn respond(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let target = uri
        .path_and_query()
        .map(|value| value.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let headers = headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                value.to_str().unwrap_or_default().to_string(),
            )
        })
        .collect();
    state
        .requests
        .lock()
        .expect("requests lock")
        .push(RecordedRequest {
            method: method.to_string(),
            path: target.clone(),
            headers,
            body,
        });

    let (status, payload) = state
        .routes
        .lock()
        .expect("routes lock")
        .get(&target)
        .cloned()
        .unwrap_or((404, r#"{"detail":"Not found."}"#.to_string()));
    (
        StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        [(header::CONTENT_TYPE, "application/json")],
        payload,
    )
}
