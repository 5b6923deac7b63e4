use axum::Form;
use axum::Router;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use shared_formpost::{FormData, FormPoster, PostError};
use tokio::net::TcpListener;

#[derive(Debug, serde::Deserialize)]
struct ChatMessage {
    message: String,
}

#[tokio::test]
async fn e2e_form_fields_round_trip() {
    let server = TestServer::start().await;
    let poster = FormPoster::new();

    let data = FormData::new()
        .field("message", "hello there")
        .field("room", "lobby & friends");
    let response = poster
        .post_form(server.url("/echo"), &data)
        .await
        .expect("form post should succeed");

    assert_eq!(response.status(), 200);
    assert_eq!(response.text(), "message=hello there;room=lobby & friends");
}

#[tokio::test]
async fn e2e_bearer_token_is_enforced() {
    let server = TestServer::start().await;
    let poster = FormPoster::new();
    let data = FormData::new().field("message", "hello");

    let response = poster
        .post_form_with_token(server.url("/guarded"), &data, "letmein")
        .await
        .expect("valid token should be accepted");
    assert_eq!(response.text(), "welcome: hello");

    let err = poster
        .post_form(server.url("/guarded"), &data)
        .await
        .expect_err("missing token should be rejected");
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "missing or invalid bearer token");
}

#[tokio::test]
async fn e2e_refused_connection_reports_disconnected() {
    // Bind a port, then drop the listener so the port is unoccupied.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind throwaway listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let poster = FormPoster::new();
    let err = poster
        .post_form(format!("http://{addr}/echo"), &FormData::new())
        .await
        .expect_err("refused connection should reject");

    assert_eq!(err, PostError::Disconnected);
    assert_eq!(err.to_string(), "disconnected from the server");
}

struct TestServer {
    base_url: String,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let app = Router::new()
            .route("/echo", post(echo_handler))
            .route("/guarded", post(guarded_handler));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{}", addr);

        let task = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { base_url, task }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn echo_handler(Form(fields): Form<Vec<(String, String)>>) -> (StatusCode, String) {
    let body = fields
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(";");
    (StatusCode::OK, body)
}

async fn guarded_handler(
    headers: HeaderMap,
    Form(form): Form<ChatMessage>,
) -> (StatusCode, String) {
    match headers.get("authorization").and_then(|v| v.to_str().ok()) {
        Some("Bearer letmein") => (StatusCode::OK, format!("welcome: {}", form.message)),
        _ => (
            StatusCode::UNAUTHORIZED,
            "missing or invalid bearer token".to_string(),
        ),
    }
}
