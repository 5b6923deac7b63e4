use std::{
    borrow::Cow,
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Client as ReqwestClient;
use reqwest::header::HeaderValue;
use thiserror::Error;

use crate::form::FormData;

pub type FormBytes = Bytes;
pub type FormFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type PostResult<T> = Result<T, PostError>;
pub type TransportResult<T> = Result<T, TransportError>;

/// Content type sent with every form post.
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded;charset=UTF-8";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    Internal,
}

/// Transport-level failure: anything that happens before a well-formed HTTP
/// response is received. The poster collapses it to
/// [`PostError::Disconnected`]; the detail only reaches the diagnostic log.
#[derive(Clone, Debug, Error)]
#[error("transport error {kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    fn from_reqwest(fallback: TransportErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else {
            fallback
        };
        Self {
            kind,
            message: err.to_string(),
        }
    }
}

/// Caller-facing outcome taxonomy for a form post.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PostError {
    /// Transport failed before a response arrived. The original cause is
    /// logged, not propagated, so UI layers never see internal error text.
    #[error("disconnected from the server")]
    Disconnected,
    /// The server answered with a non-2xx status. Displays the full response
    /// body text verbatim.
    #[error("{message}")]
    Rejected { status: u16, message: String },
}

impl PostError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Disconnected => None,
            Self::Rejected { status, .. } => Some(*status),
        }
    }

    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// A fully assembled form post. The method is always POST, so none is
/// carried.
#[derive(Clone, Debug)]
pub struct FormRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: FormBytes,
    pub timeout: Option<Duration>,
}

impl FormRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: FormBytes::new(),
            timeout: None,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<FormBytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Case-insensitive header lookup; first match wins.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct FormResponse {
    pub status: u16,
    pub headers: Vec<(String, FormBytes)>,
    pub body: FormBytes,
    pub elapsed: Duration,
}

impl FormResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

pub trait FormTransport: Send + Sync {
    fn execute(&self, request: FormRequest) -> FormFuture<TransportResult<FormResponse>>;
}

pub type SharedFormTransport = dyn FormTransport + Send + Sync;

/// Client entry point. Stateless per call; `Clone` shares the transport.
#[derive(Clone)]
pub struct FormPoster {
    transport: Arc<SharedFormTransport>,
}

impl FormPoster {
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    pub fn with_transport<T>(transport: T) -> Self
    where
        T: FormTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
        }
    }

    /// Posts `data` URL-encoded to `target` without credentials.
    pub async fn post_form(
        &self,
        target: impl Into<String>,
        data: &FormData,
    ) -> PostResult<FormResponse> {
        self.submit(Self::request(target, data)).await
    }

    /// Posts `data` URL-encoded to `target` with
    /// `Authorization: Bearer <token>`. The token is injected verbatim.
    pub async fn post_form_with_token(
        &self,
        target: impl Into<String>,
        data: &FormData,
        token: &str,
    ) -> PostResult<FormResponse> {
        let request =
            Self::request(target, data).with_header("authorization", format!("Bearer {token}"));
        self.submit(request).await
    }

    fn request(target: impl Into<String>, data: &FormData) -> FormRequest {
        FormRequest::new(target)
            .with_header("content-type", FORM_CONTENT_TYPE)
            .with_body(data.encode())
    }

    async fn submit(&self, request: FormRequest) -> PostResult<FormResponse> {
        let response = match self.transport.execute(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "network error");
                return Err(PostError::Disconnected);
            }
        };

        if !response.is_success() {
            return Err(PostError::Rejected {
                status: response.status,
                message: response.text().into_owned(),
            });
        }

        Ok(response)
    }
}

impl Default for FormPoster {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FormTransport for ReqwestTransport {
    fn execute(&self, request: FormRequest) -> FormFuture<TransportResult<FormResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            let mut req = client.post(&request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_str(&value).map_err(|err| {
                    TransportError::new(TransportErrorKind::Internal, err.to_string())
                })?;
                req = req.header(key, value);
            }

            req = req.body(request.body);

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req
                .send()
                .await
                .map_err(|err| TransportError::from_reqwest(TransportErrorKind::Send, err))?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| TransportError::from_reqwest(TransportErrorKind::Receive, err))?;
            let elapsed = start.elapsed();

            Ok(FormResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
