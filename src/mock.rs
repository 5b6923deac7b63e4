use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use bytes::Bytes;

use super::adapter::{
    FormBytes, FormFuture, FormRequest, FormResponse, FormTransport, TransportError,
    TransportErrorKind, TransportResult,
};

/// Bookkeeping state the mock exposes through snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTransportState {
    Idle,
    Busy,
    Error,
}

#[derive(Clone, Debug)]
pub enum MockBehavior {
    Pass,
    Delay(Duration),
    ConnectError { reason: String },
    SendError { reason: String },
    ReceiveError { reason: String },
    TimeoutError { reason: String },
    InternalError { reason: String },
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn delay(ms: u64) -> Self {
        Self::Delay(Duration::from_millis(ms))
    }

    pub fn connect_error(reason: impl Into<String>) -> Self {
        Self::ConnectError {
            reason: reason.into(),
        }
    }

    pub fn send_error(reason: impl Into<String>) -> Self {
        Self::SendError {
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>) -> Self {
        Self::ReceiveError {
            reason: reason.into(),
        }
    }

    pub fn timeout_error(reason: impl Into<String>) -> Self {
        Self::TimeoutError {
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self::Pass
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    queue: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.queue.push_back(behavior);
        self
    }

    pub fn pop(&mut self) -> MockBehavior {
        self.queue.pop_front().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, FormBytes)>,
    pub body: FormBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<FormBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<FormBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }
}

#[derive(Clone, Debug)]
pub struct MockStateSnapshot {
    pub state: MockTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub elapsed_total: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct MockFormTransportState {
    state: MockTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<String, VecDeque<MockResponse>>,
    outbound_log: Vec<FormRequest>,
    inbound_log: Vec<FormResponse>,
    last_error: Option<String>,
    elapsed_total: Duration,
}

impl MockFormTransportState {
    fn snapshot(&self) -> MockStateSnapshot {
        MockStateSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.len(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            inbound_count: self.inbound_log.len(),
            outbound_count: self.outbound_log.len(),
            elapsed_total: self.elapsed_total,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for MockFormTransportState {
    fn default() -> Self {
        Self {
            state: MockTransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            route_response_queues: HashMap::new(),
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            last_error: None,
            elapsed_total: Duration::from_millis(0),
        }
    }
}

/// In-memory transport for fully deterministic tests. Responses are served
/// from per-URL queues, then from the default queue, and fall back to an
/// empty 200 when both are exhausted.
#[derive(Clone, Debug)]
pub struct MockFormTransport {
    state: Arc<Mutex<MockFormTransportState>>,
}

impl MockFormTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockFormTransportState::default())),
        }
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let transport = Self::new();
        transport
            .state
            .lock()
            .expect("mock-formpost mutex poisoned while installing behavior plan")
            .behavior_plan = behavior_plan;
        transport
    }

    pub fn with_behavior(behavior: MockBehavior) -> Self {
        let mut behavior_plan = MockBehaviorPlan::default();
        behavior_plan.push(behavior);
        Self::with_behavior_plan(behavior_plan)
    }

    pub fn snapshot(&self) -> MockStateSnapshot {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while taking snapshot")
            .snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while queueing response")
            .default_response_queue
            .push_back(response);
    }

    pub fn queue_response_for(&self, url: impl Into<String>, response: MockResponse) {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while queueing response by route")
            .route_response_queues
            .entry(url.into())
            .or_default()
            .push_back(response);
    }

    pub fn queue_error_text(
        &self,
        url: impl Into<String>,
        status: u16,
        message: impl Into<String>,
    ) {
        self.queue_response_for(url, MockResponse::text(status, message));
    }

    /// Clones of every request the mock has executed, in order.
    pub fn outbound_requests(&self) -> Vec<FormRequest> {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while reading outbound log")
            .outbound_log
            .clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while reading outbound count")
            .outbound_log
            .len()
    }

    pub fn inbound_count(&self) -> usize {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while reading inbound count")
            .inbound_log
            .len()
    }

    pub fn clear_logs(&self) {
        let mut state = self
            .state
            .lock()
            .expect("mock-formpost mutex poisoned while clearing logs");
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    fn pop_behavior(&self) -> MockBehavior {
        self.state
            .lock()
            .expect("mock-formpost mutex poisoned while reading behavior plan")
            .behavior_plan
            .pop()
    }

    fn apply_delay(behavior: &MockBehavior) {
        if let MockBehavior::Delay(duration) = behavior {
            std::thread::sleep(*duration);
        }
    }

    fn next_response(&self, request: &FormRequest) -> Option<MockResponse> {
        let mut state = self
            .state
            .lock()
            .expect("mock-formpost mutex poisoned while selecting response");
        if let Some(queue) = state.route_response_queues.get_mut(&request.url) {
            if let Some(response) = queue.pop_front() {
                return Some(response);
            }
        }
        state.default_response_queue.pop_front()
    }

    fn error(&self, kind: TransportErrorKind, reason: String) -> TransportError {
        let mut state = self
            .state
            .lock()
            .expect("mock-formpost mutex poisoned while recording error");
        state.state = MockTransportState::Error;
        state.last_error = Some(reason.clone());
        TransportError::new(kind, reason)
    }
}

impl Default for MockFormTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl FormTransport for MockFormTransport {
    fn execute(&self, request: FormRequest) -> FormFuture<TransportResult<FormResponse>> {
        let transport = self.clone();
        Box::pin(async move {
            let start = Instant::now();
            let behavior = transport.pop_behavior();
            Self::apply_delay(&behavior);
            {
                let mut state = transport
                    .state
                    .lock()
                    .expect("mock-formpost mutex poisoned while updating state before execute");
                state.outbound_log.push(request.clone());
                state.request_count += 1;
                state.last_url = Some(request.url.clone());
                state.state = MockTransportState::Busy;
                state.last_error = None;
            }

            match behavior {
                MockBehavior::ConnectError { reason } => {
                    return Err(transport.error(TransportErrorKind::Connect, reason));
                }
                MockBehavior::SendError { reason } => {
                    return Err(transport.error(TransportErrorKind::Send, reason));
                }
                MockBehavior::ReceiveError { reason } => {
                    return Err(transport.error(TransportErrorKind::Receive, reason));
                }
                MockBehavior::TimeoutError { reason } => {
                    return Err(transport.error(TransportErrorKind::Timeout, reason));
                }
                MockBehavior::InternalError { reason } => {
                    return Err(transport.error(TransportErrorKind::Internal, reason));
                }
                MockBehavior::Pass | MockBehavior::Delay(_) => {}
            }

            let elapsed = start.elapsed();
            let response = match transport.next_response(&request) {
                Some(response) => FormResponse {
                    status: response.status,
                    headers: response.headers,
                    body: response.body,
                    elapsed,
                },
                None => FormResponse {
                    status: 200,
                    headers: Vec::new(),
                    body: Bytes::new(),
                    elapsed,
                },
            };

            {
                let mut state = transport
                    .state
                    .lock()
                    .expect("mock-formpost mutex poisoned while recording inbound response");
                state.inbound_log.push(response.clone());
                state.last_status = Some(response.status);
                state.state = MockTransportState::Idle;
                state.elapsed_total += elapsed;
            }

            Ok(response)
        })
    }
}
