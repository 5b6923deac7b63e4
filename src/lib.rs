//! Minimal URL-encoded form poster over reqwest with an in-memory mock
//! transport for fully deterministic tests.

pub mod adapter;
pub mod form;
pub mod mock;

pub use adapter::{
    FORM_CONTENT_TYPE, FormBytes, FormFuture, FormPoster, FormRequest, FormResponse,
    FormTransport, PostError, PostResult, ReqwestTransport, TransportError, TransportErrorKind,
    TransportResult,
};
pub use form::FormData;
pub use mock::{
    MockBehavior, MockBehaviorPlan, MockFormTransport, MockResponse, MockStateSnapshot,
    MockTransportState,
};
