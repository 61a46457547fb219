//! Request logging hooks
//!
//! Provides the entry points the HTTP layer calls into:
//! - `RequestInstrumentation` for request start, response send and finish
//! - `ErrorReporter` for failures nobody else handled
//! - Rendering of headers, bodies and query strings into metadata

mod error_reporter;
mod instrumentation;
pub mod render;
mod request_context;

pub use error_reporter::{ErrorReporter, FailureResponse, FAILURE_BODY};
pub use instrumentation::RequestInstrumentation;
pub use render::CapturedBody;
pub use request_context::{generate_request_id, RequestContext, RequestSpan};
