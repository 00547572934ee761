//! Thin contracts to the collaborators spec §1 calls "external": the HTTP
//! transport (§6.1) and the MongoDB-style importer (§6.2). Neither is
//! implemented here - this module only describes the boundary the
//! concurrency/indexing core expects its callers to honour, grounded
//! directly on spec.md §6 since the teacher has no transport layer of its
//! own to generalize from.

use crate::core::error::ErrorKind;
use crate::tasks::queue::QueueState;
use serde_json::Value;

/// The JSON response a `ReadonlyTask` eventually writes into its
/// `ResultHandle`, paired with the HTTP-style status code the transport
/// should send. This is the `T` instantiation of `core::ResultHandle<T>`
/// for every task in this crate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn ok(body: Value) -> Self {
        Response { status: 200, body }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Response { status, body: serde_json::json!({ "err": message.into() }) }
    }
}

/// Map an `ErrorKind` (spec §7) to the HTTP-style status code a transport
/// would send for it.
pub fn status_for_error(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::InvalidValue => 400,
        ErrorKind::NotFound => 404,
        ErrorKind::OutOfMemory => 503,
        ErrorKind::Unserialization | ErrorKind::IndexBackend | ErrorKind::System | ErrorKind::Internal => 500,
        ErrorKind::QueueFull => 503,
        ErrorKind::QueueClosed => 500,
    }
}

/// Map a `QueueState` returned by a no-wait enqueue attempt to the
/// HTTP-style response the transport sends without waiting for the task
/// itself to run (spec §6.1 "Back-pressure HTTP mapping").
pub fn response_for_queue_state(state: QueueState) -> Option<Response> {
    match state {
        QueueState::HasSpace => None,
        QueueState::LowSpace => Some(Response::ok(serde_json::json!({"ok": 1, "busy": 1}))),
        QueueState::Full => Some(Response::error(503, "queue is full")),
        QueueState::Closed => Some(Response::error(500, "server is shutting down")),
    }
}

/// A background document producer (the MongoDB importer, per spec §6.2).
/// Implementors call `queue_pipe_document` with `allow_throttle = true`
/// and a short deadline, retrying while their own stop flag is clear and
/// the queue returns anything other than `Closed`.
pub trait ImporterSink {
    /// Submit one document to `pipe` within `collection`. Returns `false`
    /// once the underlying queue group is closed, at which point the
    /// importer should stop.
    fn submit(&self, collection: &str, pipe: &str, document: Value) -> bool;

    /// Number of documents to accumulate before issuing an explicit commit
    /// (SPEC_FULL.md §D.3: exposed as `Config::importer_commit_batch`
    /// rather than the original's hard-coded 100,000).
    fn commit_batch_size(&self) -> usize;
}

/// One inbound transport request: the three pieces of information a
/// method+path+body HTTP route hands to the task manager (spec §6.1). The
/// transport itself (routing, header parsing, the Windows-service
/// wrapper) lives outside this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub path: Vec<String>,
    pub body: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
    Post,
    Delete,
}
