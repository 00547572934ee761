//! Task shapes (spec §4.9): three task families instead of the original's
//! three abstract base classes with a virtual `perform` - each family is a
//! plain enum of its concrete kinds, and `perform` is a regular method
//! matching over it. Grounded on `server/basetasks.h`, `server/tasks.h`/
//! `.cc`, and `features/checkpoint_tasks.h`/`.cc`.

use crate::core::result_handle::ResultHandle;
use crate::external::Response;
use crate::query::search::SearchRequest;
use crate::schema::document::Document;
use crate::schema::Schema;
use serde_json::Value;

/// Served by the search pool. `collection` is `None` for the handful of
/// kinds that only read queue-state machinery (server status); every other
/// kind names the collection it needs opened read-only.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadonlyTaskKind {
    ServerStatus,
    ListCollections,
    CollectionInfo { collection: String },
    GetDocument { collection: String, doctype: String, id: String },
    CheckpointList { collection: String },
    CheckpointStatus { collection: String, checkid: String },
    Search { collection: String, doctype: String, request: Box<SearchRequest> },
}

impl ReadonlyTaskKind {
    /// Collection this kind needs opened, if any.
    pub fn collection(&self) -> Option<&str> {
        match self {
            ReadonlyTaskKind::ServerStatus | ReadonlyTaskKind::ListCollections => None,
            ReadonlyTaskKind::CollectionInfo { collection }
            | ReadonlyTaskKind::GetDocument { collection, .. }
            | ReadonlyTaskKind::CheckpointList { collection }
            | ReadonlyTaskKind::CheckpointStatus { collection, .. }
            | ReadonlyTaskKind::Search { collection, .. } => Some(collection),
        }
    }
}

/// A queued read-only request plus the handle its result lands in.
pub struct ReadonlyTask {
    pub kind: ReadonlyTaskKind,
    pub result: ResultHandle<Response>,
}

impl ReadonlyTask {
    pub fn new(kind: ReadonlyTaskKind) -> Self {
        ReadonlyTask { kind, result: ResultHandle::new() }
    }
}

/// Served by the processing pool, which holds a read-only collection lease
/// and a back-reference to the task manager so it can enqueue the indexing
/// work it produces.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingTaskKind {
    /// Forward `doc` through the collection's `pipe` configuration (spec
    /// §4.8 `send_to_pipe`).
    PipeDocument { pipe: String, doc: Value },
    /// Run `doc` through `doctype`'s schema and enqueue the resulting
    /// indexing task.
    ProcessDocument { doctype: String, doc: Value },
    /// The processing-side half of checkpoint propagation
    /// (`ProcessorCheckpointTask`): once popped, every earlier-queued
    /// processing task for this collection has run, so the matching
    /// indexing-side checkpoint task is pushed next.
    Checkpoint { checkid: String },
}

pub struct ProcessingTask {
    pub collection: String,
    pub kind: ProcessingTaskKind,
}

/// Served by the indexing pool, which holds a writable collection lease.
/// Clonable to permit re-queueing (spec §4.9).
#[derive(Debug, Clone, PartialEq)]
pub enum IndexingTaskKind {
    UpdateDocument { idterm: String, doc: Document },
    DeleteDocument { idterm: String },
    Commit,
    SetSchema { doctype: String, schema: Schema },
    /// The indexing-side half of checkpoint propagation
    /// (`IndexingCheckpointTask`): once popped, every earlier-queued
    /// indexing task for this collection has been applied, so the
    /// checkpoint is marked reached.
    CheckpointReached { checkid: String },
}

#[derive(Clone)]
pub struct IndexingTask {
    pub collection: String,
    pub kind: IndexingTaskKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readonly_kind_reports_its_collection() {
        assert_eq!(ReadonlyTaskKind::ServerStatus.collection(), None);
        assert_eq!(
            ReadonlyTaskKind::CollectionInfo { collection: "blog".into() }.collection(),
            Some("blog")
        );
    }

    #[test]
    fn readonly_task_result_starts_unready() {
        let task = ReadonlyTask::new(ReadonlyTaskKind::ServerStatus);
        assert!(!task.result.is_ready());
    }

    #[test]
    fn indexing_task_kind_is_clonable() {
        let kind = IndexingTaskKind::DeleteDocument { idterm: "\tblog\t1".into() };
        let cloned = kind.clone();
        assert_eq!(kind, cloned);
    }
}
