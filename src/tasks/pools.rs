//! The three worker pools that drain `TaskQueueGroup`s (spec §4.11),
//! grounded on `server/server.cc`'s three `WorkerThread` subclasses: each
//! pool is a thread entry point that pops from its own queue group until
//! the group closes and drains, then returns.

use crate::backend::MatchSpy;
use crate::core::error::Error;
use crate::external::Response;
use crate::query::facet::FacetCountMatchSpy;
use crate::query::search::SearchRequest;
use crate::schema::Schema;
use crate::tasks::manager::TaskManager;
use crate::tasks::queue::{PopFromOutcome, PopToken, QueueState};
use crate::tasks::task::{IndexingTask, IndexingTaskKind, ProcessingTask, ProcessingTaskKind, ReadonlyTask, ReadonlyTaskKind};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Drains the search queue group: one pop per iteration, fanned out across
/// as many threads as configured since every readonly task only reads.
pub fn run_search_thread(manager: Arc<TaskManager>) {
    let mut completed: Option<PopToken> = None;
    loop {
        match manager.search_queues.pop_any(completed.take()) {
            Some((task, token)) => {
                perform_readonly(&manager, task);
                completed = Some(token);
            }
            None => break,
        }
    }
}

fn perform_readonly(manager: &TaskManager, task: ReadonlyTask) {
    let response = match &task.kind {
        ReadonlyTaskKind::ServerStatus => Response::ok(manager.status()),
        ReadonlyTaskKind::ListCollections => Response::ok(serde_json::json!(manager.pool().list_names())),
        ReadonlyTaskKind::CollectionInfo { collection } => {
            let handle = manager.pool().get_readonly(collection);
            let coll = handle.lock();
            Response::ok(coll.info_json())
        }
        ReadonlyTaskKind::GetDocument { collection, doctype, id } => {
            let handle = manager.pool().get_readonly(collection);
            let coll = handle.lock();
            match coll.get_document(doctype, id) {
                Ok(Some(fields)) => Response::ok(serde_json::json!(fields)),
                Ok(None) => Response::error(404, format!("no document {doctype}/{id} in collection {collection:?}")),
                Err(err) => error_response(&err),
            }
        }
        ReadonlyTaskKind::CheckpointList { collection } => {
            let handle = manager.pool().get_readonly(collection);
            let coll = handle.lock();
            let all: Vec<_> = coll.checkpoints.get_all().into_iter().cloned().collect();
            Response::ok(serde_json::to_value(all).unwrap_or(Value::Null))
        }
        ReadonlyTaskKind::CheckpointStatus { collection, checkid } => {
            let handle = manager.pool().get_readonly(collection);
            let coll = handle.lock();
            match coll.checkpoints.get(checkid) {
                Some(state) => Response::ok(serde_json::to_value(state).unwrap_or(Value::Null)),
                None => Response::error(404, format!("unknown checkpoint {checkid:?}")),
            }
        }
        ReadonlyTaskKind::Search { collection, doctype, request } => perform_search(manager, collection, doctype, request),
    };
    task.result.with_response_mut(|slot| *slot = response);
    task.result.set_ready();
}

/// Build the match spies `request.info` describes (spec §4.7), run the
/// search, and fold the spies' results back into the response.
fn perform_search(manager: &TaskManager, collection: &str, doctype: &str, request: &SearchRequest) -> Response {
    let handle = manager.pool().get_readonly(collection);
    let coll = handle.lock();
    let Some(schema) = coll.schema(doctype) else {
        return Response::error(404, format!("unknown document type {doctype:?}"));
    };

    let mut facet_spies: Vec<FacetCountMatchSpy> = Vec::new();
    let mut names: Vec<String> = Vec::new();
    for info in &request.info {
        if info.get("type").and_then(Value::as_str) != Some("facetcount") {
            continue;
        }
        let field = info.get("field").and_then(Value::as_str).unwrap_or("").to_string();
        let doc_limit = info.get("doc_limit").and_then(Value::as_u64).unwrap_or(0);
        let result_limit = info.get("result_limit").and_then(Value::as_u64).unwrap_or(10) as usize;
        let slot = schema.slot_for_field(&field).unwrap_or(crate::slots::NO_SLOT);
        facet_spies.push(FacetCountMatchSpy::new(slot, doc_limit, result_limit));
        names.push(field);
    }

    let spies: Vec<(&str, &mut dyn MatchSpy)> =
        names.iter().map(String::as_str).zip(facet_spies.iter_mut().map(|spy| spy as &mut dyn MatchSpy)).collect();

    match coll.perform_search(doctype, request, spies) {
        Ok(result) => Response::ok(serde_json::to_value(result).unwrap_or(Value::Null)),
        Err(err) => error_response(&err),
    }
}

fn error_response(err: &Error) -> Response {
    Response::error(crate::external::status_for_error(err.kind), err.context.clone())
}

/// Drains the processing queue group: pop_any round-robins across
/// collections, so one collection's processing workload can fan out across
/// every thread in the pool (spec §4.9: processing tasks may finish out of
/// order across workers).
pub fn run_processing_thread(manager: Arc<TaskManager>) {
    let mut completed: Option<PopToken> = None;
    loop {
        match manager.processing_queues.pop_any(completed.take()) {
            Some((task, token)) => {
                perform_processing(&manager, task);
                completed = Some(token);
            }
            None => break,
        }
    }
}

fn perform_processing(manager: &TaskManager, task: ProcessingTask) {
    let collection = task.collection.clone();
    let result = match task.kind {
        ProcessingTaskKind::PipeDocument { pipe, doc } => {
            let handle = manager.pool().get_readonly(&collection);
            let coll = handle.lock();
            coll.send_to_pipe(manager, &pipe, &doc);
            Ok(())
        }
        ProcessingTaskKind::ProcessDocument { doctype, doc } => process_document(manager, &collection, &doctype, doc),
        ProcessingTaskKind::Checkpoint { checkid } => {
            let task = IndexingTask { collection: collection.clone(), kind: IndexingTaskKind::CheckpointReached { checkid } };
            manager.indexing_queues.push(&collection, task, true, None);
            Ok(())
        }
    };
    if let Err(err) = result {
        record_failure(manager, &collection, &err);
    }
}

fn process_document(manager: &TaskManager, collection: &str, doctype: &str, doc: Value) -> crate::core::error::Result<()> {
    let (document, idterm) = {
        let handle = manager.pool().get_readonly(collection);
        let mut coll = handle.lock();
        coll.process_doc(doctype, &doc)?
    };
    manager.queue_index_processed_doc(collection, document, idterm);
    Ok(())
}

fn record_failure(manager: &TaskManager, collection: &str, err: &Error) {
    manager.logger().error(format!("collection {collection:?}: {err}"));
    let handle = manager.pool().get_readonly(collection);
    let mut coll = handle.lock();
    coll.checkpoints.append_error_all(err.to_string());
}

/// Drains the indexing queue group. Unlike the other two pools, a thread
/// here pins itself to one collection at a time via `assign_handler` (spec
/// §4.9/§4.11: the indexing pool is the only place writable leases are
/// acquired, so writes to a given collection are always single-threaded)
/// and uses `pop_from`'s deadline to implement the idle-commit timer.
pub fn run_indexing_thread(manager: Arc<TaskManager>) {
    loop {
        let Some(collection) = manager.indexing_queues.assign_handler() else {
            break;
        };
        run_indexing_assignment(&manager, &collection);
        manager.indexing_queues.unassign_handler(&collection);
    }
}

/// Returns once the assignment should be released: either the idle-commit
/// timer fired (caller re-enters `assign_handler` and may land on a
/// different collection next time, so one quiet collection can't pin the
/// sole indexing thread forever) or the queue group has closed and drained.
fn run_indexing_assignment(manager: &TaskManager, collection: &str) {
    let Ok(handle) = manager.pool().get_writable(collection) else {
        return;
    };
    let mut completed: Option<PopToken> = None;
    loop {
        let deadline = Instant::now() + manager.idle_commit_timeout;
        match manager.indexing_queues.pop_from(collection, deadline, completed.take()) {
            PopFromOutcome::Task(task, token) => {
                let mut coll = handle.lock();
                if let Err(err) = perform_indexing(&mut coll, task) {
                    manager.logger().error(format!("collection {collection:?}: {err}"));
                    coll.checkpoints.append_error_all(err.to_string());
                }
                drop(coll);
                completed = Some(token);
            }
            PopFromOutcome::TimedOut | PopFromOutcome::Finished => break,
        }
    }

    {
        let mut coll = handle.lock();
        if let Err(err) = coll.commit() {
            manager.logger().error(format!("idle commit failed for collection {collection:?}: {err}"));
        }
    }
    manager.pool().release_writable(collection, false);
    // Room may have opened up on the indexing side; let a deactivated
    // processing queue for this collection resume without waiting for a
    // nudge-pipe round trip.
    if manager.indexing_queues.get_queues_with_space().iter().any(|key| key == collection) {
        manager.processing_queues.set_active(collection, true);
    }
}

fn perform_indexing(coll: &mut crate::collection::Collection, task: IndexingTask) -> crate::core::error::Result<()> {
    match task.kind {
        IndexingTaskKind::UpdateDocument { idterm, doc } => coll.raw_update_doc(&idterm, doc),
        IndexingTaskKind::DeleteDocument { idterm } => coll.raw_delete_doc(&idterm).map(|_| ()),
        IndexingTaskKind::Commit => coll.commit(),
        IndexingTaskKind::SetSchema { doctype, schema } => coll.set_schema(doctype, schema),
        IndexingTaskKind::CheckpointReached { checkid } => coll.checkpoints.mark_reached(&checkid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::schema::field::{ExactFieldConfig, FieldConfig, IdFieldConfig, MaxLen};
    use serde_json::json;

    fn blog_schema() -> Schema {
        let mut schema = Schema::new();
        schema.set_field("id", FieldConfig::Id(IdFieldConfig { store_field: None, max_len: MaxLen::default() }));
        schema.set_field(
            "tag",
            FieldConfig::Exact(ExactFieldConfig { prefix: "XTAG".into(), store_field: None, wdfinc: 0, max_len: MaxLen::default() }),
        );
        schema
    }

    #[test]
    fn processing_then_indexing_persists_a_document() {
        let mut config = Config::default();
        config.search_threads = 1;
        config.processing_threads = 1;
        config.indexing_threads = 1;
        let manager = TaskManager::new(config);
        manager.start();

        manager.queue_set_schema("blog", "post".into(), blog_schema(), false);
        // SetSchema is an indexing task and ProcessDocument a processing
        // task on an independent queue group; give the former a moment to
        // land before the latter relies on it.
        std::thread::sleep(std::time::Duration::from_millis(50));
        manager.queue_process_document("blog", "post", json!({"id": "1", "tag": "rust"}), false);
        manager.queue_commit("blog", false);

        let (handle, _) = manager.queue_get_document("blog", "post", "1");
        for _ in 0..200 {
            if handle.is_ready() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        handle.with_response(|r| assert_eq!(r.status, 200));

        manager.stop();
        manager.join();
    }

    #[test]
    fn checkpoint_is_reached_once_its_tasks_drain() {
        let mut config = Config::default();
        config.search_threads = 1;
        config.processing_threads = 1;
        config.indexing_threads = 1;
        let manager = TaskManager::new(config);
        manager.start();

        manager.queue_set_schema("blog", "post".into(), blog_schema(), false);
        std::thread::sleep(std::time::Duration::from_millis(50));
        manager.queue_process_document("blog", "post", json!({"id": "1", "tag": "rust"}), false);
        let (checkid, _) = manager.queue_checkpoint("blog", false);

        let (handle, _) = manager.queue_checkpoint_status("blog", &checkid);
        for _ in 0..200 {
            if handle.is_ready() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        handle.with_response(|r| assert_eq!(r.status, 200));

        manager.stop();
        manager.join();
    }
}
