//! `TaskManager` (spec §4.12): the façade external producers push work
//! through, plus the start/stop/join lifecycle. Grounded on
//! `server/task_manager.h`/`.cc` - the fixed pseudo-keys `"status"`,
//! `"info"`, `"search"` for the three collection-agnostic-by-convention
//! readonly operations are lifted directly from `queue_get_status`/
//! `queue_get_collinfo`/`queue_search` in `task_manager.cc`.

use crate::collection::CollectionPool;
use crate::core::config::Config;
use crate::core::error::Result;
use crate::core::logger::Logger;
use crate::core::result_handle::ResultHandle;
use crate::external::Response;
use crate::query::search::SearchRequest;
use crate::schema::document::Document;
use crate::schema::Schema;
use crate::tasks::pools;
use crate::tasks::queue::{QueueState, TaskQueueGroup};
use crate::tasks::task::{IndexingTask, IndexingTaskKind, ProcessingTask, ProcessingTaskKind, ReadonlyTask, ReadonlyTaskKind};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Server-wide task pipeline: three queue groups, a collection pool, and
/// the worker pools draining them. Always lives behind an `Arc` because
/// worker threads hold a handle back to it (to enqueue downstream work and
/// to reach the collection pool).
pub struct TaskManager {
    pub(crate) config: Config,
    pub(crate) pool: CollectionPool,
    pub(crate) search_queues: TaskQueueGroup<ReadonlyTask>,
    pub(crate) processing_queues: TaskQueueGroup<ProcessingTask>,
    pub(crate) indexing_queues: TaskQueueGroup<IndexingTask>,
    pub(crate) idle_commit_timeout: Duration,
    pub(crate) logger: Logger,
    stopping: AtomicBool,
    nudge_write_fd: i32,
    nudge_read_fd: i32,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskManager {
    pub fn new(config: Config) -> Arc<Self> {
        let throttle = config.queue_throttle_size;
        let max = config.queue_max_size;
        let mut fds = [0i32; 2];
        let (nudge_read_fd, nudge_write_fd) = unsafe {
            if libc::pipe(fds.as_mut_ptr()) == 0 {
                (fds[0], fds[1])
            } else {
                (-1, -1)
            }
        };

        let search_queues = TaskQueueGroup::new(throttle, max);
        let processing_queues = TaskQueueGroup::new(throttle, max);
        let indexing_queues = TaskQueueGroup::new(throttle, max);
        search_queues.set_nudge(nudge_write_fd, b'S');
        processing_queues.set_nudge(nudge_write_fd, b'P');
        indexing_queues.set_nudge(nudge_write_fd, b'I');

        let logger = Logger::new(config.log_queue_size);

        Arc::new(TaskManager {
            pool: CollectionPool::with_capacity(config.max_open_collections),
            search_queues,
            processing_queues,
            indexing_queues,
            idle_commit_timeout: Duration::from_secs(5),
            logger,
            stopping: AtomicBool::new(false),
            nudge_write_fd,
            nudge_read_fd,
            handles: Mutex::new(Vec::new()),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &CollectionPool {
        &self.pool
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// The read end of the nudge pipe. The transport's event loop selects
    /// on this and calls `serve_nudge` when it becomes readable (spec §5
    /// back-pressure paragraph; mirrors `TaskManager::get_fdsets`/`serve`
    /// in the original).
    pub fn nudge_read_fd(&self) -> i32 {
        self.nudge_read_fd
    }

    /// Drain the nudge pipe and reactivate any processing queue whose
    /// indexing counterpart has space again.
    pub fn serve_nudge(&self) {
        let mut buf = [0u8; 256];
        loop {
            let n = unsafe { libc::read(self.nudge_read_fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if n <= 0 {
                break;
            }
            if n < buf.len() as isize {
                break;
            }
        }
        for key in self.indexing_queues.get_queues_with_space() {
            self.processing_queues.set_active(&key, true);
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::Acquire)
    }

    /// Spawn the three fixed worker pools.
    pub fn start(self: &Arc<Self>) {
        let mut handles = self.handles.lock().unwrap();
        for _ in 0..self.config.search_threads.max(1) {
            let manager = Arc::clone(self);
            handles.push(std::thread::spawn(move || pools::run_search_thread(manager)));
        }
        for _ in 0..self.config.processing_threads.max(1) {
            let manager = Arc::clone(self);
            handles.push(std::thread::spawn(move || pools::run_processing_thread(manager)));
        }
        for _ in 0..self.config.indexing_threads.max(1) {
            let manager = Arc::clone(self);
            handles.push(std::thread::spawn(move || pools::run_indexing_thread(manager)));
        }
        self.logger.info(format!(
            "task manager started: {} search, {} processing, {} indexing thread(s)",
            self.config.search_threads.max(1),
            self.config.processing_threads.max(1),
            self.config.indexing_threads.max(1)
        ));
    }

    /// Stop accepting new work: reject pushes, and let pops drain.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.processing_queues.close();
        self.search_queues.close();
        self.logger.info("task manager stopping");
    }

    /// Block until every pool has drained and exited, in the documented
    /// order (spec §4.12 "Start/stop protocol"). Each pool's threads run
    /// only their own queue group's pop loop, so they exit on their own
    /// once that group is closed and empty; "stop the pool" therefore
    /// needs no separate signal here beyond the final join.
    pub fn join(&self) {
        self.processing_queues.wait_for_empty();
        self.indexing_queues.close();
        self.search_queues.wait_for_empty();
        self.indexing_queues.wait_for_empty();
        let mut handles = self.handles.lock().unwrap();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        self.logger.info("task manager stopped");
    }

    /// Queue-group status snapshot (spec §4.12 supplement: server-status
    /// task payload).
    pub fn status(&self) -> Value {
        serde_json::json!({
            "search": serde_json::to_value(self.search_queues.get_status()).unwrap_or(Value::Null),
            "processing": serde_json::to_value(self.processing_queues.get_status()).unwrap_or(Value::Null),
            "indexing": serde_json::to_value(self.indexing_queues.get_status()).unwrap_or(Value::Null),
        })
    }

    fn queue_readonly(&self, key: &str, kind: ReadonlyTaskKind) -> (ResultHandle<Response>, QueueState) {
        let task = ReadonlyTask::new(kind);
        let handle = task.result.clone();
        let state = self.search_queues.push(key, task, false, None);
        if let Some(response) = crate::external::response_for_queue_state(state) {
            handle.fail_with(response);
        }
        (handle, state)
    }

    pub fn queue_get_status(&self) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly("status", ReadonlyTaskKind::ServerStatus)
    }

    pub fn queue_list_collections(&self) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly("collections", ReadonlyTaskKind::ListCollections)
    }

    pub fn queue_get_collinfo(&self, collection: &str) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly("info", ReadonlyTaskKind::CollectionInfo { collection: collection.to_string() })
    }

    pub fn queue_get_document(&self, collection: &str, doctype: &str, id: &str) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly(
            "doc",
            ReadonlyTaskKind::GetDocument { collection: collection.to_string(), doctype: doctype.to_string(), id: id.to_string() },
        )
    }

    pub fn queue_checkpoint_list(&self, collection: &str) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly("checkpoint", ReadonlyTaskKind::CheckpointList { collection: collection.to_string() })
    }

    pub fn queue_checkpoint_status(&self, collection: &str, checkid: &str) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly(
            "checkpoint",
            ReadonlyTaskKind::CheckpointStatus { collection: collection.to_string(), checkid: checkid.to_string() },
        )
    }

    pub fn queue_search(&self, collection: &str, doctype: &str, request: SearchRequest) -> (ResultHandle<Response>, QueueState) {
        self.queue_readonly(
            "search",
            ReadonlyTaskKind::Search { collection: collection.to_string(), doctype: doctype.to_string(), request: Box::new(request) },
        )
    }

    /// Allocate and publish a checkpoint, then push the sentinel task that
    /// fences all processing/indexing work already queued for `collection`
    /// (spec §4.13, §5 ordering guarantee 3).
    pub fn queue_checkpoint(&self, collection: &str, allow_throttle: bool) -> (String, QueueState) {
        let handle = self.pool.get_readonly(collection);
        let checkid = {
            let mut guard = handle.lock();
            let checkid = guard.checkpoints.alloc_checkpoint();
            guard.checkpoints.publish_checkpoint(checkid.clone());
            checkid
        };
        let task = ProcessingTask { collection: collection.to_string(), kind: ProcessingTaskKind::Checkpoint { checkid: checkid.clone() } };
        let state = self.processing_queues.push(collection, task, allow_throttle, None);
        (checkid, state)
    }

    pub fn queue_pipe_document(&self, collection: &str, pipe: &str, doc: Value, allow_throttle: bool, deadline: Option<Instant>) -> QueueState {
        let task = ProcessingTask { collection: collection.to_string(), kind: ProcessingTaskKind::PipeDocument { pipe: pipe.to_string(), doc } };
        self.processing_queues.push(collection, task, allow_throttle, deadline)
    }

    pub fn queue_process_document(&self, collection: &str, doctype: &str, doc: Value, allow_throttle: bool) -> QueueState {
        let task = ProcessingTask { collection: collection.to_string(), kind: ProcessingTaskKind::ProcessDocument { doctype: doctype.to_string(), doc } };
        self.processing_queues.push(collection, task, allow_throttle, None)
    }

    pub fn queue_index_document(&self, collection: &str, doc: Document, idterm: String, allow_throttle: bool) -> QueueState {
        let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::UpdateDocument { idterm, doc } };
        self.indexing_queues.push(collection, task, allow_throttle, None)
    }

    pub fn queue_delete_document(&self, collection: &str, idterm: String, allow_throttle: bool) -> QueueState {
        let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::DeleteDocument { idterm } };
        self.indexing_queues.push(collection, task, allow_throttle, None)
    }

    pub fn queue_commit(&self, collection: &str, allow_throttle: bool) -> QueueState {
        let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::Commit };
        self.indexing_queues.push(collection, task, allow_throttle, None)
    }

    pub fn queue_set_schema(&self, collection: &str, doctype: String, schema: Schema, allow_throttle: bool) -> QueueState {
        let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::SetSchema { doctype, schema } };
        self.indexing_queues.push(collection, task, allow_throttle, None)
    }

    /// The back-pressure edge (spec §4.12): called from a processing
    /// worker once it has produced an indexing task for a document. Tries
    /// to push without throttling against the *max* watermark; on
    /// `LowSpace` it deactivates the collection's processing queue so no
    /// more documents are pulled off it until the indexing side catches up.
    /// On `Full` it deactivates the processing queue too, then blocks
    /// (bounded retries against the indexing group's own push-deadline
    /// wait, standing in for the original's shared-condvar wait across
    /// both queue groups - our groups each own a private condvar) until
    /// there is room.
    pub fn queue_index_processed_doc(&self, collection: &str, doc: Document, idterm: String) {
        loop {
            let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::UpdateDocument { idterm: idterm.clone(), doc: doc.clone() } };
            match self.indexing_queues.push(collection, task, true, None) {
                QueueState::HasSpace => return,
                QueueState::Closed => return,
                QueueState::LowSpace => {
                    self.processing_queues.set_active(collection, false);
                    return;
                }
                QueueState::Full => {
                    self.processing_queues.set_active(collection, false);
                    let deadline = Instant::now() + Duration::from_millis(50);
                    let task = IndexingTask { collection: collection.to_string(), kind: IndexingTaskKind::UpdateDocument { idterm: idterm.clone(), doc: doc.clone() } };
                    match self.indexing_queues.push(collection, task, true, Some(deadline)) {
                        QueueState::Full => continue,
                        QueueState::LowSpace => {
                            self.processing_queues.set_active(collection, false);
                            return;
                        }
                        QueueState::HasSpace | QueueState::Closed => return,
                    }
                }
            }
        }
    }
}
