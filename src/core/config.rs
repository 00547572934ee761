use std::path::PathBuf;

/// Server-wide tunables. Everything here has a sane default; callers only
/// need to override what they care about.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,

    /// Number of worker threads in the search pool.
    pub search_threads: usize,
    /// Number of worker threads in the document-processing pool.
    pub processing_threads: usize,
    /// Number of worker threads in the indexing pool.
    pub indexing_threads: usize,

    /// Queue size at which a `TaskQueueGroup` reports `LowSpace`.
    pub queue_throttle_size: usize,
    /// Queue size at which a `TaskQueueGroup` reports `Full` and rejects pushes.
    pub queue_max_size: usize,

    /// Maximum number of collections kept open at once in a `CollectionPool`.
    pub max_open_collections: usize,

    /// Number of documents an importer accumulates before issuing a commit.
    pub importer_commit_batch: usize,

    /// Maximum number of log messages buffered for the background logger
    /// before new messages start being dropped (with a carried drop count).
    pub log_queue_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Config {
            data_dir: PathBuf::from("./data"),

            search_threads: cpus,
            processing_threads: cpus,
            indexing_threads: 1,

            queue_throttle_size: 10_000,
            queue_max_size: 100_000,

            max_open_collections: 10,

            importer_commit_batch: 100_000,

            log_queue_size: 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_at_least_one_thread_per_pool() {
        let cfg = Config::default();
        assert!(cfg.search_threads >= 1);
        assert!(cfg.processing_threads >= 1);
        assert!(cfg.indexing_threads >= 1);
    }

    #[test]
    fn throttle_is_below_max() {
        let cfg = Config::default();
        assert!(cfg.queue_throttle_size < cfg.queue_max_size);
    }
}
