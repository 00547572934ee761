use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

struct LogMsg {
    timestamp: f64,
    level: Level,
    message: String,
    /// Number of messages dropped immediately before this one was queued,
    /// because the queue was full. Carried on the next record that does
    /// make it through, so drops are never silent.
    dropped_before: u64,
}

struct State {
    queue: VecDeque<LogMsg>,
    dropped: u64,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    cond: Condvar,
    max_queue_size: usize,
}

/// A bounded, single-writer-thread logger.
///
/// All log calls are non-blocking: they push onto an in-memory queue and
/// return. A dedicated background thread drains the queue and writes each
/// message out. If the queue is full, the message is dropped, but the drop
/// is never silent: the count of dropped messages since the last delivered
/// one is attached to the next message that is successfully queued.
pub struct Logger {
    shared: Arc<Shared>,
    writer: Option<JoinHandle<()>>,
}

impl Logger {
    pub fn new(max_queue_size: usize) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State { queue: VecDeque::new(), dropped: 0, closed: false }),
            cond: Condvar::new(),
            max_queue_size,
        });

        let run_shared = Arc::clone(&shared);
        let writer = std::thread::Builder::new()
            .name("restpose-logger".into())
            .spawn(move || Logger::run(run_shared))
            .expect("failed to spawn logger thread");

        Logger { shared, writer: Some(writer) }
    }

    fn run(shared: Arc<Shared>) {
        loop {
            let msg = {
                let mut state = shared.state.lock().unwrap();
                loop {
                    if let Some(msg) = state.queue.pop_front() {
                        break Some(msg);
                    }
                    if state.closed {
                        break None;
                    }
                    state = shared.cond.wait(state).unwrap();
                }
            };
            let Some(msg) = msg else { break };
            Logger::write(&msg);
        }
    }

    fn write(msg: &LogMsg) {
        if msg.dropped_before > 0 {
            eprintln!(
                "[{:.3}] {} ({} message(s) dropped): {}",
                msg.timestamp,
                msg.level.as_str(),
                msg.dropped_before,
                msg.message
            );
        } else {
            eprintln!("[{:.3}] {}: {}", msg.timestamp, msg.level.as_str(), msg.message);
        }
    }

    fn now() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }

    fn log(&self, level: Level, message: String) {
        let mut state = self.shared.state.lock().unwrap();
        if state.queue.len() >= self.shared.max_queue_size {
            state.dropped += 1;
            return;
        }
        let dropped_before = std::mem::take(&mut state.dropped);
        state.queue.push_back(LogMsg { timestamp: Logger::now(), level, message, dropped_before });
        self.shared.cond.notify_one();
    }

    /// All actions performed by the system should be logged at this level
    /// (or higher).
    pub fn debug(&self, message: impl Into<String>) {
        self.log(Level::Debug, message.into());
    }

    /// Significant actions and changes of state of the system should be
    /// logged at this level.
    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message.into());
    }

    /// An error handled properly by the system, e.g. bad user input that
    /// was detected and rejected.
    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message.into());
    }

    /// An error which shouldn't occur in normal operation.
    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message.into());
    }

    /// Number of messages waiting to be written, for diagnostics.
    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().unwrap().queue.len()
    }

    /// Block until the queue has been fully drained. Mainly useful in tests.
    pub fn flush(&self) {
        loop {
            let state = self.shared.state.lock().unwrap();
            if state.queue.is_empty() {
                return;
            }
            drop(state);
            std::thread::yield_now();
        }
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.closed = true;
        }
        self.shared.cond.notify_all();
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}
