use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Nudge a waiting async loop by writing a single byte to a file descriptor.
/// `fd` is typically the write end of a pipe or an eventfd the caller's
/// event loop is select()/poll()-ing on.
#[derive(Clone, Copy)]
struct Nudge {
    fd: i32,
    byte: u8,
}

impl Nudge {
    fn fire(&self) {
        let buf = [self.byte];
        unsafe {
            libc::write(self.fd, buf.as_ptr() as *const libc::c_void, 1);
        }
    }
}

struct Inner<T> {
    response: Mutex<T>,
    ready: AtomicBool,
    nudge: Mutex<Option<Nudge>>,
}

/// A synchronised, reference-counted container for a result which one
/// thread prepares and another thread consumes.
///
/// The producing thread writes into `response_mut()` and then calls
/// `set_ready()` exactly once; after that point it must not touch the
/// response again. The consuming thread polls `is_ready()` (typically after
/// being woken by the configured nudge fd) and then reads `response()`.
pub struct ResultHandle<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResultHandle<T> {
    fn clone(&self) -> Self {
        ResultHandle { inner: Arc::clone(&self.inner) }
    }
}

impl<T: Default> ResultHandle<T> {
    pub fn new() -> Self {
        ResultHandle {
            inner: Arc::new(Inner {
                response: Mutex::new(T::default()),
                ready: AtomicBool::new(false),
                nudge: Mutex::new(None),
            }),
        }
    }
}

impl<T: Default> Default for ResultHandle<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultHandle<T> {
    pub fn set_nudge(&self, fd: i32, byte: u8) {
        *self.inner.nudge.lock() = if fd >= 0 { Some(Nudge { fd, byte }) } else { None };
    }

    /// Run `f` against the response. Must only be called by the producing
    /// thread, and only before `set_ready()`.
    pub fn with_response_mut(&self, f: impl FnOnce(&mut T)) {
        let mut guard = self.inner.response.lock();
        f(&mut guard);
    }

    /// Mark the result ready, firing the nudge if one was configured. Must
    /// be called exactly once by the producing thread.
    pub fn set_ready(&self) {
        self.inner.ready.store(true, Ordering::Release);
        if let Some(nudge) = *self.inner.nudge.lock() {
            nudge.fire();
        }
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Run `f` against the finished response. Intended for the waiting
    /// thread, after `is_ready()` returns true.
    pub fn with_response<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.response.lock();
        f(&guard)
    }
}

impl<T: Default> ResultHandle<T> {
    /// Report a failure, unless the result is already ready (in which case
    /// this call has no effect).
    pub fn fail_with(&self, value: T) {
        if self.inner.ready.swap(true, Ordering::AcqRel) {
            return;
        }
        *self.inner.response.lock() = value;
        if let Some(nudge) = *self.inner.nudge.lock() {
            nudge.fire();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_then_consumer_sees_value() {
        let handle: ResultHandle<i32> = ResultHandle::new();
        assert!(!handle.is_ready());
        handle.with_response_mut(|v| *v = 42);
        handle.set_ready();
        assert!(handle.is_ready());
        handle.with_response(|v| assert_eq!(*v, 42));
    }

    #[test]
    fn fail_after_ready_is_noop() {
        let handle: ResultHandle<i32> = ResultHandle::new();
        handle.with_response_mut(|v| *v = 1);
        handle.set_ready();
        handle.fail_with(99);
        handle.with_response(|v| assert_eq!(*v, 1));
    }

    #[test]
    fn clone_shares_state() {
        let handle: ResultHandle<i32> = ResultHandle::new();
        let other = handle.clone();
        handle.with_response_mut(|v| *v = 7);
        handle.set_ready();
        assert!(other.is_ready());
        other.with_response(|v| assert_eq!(*v, 7));
    }
}
