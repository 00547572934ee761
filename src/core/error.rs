use std::fmt;

/// Broad classification of failures, following the error taxonomy a REST
/// transport needs to map onto status codes (400 vs 404 vs 503 vs 500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or out-of-range input supplied by a caller.
    InvalidValue,
    /// A stored value could not be deserialized (corrupt document data,
    /// unrecognised slot encoding, ...).
    Unserialization,
    /// Allocation failed or a configured memory bound was exceeded.
    OutOfMemory,
    /// The index backend reported a failure.
    IndexBackend,
    /// A requested collection, field, checkpoint or category does not exist.
    NotFound,
    /// A task could not be pushed because its queue is full.
    QueueFull,
    /// A task was pushed to (or popped from) a closed queue group.
    QueueClosed,
    /// Failure in the surrounding OS (I/O, thread spawn, ...).
    System,
    /// Anything else: a broken invariant, a bug.
    Internal,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Error { kind, context: context.into() }
    }

    pub fn invalid_value(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidValue, context)
    }

    pub fn not_found(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::NotFound, context)
    }

    pub fn internal(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::Internal, context)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.context)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::new(ErrorKind::System, err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Unserialization, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = Error::invalid_value("bad field name");
        let s = err.to_string();
        assert!(s.contains("InvalidValue"));
        assert!(s.contains("bad field name"));
    }

    #[test]
    fn from_serde_json_error_is_unserialization() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json_err.into();
        assert_eq!(err.kind, ErrorKind::Unserialization);
    }
}
