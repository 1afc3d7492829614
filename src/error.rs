use std::io::Error as IoError;

/// Errors raised by the alignment graph, the melting passes and the net model.
#[derive(Debug)]
pub enum CafError {
    /// A structural invariant does not hold; the graph or model is corrupt or misused.
    Consistency(String),
    /// A name or index did not resolve to a live object.
    Missing { kind: &'static str, name: u64 },
    /// The group already owns a nested net.
    AlreadyNested(u64),
    IoError(IoError),
    Decode(String),
}

impl std::fmt::Display for CafError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CafError::Consistency(msg) => write!(f, "Consistency error: {}", msg),
            CafError::Missing { kind, name } => write!(f, "No {} named {}", kind, name),
            CafError::AlreadyNested(name) => {
                write!(f, "Group {} already has a nested net", name)
            }
            CafError::IoError(e) => write!(f, "IO error: {}", e),
            CafError::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for CafError {}

impl From<IoError> for CafError {
    fn from(e: IoError) -> Self {
        CafError::IoError(e)
    }
}

impl From<CafError> for IoError {
    fn from(e: CafError) -> Self {
        match e {
            CafError::IoError(e) => e,
            CafError::Decode(msg) => IoError::new(std::io::ErrorKind::InvalidData, msg),
            CafError::Missing { .. } => IoError::new(std::io::ErrorKind::NotFound, e.to_string()),
            other => IoError::new(std::io::ErrorKind::InvalidInput, other.to_string()),
        }
    }
}

/// Shorthand for a consistency failure.
pub(crate) fn inconsistent(msg: impl Into<String>) -> CafError {
    CafError::Consistency(msg.into())
}
