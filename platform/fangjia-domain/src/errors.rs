#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalError {
    Transport { url: String, message: String },
    HttpStatus { url: String, status: u16 },
    InvalidRequest(String),
}

impl std::fmt::Display for RetrievalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalError::Transport { url, message } => {
                write!(f, "request to {url} failed: {message}")
            }
            RetrievalError::HttpStatus { url, status } => {
                write!(f, "request to {url} returned HTTP {status}")
            }
            RetrievalError::InvalidRequest(msg) => write!(f, "invalid request: {msg}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersistenceError {
    Io(String),
    Serialize(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceError::Io(msg) => write!(f, "io: {msg}"),
            PersistenceError::Serialize(msg) => write!(f, "serialize: {msg}"),
        }
    }
}
