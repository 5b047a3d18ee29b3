use cuebus_core::GroupId;
use cuebus_protocol::frames::codes;
use cuebus_store::StoreError;
use thiserror::Error;

/// Errors surfaced to callers of engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The repository rejected the write. In-memory state is unchanged.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Command tags are OSC address patterns and must start with `/`.
    #[error("invalid tag {0:?}: must start with '/'")]
    InvalidTag(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("group not found: {0}")]
    UnknownGroup(GroupId),
}

impl EngineError {
    /// Short error code string sent to clients in WS RES frames.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Store(StoreError::NotFound { .. }) => codes::NOT_FOUND,
            EngineError::Store(StoreError::Corrupt { .. }) => codes::INTERNAL_ERROR,
            EngineError::Store(_) => codes::DATABASE_ERROR,
            EngineError::InvalidTag(_) | EngineError::InvalidInterval(_) => codes::INVALID_PARAMS,
            EngineError::UnknownGroup(_) => codes::NOT_FOUND,
        }
    }
}

/// Failure to deliver one batch to one target.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("OSC encode error: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_the_failure_kind() {
        let missing = EngineError::Store(StoreError::NotFound { entity: "group", id: 3 });
        assert_eq!(missing.code(), "NOT_FOUND");
        assert_eq!(EngineError::InvalidTag("play".into()).code(), "INVALID_PARAMS");
        assert_eq!(EngineError::UnknownGroup(GroupId(1)).code(), "NOT_FOUND");
        let encode = serde_json::from_str::<u8>("x").unwrap_err();
        assert_eq!(EngineError::Store(StoreError::Encode(encode)).code(), "DATABASE_ERROR");
        let corrupt = StoreError::Corrupt { entity: "command", id: 9, reason: "bad json".into() };
        assert_eq!(EngineError::Store(corrupt).code(), "INTERNAL_ERROR");
    }
}
