use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Input errors raised by the context engine.
///
/// Fetch failures never surface here; they degrade to missing content
/// inside the resolved context instead.
pub enum ContextError {
    #[error("invalid entity reference '{0}'")]
    InvalidReference(String),
    #[error("invalid entity key: {0}")]
    InvalidKey(String),
    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}
