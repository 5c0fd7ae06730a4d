use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    BadMessage(String),
}
