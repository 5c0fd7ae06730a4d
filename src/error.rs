//! `ProtocolError`: the error type `ProtocolHandler` and the HTTP/WS
//! endpoints report to callers (spec §7). Library errors bubble up through
//! `thiserror`; only the CLI boundary in `main.rs` uses `anyhow`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("variable graph error: {0}")]
    Core(#[from] strand_core::CoreError),
    #[error("path error: {0}")]
    Path(#[from] strand_core::PathError),
    #[error("resolve error: {0}")]
    Resolve(#[from] strand_core::ResolveError),
    #[error("codec error: {0}")]
    Codec(#[from] strand_protocol::CodecError),
    #[error("scripting host error: {0}")]
    Host(#[from] strand_scripting::HostError),
    #[error("wrapper error: {0}")]
    Wrapper(#[from] strand_core::WrapperError),
    #[error("malformed message: {0}")]
    BadMessage(String),
    #[error("no such session {0:?}")]
    SessionMissing(String),
    #[error("handler panicked: {0}")]
    Fatal(String),
}

impl ProtocolError {
    /// Wire-facing error code, sent in `Message::Error.code` (spec §6 error
    /// message payload).
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Core(_) => "path-failure",
            ProtocolError::Path(_) => "path-failure",
            ProtocolError::Resolve(_) => "path-failure",
            ProtocolError::Codec(_) => "bad-message",
            ProtocolError::Host(_) => "host-invocation-failed",
            ProtocolError::Wrapper(_) => "wrapper-create-failed",
            ProtocolError::BadMessage(_) => "bad-message",
            ProtocolError::SessionMissing(_) => "session-missing",
            ProtocolError::Fatal(_) => "fatal",
        }
    }

    /// Whether this error should tear down the whole connection rather than
    /// just being reported back as a per-message `Message::Error` (spec §7
    /// propagation policy: only `Fatal` is connection-ending).
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Fatal(_))
    }
}
