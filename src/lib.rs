//! `strand_server`: a reactive variable-graph server. Clients create and
//! watch variables over a WebSocket; the server resolves their values
//! through a scripting host and streams debounced change batches back.

pub mod error;
pub mod http;
pub mod session;
pub mod state;
pub mod ws;

pub use error::ProtocolError;
pub use state::AppState;
