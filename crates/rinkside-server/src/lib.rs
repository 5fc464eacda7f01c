// Network surface for the draft engine: wire protocol, per-client sessions
// and the WebSocket listener.

pub mod protocol;
pub mod session;
pub mod ws_server;
