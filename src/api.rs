//! HTTP API for chat front-ends.
//!
//! Clients own the conversation: every request carries the full history and
//! the server keeps no session state.

mod chat;
mod server;
mod state;

pub use server::{router, start_http_server};
pub use state::ApiState;
