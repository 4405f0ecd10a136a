//! Background services for mission control.
//!
//! Long-running reporters that operate independently of the API server.

pub mod heartbeat;

pub use heartbeat::{HeartbeatError, HeartbeatReporter};
