//! Web GUI for PlanPilot (feature `gui`).
//!
//! Serves read-only REST views over the sync engine's mirror plus a
//! websocket that pushes a reload message whenever the engine applies a
//! snapshot, so clients refetch instead of patching state locally.

pub mod server;
pub mod websocket;

pub use server::start_server;
