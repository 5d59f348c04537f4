//! PlanPilot - a goal tracking library with a real-time hierarchical sync engine.
//!
//! This library provides the core functionality for the `pp` CLI tool:
//! goal/milestone/task management, a live-subscription document store,
//! the hierarchical sync engine that mirrors it, and the AI planning client.

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
#[cfg(feature = "gui")]
pub mod gui;
pub mod models;
pub mod planner;
pub mod repo;
pub mod store;
pub mod sync;

/// Library-level error type for PlanPilot operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Not signed in: run `pp login <user>` first")]
    Unauthenticated,

    #[error("Not initialized: run `pp system init` first")]
    NotInitialized,

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cascade delete left {} document(s) behind: {}", failed.len(), failed.join(", "))]
    Cascade { failed: Vec<String> },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for PlanPilot operations.
pub type Result<T> = std::result::Result<T, Error>;
