//! Tendersbot — Telegram front end for the tenders and procurement
//! department.
//!
//! Staff author a tree of informational menu nodes through an external
//! admin surface; end users walk that tree in chat, and a feedback-capable
//! node launches a multi-step form that is stored and emailed to staff.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, domain enums
//! - `storage`: pooled SQLite store for nodes, feedback, and files
//! - `telegram`: bot handlers, navigation engine, feedback flow, sessions
//! - `notify`: staff email notifications for submitted feedback

pub mod cli;
pub mod core;
pub mod notify;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult};
pub use crate::storage::{create_pool, get_connection, DbConnection, DbPool};
pub use crate::telegram::{schema, HandlerDeps, HandlerError};
