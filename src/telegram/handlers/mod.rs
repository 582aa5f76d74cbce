//! Telegram bot handler tree configuration
//!
//! Provides the main dispatcher schema. Handlers are organized so that
//! integration tests drive the same tree as production code.

mod schema;
mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
