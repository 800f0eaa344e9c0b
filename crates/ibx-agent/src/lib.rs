//! Trade intent execution engine.
//!
//! Wires the gateway link, session, guardrails, and order tracker into
//! one engine: intents come in from the external resolver, queries run
//! immediately, trades stop at the confirmation gate until the user
//! authorizes them.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use engine::{Engine, EngineConfig, Outcome};
pub use error::{AppError, AppResult, EngineError};
