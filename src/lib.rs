pub mod agent;
pub mod api;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod llm;
pub mod memory;
pub mod middleware;
pub mod router;
pub mod service;
pub mod tools;
pub mod types;

pub use error::AgentError;
pub use identity::{CookieUserResolver, User, UserResolver};
