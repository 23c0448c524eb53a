pub mod chat;

pub use chat::{chat_poll_handler, chat_sse_handler, health_handler, whoami_handler};
