pub mod chat;
pub mod gemini;
