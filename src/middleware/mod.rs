pub mod chat_request;
pub mod identity;

pub use chat_request::{ChatPreprocess, ChatTurn};
pub use identity::ResolvedUser;
