pub mod conversation_actor;

pub use conversation_actor::{ConversationHandle, ConversationLimits};
