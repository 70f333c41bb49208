use async_trait::async_trait;
use jm_bot_core::contract::{ChatResponder, ChatTarget};
use jm_bot_core::error::ResponderError;

/// Prints replies to stdout instead of sending them to the chat.
pub struct ConsoleResponder;

pub fn describe_target(target: &ChatTarget) -> String {
    match target {
        ChatTarget::Group(id) => format!("group:{id}"),
        ChatTarget::Private(id) => format!("user:{id}"),
    }
}

#[async_trait]
impl ChatResponder for ConsoleResponder {
    async fn send_text(&self, target: &ChatTarget, text: &str) -> Result<(), ResponderError> {
        println!("[{}] {}", describe_target(target), text);
        Ok(())
    }
}
