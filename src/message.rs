use serde::{Deserialize, Serialize};

/// A message in a conversation, containing a role and text content.
///
/// Messages are the unit of prompt assembly and history serialization:
/// the reformulator and the generator both consume `&[Message]`, and the
/// session store converts persisted turns into messages when hydrating
/// conversation context.
///
/// # Examples
///
/// ```
/// use ragweave::message::Message;
///
/// let user_msg = Message::user("What is the refund policy?");
/// let assistant_msg = Message::assistant("Refunds are accepted within 30 days.");
/// let system_msg = Message::system("Answer from the provided context only.");
///
/// assert!(user_msg.has_role(Message::USER));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g., "user", "assistant", "system").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// AI assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System prompt or instruction message role.
    pub const SYSTEM: &'static str = "system";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a user message with the specified content.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message with the specified content.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message with the specified content.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }

    /// Renders a slice of messages into the `role: content` transcript form
    /// used inside prompts.
    #[must_use]
    pub fn render_transcript(messages: &[Message]) -> String {
        let mut out = String::new();
        for msg in messages {
            out.push_str(&msg.role);
            out.push_str(": ");
            out.push_str(&msg.content);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convenience_constructors_set_roles() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, Message::USER);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there!");
        assert_eq!(assistant_msg.role, Message::ASSISTANT);

        let system_msg = Message::system("You are helpful");
        assert_eq!(system_msg.role, Message::SYSTEM);

        let custom_msg = Message::new("function", "Result: 42");
        assert_eq!(custom_msg.role, "function");
    }

    #[test]
    fn role_checking() {
        let msg = Message::user("Hello");
        assert!(msg.has_role(Message::USER));
        assert!(!msg.has_role(Message::ASSISTANT));
    }

    #[test]
    fn transcript_rendering_preserves_order() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("second"),
        ];
        let transcript = Message::render_transcript(&messages);
        assert_eq!(transcript, "user: first\nassistant: second\n");
    }

    #[test]
    fn serialization_round_trip() {
        let original = Message::user("Test message");
        let json = serde_json::to_string(&original).expect("serialize");
        let parsed: Message = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, parsed);
    }
}
