use crate::api::Message;

/// Chat transcript in chronological order.
///
/// Messages are only ever appended; the sole other mutation is clearing the
/// whole transcript.
#[derive(Debug, Default, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    #[test]
    fn keeps_insertion_order_until_cleared() {
        let mut conversation = Conversation::new();
        conversation.push(Message::user("one"));
        conversation.push(Message::assistant("two"));
        conversation.push(Message::user("three"));

        let contents: Vec<_> = conversation.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(conversation.messages()[1].role, Role::Assistant);

        conversation.clear();
        assert!(conversation.is_empty());
        assert_eq!(conversation.len(), 0);
    }
}
