use tracing::{error, info};

use crate::api::Message;
use crate::conversation::Conversation;
use crate::error::TransportError;

/// Shown as the assistant's reply when a turn fails. The cause is only logged.
pub const CHAT_ERROR_NOTICE: &str = "Sorry, I encountered an error. Please make sure Ollama is running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatRequestState {
    #[default]
    Idle,
    AwaitingResponse,
}

/// What has to be sent to the server for a submitted turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub model: String,
    pub messages: Vec<Message>,
}

/// Input line, transcript and single-flight request state of the chat view.
#[derive(Debug, Default)]
pub struct ChatSession {
    conversation: Conversation,
    input: String,
    state: ChatRequestState,
    partial_reply: String,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn state(&self) -> ChatRequestState {
        self.state
    }

    pub fn is_awaiting(&self) -> bool {
        self.state == ChatRequestState::AwaitingResponse
    }

    /// Reply text streamed so far for the outstanding turn.
    pub fn partial_reply(&self) -> &str {
        &self.partial_reply
    }

    pub fn push_char(&mut self, c: char) {
        self.input.push(c);
    }

    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Moves the input into the transcript and returns the request to send.
    ///
    /// Returns `None` without touching anything when the input is blank or
    /// a reply is still outstanding.
    pub fn submit(&mut self, model: &str) -> Option<PendingTurn> {
        let prompt = self.input.trim();
        if prompt.is_empty() || self.is_awaiting() {
            return None;
        }

        let message = Message::user(prompt);
        self.input.clear();
        self.conversation.push(message);
        self.partial_reply.clear();
        self.state = ChatRequestState::AwaitingResponse;
        info!(model, turns = self.conversation.len(), "submitting chat turn");

        Some(PendingTurn {
            model: model.to_string(),
            messages: self.conversation.messages().to_vec(),
        })
    }

    pub fn finish_turn(&mut self, result: Result<String, TransportError>) {
        let reply = match result {
            Ok(text) => Message::assistant(text),
            Err(err) => {
                error!(error = %err, "chat turn failed");
                Message::assistant(CHAT_ERROR_NOTICE)
            }
        };
        self.conversation.push(reply);
        self.partial_reply.clear();
        self.state = ChatRequestState::Idle;
    }

    pub fn append_fragment(&mut self, fragment: &str) {
        if self.is_awaiting() {
            self.partial_reply.push_str(fragment);
        }
    }

    /// Closes a streamed turn. On error the partial text is dropped.
    pub fn finish_stream(&mut self, result: Result<(), TransportError>) {
        let text = std::mem::take(&mut self.partial_reply);
        self.finish_turn(result.map(|()| text));
    }

    pub fn clear(&mut self) {
        self.conversation.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Role;

    fn type_text(session: &mut ChatSession, text: &str) {
        text.chars().for_each(|c| session.push_char(c));
    }

    fn failure() -> TransportError {
        TransportError::Stream("connection reset".to_string())
    }

    #[test]
    fn hello_turn_sends_single_user_message() {
        let mut session = ChatSession::new();
        type_text(&mut session, "hello");

        let turn = session.submit("llama2").expect("turn should be sent");
        assert_eq!(turn.model, "llama2");
        assert_eq!(turn.messages, vec![Message::user("hello")]);
        assert_eq!(session.input(), "");
        assert_eq!(session.state(), ChatRequestState::AwaitingResponse);

        session.finish_turn(Ok("hi there".to_string()));
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello"), Message::assistant("hi there")]
        );
        assert_eq!(session.state(), ChatRequestState::Idle);
    }

    #[test]
    fn failed_turn_appends_error_notice() {
        let mut session = ChatSession::new();
        type_text(&mut session, "hello");
        session.submit("llama2").unwrap();

        session.finish_turn(Err(failure()));
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello"), Message::assistant(CHAT_ERROR_NOTICE)]
        );
        assert_eq!(session.state(), ChatRequestState::Idle);
    }

    #[test]
    fn n_turns_alternate_user_and_assistant() {
        let mut session = ChatSession::new();
        for turn in 0..5 {
            type_text(&mut session, &format!("question {turn}"));
            let pending = session.submit("mistral").unwrap();
            assert_eq!(pending.messages.len(), 2 * turn + 1);
            assert_eq!(pending.messages.last(), Some(&Message::user(format!("question {turn}"))));
            session.finish_turn(Ok(format!("answer {turn}")));
        }

        let messages = session.conversation().messages();
        assert_eq!(messages.len(), 10);
        for (index, message) in messages.iter().enumerate() {
            let (role, content) = if index % 2 == 0 {
                (Role::User, format!("question {}", index / 2))
            } else {
                (Role::Assistant, format!("answer {}", index / 2))
            };
            assert_eq!(message.role, role);
            assert_eq!(message.content, content);
        }
    }

    #[test]
    fn prompt_is_trimmed() {
        let mut session = ChatSession::new();
        type_text(&mut session, "  spaced out \n");
        let turn = session.submit("llama2").unwrap();
        assert_eq!(turn.messages, vec![Message::user("spaced out")]);
    }

    #[test]
    fn blank_input_is_ignored() {
        let mut session = ChatSession::new();
        assert!(session.submit("llama2").is_none());

        type_text(&mut session, " \t \n");
        assert!(session.submit("llama2").is_none());
        assert!(session.conversation().is_empty());
        assert_eq!(session.input(), " \t \n");
        assert_eq!(session.state(), ChatRequestState::Idle);
    }

    #[test]
    fn submit_while_awaiting_is_ignored() {
        let mut session = ChatSession::new();
        type_text(&mut session, "first");
        session.submit("llama2").unwrap();

        type_text(&mut session, "second");
        assert!(session.submit("llama2").is_none());
        assert_eq!(session.conversation().len(), 1);
        assert_eq!(session.input(), "second");
    }

    #[test]
    fn clear_empties_transcript_in_any_state() {
        let mut session = ChatSession::new();
        session.clear();
        assert_eq!(session.conversation().len(), 0);

        type_text(&mut session, "hello");
        session.submit("llama2").unwrap();
        session.finish_turn(Ok("hi".to_string()));
        type_text(&mut session, "again");
        session.submit("llama2").unwrap();

        session.clear();
        assert_eq!(session.conversation().len(), 0);
        assert!(session.is_awaiting());

        // The outstanding reply still lands, now on an empty transcript.
        session.finish_turn(Ok("late".to_string()));
        assert_eq!(session.conversation().messages(), &[Message::assistant("late")]);
    }

    #[test]
    fn streamed_fragments_become_one_message() {
        let mut session = ChatSession::new();
        type_text(&mut session, "hello");
        session.submit("llama2").unwrap();

        session.append_fragment("hi ");
        session.append_fragment("there");
        assert_eq!(session.partial_reply(), "hi there");
        assert_eq!(session.conversation().len(), 1);

        session.finish_stream(Ok(()));
        assert_eq!(session.partial_reply(), "");
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello"), Message::assistant("hi there")]
        );
    }

    #[test]
    fn stream_error_discards_partial_reply() {
        let mut session = ChatSession::new();
        type_text(&mut session, "hello");
        session.submit("llama2").unwrap();
        session.append_fragment("half an ans");

        session.finish_stream(Err(failure()));
        assert_eq!(
            session.conversation().messages(),
            &[Message::user("hello"), Message::assistant(CHAT_ERROR_NOTICE)]
        );
        assert_eq!(session.state(), ChatRequestState::Idle);
    }

    #[test]
    fn fragments_outside_a_turn_are_dropped() {
        let mut session = ChatSession::new();
        session.append_fragment("stray");
        assert_eq!(session.partial_reply(), "");
    }
}
