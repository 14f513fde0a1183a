use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Assistant => "AI",
            Role::System => "System",
        }
    }
}

/// One entry of the chat transcript, as sent to `/api/chat`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// --- Ollama API Structures ---
#[derive(Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub stream: bool,
}

/// Envelope of both the buffered chat reply and each streamed NDJSON line.
/// Everything is optional so that partial lines still deserialize.
#[derive(Deserialize, Debug, Default)]
pub struct ChatResponse {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub done: bool,
}

#[derive(Deserialize, Debug, Default)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    pub fn content(&self) -> Option<&str> {
        self.message.as_ref().and_then(|m| m.content.as_deref())
    }

    pub fn into_content(self) -> Option<String> {
        self.message.and_then(|m| m.content)
    }
}

#[derive(Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub stream: bool,
}

#[derive(Deserialize, Debug)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelInfo>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    // modified_at, size, digest and details are ignored.
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_request_serializes_roles_lowercase() {
        let messages = vec![
            Message {
                role: Role::System,
                content: "be brief".to_string(),
            },
            Message::user("hello"),
        ];
        let request = ChatRequest {
            model: "llama2",
            messages: &messages,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "llama2",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hello"}
                ],
                "stream": false
            })
        );
    }

    #[test]
    fn chat_response_tolerates_missing_message() {
        let response: ChatResponse = serde_json::from_str(r#"{"done":true}"#).unwrap();
        assert!(response.done);
        assert_eq!(response.content(), None);

        let response: ChatResponse =
            serde_json::from_str(r#"{"message":{"role":"assistant","content":"hi"},"done":false}"#)
                .unwrap();
        assert_eq!(response.content(), Some("hi"));
    }

    #[test]
    fn tags_response_keeps_only_names() {
        let body = r#"{"models":[{"name":"llama2:latest","size":1,"digest":"abc"},{"name":"mistral"}]}"#;
        let tags: TagsResponse = serde_json::from_str(body).unwrap();
        let names: Vec<_> = tags.models.into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["llama2:latest", "mistral"]);
    }
}
