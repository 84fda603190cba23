use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Named data topics the chat-session SDK serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Topic {
    /// The visitor's profile record.
    VisitorProfile,
    /// Structured conversation metadata, including pre-chat survey answers.
    ConversationInfo,
    /// The running conversation transcript.
    TranscriptLines,
}

impl Topic {
    /// Wire name of the topic, as the SDK keys it.
    pub fn key(&self) -> &'static str {
        match self {
            Topic::VisitorProfile => "visitorInfo",
            Topic::ConversationInfo => "conversationInfo",
            Topic::TranscriptLines => "transcriptLines",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Callback for a streaming bind. Invoked on every delivery for the life of
/// the session.
pub type TopicCallback = Box<dyn Fn(Value) + Send + Sync>;

/// Callback for a one-shot read.
pub type TopicOnceCallback = Box<dyn FnOnce(Value) + Send>;

/// The upstream chat-session SDK, reduced to the surface this crate consumes.
/// Delivery and binding semantics are the SDK's contract: `get` answers once,
/// `bind` streams until the session ends, and neither offers an unsubscribe.
pub trait AgentSdk: Send + Sync {
    /// Initialize the SDK. Listeners stay inert unless this succeeds.
    fn init(&self) -> Result<()>;

    /// One-shot read of a named topic.
    fn get(&self, topic: Topic, callback: TopicOnceCallback);

    /// Bind a streaming listener to a named topic.
    fn bind(&self, topic: Topic, callback: TopicCallback);
}
