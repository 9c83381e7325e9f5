pub mod config;
pub mod context;
pub mod errors;
pub mod messages;
pub mod references;
pub mod transcript;

pub use context::{ContextParams, RunContext, RunMetadata};
pub use errors::ApplicationError;
pub use messages::MessageCatalog;
pub use references::{parse_agent_result, Reference, ReferenceArtifact};
pub use transcript::{ContentItem, MessageContent, ToolCall, Transcript, TranscriptMessage};
