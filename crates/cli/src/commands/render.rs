use std::fs;
use std::path::Path;

use serde_json::json;
use threadmind_core::{parse_agent_result, MessageCatalog, Transcript, TranscriptMessage};
use threadmind_slack::format_reply;

use crate::commands::{exit, CommandResult};

/// Renders with the built-in catalog so the preview never depends on the
/// Slack credentials being set.
pub fn run(path: &Path) -> CommandResult {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) => {
            return CommandResult::failure(
                "render",
                "input_read",
                format!("could not read `{}`: {error}", path.display()),
                exit::INPUT,
            );
        }
    };

    let transcript = match decode_transcript(&raw) {
        Ok(transcript) => transcript,
        Err(error) => {
            return CommandResult::failure(
                "render",
                "transcript_decode",
                format!("`{}` is not an agent transcript: {error}", path.display()),
                exit::INPUT,
            );
        }
    };

    let catalog = MessageCatalog::default();
    let (content, references) = parse_agent_result(&transcript, &catalog);
    let reply = format_reply(&content, &references, &catalog);

    CommandResult::success_with_data(
        "render",
        format!(
            "rendered {} transcript messages with {} references",
            transcript.messages.len(),
            references.len()
        ),
        Some(json!({"text": reply.fallback_text, "blocks": reply.blocks})),
    )
}

fn decode_transcript(raw: &str) -> Result<Transcript, serde_json::Error> {
    serde_json::from_str::<Transcript>(raw).or_else(|error| {
        serde_json::from_str::<Vec<TranscriptMessage>>(raw)
            .map(Transcript::new)
            .map_err(|_| error)
    })
}
