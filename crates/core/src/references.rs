use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::messages::{MessageCatalog, TOOL_ARTIFACT_TITLE};
use crate::transcript::{ContentItem, MessageContent, Transcript, TranscriptMessage};

/// Substituted when the final message has no usable text.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "...";

/// Citations gathered from one tool, shown under a reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub title: String,
    pub source: String,
    pub icon: String,
    pub artifacts: Vec<ReferenceArtifact>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceArtifact {
    pub title: String,
    pub link: String,
}

/// Extracts the reply text and the references of the tool calls that served
/// the final answer.
pub fn parse_agent_result(
    transcript: &Transcript,
    catalog: &MessageCatalog,
) -> (String, Vec<Reference>) {
    let content = transcript
        .last()
        .map(|message| extract_content(message.content()))
        .unwrap_or_else(|| EMPTY_CONTENT_PLACEHOLDER.to_string());

    (content, collect_references(&transcript.messages, catalog))
}

fn extract_content(content: &MessageContent) -> String {
    match content {
        MessageContent::Text(text) => text.trim().to_string(),
        MessageContent::Items(items) => {
            let mut texts = Vec::new();
            for item in items {
                match item {
                    ContentItem::Text(text) if text.trim().is_empty() => {}
                    ContentItem::Text(text) => texts.push(text.as_str()),
                    ContentItem::Unrecognized(value) => {
                        warn!(item = %value, "unrecognized transcript content item");
                    }
                }
            }
            if texts.is_empty() {
                EMPTY_CONTENT_PLACEHOLDER.to_string()
            } else {
                texts.join("\n").trim().to_string()
            }
        }
    }
}

/// Walks the transcript backward. Collection starts at the latest assistant
/// message and ends at the one before it (or at a human turn).
fn collect_references(messages: &[TranscriptMessage], catalog: &MessageCatalog) -> Vec<Reference> {
    let mut tool_order: Vec<&str> = Vec::new();
    let mut calls_by_tool: HashMap<&str, Vec<Vec<ReferenceArtifact>>> = HashMap::new();
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut found_assistant = false;

    for message in messages.iter().rev() {
        match message {
            TranscriptMessage::Human { .. } => break,
            TranscriptMessage::Assistant { .. } => {
                if found_assistant {
                    break;
                }
                found_assistant = true;
            }
            TranscriptMessage::Tool { name, artifacts, .. } => {
                if !found_assistant || artifacts.is_empty() {
                    continue;
                }

                let mut kept = Vec::new();
                for artifact in artifacts {
                    let Some(artifact) = read_artifact(artifact) else {
                        continue;
                    };
                    let key =
                        (name.trim().to_string(), artifact.title.clone(), artifact.link.clone());
                    if seen.insert(key) {
                        kept.push(artifact);
                    }
                }
                if kept.is_empty() {
                    continue;
                }

                let tool = name.as_str();
                if !calls_by_tool.contains_key(tool) {
                    tool_order.push(tool);
                }
                calls_by_tool.entry(tool).or_default().push(kept);
            }
        }
    }

    let title = catalog.message(TOOL_ARTIFACT_TITLE);
    tool_order
        .into_iter()
        .rev()
        .filter_map(|tool| {
            let calls = calls_by_tool.remove(tool)?;
            // calls were gathered newest first
            let artifacts: Vec<ReferenceArtifact> = calls.into_iter().rev().flatten().collect();
            Some(Reference {
                title: title.to_string(),
                source: tool.to_string(),
                icon: catalog.tool_icon(tool).to_string(),
                artifacts,
            })
        })
        .collect()
}

fn read_artifact(value: &Value) -> Option<ReferenceArtifact> {
    let title = value.get("title")?.as_str()?;
    let link = value.get("link")?.as_str()?;
    Some(ReferenceArtifact { title: title.trim().to_string(), link: link.trim().to_string() })
}
