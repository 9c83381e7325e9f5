use serde::Serialize;
use threadmind_core::messages::{
    MessageCatalog, AI_REPLY_TOO_LONG_WARNING, CONTENT_DISCLAIMER, NEW_CONVERSATION_MESSAGE,
    NEW_CONVERSATION_TITLE,
};
use threadmind_core::Reference;
use tracing::warn;

use crate::markdown::clean_markdown;

/// Longest text Slack accepts in a single markdown block.
pub const MAX_MARKDOWN_CHARS: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextObject {
    PlainText { text: String, emoji: bool },
    Mrkdwn { text: String },
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::PlainText { text: text.into(), emoji: true }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self::Mrkdwn { text: text.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Markdown { text: String },
    Section { text: TextObject },
    Context { elements: Vec<TextObject> },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub fallback_text: String,
    pub blocks: Vec<Block>,
}

pub struct MessageBuilder {
    fallback_text: String,
    blocks: Vec<Block>,
}

impl MessageBuilder {
    pub fn new(fallback_text: impl Into<String>) -> Self {
        Self { fallback_text: fallback_text.into(), blocks: Vec::new() }
    }

    pub fn markdown(mut self, text: impl Into<String>) -> Self {
        self.blocks.push(Block::Markdown { text: text.into() });
        self
    }

    pub fn section(mut self, text: TextObject) -> Self {
        self.blocks.push(Block::Section { text });
        self
    }

    pub fn context<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ContextBuilder),
    {
        let mut builder = ContextBuilder::default();
        build(&mut builder);
        self.blocks.push(Block::Context { elements: builder.build() });
        self
    }

    pub fn build(self) -> MessageTemplate {
        MessageTemplate { fallback_text: self.fallback_text, blocks: self.blocks }
    }
}

#[derive(Default)]
pub struct ContextBuilder {
    elements: Vec<TextObject>,
}

impl ContextBuilder {
    pub fn plain(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::plain(text));
        self
    }

    pub fn mrkdwn(&mut self, text: impl Into<String>) -> &mut Self {
        self.elements.push(TextObject::mrkdwn(text));
        self
    }

    fn build(self) -> Vec<TextObject> {
        self.elements
    }
}

/// Agent reply as Block Kit: one markdown block, a truncation warning when
/// needed, one context block per reference and the disclaimer last.
pub fn format_reply(
    content: &str,
    references: &[Reference],
    catalog: &MessageCatalog,
) -> MessageTemplate {
    let char_count = content.chars().count();
    let truncated = char_count > MAX_MARKDOWN_CHARS;

    let mut builder = MessageBuilder::new(clean_markdown(content));
    if truncated {
        warn!(markdown_length = char_count, "agent reply exceeds markdown block limit; truncating");
        let head: String = content.chars().take(MAX_MARKDOWN_CHARS).collect();
        builder = builder
            .markdown(head)
            .context(|context| {
                context.plain(catalog.message(AI_REPLY_TOO_LONG_WARNING));
            });
    } else {
        builder = builder.markdown(content);
    }

    for reference in references {
        builder = builder.context(|context| {
            context.mrkdwn(reference_text(reference));
        });
    }

    builder
        .context(|context| {
            context.mrkdwn(catalog.message(CONTENT_DISCLAIMER));
        })
        .build()
}

fn reference_text(reference: &Reference) -> String {
    let links = reference
        .artifacts
        .iter()
        .map(|artifact| format!("<{}|{}>", artifact.link, artifact.title))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{} *{}*\n`#{}`\n{links}", reference.icon, reference.title, reference.source)
}

/// Posted instead of an answer when a channel message starts a new topic.
pub fn new_conversation_message(catalog: &MessageCatalog) -> MessageTemplate {
    MessageBuilder::new(catalog.message(NEW_CONVERSATION_TITLE))
        .context(|context| {
            context.plain(catalog.message(NEW_CONVERSATION_MESSAGE));
        })
        .build()
}
