use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Deserialize;
use serde_json::{json, Value};
use threadmind_core::ReferenceArtifact;
use tracing::debug;

use super::{clean_title, parse_input, Tool, ToolError, ToolOutput};

const USER_AGENT: &str = "threadmind-crawler/0.1";

#[derive(Deserialize)]
struct CrawlInput {
    url: String,
}

/// Fetches a web page and hands the agent a markdown rendition of it.
pub struct PageCrawlerTool {
    http: Client,
    max_chars: usize,
}

impl PageCrawlerTool {
    pub fn new(max_chars: usize) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|error| ToolError::Http(error.to_string()))?;
        Ok(Self { http, max_chars })
    }
}

#[async_trait]
impl Tool for PageCrawlerTool {
    fn name(&self) -> &'static str {
        "page_crawler"
    }

    fn description(&self) -> &'static str {
        "Fetch a web page by URL and return its content as markdown."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "http(s) URL of the page"}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, input: Value) -> Result<ToolOutput, ToolError> {
        let CrawlInput { url } = parse_input(input)?;
        let url = url.trim().to_owned();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ToolError::InvalidInput("url must start with http:// or https://".to_owned()));
        }

        let response =
            self.http.get(&url).send().await.map_err(|error| ToolError::Http(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Http(format!("{url} returned status {status}")));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let body = response.text().await.map_err(|error| ToolError::Http(error.to_string()))?;

        let (title, content) = if content_type.contains("text/html") {
            let document = Html::parse_document(&body);
            (page_title(&document), render_markdown(&document))
        } else {
            (None, body.trim().to_owned())
        };
        let content = truncate_chars(&content, self.max_chars);
        debug!(url = %url, chars = content.chars().count(), "page crawled");

        let title = title.map(|title| clean_title(&title)).unwrap_or_else(|| url.clone());
        Ok(ToolOutput { content, artifacts: vec![ReferenceArtifact { title, link: url }] })
    }
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?.text().collect::<String>();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}

/// Renders an HTML document as markdown, dropping `<head>` and scripts.
pub fn html_to_markdown(html: &str) -> String {
    render_markdown(&Html::parse_document(html))
}

fn render_markdown(document: &Html) -> String {
    let mut writer = MarkdownWriter::default();
    writer.walk(document.root_element());
    tidy(&writer.out)
}

#[derive(Default)]
struct MarkdownWriter {
    out: String,
    list_depth: usize,
    in_pre: bool,
}

impl MarkdownWriter {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.text(&text.text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.element(child);
                    }
                }
                _ => {}
            }
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_pre {
            self.out.push_str(text);
            return;
        }
        let mut last_was_space = self.out.is_empty() || self.out.ends_with(char::is_whitespace);
        for c in text.chars() {
            if c.is_whitespace() {
                if !last_was_space {
                    self.out.push(' ');
                    last_was_space = true;
                }
            } else {
                self.out.push(c);
                last_was_space = false;
            }
        }
    }

    fn element(&mut self, element: ElementRef<'_>) {
        match element.value().name() {
            "head" | "script" | "style" | "noscript" | "template" => {}
            "h1" => self.block(element, "# "),
            "h2" => self.block(element, "## "),
            "h3" => self.block(element, "### "),
            "h4" => self.block(element, "#### "),
            "h5" => self.block(element, "##### "),
            "h6" => self.block(element, "###### "),
            "p" | "div" | "section" | "article" | "table" | "tr" => self.block(element, ""),
            "blockquote" => self.block(element, "> "),
            "br" => self.out.push('\n'),
            "hr" => self.out.push_str("\n\n---\n\n"),
            "b" | "strong" => self.wrapped(element, "**", "**"),
            "i" | "em" => self.wrapped(element, "*", "*"),
            "code" if self.in_pre => self.walk(element),
            "code" => self.wrapped(element, "`", "`"),
            "pre" => {
                self.out.push_str("\n\n```\n");
                self.in_pre = true;
                self.walk(element);
                self.in_pre = false;
                self.out.push_str("\n```\n\n");
            }
            "ul" | "ol" => {
                let outermost = self.list_depth == 0;
                if outermost {
                    self.out.push('\n');
                }
                self.list_depth += 1;
                self.walk(element);
                self.list_depth -= 1;
                if outermost {
                    self.out.push('\n');
                }
            }
            "li" => {
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                self.out.push('\n');
                self.out.push_str(&indent);
                self.out.push_str("- ");
                self.walk(element);
            }
            "a" => match element.value().attr("href") {
                Some(href) => {
                    self.out.push('[');
                    self.walk(element);
                    self.out.push_str("](");
                    self.out.push_str(href.trim());
                    self.out.push(')');
                }
                None => self.walk(element),
            },
            "td" | "th" => {
                self.walk(element);
                self.out.push(' ');
            }
            _ => self.walk(element),
        }
    }

    fn block(&mut self, element: ElementRef<'_>, prefix: &str) {
        self.out.push_str("\n\n");
        self.out.push_str(prefix);
        self.walk(element);
        self.out.push_str("\n\n");
    }

    fn wrapped(&mut self, element: ElementRef<'_>, open: &str, close: &str) {
        self.out.push_str(open);
        self.walk(element);
        self.out.push_str(close);
    }
}

/// Trims lines and collapses blank runs outside code fences.
fn tidy(markdown: &str) -> String {
    let mut cleaned = String::new();
    let mut in_fence = false;
    let mut last_was_empty = true;
    for line in markdown.lines() {
        if in_fence {
            let line = line.trim_end();
            in_fence = line != "```";
            cleaned.push_str(line);
            cleaned.push('\n');
            last_was_empty = false;
            continue;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !last_was_empty {
                cleaned.push('\n');
                last_was_empty = true;
            }
            continue;
        }
        in_fence = trimmed == "```";
        // nested list items keep their indentation
        cleaned.push_str(if trimmed.starts_with("- ") { line.trim_end() } else { trimmed });
        cleaned.push('\n');
        last_was_empty = false;
    }
    cleaned.trim().to_owned()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_owned(),
    }
}
