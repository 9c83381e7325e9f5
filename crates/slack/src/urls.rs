use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static CHANNEL_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/archives/([^/?#]+)").expect("channel path regex"));
static THREAD_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/archives/([^/?#]+)/p(\d{7,})").expect("thread path regex"));
static CHANNEL_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<#([A-Z0-9]+)(?:\|[^>]*)?>").expect("channel mention regex"));

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SlackUrlError {
    #[error("invalid Slack channel URL: {0}")]
    InvalidChannelUrl(String),
    #[error("invalid Slack thread URL: {0}")]
    InvalidThreadUrl(String),
}

/// Where a thread permalink points.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadLocation {
    pub channel_id: String,
    /// The linked message.
    pub ts: String,
    /// Parent of the thread, present when the link targets a reply.
    pub thread_ts: Option<String>,
}

impl ThreadLocation {
    /// Timestamp of the whole thread when `whole_thread` is set, otherwise of
    /// the linked message only.
    pub fn target_ts(&self, whole_thread: bool) -> &str {
        if whole_thread {
            self.thread_ts.as_deref().unwrap_or(&self.ts)
        } else {
            &self.ts
        }
    }
}

pub fn build_channel_url(workspace_url: &str, channel_id: &str) -> String {
    format!("{}/archives/{channel_id}", workspace_url.trim_end_matches('/'))
}

pub fn build_thread_url(
    workspace_url: &str,
    channel_id: &str,
    ts: &str,
    thread_ts: Option<&str>,
) -> String {
    let mut url = format!("{}/p{}", build_channel_url(workspace_url, channel_id), ts.replace('.', ""));
    if let Some(thread_ts) = thread_ts.filter(|thread_ts| *thread_ts != ts) {
        url.push_str(&format!("?thread_ts={thread_ts}&cid={channel_id}"));
    }
    url
}

pub fn parse_channel_url(url: &str) -> Result<String, SlackUrlError> {
    CHANNEL_PATH
        .captures(url)
        .and_then(|captures| captures.get(1))
        .map(|channel| channel.as_str().to_owned())
        .ok_or_else(|| SlackUrlError::InvalidChannelUrl(url.to_owned()))
}

pub fn parse_thread_url(url: &str) -> Result<ThreadLocation, SlackUrlError> {
    let invalid = || SlackUrlError::InvalidThreadUrl(url.to_owned());
    let captures = THREAD_PATH.captures(url).ok_or_else(invalid)?;
    let channel_id = captures.get(1).ok_or_else(invalid)?.as_str().to_owned();
    let digits = captures.get(2).ok_or_else(invalid)?.as_str();
    let (seconds, micros) = digits.split_at(digits.len() - 6);
    let ts = format!("{seconds}.{micros}");

    let thread_ts = url
        .split_once('?')
        .map(|(_, query)| query)
        .into_iter()
        .flat_map(|query| query.split('&'))
        .find_map(|pair| pair.strip_prefix("thread_ts="))
        .map(str::to_owned);

    Ok(ThreadLocation { channel_id, ts, thread_ts })
}

/// Rewrites `<#C123|name>` channel references into channel URLs so the agent
/// sees a link it can pass to the Slack tools.
pub fn replace_channel_ids_with_urls(text: &str, workspace_url: &str) -> String {
    CHANNEL_MENTION
        .replace_all(text, |captures: &regex::Captures<'_>| {
            build_channel_url(workspace_url, &captures[1])
        })
        .into_owned()
}
