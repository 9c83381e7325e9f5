//! Markdown to Slack mrkdwn for the plain-text fallback of a reply.
//!
//! The reply's markdown block renders natively. Notifications and previews
//! only see the fallback `text`, which uses mrkdwn rules.

use std::sync::LazyLock;

use regex::Regex;

const BOLD_MARK: char = '\u{1}';

static CODE_FENCE_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```[^\n]*\n").expect("code fence regex"));
static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*][ \t]+").expect("bullet regex"));
static LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("link regex"));
static BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("bold regex"));
static ITALIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").expect("italic regex"));

pub fn clean_markdown(text: &str) -> String {
    let text = CODE_FENCE_LANGUAGE.replace_all(text, "```\n");
    // bullets go first so a leading `* ` is not read as italic
    let text = BULLET.replace_all(&text, "• ");
    let text = LINK.replace_all(&text, "<$2|$1>");
    let text = BOLD.replace_all(&text, format!("{BOLD_MARK}${{1}}{BOLD_MARK}").as_str());
    let text = ITALIC.replace_all(&text, "_${1}_");
    text.replace(BOLD_MARK, "*")
}

#[cfg(test)]
mod tests {
    use super::clean_markdown;

    #[test]
    fn converts_emphasis() {
        assert_eq!(clean_markdown("**bold** and *italic*"), "*bold* and _italic_");
    }

    #[test]
    fn converts_links() {
        assert_eq!(
            clean_markdown("see [the docs](https://example.com/docs)"),
            "see <https://example.com/docs|the docs>"
        );
    }

    #[test]
    fn converts_bullets_without_italicising_them() {
        assert_eq!(
            clean_markdown("list:\n- one\n* two *really*\n  - nested"),
            "list:\n• one\n• two _really_\n• nested"
        );
    }

    #[test]
    fn strips_code_fence_language() {
        assert_eq!(
            clean_markdown("```rust\nfn main() {}\n```\n"),
            "```\nfn main() {}\n```\n"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(clean_markdown("nothing to see here"), "nothing to see here");
    }
}
