//! Response segmentation into typed content blocks.
//!
//! Generated text arrives as one string in which the model may wrap its
//! reasoning in paired `<think>…</think>` delimiters. [`segment`] splits
//! the text into ordered [`ContentBlock`]s — reasoning inside the
//! delimiters, answer text outside — and renders each block's lightweight
//! markup to safe HTML. An unclosed `<think>` runs to end-of-text; the
//! function never errors.

use std::sync::LazyLock;

use pulldown_cmark::{Event, Options, Parser, html};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Kind of a content block in the structured assistant response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// Answer text shown to the user.
    Text,
    /// Model reasoning, rendered collapsible by frontends.
    Think,
    /// Pipeline status message (duration, errors).
    Status,
}

/// A typed, position-ordered unit of the structured assistant response.
///
/// Request-scoped: block lists are built per response and discarded; only
/// the flattened raw text is persisted as a session turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: BlockKind,
    pub content: String,
}

impl ContentBlock {
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Text,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn think(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Think,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn status(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Status,
            content: content.into(),
        }
    }
}

static THINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>(.*?)(?:</think>|\z)").expect("valid regex"));

/// Segments raw generated text into ordered text/think blocks.
///
/// Whitespace-only segments are omitted. The duration status block is the
/// orchestrator's job, not derived from the raw text here.
#[must_use]
pub fn segment(raw_text: &str) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    let mut last_end = 0;

    for capture in THINK_RE.captures_iter(raw_text) {
        let whole = capture.get(0).expect("match 0 always present");
        if whole.start() > last_end {
            push_block(&mut blocks, BlockKind::Text, &raw_text[last_end..whole.start()]);
        }
        if let Some(inner) = capture.get(1) {
            push_block(&mut blocks, BlockKind::Think, inner.as_str());
        }
        last_end = whole.end();
    }
    if last_end < raw_text.len() {
        push_block(&mut blocks, BlockKind::Text, &raw_text[last_end..]);
    }
    blocks
}

fn push_block(blocks: &mut Vec<ContentBlock>, kind: BlockKind, raw: &str) {
    if raw.trim().is_empty() {
        return;
    }
    blocks.push(ContentBlock {
        kind,
        content: render_markup(raw.trim()),
    });
}

/// Renders lightweight markup to display-safe HTML.
///
/// Soft line breaks are promoted to hard breaks so single newlines survive
/// rendering, and raw HTML in the source is escaped rather than passed
/// through.
#[must_use]
pub fn render_markup(raw: &str) -> String {
    let parser = Parser::new_ext(raw, Options::ENABLE_STRIKETHROUGH).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        Event::Html(markup) => {
            Event::Text(html_escape::encode_safe(markup.as_ref()).into_owned().into())
        }
        Event::InlineHtml(markup) => {
            Event::Text(html_escape::encode_safe(markup.as_ref()).into_owned().into())
        }
        other => other,
    });
    let mut out = String::with_capacity(raw.len() + raw.len() / 2);
    html::push_html(&mut out, parser);
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_one_text_block() {
        let blocks = segment("The refund window is 30 days.");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Text);
        assert!(blocks[0].content.contains("The refund window is 30 days."));
    }

    #[test]
    fn think_and_text_interleave_in_order() {
        let blocks = segment("<think>x</think>y");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Think);
        assert!(blocks[0].content.contains('x'));
        assert_eq!(blocks[1].kind, BlockKind::Text);
        assert!(blocks[1].content.contains('y'));
    }

    #[test]
    fn text_before_think_keeps_position() {
        let blocks = segment("lead-in <think>reasoning</think> answer");
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].kind, BlockKind::Text);
        assert_eq!(blocks[1].kind, BlockKind::Think);
        assert_eq!(blocks[2].kind, BlockKind::Text);
    }

    #[test]
    fn unclosed_think_extends_to_end() {
        let blocks = segment("answer so far <think>never closed");
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1].kind, BlockKind::Think);
        assert!(blocks[1].content.contains("never closed"));
    }

    #[test]
    fn empty_segments_are_omitted() {
        let blocks = segment("<think>only reasoning</think>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, BlockKind::Think);

        assert!(segment("").is_empty());
        assert!(segment("   \n ").is_empty());
    }

    #[test]
    fn multiple_think_spans_are_preserved() {
        let blocks = segment("<think>a</think>b<think>c</think>d");
        let kinds: Vec<BlockKind> = blocks.iter().map(|b| b.kind).collect();
        assert_eq!(
            kinds,
            vec![
                BlockKind::Think,
                BlockKind::Text,
                BlockKind::Think,
                BlockKind::Text
            ]
        );
    }

    #[test]
    fn markup_renders_to_html() {
        let rendered = render_markup("some **bold** text");
        assert!(rendered.contains("<strong>bold</strong>"));
    }

    #[test]
    fn single_newlines_become_breaks() {
        let rendered = render_markup("line one\nline two");
        assert!(rendered.contains("<br"));
    }

    #[test]
    fn raw_html_is_escaped() {
        let rendered = render_markup("hello <script>alert(1)</script>");
        assert!(!rendered.contains("<script>"));
    }

    #[test]
    fn status_blocks_serialize_with_type_tag() {
        let block = ContentBlock::status("Thought for 1.2 seconds");
        let json = serde_json::to_string(&block).unwrap();
        assert!(json.contains("\"type\":\"status\""));
    }
}
