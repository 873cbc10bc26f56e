//! Code block extraction from free-form text

use crate::resolver::normalize_tag;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;

/// Language assigned to blocks without a tag
pub const UNKNOWN_LANGUAGE: &str = "unknown";

/// A code block found in text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

impl CodeBlock {
    pub fn new(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            code: code.into(),
        }
    }
}

fn fenced_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?s)```(\w*)\n(.*?)\n```").expect("fenced code pattern is valid")
    })
}

fn inline_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"`([^`]+)`").expect("inline code pattern is valid"))
}

/// Extract code blocks from `text`.
///
/// Fenced blocks are returned in order of appearance. Inline spans are only
/// considered when no fenced block exists and `detect_single_line` is set.
/// Non-blank text without any block is returned whole as a single block.
pub fn extract(text: Option<&str>, detect_single_line: bool) -> Vec<CodeBlock> {
    let Some(text) = text.filter(|t| !t.trim().is_empty()) else {
        return Vec::new();
    };

    let mut blocks: Vec<CodeBlock> = fenced_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let code = caps.get(2)?.as_str().trim();
            if code.is_empty() {
                return None;
            }
            let tag = normalize_tag(caps.get(1).map_or("", |m| m.as_str()));
            let language = if tag.is_empty() {
                UNKNOWN_LANGUAGE.to_string()
            } else {
                tag
            };
            Some(CodeBlock::new(language, code))
        })
        .collect();

    if blocks.is_empty() && detect_single_line {
        blocks = inline_pattern()
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .filter(|code| !code.is_empty())
            .map(|code| CodeBlock::new(UNKNOWN_LANGUAGE, code))
            .collect();
    }

    if blocks.is_empty() {
        blocks.push(CodeBlock::new(UNKNOWN_LANGUAGE, text.trim()));
    }
    blocks
}

/// Flatten structured message content into plain text.
///
/// Accepts a string, or a list of parts shaped like `{"type": "text", "text": ..}`
/// and `{"type": "image_url", ..}`. Image parts become `[image]`.
pub fn content_to_text(content: &Value) -> String {
    match content {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(part_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(_) => part_to_text(content).unwrap_or_default(),
        other => other.to_string(),
    }
}

fn part_to_text(part: &Value) -> Option<String> {
    match part {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => match map.get("type").and_then(Value::as_str) {
            Some("text") => map.get("text").and_then(Value::as_str).map(str::to_string),
            Some("image_url") | Some("image") => Some("[image]".to_string()),
            _ => None,
        },
        _ => None,
    }
}
